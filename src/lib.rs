//! Reading-plan state for the Living Books catalog.
//!
//! A family's reading plan lives in one of two places: a local store while
//! browsing as a guest, or the backend once signed in. [`reconcile::Controller`]
//! decides which one is authoritative and carries guest entries across the
//! sign-in boundary.

pub mod book;
pub mod config;
pub mod local_plan;
pub mod logging;
pub mod reconcile;
pub mod remote;
pub mod session;
pub mod status;
pub mod storage;
