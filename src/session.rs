//! Account session, as seen by the reading plan.
//!
//! Token issuance and refresh live with the auth backend. All this module
//! answers is "is there a signed-in user right now?"; presence of a session is
//! what switches the controller from guest to account mode.

use crate::config::ApiConfig;
use crate::remote::http::Transport;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subscription_tier: Option<String>,
    #[serde(default)]
    pub subscription_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
}

impl Session {
    pub fn display_name(&self) -> &str {
        self.user.name.as_deref().unwrap_or(&self.user.email)
    }
}

#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Current session, or `None` for a guest. Failures count as guest.
    async fn current(&self) -> Option<Session>;
}

/// Fixed answer, for offline use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSession(pub Option<Session>);

impl StaticSession {
    pub fn guest() -> Self {
        Self(None)
    }

    pub fn signed_in(user: User) -> Self {
        Self(Some(Session { user }))
    }
}

#[async_trait]
impl SessionSource for StaticSession {
    async fn current(&self) -> Option<Session> {
        self.0.clone()
    }
}

/// Probes the backend's "who am I" endpoint.
#[derive(Debug, Clone)]
pub struct HttpSessionSource {
    transport: Transport,
    path: String,
    has_token: bool,
}

impl HttpSessionSource {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(&config.base_url, config.session_token.clone())?,
            path: config.session_path.clone(),
            has_token: config.session_token.is_some(),
        })
    }
}

#[async_trait]
impl SessionSource for HttpSessionSource {
    async fn current(&self) -> Option<Session> {
        if !self.has_token {
            return None;
        }

        let req = self.transport.request(Method::GET, &self.path);
        match self.transport.json::<Option<User>>(req).await {
            Ok(Some(user)) => {
                tracing::debug!(user_id = user.id, "session active");
                Some(Session { user })
            }
            Ok(None) => None,
            Err(e) => {
                if e.status_code().is_none() {
                    tracing::warn!("session probe failed, continuing as guest: {}", e);
                } else {
                    tracing::debug!("no session: {}", e);
                }
                None
            }
        }
    }
}
