use serde::{Deserialize, Serialize};

/// Catalog identifier of a book.
pub type BookId = i64;

/// Book summary as returned by the catalog API.
///
/// Plan entries embed a full copy of this rather than a reference: the guest
/// store has no link to the live catalog, so whatever was captured at add time
/// is what gets rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub age_range: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub reading_level: Option<String>,
    #[serde(default)]
    pub popularity_score: f64,
}

impl BookSummary {
    /// Minimal summary, mostly useful for tests and fixtures.
    pub fn new(id: BookId, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            author: author.into(),
            description: String::new(),
            age_range: String::new(),
            subjects: Vec::new(),
            cover_image_url: None,
            reading_level: None,
            popularity_score: 0.0,
        }
    }

    /// "Title by Author" for one-line listings.
    pub fn byline(&self) -> String {
        if self.author.is_empty() {
            self.title.clone()
        } else {
            format!("{} by {}", self.title, self.author)
        }
    }
}
