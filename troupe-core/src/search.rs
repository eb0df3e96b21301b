use serde::{Deserialize, Serialize};

use crate::TroupeError;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub content: String,
}

impl SearchHit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
pub trait SearchClient: Send + Sync + 'static {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, TroupeError>;
}
