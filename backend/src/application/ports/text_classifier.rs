use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("classifier returned {status}")]
    Status { status: u16 },

    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// Port for the external text classifier. Returns the raw free-text answer.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ClassifierError>;
}
