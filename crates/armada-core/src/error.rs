use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArmadaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ArmadaError {
    /// Short, stable error code for logs and API responses.
    pub fn code(&self) -> &'static str {
        match self {
            ArmadaError::Config(_) => "CONFIG_ERROR",
            ArmadaError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ArmadaError>;
