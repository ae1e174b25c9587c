use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl ScoutError {
    pub fn api(message: impl Into<String>) -> Self {
        ScoutError::Api {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ScoutError::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;
