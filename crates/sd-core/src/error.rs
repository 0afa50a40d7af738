use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Authentication error: {0}")]
    Authentication(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl SdError {
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SdError>;
