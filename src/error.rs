use thiserror::Error;

pub type Result<T> = std::result::Result<T, HelpDeskError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HelpDeskError {
    /// neither the secret store nor manual entry produced a key.
    #[error("missing credential '{name}'")]
    MissingCredential { name: String },
    /// transport or service failure from the completion endpoint.
    #[error("provider: {0}")]
    Provider(String),
    /// the provider could not be constructed from config + credential.
    #[error("build provider: {0}")]
    Build(String),
    #[error("secrets: {0}")]
    Secrets(String),
    #[error("io: {0}")]
    Io(String),
}

impl From<llm::error::LLMError> for HelpDeskError {
    fn from(err: llm::error::LLMError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<std::io::Error> for HelpDeskError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for HelpDeskError {
    fn from(err: toml::de::Error) -> Self {
        Self::Secrets(err.to_string())
    }
}
