use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum ProviderError {
    Network(String),
    Blocked(String),
    HtmlParse(String),
    MissingEmbeddedJson,
    JsonParse(String),
    UnexpectedShape(String),
    Config(String),
    Storage(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Network(msg) => write!(f, "Network error: {msg}"),
            ProviderError::Blocked(msg) => write!(f, "Blocked by site: {msg}"),
            ProviderError::HtmlParse(msg) => write!(f, "HTML parse error: {msg}"),
            ProviderError::MissingEmbeddedJson => write!(f, "__NEXT_DATA__ not found"),
            ProviderError::JsonParse(msg) => write!(f, "JSON parse error: {msg}"),
            ProviderError::UnexpectedShape(msg) => write!(f, "Unexpected data shape: {msg}"),
            ProviderError::Config(msg) => write!(f, "Config error: {msg}"),
            ProviderError::Storage(msg) => write!(f, "Storage error: {msg}"),
        }
    }
}

impl Error for ProviderError {}
