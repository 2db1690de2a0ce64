use thiserror::Error;

pub const GENERIC_CONNECT_FAILURE: &str = "Failed to connect to the server.";
pub const GENERIC_INVALID_RESPONSE: &str = "Server returned an invalid response.";
pub const GENERIC_REQUEST_FAILURE: &str = "The server could not complete the request.";

#[derive(Debug, Error)]
pub enum Error {
    /// Required input missing; raised before any request is built.
    #[error("{message}")]
    Precondition { message: String },

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} answered {status}{}", server_suffix(.message))]
    Server {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },

    #[error("invalid JSON from {endpoint}: {source}")]
    Malformed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected response from {endpoint}: expected {expected}")]
    UnexpectedShape {
        endpoint: String,
        expected: &'static str,
    },

    #[error("empty file received from {endpoint}")]
    EmptyReport { endpoint: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn server_suffix(message: &Option<String>) -> String {
    match message.as_deref() {
        Some(m) if !m.trim().is_empty() => format!(": {m}"),
        _ => String::new(),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition { .. })
    }

    /// Text to show the user. Server-provided messages pass through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::Precondition { message } => message.clone(),
            Self::Transport { .. } => GENERIC_CONNECT_FAILURE.to_string(),
            Self::Server {
                message: Some(m), ..
            } if !m.trim().is_empty() => m.clone(),
            Self::Server { .. } => GENERIC_REQUEST_FAILURE.to_string(),
            Self::Malformed { .. } | Self::UnexpectedShape { .. } => {
                GENERIC_INVALID_RESPONSE.to_string()
            }
            Self::EmptyReport { .. } => "Empty file received.".to_string(),
            other => other.to_string(),
        }
    }
}
