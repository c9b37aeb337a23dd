use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid notification endpoint: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported api scheme: {0}")]
    Scheme(String),
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid api url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api error: {status} - {reason} - {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("failed to decode api response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration directory available")]
    NoConfigDir,
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
