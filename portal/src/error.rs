use portal_core::DocumentId;
use portal_router::RouteError;
use thiserror::Error;

/// Error from a portal operation. `E` is the document store's error type.
#[derive(Debug, Error)]
pub enum PortalError<E> {
    #[error("no creature could be resolved to token data: {0}")]
    NoTokenData(String),

    #[error("no free position for {0} near the picked point")]
    NoFreePosition(String),

    #[error("portal has no teleport target")]
    NoTeleportTarget,

    #[error("actor {0} is not transformed")]
    NotTransformed(DocumentId),

    #[error(transparent)]
    Route(#[from] RouteError<E>),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Parse(#[from] toml::de::Error),
}
