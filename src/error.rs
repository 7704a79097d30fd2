use crate::session::{ModeRequest, PresentationMode};

/// Why an asset could not be turned into a displayable model.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("{0} import is not available in this build")]
    FormatUnavailable(&'static str),
    #[error("failed to parse glTF: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("asset contains no renderable geometry")]
    Empty,
    #[error("loading was cancelled")]
    Cancelled,
    #[error("the loader stopped before producing a result")]
    Aborted,
}

/// Why a presentation mode could not be entered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("load a model first")]
    NoModel,
    #[error("{0} is not supported on this device")]
    Unsupported(ModeRequest),
    #[error("cannot enter {requested} while {current} is active")]
    IllegalTransition {
        current: PresentationMode,
        requested: ModeRequest,
    },
    #[error("session request was rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("{0} is not available on this platform")]
    Unavailable(&'static str),
}
