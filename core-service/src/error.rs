use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("An audio player already exists; the media handle is single-instance")]
    PlayerAlreadyCreated,

    #[error("Runtime error: {0}")]
    Runtime(#[source] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

impl From<core_runtime::Error> for CoreError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => CoreError::CapabilityMissing {
                capability,
                message,
            },
            other => CoreError::Runtime(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_errors_keep_their_shape() {
        let err: CoreError = core_runtime::Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "provide one".to_string(),
        }
        .into();

        assert!(matches!(
            err,
            CoreError::CapabilityMissing { ref capability, .. } if capability == "HttpClient"
        ));
    }

    #[test]
    fn test_other_runtime_errors_wrapped() {
        let err: CoreError = core_runtime::Error::Config("bad host".to_string()).into();
        assert!(matches!(err, CoreError::Runtime(_)));
        assert!(err.to_string().contains("bad host"));
    }
}
