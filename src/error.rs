//! Core error taxonomy shared by the stores, the transcription pipeline,
//! and the API layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A meeting or job the caller referenced does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The external transcription service returned a non-200 or was unreachable.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Malformed input: bad update payload, bad audio path.
    #[error("validation error: {0}")]
    Validation(String),

    /// The asynchronous poll loop exhausted its retry budget.
    #[error("transcription timed out after {attempts} status polls")]
    Timeout { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = CoreError::NotFound("meeting 5".to_string());
        assert_eq!(err.to_string(), "not found: meeting 5");

        let err = CoreError::Timeout { attempts: 60 };
        assert!(err.to_string().contains("60 status polls"));
    }
}
