use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Peer request failed: {0}")]
    PeerUnreachable(String),

    #[error("Data fetch failed: {0}")]
    DataFetch(String),

    #[error("Enqueue failed: {0}")]
    Enqueue(String),

    #[error("Registry update failed: {0}")]
    Registry(String),

    #[error("Replica selection failed: {0}")]
    Selection(String),

    #[error("No service provider registered for endpoint '{0}'")]
    UnknownEndpoint(String),

    #[error("No local clock record for wallet '{0}'")]
    MissingClock(String),

    #[error("Sync issuing produced {errors} errors for {issued} issued requests")]
    SyncIssuing { errors: usize, issued: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::PeerUnreachable("https://cn1.example.com".to_string());
        assert_eq!(
            err.to_string(),
            "Peer request failed: https://cn1.example.com"
        );

        let err = EngineError::DataFetch("user listing unavailable".to_string());
        assert_eq!(err.to_string(), "Data fetch failed: user listing unavailable");

        let err = EngineError::Enqueue("channel closed".to_string());
        assert_eq!(err.to_string(), "Enqueue failed: channel closed");

        let err = EngineError::Registry("relay rejected write".to_string());
        assert_eq!(err.to_string(), "Registry update failed: relay rejected write");

        let err = EngineError::UnknownEndpoint("https://cn9.example.com".to_string());
        assert_eq!(
            err.to_string(),
            "No service provider registered for endpoint 'https://cn9.example.com'"
        );
    }

    #[test]
    fn test_sync_issuing_message() {
        let err = EngineError::SyncIssuing {
            errors: 3,
            issued: 1,
        };
        assert_eq!(
            err.to_string(),
            "Sync issuing produced 3 errors for 1 issued requests"
        );
    }

    #[test]
    fn test_error_debug() {
        let err = EngineError::MissingClock("0xabc".to_string());
        let debug = format!("{:?}", err);
        assert!(debug.contains("MissingClock"));
    }

    #[test]
    fn test_engine_result_type() {
        let ok: EngineResult<u64> = Ok(7);
        assert_eq!(ok.unwrap(), 7);

        let err: EngineResult<u64> = Err(EngineError::DataFetch("x".to_string()));
        assert!(err.is_err());
    }
}
