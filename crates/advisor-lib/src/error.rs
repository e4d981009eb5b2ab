//! Error taxonomy for the advisor
//!
//! Configuration errors are fatal for a whole run. Query and parse errors are
//! scoped to a single entity and recovered by the assembler.

use thiserror::Error;

/// Result alias used across the library
pub type Result<T, E = AdvisorError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Required configuration is missing or unreadable
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A metric query failed (transport, timeout, status or envelope)
    #[error("query error: {0}")]
    Query(String),

    /// A returned value could not be decoded as a number
    #[error("parse error: {0}")]
    Parse(String),

    /// The cluster inventory could not be consulted
    #[error("inventory error: {0}")]
    Inventory(String),

    /// The report sink could not accept a record
    #[error("sink error: {0}")]
    Sink(String),
}

impl AdvisorError {
    /// Errors that only affect a single entity and never abort a run
    pub fn is_entity_scoped(&self) -> bool {
        matches!(self, AdvisorError::Query(_) | AdvisorError::Parse(_))
    }
}

impl From<reqwest::Error> for AdvisorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdvisorError::Query(format!("request timed out: {}", err))
        } else {
            AdvisorError::Query(err.to_string())
        }
    }
}

impl From<config::ConfigError> for AdvisorError {
    fn from(err: config::ConfigError) -> Self {
        AdvisorError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_scope() {
        assert!(AdvisorError::Query("boom".into()).is_entity_scoped());
        assert!(AdvisorError::Parse("NaN?".into()).is_entity_scoped());
        assert!(!AdvisorError::Configuration("empty".into()).is_entity_scoped());
        assert!(!AdvisorError::Sink("closed".into()).is_entity_scoped());
    }

    #[test]
    fn test_display() {
        let err = AdvisorError::Configuration("metrics endpoint must not be empty".into());
        assert_eq!(
            err.to_string(),
            "configuration error: metrics endpoint must not be empty"
        );
    }
}
