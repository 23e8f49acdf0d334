//! Typed failure classes.
//!
//! Operations return [`anyhow::Result`]; when a failure belongs to one of
//! the classes below it is raised as an [`Error`] so that boundaries (the
//! CLI, the HTTP server, batch jobs) can tell a missing subject from a
//! provider outage with [`classify`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing credentials, unknown provider, or a vector width that does
    /// not match the index schema. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An explicitly requested subject, week, or document does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed input rejected before any I/O (e.g. start after end).
    #[error("invalid input: {0}")]
    Validation(String),

    /// The embedding or answer backend failed or returned a malformed batch.
    #[error("provider error: {0}")]
    Provider(String),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> anyhow::Error {
        Error::Configuration(msg.into()).into()
    }

    pub fn not_found(what: impl Into<String>) -> anyhow::Error {
        Error::NotFound(what.into()).into()
    }

    pub fn validation(msg: impl Into<String>) -> anyhow::Error {
        Error::Validation(msg.into()).into()
    }

    pub fn provider(msg: impl Into<String>) -> anyhow::Error {
        Error::Provider(msg.into()).into()
    }
}

/// Find the first typed [`Error`] in an error chain, looking through any
/// `.context(...)` layers added on the way up.
pub fn classify(err: &anyhow::Error) -> Option<&Error> {
    err.chain().find_map(|e| e.downcast_ref::<Error>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn classify_sees_through_context() {
        let err: anyhow::Result<()> = Err(Error::not_found("subject 7"));
        let err = err.context("rebuilding week").unwrap_err();
        assert!(matches!(classify(&err), Some(Error::NotFound(_))));
        assert_eq!(
            classify(&err).map(|e| e.to_string()).as_deref(),
            Some("subject 7 not found")
        );
    }

    #[test]
    fn classify_untyped_is_none() {
        let err = anyhow::anyhow!("disk on fire");
        assert!(classify(&err).is_none());
    }
}
