use thiserror::Error;

/// Errors raised while building API credentials.
///
/// These are configuration errors: they surface once, at construction, and are never
/// retried.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A credential value was supplied but is empty.
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}
