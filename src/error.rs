//! Error types for the failover controllers
//!
//! Every failure a verb handler can hit is one of these variants. The
//! variant decides the outcome code reported to the cluster manager and
//! whether a periodic monitor may downgrade it.

use thiserror::Error;

use crate::ocf::Outcome;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing static configuration, unresolvable local identity,
    /// or an empty eligible-route set
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Required invocation parameter missing or inconsistent
    #[error("Missing or invalid parameter: {0}")]
    MissingParameter(String),

    /// An IP configuration is already bound to a different public IP than
    /// the desired one
    #[error("Conflicting association: {0}")]
    ConflictingAssociation(String),

    /// A required local file or tool is absent
    #[error("Not installed: {0}")]
    NotInstalled(String),

    /// Association or routing state inconsistent with the two-owner model
    #[error("Unexpected topology: {0}")]
    Topology(String),

    /// No eligible route points into our subnet at all
    #[error("No route in subnet {0} points at any address")]
    NothingRouted(String),

    /// Control plane rejected our credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No credential source could issue a token
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// Control plane answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Request never completed
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// An asynchronous operation finished in a non-success state
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// The validation call budget ran out
    #[error("Call budget exceeded after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Authentication, transport and HTTP failures from the control plane
    pub fn is_cloud_api_error(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_)
                | Error::CredentialUnavailable(_)
                | Error::Http { .. }
                | Error::Transport(_)
                | Error::OperationFailed(_)
        )
    }

    /// Errors that no amount of retrying within one invocation will fix
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::ConfigError(_)
                | Error::MissingParameter(_)
                | Error::ConflictingAssociation(_)
                | Error::NotInstalled(_)
                | Error::Topology(_)
        )
    }

    /// Whether a periodic monitor may report success instead of this error
    ///
    /// Topology and configuration errors are never masked.
    pub fn is_tolerable(&self) -> bool {
        self.is_cloud_api_error() || matches!(self, Error::Timeout(_) | Error::NothingRouted(_))
    }

    /// Outcome code reported for this error
    pub fn outcome(&self) -> Outcome {
        match self {
            Error::ConfigError(_)
            | Error::MissingParameter(_)
            | Error::ConflictingAssociation(_) => Outcome::ErrConfigured,
            Error::NotInstalled(_) => Outcome::ErrInstalled,
            _ => Outcome::ErrGeneric,
        }
    }
}
