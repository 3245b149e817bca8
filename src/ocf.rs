//! Verbs and outcome codes exchanged with the cluster manager

use std::fmt;

use clap::ValueEnum;

/// Action requested by the cluster manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verb {
    Start,
    Stop,
    Monitor,
    ValidateAll,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Monitor => "monitor",
            Verb::ValidateAll => "validate-all",
        };
        f.write_str(s)
    }
}

/// The single result of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NotRunning,
    ErrGeneric,
    ErrConfigured,
    ErrInstalled,
}

impl Outcome {
    /// Process exit status expected by the cluster manager
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::ErrGeneric => 1,
            Outcome::ErrInstalled => 5,
            Outcome::ErrConfigured => 6,
            Outcome::NotRunning => 7,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Success => "OCF_SUCCESS",
            Outcome::NotRunning => "OCF_NOT_RUNNING",
            Outcome::ErrGeneric => "OCF_ERR_GENERIC",
            Outcome::ErrConfigured => "OCF_ERR_CONFIGURED",
            Outcome::ErrInstalled => "OCF_ERR_INSTALLED",
        };
        f.write_str(s)
    }
}

/// Collapse a handler result into exactly one outcome
pub fn resolve(result: &crate::Result<Outcome>) -> Outcome {
    match result {
        Ok(outcome) => *outcome,
        Err(e) => e.outcome(),
    }
}
