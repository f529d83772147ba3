use crate::engine::{self, ErrorCode};
use crate::ResourceKind;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// The engine's description of a failed call: the error code and the message of its
/// error record at the time of the failure.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct EngineFault {
    pub code: ErrorCode,
    pub message: String,
}

/// Errors of the safe layer. Every engine failure is translated into exactly one category,
/// depending on the operation that triggered it.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SolverError {
    /// Unknown option name, invalid option value or unknown logic.
    #[error("configuration error: {0}")]
    Config(EngineFault),
    /// The engine rejected a session (e.g. an incompatible logic and mode).
    #[error("session error: {0}")]
    Session(EngineFault),
    /// An ill-typed assertion, or an assertion the session does not accept right now.
    #[error("assertion error: {0}")]
    Assert(EngineFault),
    /// `push`/`pop` in a session without scopes, or `pop` without a matching `push`.
    #[error("scope error: {0}")]
    Scope(EngineFault),
    /// A model was requested (or used) without a `Sat` result.
    #[error("model error: {0}")]
    Model(EngineFault),
    /// A value cannot be decoded in the requested representation.
    #[error("value error: {0}")]
    Value(EngineFault),
    /// The engine signalled an error during a check.
    #[error("search error: {0}")]
    Search(EngineFault),
    /// An ill-typed term or type construction.
    #[error("term error: {0}")]
    Term(EngineFault),
    #[error("the {0} resource is already closed")]
    ResourceClosed(ResourceKind),
}

impl EngineFault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> EngineFault {
        EngineFault {
            code,
            message: message.into(),
        }
    }

    /// **(internal)** Read the engine's error record of this thread and clear it.
    pub(crate) fn take() -> EngineFault {
        let fault = EngineFault {
            code: engine::error_code(),
            message: engine::error_string(),
        };
        engine::reset_error();
        fault
    }
}

impl Display for EngineFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl SolverError {
    /// The engine fault behind this error, if it was raised by the engine.
    pub fn fault(&self) -> Option<&EngineFault> {
        match self {
            SolverError::Config(fault)
            | SolverError::Session(fault)
            | SolverError::Assert(fault)
            | SolverError::Scope(fault)
            | SolverError::Model(fault)
            | SolverError::Value(fault)
            | SolverError::Search(fault)
            | SolverError::Term(fault) => Some(fault),
            SolverError::ResourceClosed(_) => None,
        }
    }

    /// The engine error code behind this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        self.fault().map(|it| it.code)
    }
}

/// **(internal)** Turn an engine status code into a `Result`, wrapping the engine's error
/// record into the given category when the code is negative.
pub(crate) fn check_code(
    code: i32,
    category: fn(EngineFault) -> SolverError,
) -> Result<(), SolverError> {
    if code < 0 {
        Err(category(EngineFault::take()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faults_are_taken_from_the_error_record() {
        engine::reset_error();
        assert!(engine::set_config(engine::NULL_HANDLE, "mode", "one-shot") < 0);
        let error = check_code(-1, SolverError::Config).unwrap_err();
        assert_eq!(error.code(), Some(ErrorCode::InvalidHandle));
        assert!(error.to_string().starts_with("configuration error: "));
        // The record is cleared once the fault is taken.
        assert_eq!(engine::error_code(), ErrorCode::NoError);
        assert!(check_code(0, SolverError::Config).is_ok());
    }

    #[test]
    fn closed_resources_have_no_fault() {
        let error = SolverError::ResourceClosed(ResourceKind::Model);
        assert_eq!(error.fault(), None);
        assert_eq!(error.to_string(), "the model resource is already closed");
    }
}
