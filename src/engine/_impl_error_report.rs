use std::cell::RefCell;
use std::fmt::{Display, Formatter};

/// Error codes reported by the engine through [`error_code`].
///
/// The integer table is stable: `code()` and `from_code()` are exact inverses on all
/// listed variants, and every integer that is not listed maps to `Internal`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorCode {
    NoError,
    InvalidType,
    InvalidTerm,
    InvalidConstantIndex,
    InvalidTupleIndex,
    WrongNumberOfArguments,
    TypeMismatch,
    IncompatibleTypes,
    ArithTermRequired,
    BitvectorRequired,
    IncompatibleBvSizes,
    InvalidBvSize,
    DivisionByZero,
    ArithNotSupported,
    BvNotSupported,
    UfNotSupported,
    NonlinearArithNotSupported,
    OperationNotSupported,
    InvalidOperation,
    InvalidConfig,
    UnknownLogic,
    LogicNotSupported,
    InvalidConfigName,
    InvalidConfigValue,
    InvalidParamName,
    InvalidParamValue,
    UnknownOption,
    EvalUnknownTerm,
    EvalNotSupported,
    EvalConversionFailed,
    EvalFormulaFalse,
    EvalOverflow,
    InvalidValueNode,
    InvalidHandle,
    Internal,
}

/// **(internal)** The `(ErrorCode, i32)` table. Keep it sorted by code.
const CODE_TABLE: [(ErrorCode, i32); 35] = [
    (ErrorCode::NoError, 0),
    (ErrorCode::InvalidType, 1),
    (ErrorCode::InvalidTerm, 2),
    (ErrorCode::InvalidConstantIndex, 3),
    (ErrorCode::InvalidTupleIndex, 4),
    (ErrorCode::WrongNumberOfArguments, 5),
    (ErrorCode::TypeMismatch, 6),
    (ErrorCode::IncompatibleTypes, 7),
    (ErrorCode::ArithTermRequired, 8),
    (ErrorCode::BitvectorRequired, 9),
    (ErrorCode::IncompatibleBvSizes, 10),
    (ErrorCode::InvalidBvSize, 11),
    (ErrorCode::DivisionByZero, 12),
    (ErrorCode::ArithNotSupported, 20),
    (ErrorCode::BvNotSupported, 21),
    (ErrorCode::UfNotSupported, 22),
    (ErrorCode::NonlinearArithNotSupported, 23),
    (ErrorCode::OperationNotSupported, 24),
    (ErrorCode::InvalidOperation, 25),
    (ErrorCode::InvalidConfig, 26),
    (ErrorCode::UnknownLogic, 27),
    (ErrorCode::LogicNotSupported, 28),
    (ErrorCode::InvalidConfigName, 30),
    (ErrorCode::InvalidConfigValue, 31),
    (ErrorCode::InvalidParamName, 32),
    (ErrorCode::InvalidParamValue, 33),
    (ErrorCode::UnknownOption, 34),
    (ErrorCode::EvalUnknownTerm, 40),
    (ErrorCode::EvalNotSupported, 41),
    (ErrorCode::EvalConversionFailed, 42),
    (ErrorCode::EvalFormulaFalse, 43),
    (ErrorCode::EvalOverflow, 44),
    (ErrorCode::InvalidValueNode, 50),
    (ErrorCode::InvalidHandle, 60),
    (ErrorCode::Internal, 99),
];

impl ErrorCode {
    /// The wire-level integer of this code.
    pub fn code(self) -> i32 {
        CODE_TABLE
            .iter()
            .find(|(it, _)| *it == self)
            .map(|(_, code)| *code)
            .unwrap_or(99)
    }

    /// Decode a wire-level integer. Unknown integers decode as `ErrorCode::Internal`.
    pub fn from_code(code: i32) -> ErrorCode {
        CODE_TABLE
            .iter()
            .find(|(_, it)| *it == code)
            .map(|(error, _)| *error)
            .unwrap_or(ErrorCode::Internal)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// **(internal)** The last failure observed on the current thread.
struct ErrorReport {
    code: ErrorCode,
    message: String,
}

thread_local! {
    static LAST_ERROR: RefCell<ErrorReport> = RefCell::new(ErrorReport {
        code: ErrorCode::NoError,
        message: String::new(),
    });
}

/// Code of the last error reported on this thread (`NoError` if there is none).
pub fn error_code() -> ErrorCode {
    LAST_ERROR.with(|it| it.borrow().code)
}

/// Human-readable message of the last error reported on this thread.
pub fn error_string() -> String {
    LAST_ERROR.with(|it| {
        let report = it.borrow();
        if report.code == ErrorCode::NoError {
            "no error".to_string()
        } else {
            report.message.clone()
        }
    })
}

/// Clear the error record of this thread.
pub fn reset_error() {
    LAST_ERROR.with(|it| {
        let mut report = it.borrow_mut();
        report.code = ErrorCode::NoError;
        report.message.clear();
    })
}

/// **(internal)** Record an error on the current thread and return the generic `-1` status.
pub(crate) fn fail(code: ErrorCode, message: impl Into<String>) -> i32 {
    LAST_ERROR.with(|it| {
        let mut report = it.borrow_mut();
        report.code = code;
        report.message = message.into();
    });
    -1
}

/// **(internal)** An engine failure that has not been reported yet. Internal helpers return
/// it through `Result` and the boundary functions turn it into a status code via `report`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Failure {
    pub(crate) code: ErrorCode,
    pub(crate) message: String,
}

impl Failure {
    pub(crate) fn new(code: ErrorCode, message: impl Into<String>) -> Failure {
        Failure {
            code,
            message: message.into(),
        }
    }

    /// Store this failure in the thread-local record; returns `-1`.
    pub(crate) fn report(self) -> i32 {
        fail(self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::{error_code, error_string, fail, reset_error, ErrorCode, CODE_TABLE};

    #[test]
    fn error_code_table_is_bidirectional() {
        for (code, value) in CODE_TABLE {
            assert_eq!(code.code(), value);
            assert_eq!(ErrorCode::from_code(value), code);
        }
        assert_eq!(ErrorCode::from_code(-7), ErrorCode::Internal);
        assert_eq!(ErrorCode::from_code(1000), ErrorCode::Internal);
    }

    #[test]
    fn error_record_is_thread_local_and_resettable() {
        reset_error();
        assert_eq!(error_code(), ErrorCode::NoError);
        assert_eq!(fail(ErrorCode::InvalidTerm, "bad term"), -1);
        assert_eq!(error_code(), ErrorCode::InvalidTerm);
        assert_eq!(error_string(), "bad term");

        std::thread::spawn(|| assert_eq!(error_code(), ErrorCode::NoError))
            .join()
            .unwrap();

        reset_error();
        assert_eq!(error_code(), ErrorCode::NoError);
        assert_eq!(error_string(), "no error");
    }
}
