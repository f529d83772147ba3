use crate::engine::{
    STATUS_ERROR, STATUS_IDLE, STATUS_INTERRUPTED, STATUS_SAT, STATUS_SEARCHING,
    STATUS_UNKNOWN, STATUS_UNSAT,
};
use crate::{SearchMode, Status};
use std::fmt::{Display, Formatter};

/// **(internal)** The `(Status, engine code)` table.
const STATUS_TABLE: [(Status, i32); 7] = [
    (Status::Idle, STATUS_IDLE),
    (Status::Searching, STATUS_SEARCHING),
    (Status::Unknown, STATUS_UNKNOWN),
    (Status::Sat, STATUS_SAT),
    (Status::Unsat, STATUS_UNSAT),
    (Status::Interrupted, STATUS_INTERRUPTED),
    (Status::Error, STATUS_ERROR),
];

impl Status {
    /// Decode an engine status code. Codes outside the known range decode as `Error`.
    pub fn from_code(code: i32) -> Status {
        STATUS_TABLE
            .iter()
            .find(|(_, it)| *it == code)
            .map(|(status, _)| *status)
            .unwrap_or(Status::Error)
    }

    /// The engine code of this status.
    pub fn code(self) -> i32 {
        STATUS_TABLE
            .iter()
            .find(|(it, _)| *it == self)
            .map(|(_, code)| *code)
            .unwrap_or(STATUS_ERROR)
    }

    /// `true` for `Sat`, `Unsat` and `Unknown`, i.e. the outcomes of a finished search.
    pub fn is_verdict(self) -> bool {
        matches!(self, Status::Sat | Status::Unsat | Status::Unknown)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Idle => "idle",
            Status::Searching => "searching",
            Status::Unknown => "unknown",
            Status::Sat => "sat",
            Status::Unsat => "unsat",
            Status::Interrupted => "interrupted",
            Status::Error => "error",
        };
        write!(f, "{}", name)
    }
}

impl SearchMode {
    /// The value of the `mode` configuration option which selects this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::OneShot => "one-shot",
            SearchMode::MultiCheck => "multi-check",
            SearchMode::PushPop => "push-pop",
            SearchMode::Interactive => "interactive",
        }
    }
}

impl Display for SearchMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
