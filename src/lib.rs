//! A resource-safe binding layer over an SMT decision-procedure engine.
//!
//! The engine itself lives behind the handle-based boundary in [`engine`]: every resource
//! (configuration, solving context, search parameters, model) is an opaque integer handle,
//! and every failure is a negative status code plus a thread-local error record. This crate
//! wraps that boundary into owned objects:
//!
//!  - [`Config`] is an editable set of options consumed when a [`Session`] is created.
//!  - [`Session`] accumulates assertions (optionally in `push`/`pop` scopes) and runs
//!    (possibly time-bounded) satisfiability checks.
//!  - [`Parameters`] tune the search of a single check.
//!  - [`Model`] is the satisfying assignment of a `Sat` check. Its values are explored
//!    lazily through [`YVal`] nodes of the model's value DAG.
//!
//! All four own a [`Handle`] which is released exactly once: either explicitly with
//! `close` (which is idempotent) or when the object is dropped. Live handles are counted
//! per [`ResourceKind`] in a process-wide [`population`] registry, so leaks can be detected
//! by checking that [`population::snapshot`] is clear at the end of a workload.
//!
//! Formulas are built from [`Term`] and [`Type`] values, which are plain indices into the
//! engine's append-only term and type tables.
//!
//! The engine is Z3 (feature `solver-z3`, enabled by default). Z3 objects are bound to the
//! thread that created them, so each thread has its own engine: types, terms and every
//! resource can only be used on the thread which created them. A [`SearchInterrupter`]
//! is the exception, it can stop a check from any thread.

use crate::engine::{RawHandle, TermId, TypeId};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

#[cfg(not(feature = "solver-z3"))]
compile_error!("biodivine-lib-smt needs a decision procedure: enable the `solver-z3` feature.");

pub mod engine;
pub mod population;

/// **(internal)** The typed error taxonomy of the safe layer.
mod error;
/// **(internal)** Utility methods for `Config`.
mod _impl_config;
/// **(internal)** Utility methods for `Handle` and `ResourceKind`.
mod _impl_handle;
/// **(internal)** Value queries of `Model` (shortcuts, `YVal` exploration, implicants).
mod _impl_model;
/// **(internal)** Utility methods for `Parameters`.
mod _impl_parameters;
/// **(internal)** Utility methods for `Session` and `SearchInterrupter`.
mod _impl_session;
/// **(internal)** Conversions between `Status`/`SearchMode` and their engine encoding.
mod _impl_status;
/// **(internal)** Term constructors.
mod _impl_term;
/// **(internal)** Type constructors.
mod _impl_type;
/// **(internal)** Conversions between `YValTag` and its engine encoding.
mod _impl_yval;
/// **(internal)** Deadline timer which interrupts a running check.
mod watchdog;

pub use engine::ErrorCode;
pub use error::{EngineFault, SolverError};
pub use population::Census;

/// The kinds of engine resources that can be owned by a [`Handle`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResourceKind {
    Config,
    Session,
    Parameters,
    Model,
}

/// Exclusive ownership of one engine resource.
///
/// A handle is created only from a successfully allocated resource and releases it exactly
/// once. After `close` (or `drop`), the raw value is reset to the null sentinel, further
/// `close` calls do nothing and every other use fails with [`SolverError::ResourceClosed`].
#[derive(Debug)]
pub struct Handle {
    kind: ResourceKind,
    raw: RawHandle,
}

/// Context construction options (logic, search mode, solver architecture, theories).
///
/// A configuration is consumed by [`Session::from_config`].
#[derive(Debug)]
pub struct Config {
    handle: Handle,
}

/// A solving session (a "context" in the terminology of the engine).
///
/// The session accumulates assertions in a stack of scopes and answers satisfiability
/// checks about their conjunction.
#[derive(Debug)]
pub struct Session {
    handle: Handle,
    /// Incremented at the start and at the end of every check, so that a deadline timer
    /// armed for one check can never interrupt another one.
    generation: Arc<AtomicU64>,
}

/// Search modes supported by a [`Session`].
///
/// Not every mode is compatible with every logic (e.g. nonlinear arithmetic requires
/// a solver which does not support `Interactive`).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SearchMode {
    /// A single check, no incremental assertions.
    OneShot,
    /// Repeated checks with assertions added in between, but no retraction.
    MultiCheck,
    /// Assertions in a stack of `push`/`pop` scopes.
    PushPop,
    /// Like `PushPop`, but an interrupted search leaves the session usable.
    Interactive,
}

/// A thread-safe token which can interrupt a running check of one [`Session`].
///
/// The token does not own the session. Once the session is closed, `stop` does nothing.
#[derive(Clone, Debug)]
pub struct SearchInterrupter {
    session: RawHandle,
}

/// Search parameters of a single check (random seed, solver time limit).
///
/// A parameter set can be reused across checks and across sessions.
#[derive(Debug)]
pub struct Parameters {
    handle: Handle,
}

/// Status of a [`Session`].
///
/// `Idle` and `Searching` are never returned by a check.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    Idle,
    Searching,
    Unknown,
    Sat,
    Unsat,
    Interrupted,
    Error,
}

/// A satisfying assignment produced by a `Sat` check (or built explicitly with
/// [`Model::from_map`]).
#[derive(Debug)]
pub struct Model {
    handle: Handle,
}

/// Tags of the value nodes of a [`Model`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum YValTag {
    Unknown,
    Bool,
    Rational,
    Algebraic,
    BitVector,
    Scalar,
    Tuple,
    Function,
    Mapping,
}

/// A reference to a node of the value DAG of one [`Model`].
///
/// The node is only meaningful for the model that produced it. Using it with any other
/// model (or with the same model after it was closed) is an error.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct YVal {
    tag: YValTag,
    id: i32,
    model: RawHandle,
}

/// The finite representation of a function value: explicit mappings (each a
/// [`YValTag::Mapping`] node) plus the value of all remaining inputs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VectorValue {
    pub children: Vec<YVal>,
    pub default: YVal,
}

/// One entry of a function value: `f(arguments) = result`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MappingValue {
    pub arguments: Vec<YVal>,
    pub result: YVal,
}

/// A decoded scalar value. The index alone is ambiguous, so the type is kept with it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ScalarValue {
    pub index: i32,
    pub ty: Type,
}

/// A type-safe index of a term in the engine's term table.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Term(TermId);

/// A type-safe index of a type in the engine's type table.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Type(TypeId);
