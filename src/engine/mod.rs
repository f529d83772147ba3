//! The foreign boundary between the resource-managing layer of this crate and the
//! decision-procedure engine.
//!
//! Every function in this module is "C-shaped": resources are referenced by
//! opaque `RawHandle` integers (with `NULL_HANDLE` as the sentinel), types and terms are
//! small integer ids (with `NULL_TYPE`/`NULL_TERM` as the sentinel), and fallible operations
//! return a negative status code. The details of the last failure are stored in a
//! thread-local record which can be read with [`error_code`]/[`error_string`] and cleared
//! with [`reset_error`].
//!
//! The safe layer (`Config`, `Session`, `Model`, ...) never interprets any of this data;
//! it only forwards calls here and translates failures into a typed `SolverError`.
//!
//! The decision procedure is Z3 (through the `z3` crate, enabled by the `solver-z3`
//! feature). Z3 objects cannot leave the thread of their Z3 context, so every thread owns
//! one engine instance with its own context, type table, term table and handle tables.
//! Handle values are unique across all threads, but a type, term or handle can only be
//! used on the thread which created it. The only exception is [`stop_search`], which can
//! be called from any thread.

use fxhash::FxHashMap;
use lazy_static::lazy_static;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once};
use z3::ast::Dynamic;
use z3::{ContextHandle, FuncDecl, Model, Solver, Sort};

/// **(internal)** Boundary functions for configuration records.
mod _impl_config;
/// **(internal)** Boundary functions for solving contexts (assert, push/pop, check, ...).
mod _impl_context;
/// **(internal)** Thread-local error record and the `ErrorCode` table.
mod _impl_error_report;
/// **(internal)** Implicant and support computation in a model.
mod _impl_explain;
/// **(internal)** Boundary functions for models and the value DAG.
mod _impl_model;
/// **(internal)** Decoding of numerals printed by Z3.
mod _impl_numerals;
/// **(internal)** Boundary functions for search parameter records.
mod _impl_params;
/// **(internal)** Term table and term constructors.
mod _impl_terms;
/// **(internal)** Type table and type constructors.
mod _impl_types;

pub use _impl_config::{default_config_for_logic, free_config, new_config, set_config};
pub use _impl_context::{
    assert_blocking_clause, assert_formula, assert_formulas, check_context,
    check_context_with_assumptions, context_disable_option, context_enable_option,
    context_status, free_context, new_context, pop, push, reset_context, stop_search,
};
pub use _impl_error_report::{error_code, error_string, reset_error, ErrorCode};
pub use _impl_explain::{get_implicant, get_support};
pub use _impl_model::{
    free_model, get_bool_value, get_bv_value, get_model, get_rational_value, get_scalar_value,
    get_value, model_from_map, model_to_string, val_bitsize, val_expand_function,
    val_expand_mapping, val_expand_tuple, val_function_arity, val_get_bool, val_get_bv,
    val_get_rational, val_get_scalar, val_is_int, val_is_long, val_mapping_arity,
    val_tuple_arity, value_as_term,
};
pub use _impl_params::{default_params_for_context, free_param_record, new_param_record, set_param};
pub use _impl_terms::{
    and, application, arith_ge, arith_gt, arith_le, arith_lt, bool_const, bv_add, bv_const_u64,
    bv_from_bits, bv_ge, bv_gt, bv_le, bv_lt, bv_mul, bv_sub, distinct, eq, get_term_by_name,
    get_term_name, iff, implies, int64, ite, mul, neg, neq, new_uninterpreted_term, not, or,
    rational, rational64, remove_term_name, scalar_const, select, set_term_name, sub, sum,
    term_to_string, term_type, tuple, xor,
};
pub use _impl_types::{
    bool_type, bv_type, function_type, int_type, new_scalar_type, real_type, scalar_type_card,
    tuple_type, type_bitsize, type_children, type_to_string,
};

/// An opaque reference to an engine-owned resource (config, context, parameters, model).
pub type RawHandle = u64;

/// The handle value which never refers to a live resource.
pub const NULL_HANDLE: RawHandle = 0;

/// Index of a type in the engine's type table.
pub type TypeId = i32;

/// Index of a term in the engine's term table.
pub type TermId = i32;

/// Returned by type constructors on failure.
pub const NULL_TYPE: TypeId = -1;

/// Returned by term constructors on failure.
pub const NULL_TERM: TermId = -1;

/// Wire-level status codes reported by `context_status` and `check_context`.
pub const STATUS_IDLE: i32 = 0;
pub const STATUS_SEARCHING: i32 = 1;
pub const STATUS_UNKNOWN: i32 = 2;
pub const STATUS_SAT: i32 = 3;
pub const STATUS_UNSAT: i32 = 4;
pub const STATUS_INTERRUPTED: i32 = 5;
pub const STATUS_ERROR: i32 = 6;

/// Wire-level tags of value nodes.
pub const TAG_UNKNOWN: i32 = 0;
pub const TAG_BOOL: i32 = 1;
pub const TAG_RATIONAL: i32 = 2;
pub const TAG_ALGEBRAIC: i32 = 3;
pub const TAG_BV: i32 = 4;
pub const TAG_SCALAR: i32 = 5;
pub const TAG_TUPLE: i32 = 6;
pub const TAG_FUNCTION: i32 = 7;
pub const TAG_MAPPING: i32 = 8;

/// A raw reference to a node of the value DAG of one model: `(tag, id)`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct RawNode {
    pub tag: i32,
    pub id: i32,
}

/// **(internal)** Structural description of a type.
///
/// Scalar types are *nominal*: every call to `new_scalar_type` creates a distinct type,
/// so they carry a unique `uid` next to their cardinality.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) enum TypeDesc {
    Bool,
    Int,
    Real,
    BitVector(u32),
    Scalar { uid: u32, card: u32 },
    Tuple(Vec<TypeId>),
    Function { domain: Vec<TypeId>, range: TypeId },
}

/// **(internal)** One entry of the type table: the description and its Z3 counterpart.
///
/// Function types have no sort. Scalar types keep the Z3 enumeration constants, tuple
/// types the constructor and the (zero-based) field accessors of their datatype.
pub(crate) struct TypeEntry {
    desc: TypeDesc,
    sort: Option<Sort<'static>>,
    constants: Vec<FuncDecl<'static>>,
    constructor: Option<FuncDecl<'static>>,
    accessors: Vec<FuncDecl<'static>>,
}

/// **(internal)** The append-only table of types. Structural types are shared.
pub(crate) struct TypeTable {
    entries: Vec<TypeEntry>,
    index: FxHashMap<TypeDesc, TypeId>,
    next_scalar: u32,
}

/// **(internal)** Comparison operators shared by arithmetic and (unsigned) bit-vector atoms.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// **(internal)** Bit-vector arithmetic operators.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum BvOp {
    Add,
    Sub,
    Mul,
}

/// **(internal)** The operator which built a term. The operands are the `children`
/// of the term entry, in argument order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Op {
    Constant,
    Symbol,
    Not,
    And,
    Or,
    Xor,
    Implies,
    Eq,
    Distinct,
    Ite,
    Sum,
    Sub,
    Neg,
    Product,
    ArithCmp(Cmp),
    BvArith(BvOp),
    BvCmp(Cmp),
    Tuple,
    /// One-based projection of a tuple.
    Select(u32),
    /// The first child is the function, the rest are the arguments.
    Apply,
}

/// **(internal)** Theory features used by a term and its sub-terms.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Features {
    pub(crate) arith: bool,
    pub(crate) real: bool,
    pub(crate) nonlinear: bool,
    pub(crate) bv: bool,
    pub(crate) uf: bool,
    /// The term contains no uninterpreted symbol.
    pub(crate) ground: bool,
}

/// **(internal)** The Z3 side of a term: an expression, or the declaration of an
/// uninterpreted function symbol.
pub(crate) enum Z3Term {
    Ast(Dynamic<'static>),
    Function(FuncDecl<'static>),
}

/// **(internal)** One entry of the term table.
pub(crate) struct TermEntry {
    z3: Z3Term,
    ty: TypeId,
    op: Op,
    children: Vec<TermId>,
    features: Features,
}

/// **(internal)** The append-only table of terms together with the symbol table mapping
/// names to terms. Expressions which Z3 considers equal share one id.
pub(crate) struct TermTable {
    entries: Vec<TermEntry>,
    index: FxHashMap<Dynamic<'static>, TermId>,
    names: FxHashMap<String, TermId>,
    term_names: FxHashMap<TermId, String>,
}

/// **(internal)** Search modes of a context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum EngineMode {
    OneShot,
    MultiCheck,
    PushPop,
    Interactive,
}

/// **(internal)** The two solver architectures a context can be configured with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum SolverType {
    Dpllt,
    Mcsat,
}

/// **(internal)** Supported fragments of arithmetic.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum ArithFragment {
    Idl,
    Rdl,
    Lra,
    Lia,
    Lira,
    Nra,
    Nia,
    Nira,
}

/// **(internal)** Everything a context needs to know about its own capabilities.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ContextSettings {
    logic: Option<String>,
    mode: EngineMode,
    solver_type: SolverType,
    arith: Option<ArithFragment>,
    uf: bool,
    bv: bool,
    arrays: bool,
}

/// **(internal)** A configuration record; `None` entries fall back to logic/engine defaults.
#[derive(Clone, Debug, Default)]
pub(crate) struct ConfigRecord {
    logic: Option<String>,
    mode: Option<EngineMode>,
    solver_type: Option<SolverType>,
    arith: Option<Option<ArithFragment>>,
    uf: Option<bool>,
    bv: Option<bool>,
    arrays: Option<bool>,
}

/// **(internal)** A search parameter record, translated into Z3 solver parameters
/// at the start of every check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ParamRecord {
    random_seed: u32,
    /// Milliseconds; `None` means no limit.
    timeout: Option<u32>,
}

/// **(internal)** A solving context: the Z3 solver plus the bookkeeping Z3 does not do
/// for us (mode rules, verdict caching, the terms asserted in each scope).
pub(crate) struct ContextRecord {
    settings: ContextSettings,
    options: FxHashMap<&'static str, bool>,
    /// `scopes[0]` is the base level, every `push` opens a new level.
    scopes: Vec<Vec<TermId>>,
    status: i32,
    checks: u32,
    solver: Solver<'static>,
}

/// **(internal)** A decoded node of the value DAG of one model.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) enum ValueNode {
    Bool(bool),
    Rational(num_rational::BigRational),
    /// An irrational algebraic number, kept in the form Z3 prints it.
    Algebraic(String),
    /// Bits, least significant first.
    Bv(Vec<bool>),
    Scalar { ty: TypeId, index: u32 },
    Tuple(Vec<RawNode>),
    Function {
        ty: TypeId,
        default: RawNode,
        mappings: Vec<RawNode>,
    },
    Mapping { args: Vec<RawNode>, result: RawNode },
}

/// **(internal)** A model: the Z3 model, the symbols it is printed with and the lazily
/// populated value DAG.
pub(crate) struct ModelRecord {
    model: Model<'static>,
    symbols: Vec<TermId>,
    nodes: Vec<ValueNode>,
    node_index: FxHashMap<ValueNode, i32>,
}

/// **(internal)** The engine state of one thread.
pub(crate) struct Engine {
    z3: &'static z3::Context,
    types: TypeTable,
    terms: TermTable,
    configs: FxHashMap<RawHandle, ConfigRecord>,
    params: FxHashMap<RawHandle, ParamRecord>,
    contexts: FxHashMap<RawHandle, ContextRecord>,
    models: FxHashMap<RawHandle, ModelRecord>,
}

/// **(internal)** A check which is currently running on some thread.
struct RunningSearch {
    interrupt: ContextHandle<'static>,
    stopped: bool,
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static Z3_GLOBALS: Once = Once::new();

lazy_static! {
    /// Running checks by context handle. This is the only engine state shared between
    /// threads, it lets `stop_search` reach a check running on another thread.
    static ref RUNNING: Mutex<FxHashMap<RawHandle, RunningSearch>> =
        Mutex::new(FxHashMap::default());
}

thread_local! {
    static ENGINE: RefCell<Engine> = RefCell::new(Engine::new());
}

impl Engine {
    fn new() -> Engine {
        Z3_GLOBALS.call_once(|| {
            // Function interpretations as explicit entries plus an `else` value.
            z3::set_global_param("model.compact", "false");
        });
        // Terms and models of a thread live as long as the thread, so its context
        // is never released.
        let z3: &'static z3::Context = Box::leak(Box::new(z3::Context::new(&z3::Config::new())));
        Engine {
            z3,
            types: TypeTable::new(z3),
            terms: TermTable::new(),
            configs: FxHashMap::default(),
            params: FxHashMap::default(),
            contexts: FxHashMap::default(),
            models: FxHashMap::default(),
        }
    }
}

/// **(internal)** Run `action` with the engine of the current thread.
///
/// Engine calls never nest, so the engine is always borrowed exactly once.
pub(crate) fn with_engine<R>(action: impl FnOnce(&mut Engine) -> R) -> R {
    ENGINE.with(|engine| action(&mut engine.borrow_mut()))
}

/// **(internal)** Allocate a fresh, never reused, non-null handle value.
pub(crate) fn fresh_handle() -> RawHandle {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// **(internal)** Lock a mutex, recovering the data if a previous holder panicked.
///
/// All updates of the running-search table are single inserts or removes, so the table
/// is never left in a torn state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
