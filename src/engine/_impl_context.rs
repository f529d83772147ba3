use crate::engine::_impl_config::config_settings;
use crate::engine::_impl_error_report::{ErrorCode, Failure};
use crate::engine::{
    fresh_handle, lock, with_engine, ContextRecord, ContextSettings, Engine, EngineMode,
    RawHandle, RunningSearch, SolverType, TermId, TermTable, TypeTable, NULL_HANDLE, RUNNING,
    STATUS_ERROR, STATUS_IDLE, STATUS_INTERRUPTED, STATUS_SAT, STATUS_SEARCHING, STATUS_UNKNOWN,
    STATUS_UNSAT,
};
use fxhash::FxHashMap;
use z3::ast::Bool;
use z3::{SatResult, Solver};

/// Names of the context options understood by `context_enable_option`.
const CONTEXT_OPTIONS: [&str; 8] = [
    "var-elim",
    "arith-elim",
    "bvarith-elim",
    "flatten",
    "learn-eq",
    "keep-ite",
    "break-symmetries",
    "eager-arith-lemmas",
];

impl ContextRecord {
    fn new(z3: &'static z3::Context, settings: ContextSettings) -> ContextRecord {
        let options: FxHashMap<&'static str, bool> =
            CONTEXT_OPTIONS.iter().map(|it| (*it, true)).collect();
        // Quantifier-free logics get the matching Z3 tactic, everything else the
        // general solver.
        let solver = settings
            .logic
            .as_deref()
            .filter(|logic| logic.starts_with("QF_"))
            .and_then(|logic| Solver::new_for_logic(z3, logic))
            .unwrap_or_else(|| Solver::new(z3));
        ContextRecord {
            settings,
            options,
            scopes: vec![Vec::new()],
            status: STATUS_IDLE,
            checks: 0,
            solver,
        }
    }

    pub(crate) fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub(crate) fn status(&self) -> i32 {
        self.status
    }

    pub(crate) fn solver(&self) -> &Solver<'static> {
        &self.solver
    }

    fn supports_scopes(&self) -> bool {
        matches!(
            self.settings.mode,
            EngineMode::PushPop | EngineMode::Interactive
        )
    }

    /// All asserted formulas, outermost scope first.
    pub(crate) fn assertions(&self) -> Vec<TermId> {
        self.scopes.iter().flatten().copied().collect()
    }

    /// Forget the last result before the assertion set changes.
    fn invalidate(&mut self) {
        self.status = STATUS_IDLE;
    }

    /// Common precondition of operations that add assertions or scopes.
    fn check_mutable(&mut self) -> Result<(), Failure> {
        if self.settings.mode == EngineMode::OneShot && self.checks > 0 {
            return Err(Failure::new(
                ErrorCode::InvalidOperation,
                "one-shot contexts cannot be modified after a check",
            ));
        }
        match self.status {
            STATUS_SAT | STATUS_UNKNOWN => {
                self.invalidate();
                Ok(())
            }
            STATUS_INTERRUPTED => Err(Failure::new(
                ErrorCode::InvalidOperation,
                "an interrupted context only accepts pop or reset",
            )),
            _ => Ok(()),
        }
    }

    /// Assert formulas in the innermost scope. An unsatisfiable context stays
    /// unsatisfiable.
    fn add(&mut self, formulas: &[TermId], terms: &TermTable) -> Result<(), Failure> {
        let mut asts = Vec::with_capacity(formulas.len());
        for formula in formulas {
            asts.push(terms.formula(*formula)?);
        }
        if self.status != STATUS_UNSAT {
            self.check_mutable()?;
        }
        for ast in &asts {
            self.solver.assert(ast);
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.extend_from_slice(formulas);
        }
        Ok(())
    }
}

impl Engine {
    pub(crate) fn context(&self, ctx: RawHandle) -> Result<&ContextRecord, Failure> {
        self.contexts.get(&ctx).ok_or_else(|| invalid_context(ctx))
    }
}

fn invalid_context(ctx: RawHandle) -> Failure {
    Failure::new(
        ErrorCode::InvalidHandle,
        format!("invalid context handle {ctx} (unknown on this thread)"),
    )
}

/// **(internal)** Run `action` on a context record together with the term table.
fn with_context<F, R>(ctx: RawHandle, action: F) -> Result<R, Failure>
where
    F: FnOnce(&mut ContextRecord, &TermTable) -> Result<R, Failure>,
{
    with_engine(|engine| {
        let Engine {
            contexts, terms, ..
        } = engine;
        let record = contexts.get_mut(&ctx).ok_or_else(|| invalid_context(ctx))?;
        action(record, terms)
    })
}

fn status_code(result: Result<(), Failure>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(failure) => failure.report(),
    }
}

/// **(internal)** Check that `formulas` are Boolean terms using only theories that
/// the context supports.
fn check_formulas(
    settings: &ContextSettings,
    terms: &TermTable,
    formulas: &[TermId],
) -> Result<(), Failure> {
    let unsupported = |code: ErrorCode, what: &str| {
        Err(Failure::new(
            code,
            format!("{what} is not supported by this context"),
        ))
    };
    for formula in formulas {
        let entry = terms.get(*formula)?;
        if entry.ty() != TypeTable::bool_type() {
            return Err(Failure::new(
                ErrorCode::TypeMismatch,
                format!("term {formula} is not a formula"),
            ));
        }
        let features = entry.features();
        if features.arith {
            match settings.arith {
                None => return unsupported(ErrorCode::ArithNotSupported, "arithmetic"),
                Some(fragment) if features.real && fragment.is_integer_only() => {
                    return unsupported(ErrorCode::ArithNotSupported, "real arithmetic")
                }
                Some(fragment) => {
                    if features.nonlinear
                        && (!fragment.is_nonlinear() || settings.solver_type != SolverType::Mcsat)
                    {
                        return unsupported(
                            ErrorCode::NonlinearArithNotSupported,
                            "nonlinear arithmetic",
                        );
                    }
                }
            }
        }
        if features.bv && !settings.bv {
            return unsupported(ErrorCode::BvNotSupported, "bit-vector arithmetic");
        }
        if features.uf && !settings.uf {
            return unsupported(ErrorCode::UfNotSupported, "uninterpreted functions");
        }
    }
    Ok(())
}

/// Create a context from a configuration (`NULL_HANDLE` for the default one).
/// Returns `NULL_HANDLE` if the configuration is invalid.
pub fn new_context(config: RawHandle) -> RawHandle {
    let settings = match config_settings(config) {
        Ok(settings) => settings,
        Err(failure) => {
            failure.report();
            return NULL_HANDLE;
        }
    };
    let handle = fresh_handle();
    with_engine(|engine| {
        let record = ContextRecord::new(engine.z3, settings);
        engine.contexts.insert(handle, record);
    });
    handle
}

/// Release a context together with its solver. Unknown handles are ignored.
pub fn free_context(ctx: RawHandle) {
    with_engine(|engine| engine.contexts.remove(&ctx));
}

/// Current status of a context, or a negative code for an invalid handle.
pub fn context_status(ctx: RawHandle) -> i32 {
    match with_context(ctx, |record, _| Ok(record.status)) {
        Ok(status) => status,
        Err(failure) => failure.report(),
    }
}

/// Remove all assertions and scopes.
pub fn reset_context(ctx: RawHandle) -> i32 {
    status_code(with_context(ctx, |record, _| {
        record.solver.reset();
        record.scopes = vec![Vec::new()];
        record.checks = 0;
        record.invalidate();
        Ok(())
    }))
}

pub fn push(ctx: RawHandle) -> i32 {
    status_code(with_context(ctx, |record, _| {
        if !record.supports_scopes() {
            return Err(Failure::new(
                ErrorCode::OperationNotSupported,
                "this context does not support push/pop",
            ));
        }
        if record.status != STATUS_UNSAT {
            record.check_mutable()?;
        }
        record.solver.push();
        record.scopes.push(Vec::new());
        Ok(())
    }))
}

/// Close the innermost scope. Fails without side effects at depth zero.
pub fn pop(ctx: RawHandle) -> i32 {
    status_code(with_context(ctx, |record, _| {
        if !record.supports_scopes() {
            return Err(Failure::new(
                ErrorCode::OperationNotSupported,
                "this context does not support push/pop",
            ));
        }
        if record.scopes.len() <= 1 {
            return Err(Failure::new(
                ErrorCode::InvalidOperation,
                "pop without a matching push",
            ));
        }
        record.solver.pop(1);
        record.scopes.pop();
        record.invalidate();
        Ok(())
    }))
}

pub fn assert_formula(ctx: RawHandle, formula: TermId) -> i32 {
    assert_formulas(ctx, &[formula])
}

/// Add formulas to the innermost scope. Nothing is added if any of them is rejected.
pub fn assert_formulas(ctx: RawHandle, formulas: &[TermId]) -> i32 {
    status_code(with_context(ctx, |record, terms| {
        check_formulas(&record.settings, terms, formulas)?;
        record.add(formulas, terms)
    }))
}

/// Enable a context option.
pub fn context_enable_option(ctx: RawHandle, option: &str) -> i32 {
    set_option(ctx, option, true)
}

/// Disable a context option.
pub fn context_disable_option(ctx: RawHandle, option: &str) -> i32 {
    set_option(ctx, option, false)
}

fn set_option(ctx: RawHandle, option: &str, value: bool) -> i32 {
    status_code(with_context(ctx, |record, _| {
        let key = CONTEXT_OPTIONS
            .iter()
            .find(|it| **it == option)
            .ok_or_else(|| {
                Failure::new(
                    ErrorCode::UnknownOption,
                    format!("unknown context option `{option}`"),
                )
            })?;
        record.options.insert(key, value);
        Ok(())
    }))
}

/// Check satisfiability of the asserted formulas.
///
/// Returns a status code; `STATUS_ERROR` means the error record holds the reason.
/// A context that already has a verdict returns it without searching again.
pub fn check_context(ctx: RawHandle, params: RawHandle) -> i32 {
    run_check(ctx, params, None)
}

/// Check satisfiability of the asserted formulas together with the given Boolean
/// assumptions, which are not asserted.
pub fn check_context_with_assumptions(
    ctx: RawHandle,
    params: RawHandle,
    assumptions: &[TermId],
) -> i32 {
    run_check(ctx, params, Some(assumptions))
}

fn run_check(ctx: RawHandle, params: RawHandle, assumptions: Option<&[TermId]>) -> i32 {
    match with_engine(|engine| engine.check(ctx, params, assumptions)) {
        Ok(status) => status,
        Err(failure) => {
            failure.report();
            STATUS_ERROR
        }
    }
}

impl Engine {
    fn check(
        &mut self,
        ctx: RawHandle,
        params: RawHandle,
        assumptions: Option<&[TermId]>,
    ) -> Result<i32, Failure> {
        let params = self.param_record(params)?.to_z3(self.z3);
        let interrupt = self.z3.handle();
        let Engine {
            contexts, terms, ..
        } = self;
        let record = contexts.get_mut(&ctx).ok_or_else(|| invalid_context(ctx))?;
        if record.settings.mode == EngineMode::OneShot && record.checks > 0 {
            return Err(Failure::new(
                ErrorCode::InvalidOperation,
                "one-shot contexts can only be checked once",
            ));
        }
        match record.status {
            STATUS_UNSAT => return Ok(STATUS_UNSAT),
            STATUS_SAT | STATUS_UNKNOWN if assumptions.is_none() => return Ok(record.status),
            STATUS_SAT | STATUS_UNKNOWN => record.invalidate(),
            STATUS_INTERRUPTED => {
                return Err(Failure::new(
                    ErrorCode::InvalidOperation,
                    "an interrupted context only accepts pop or reset",
                ))
            }
            _ => {}
        }
        let mut literals: Vec<Bool<'static>> = Vec::new();
        if let Some(assumptions) = assumptions {
            check_formulas(&record.settings, terms, assumptions)?;
            for assumption in assumptions {
                literals.push(terms.formula(*assumption)?);
            }
        }
        record.solver.set_params(&params);

        if cfg!(feature = "print-progress") {
            println!(
                "Start check of context {} with {} assertions and {} assumptions.",
                ctx,
                record.scopes.iter().map(|it| it.len()).sum::<usize>(),
                literals.len(),
            );
        }

        record.status = STATUS_SEARCHING;
        lock(&RUNNING).insert(
            ctx,
            RunningSearch {
                interrupt,
                stopped: false,
            },
        );
        let result = if assumptions.is_some() {
            record.solver.check_assumptions(&literals)
        } else {
            record.solver.check()
        };
        let stopped = lock(&RUNNING)
            .remove(&ctx)
            .map(|it| it.stopped)
            .unwrap_or(false);
        record.checks += 1;

        if cfg!(feature = "print-progress") {
            println!("Check of context {ctx} done: {result:?} (stopped: {stopped}).");
        }

        Ok(match result {
            SatResult::Sat => {
                record.status = STATUS_SAT;
                STATUS_SAT
            }
            SatResult::Unsat if assumptions.is_some() => {
                // The verdict depends on the assumptions, the assertions alone stay open.
                record.status = STATUS_IDLE;
                STATUS_UNSAT
            }
            SatResult::Unsat => {
                record.status = STATUS_UNSAT;
                STATUS_UNSAT
            }
            SatResult::Unknown if stopped => {
                record.status = if record.settings.mode == EngineMode::Interactive {
                    STATUS_IDLE
                } else {
                    STATUS_INTERRUPTED
                };
                STATUS_INTERRUPTED
            }
            SatResult::Unknown => {
                record.status = STATUS_UNKNOWN;
                STATUS_UNKNOWN
            }
        })
    }
}

/// Ask a running search to stop. Does nothing if no search is running.
///
/// This is the only engine function that may be called from any thread.
pub fn stop_search(ctx: RawHandle) {
    let mut running = lock(&RUNNING);
    if let Some(search) = running.get_mut(&ctx) {
        search.stopped = true;
        search.interrupt.interrupt();
    }
}

/// Assert a clause that excludes the current model. Requires a `Sat` status.
///
/// The clause ranges over the uninterpreted symbols and function applications of
/// the assertions: at least one of them must change its value.
pub fn assert_blocking_clause(ctx: RawHandle) -> i32 {
    status_code(with_engine(|engine| {
        let record = engine.context(ctx)?;
        let model = match record.status {
            STATUS_SAT => record.solver.get_model(),
            _ => None,
        };
        let model = model.ok_or_else(|| {
            Failure::new(ErrorCode::InvalidOperation, "no model is available")
        })?;
        let leaves = engine.terms.leaves(&record.assertions());
        let mut values = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let ast = engine.terms.ast(leaf)?;
            let value = model.eval(ast, true).ok_or_else(|| {
                Failure::new(
                    ErrorCode::EvalUnknownTerm,
                    format!("term {leaf} has no value in the model"),
                )
            })?;
            values.push((leaf, value, engine.terms.entry(leaf).ty()));
        }

        let mut literals = Vec::with_capacity(values.len());
        for (leaf, value, ty) in values {
            let constant = engine.mk_value(value, ty);
            let equal = engine.mk_eq(leaf, constant)?;
            literals.push(engine.mk_not(equal)?);
        }
        let clause = engine.mk_junction(&literals, false)?;

        let Engine {
            contexts, terms, ..
        } = engine;
        let record = contexts.get_mut(&ctx).ok_or_else(|| invalid_context(ctx))?;
        record.add(&[clause], terms)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        arith_gt, bool_type, bv_const_u64, bv_gt, bv_type, error_code, int64, int_type,
        new_config, new_uninterpreted_term, not, or, set_config,
    };

    fn fresh(mode: &str) -> RawHandle {
        let config = new_config();
        assert_eq!(set_config(config, "mode", mode), 0);
        let ctx = new_context(config);
        crate::engine::free_config(config);
        ctx
    }

    #[test]
    fn push_pop_discipline() {
        let ctx = new_context(NULL_HANDLE);
        let p = new_uninterpreted_term(bool_type());
        assert!(pop(ctx) < 0);
        assert_eq!(error_code(), ErrorCode::InvalidOperation);
        assert_eq!(push(ctx), 0);
        assert_eq!(assert_formulas(ctx, &[p, not(p)]), 0);
        assert_eq!(check_context(ctx, NULL_HANDLE), STATUS_UNSAT);
        assert_eq!(pop(ctx), 0);
        assert_eq!(check_context(ctx, NULL_HANDLE), STATUS_SAT);
        free_context(ctx);
        assert!(context_status(ctx) < 0);
    }

    #[test]
    fn assertions_survive_an_unsat_scope() {
        let ctx = new_context(NULL_HANDLE);
        let p = new_uninterpreted_term(bool_type());
        let q = new_uninterpreted_term(bool_type());
        assert_eq!(push(ctx), 0);
        assert_eq!(assert_formulas(ctx, &[p, not(p)]), 0);
        assert_eq!(check_context(ctx, NULL_HANDLE), STATUS_UNSAT);
        assert_eq!(assert_formula(ctx, q), 0);
        assert_eq!(context_status(ctx), STATUS_UNSAT);
        assert_eq!(pop(ctx), 0);
        assert_eq!(assert_formula(ctx, not(q)), 0);
        assert_eq!(check_context(ctx, NULL_HANDLE), STATUS_SAT);
        free_context(ctx);
    }

    #[test]
    fn scopes_need_an_incremental_mode() {
        let ctx = fresh("multi-check");
        assert!(push(ctx) < 0);
        assert_eq!(error_code(), ErrorCode::OperationNotSupported);
        free_context(ctx);
    }

    #[test]
    fn one_shot_contexts_are_checked_once() {
        let ctx = fresh("one-shot");
        let p = new_uninterpreted_term(bool_type());
        assert_eq!(assert_formula(ctx, p), 0);
        assert_eq!(check_context(ctx, NULL_HANDLE), STATUS_SAT);
        assert!(assert_formula(ctx, p) < 0);
        assert!(check_context_with_assumptions(ctx, NULL_HANDLE, &[p]) == STATUS_ERROR);
        free_context(ctx);
    }

    #[test]
    fn assumptions_are_not_asserted() {
        let ctx = new_context(NULL_HANDLE);
        let p = new_uninterpreted_term(bool_type());
        assert_eq!(assert_formula(ctx, or(&[p, p])), 0);
        assert_eq!(
            check_context_with_assumptions(ctx, NULL_HANDLE, &[not(p)]),
            STATUS_UNSAT
        );
        assert_eq!(context_status(ctx), STATUS_IDLE);
        assert_eq!(check_context(ctx, NULL_HANDLE), STATUS_SAT);
        free_context(ctx);
    }

    #[test]
    fn blocking_clauses_enumerate_models() {
        let ctx = new_context(NULL_HANDLE);
        let x = new_uninterpreted_term(bv_type(2));
        assert_eq!(assert_formula(ctx, bv_gt(x, bv_const_u64(2, 1))), 0);
        assert!(assert_blocking_clause(ctx) < 0);
        let mut found = 0;
        while check_context(ctx, NULL_HANDLE) == STATUS_SAT {
            found += 1;
            assert_eq!(assert_blocking_clause(ctx), 0);
        }
        assert_eq!(found, 2);
        assert_eq!(context_status(ctx), STATUS_UNSAT);
        free_context(ctx);
    }

    #[test]
    fn logics_restrict_assertions() {
        let config = new_config();
        assert_eq!(crate::engine::default_config_for_logic(config, "QF_BV"), 0);
        let ctx = new_context(config);
        crate::engine::free_config(config);
        let x = new_uninterpreted_term(int_type());
        assert!(assert_formula(ctx, arith_gt(x, int64(0))) < 0);
        assert_eq!(error_code(), ErrorCode::ArithNotSupported);
        assert!(assert_formula(ctx, x) < 0);
        assert_eq!(error_code(), ErrorCode::TypeMismatch);
        free_context(ctx);
    }

    #[test]
    fn stop_without_search_is_ignored() {
        let ctx = new_context(NULL_HANDLE);
        stop_search(ctx);
        assert_eq!(check_context(ctx, NULL_HANDLE), STATUS_SAT);
        free_context(ctx);
    }

    #[test]
    fn contexts_are_bound_to_their_thread() {
        let ctx = new_context(NULL_HANDLE);
        let status = std::thread::spawn(move || {
            let status = context_status(ctx);
            (status, error_code())
        })
        .join()
        .unwrap();
        assert!(status.0 < 0);
        assert_eq!(status.1, ErrorCode::InvalidHandle);
        assert_eq!(context_status(ctx), STATUS_IDLE);
        free_context(ctx);
    }
}
