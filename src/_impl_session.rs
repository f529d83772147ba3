use crate::_impl_term::ids;
use crate::engine::{self, RawHandle, NULL_HANDLE};
use crate::error::{check_code, EngineFault};
use crate::watchdog::Watchdog;
use crate::{
    Config, Handle, Model, Parameters, ResourceKind, SearchInterrupter, SearchMode, Session,
    SolverError, Status, Term,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

impl Session {
    /// **(internal)** Create a session from a raw configuration handle (`NULL_HANDLE`
    /// selects the engine defaults).
    fn with_raw_config(config: RawHandle) -> Result<Session, SolverError> {
        match Handle::acquire(ResourceKind::Session, engine::new_context(config)) {
            Some(handle) => Ok(Session {
                handle,
                generation: Arc::new(AtomicU64::new(0)),
            }),
            None => Err(SolverError::Session(EngineFault::take())),
        }
    }

    /// A general purpose session with all theories and `push`/`pop` support.
    pub fn new() -> Result<Session, SolverError> {
        Session::with_raw_config(NULL_HANDLE)
    }

    /// A session built from `config`. The configuration is consumed and closed, whether
    /// or not the engine accepts it.
    pub fn from_config(mut config: Config) -> Result<Session, SolverError> {
        let raw = config.handle().raw()?;
        let session = Session::with_raw_config(raw);
        config.close();
        session
    }

    /// A session for the given logic (e.g. `QF_LIA`), in the default mode.
    pub fn for_logic(logic: &str) -> Result<Session, SolverError> {
        Session::from_config(Config::for_logic(logic)?)
    }

    /// A session for the given logic and search mode. Fails if the engine does not
    /// support the mode for that logic.
    pub fn for_logic_and_mode(logic: &str, mode: SearchMode) -> Result<Session, SolverError> {
        let mut config = Config::for_logic(logic)?;
        config.set("mode", mode.as_str())?;
        Session::from_config(config)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The current status of the session.
    pub fn status(&self) -> Result<Status, SolverError> {
        let code = engine::context_status(self.handle.raw()?);
        if code < 0 {
            Err(SolverError::Session(EngineFault::take()))
        } else {
            Ok(Status::from_code(code))
        }
    }

    pub fn assert_formula(&mut self, formula: Term) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::assert_formula(raw, formula.id()), SolverError::Assert)
    }

    /// Assert all formulas, or none of them if any one is rejected.
    pub fn assert_formulas(&mut self, formulas: &[Term]) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::assert_formulas(raw, &ids(formulas)), SolverError::Assert)
    }

    pub fn push(&mut self) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::push(raw), SolverError::Scope)
    }

    /// Drop the assertions of the innermost scope. Fails (without side effects) when
    /// there is no matching `push`.
    pub fn pop(&mut self) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::pop(raw), SolverError::Scope)
    }

    /// Remove all assertions and scopes.
    pub fn reset(&mut self) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::reset_context(raw), SolverError::Session)
    }

    pub fn enable_option(&mut self, option: &str) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::context_enable_option(raw, option), SolverError::Session)
    }

    pub fn disable_option(&mut self, option: &str) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::context_disable_option(raw, option), SolverError::Session)
    }

    /// Check satisfiability of the asserted formulas with default parameters.
    pub fn check(&mut self) -> Result<Status, SolverError> {
        self.run_check(None, None, None)
    }

    pub fn check_with_params(&mut self, params: &Parameters) -> Result<Status, SolverError> {
        self.run_check(Some(params), None, None)
    }

    /// Check with a deadline. When the deadline elapses, the search is asked to stop and
    /// the check returns `Interrupted`. Deadlines shorter than one second are rounded up.
    pub fn check_with_timeout(&mut self, timeout: Duration) -> Result<Status, SolverError> {
        self.run_check(None, Some(timeout), None)
    }

    pub fn check_with_params_and_timeout(
        &mut self,
        params: &Parameters,
        timeout: Duration,
    ) -> Result<Status, SolverError> {
        self.run_check(Some(params), Some(timeout), None)
    }

    /// Check the asserted formulas together with Boolean `assumptions`, which are not
    /// asserted: after the check, the session contains the same formulas as before.
    pub fn check_with_assumptions(
        &mut self,
        params: Option<&Parameters>,
        assumptions: &[Term],
    ) -> Result<Status, SolverError> {
        self.run_check(params, None, Some(assumptions))
    }

    fn run_check(
        &mut self,
        params: Option<&Parameters>,
        timeout: Option<Duration>,
        assumptions: Option<&[Term]>,
    ) -> Result<Status, SolverError> {
        let ctx = self.handle.raw()?;
        let params = match params {
            Some(params) => params.handle().raw()?,
            None => NULL_HANDLE,
        };
        let tag = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let watchdog =
            timeout.map(|timeout| Watchdog::arm(ctx, self.generation.clone(), tag, timeout));
        let started = Instant::now();
        debug!(session = ctx, ?timeout, "check started");

        let code = match assumptions {
            Some(assumptions) => {
                engine::check_context_with_assumptions(ctx, params, &ids(assumptions))
            }
            None => engine::check_context(ctx, params),
        };

        // Retire the generation before the timer is cancelled, so it cannot fire anymore.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(watchdog) = watchdog {
            watchdog.disarm();
        }
        let status = Status::from_code(code);
        debug!(session = ctx, %status, elapsed = ?started.elapsed(), "check finished");
        match status {
            Status::Idle | Status::Searching | Status::Error => {
                Err(SolverError::Search(EngineFault::take()))
            }
            status => Ok(status),
        }
    }

    /// Assert a clause which excludes the model of the last `Sat` check.
    pub fn assert_blocking_clause(&mut self) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::assert_blocking_clause(raw), SolverError::Model)
    }

    /// Ask a running check to stop. Does nothing if no check is running.
    pub fn stop_search(&self) -> Result<(), SolverError> {
        engine::stop_search(self.handle.raw()?);
        Ok(())
    }

    /// A token which can stop the checks of this session from another thread.
    pub fn interrupter(&self) -> Result<SearchInterrupter, SolverError> {
        Ok(SearchInterrupter {
            session: self.handle.raw()?,
        })
    }

    /// The model of the last check, which must have returned `Sat`.
    pub fn get_model(&self) -> Result<Model, SolverError> {
        let raw = self.handle.raw()?;
        match Handle::acquire(ResourceKind::Model, engine::get_model(raw)) {
            Some(handle) => Ok(Model { handle }),
            None => Err(SolverError::Model(EngineFault::take())),
        }
    }

    /// Release the session. Idempotent. Models obtained from the session stay valid
    /// until they are closed themselves.
    pub fn close(&mut self) {
        self.handle.close();
    }
}

impl SearchInterrupter {
    /// Ask the running check of the session (if any) to stop.
    pub fn stop(&self) {
        engine::stop_search(self.session);
    }
}
