use crate::engine;
use crate::error::{check_code, EngineFault};
use crate::{Handle, Parameters, ResourceKind, Session, SolverError};

impl Parameters {
    /// A parameter set with the engine defaults.
    pub fn new() -> Result<Parameters, SolverError> {
        match Handle::acquire(ResourceKind::Parameters, engine::new_param_record()) {
            Some(handle) => Ok(Parameters { handle }),
            None => Err(SolverError::Config(EngineFault::take())),
        }
    }

    /// Set one parameter. On failure the parameter set is left unchanged.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::set_param(raw, name, value), SolverError::Config)
    }

    /// Replace all parameters with the values the engine recommends for `session`.
    pub fn defaults_for_session(&mut self, session: &Session) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        let ctx = session.handle().raw()?;
        check_code(
            engine::default_params_for_context(ctx, raw),
            SolverError::Config,
        )
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Release the parameter set. Idempotent.
    pub fn close(&mut self) {
        self.handle.close();
    }
}

#[cfg(test)]
mod tests {
    use crate::{ErrorCode, Parameters, ResourceKind, Session, SolverError};

    #[test]
    fn parameters_are_validated() {
        let mut params = Parameters::new().unwrap();
        params.set("random-seed", "17").unwrap();
        params.set("timeout", "500").unwrap();
        let error = params.set("timeout", "-1").unwrap_err();
        assert_eq!(error.code(), Some(ErrorCode::InvalidParamValue));
        let error = params.set("restart-factor", "2").unwrap_err();
        assert_eq!(error.code(), Some(ErrorCode::InvalidParamName));
    }

    #[test]
    fn defaults_follow_the_session() {
        let session = Session::for_logic("QF_BV").unwrap();
        let mut params = Parameters::new().unwrap();
        params.defaults_for_session(&session).unwrap();

        let mut closed = Session::new().unwrap();
        closed.close();
        assert_eq!(
            params.defaults_for_session(&closed),
            Err(SolverError::ResourceClosed(ResourceKind::Session))
        );
    }
}
