use crate::engine;
use crate::error::{check_code, EngineFault};
use crate::{Config, Handle, ResourceKind, SolverError};

impl Config {
    /// A configuration with the engine defaults (all theories, `push-pop` mode).
    pub fn new() -> Result<Config, SolverError> {
        match Handle::acquire(ResourceKind::Config, engine::new_config()) {
            Some(handle) => Ok(Config { handle }),
            None => Err(SolverError::Config(EngineFault::take())),
        }
    }

    /// A configuration prepared for the given logic (e.g. `QF_LIA`, `QF_BV`, `ALL`).
    pub fn for_logic(logic: &str) -> Result<Config, SolverError> {
        let config = Config::new()?;
        let raw = config.handle.raw()?;
        check_code(engine::default_config_for_logic(raw, logic), SolverError::Config)?;
        Ok(config)
    }

    /// Set one option. On failure the configuration is left unchanged and usable.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), SolverError> {
        let raw = self.handle.raw()?;
        check_code(engine::set_config(raw, name, value), SolverError::Config)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Release the configuration. Idempotent.
    pub fn close(&mut self) {
        self.handle.close();
    }
}

#[cfg(test)]
mod tests {
    use crate::{Config, ErrorCode, ResourceKind, SolverError};

    #[test]
    fn invalid_options_are_config_errors() {
        let mut config = Config::new().unwrap();
        let error = config.set("mode", "sometimes").unwrap_err();
        assert!(matches!(error, SolverError::Config(_)));
        assert_eq!(error.code(), Some(ErrorCode::InvalidConfigValue));
        let error = config.set("no-such-option", "1").unwrap_err();
        assert_eq!(error.code(), Some(ErrorCode::InvalidConfigName));
        // Still usable.
        config.set("mode", "multi-check").unwrap();
    }

    #[test]
    fn unknown_logics_are_rejected() {
        let error = Config::for_logic("QF_WHATEVER").unwrap_err();
        assert_eq!(error.code(), Some(ErrorCode::UnknownLogic));
        assert!(Config::for_logic("QF_LRA").is_ok());
    }

    #[test]
    fn closed_configs_refuse_updates() {
        let mut config = Config::new().unwrap();
        config.close();
        config.close();
        assert_eq!(
            config.set("mode", "one-shot"),
            Err(SolverError::ResourceClosed(ResourceKind::Config))
        );
    }
}
