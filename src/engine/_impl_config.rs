use crate::engine::_impl_error_report::{ErrorCode, Failure};
use crate::engine::{
    fresh_handle, with_engine, ArithFragment, ConfigRecord, ContextSettings, EngineMode,
    RawHandle, SolverType, NULL_HANDLE,
};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// SMT-LIB logic names: optional `QF_` prefix, then arrays, uninterpreted functions,
    /// bit-vectors and an arithmetic fragment, in this order.
    static ref LOGIC_NAME: Regex =
        Regex::new(r"^(QF_)?(AX|A)?(UF)?(BV)?(IDL|RDL|LIA|LRA|LIRA|NIA|NRA|NIRA)?$").unwrap();
}

/// **(internal)** Theories enabled by a logic name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct LogicDesc {
    pub(crate) arrays: bool,
    pub(crate) uf: bool,
    pub(crate) bv: bool,
    pub(crate) arith: Option<ArithFragment>,
}

impl ArithFragment {
    pub(crate) fn parse(name: &str) -> Option<ArithFragment> {
        Some(match name {
            "IDL" => ArithFragment::Idl,
            "RDL" => ArithFragment::Rdl,
            "LRA" => ArithFragment::Lra,
            "LIA" => ArithFragment::Lia,
            "LIRA" => ArithFragment::Lira,
            "NRA" => ArithFragment::Nra,
            "NIA" => ArithFragment::Nia,
            "NIRA" => ArithFragment::Nira,
            _ => return None,
        })
    }

    pub(crate) fn is_nonlinear(self) -> bool {
        matches!(
            self,
            ArithFragment::Nra | ArithFragment::Nia | ArithFragment::Nira
        )
    }

    /// `true` for the fragments that only admit integer terms.
    pub(crate) fn is_integer_only(self) -> bool {
        matches!(
            self,
            ArithFragment::Idl | ArithFragment::Lia | ArithFragment::Nia
        )
    }
}

/// **(internal)** Decompose a logic name into the theories it enables.
pub(crate) fn parse_logic(name: &str) -> Result<LogicDesc, Failure> {
    match name {
        "NONE" => {
            return Ok(LogicDesc {
                arrays: false,
                uf: false,
                bv: false,
                arith: None,
            })
        }
        "ALL" => {
            return Ok(LogicDesc {
                arrays: true,
                uf: true,
                bv: true,
                arith: Some(ArithFragment::Lira),
            })
        }
        _ => {}
    }
    let unknown = || Failure::new(ErrorCode::UnknownLogic, format!("unknown logic `{name}`"));
    let captures = LOGIC_NAME.captures(name).ok_or_else(unknown)?;
    let theories = (2..=5).filter(|i| captures.get(*i).is_some()).count();
    if theories == 0 {
        return Err(unknown());
    }
    if captures.get(1).is_none() {
        return Err(Failure::new(
            ErrorCode::LogicNotSupported,
            format!("quantified logic `{name}` is not supported"),
        ));
    }
    Ok(LogicDesc {
        arrays: captures.get(2).is_some(),
        uf: captures.get(3).is_some(),
        bv: captures.get(4).is_some(),
        arith: captures
            .get(5)
            .and_then(|it| ArithFragment::parse(it.as_str())),
    })
}

impl ConfigRecord {
    /// Resolve the explicit settings of this record against the defaults of its logic
    /// and check that they are compatible.
    pub(crate) fn settings(&self) -> Result<ContextSettings, Failure> {
        let logic = match &self.logic {
            Some(name) => parse_logic(name)?,
            None => LogicDesc {
                arrays: true,
                uf: true,
                bv: true,
                arith: Some(ArithFragment::Lira),
            },
        };
        let arith = match self.arith {
            Some(explicit) => explicit,
            None => logic.arith,
        };
        let nonlinear = arith.map(|it| it.is_nonlinear()).unwrap_or(false);
        let solver_type = match self.solver_type {
            Some(explicit) => explicit,
            None if nonlinear => SolverType::Mcsat,
            None => SolverType::Dpllt,
        };
        let mode = self.mode.unwrap_or(EngineMode::PushPop);

        if solver_type == SolverType::Mcsat && mode == EngineMode::Interactive {
            return Err(Failure::new(
                ErrorCode::InvalidConfig,
                "the mcsat solver does not support the interactive mode",
            ));
        }
        if solver_type == SolverType::Dpllt && nonlinear {
            return Err(Failure::new(
                ErrorCode::InvalidConfig,
                "nonlinear arithmetic requires the mcsat solver",
            ));
        }

        Ok(ContextSettings {
            logic: self.logic.clone(),
            mode,
            solver_type,
            arith,
            uf: self.uf.unwrap_or(logic.uf),
            bv: self.bv.unwrap_or(logic.bv),
            arrays: self.arrays.unwrap_or(logic.arrays),
        })
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), Failure> {
        let invalid = || {
            Failure::new(
                ErrorCode::InvalidConfigValue,
                format!("invalid value `{value}` for `{name}`"),
            )
        };
        let switch = || match value {
            "default" => Ok(true),
            "none" => Ok(false),
            _ => Err(invalid()),
        };
        match name {
            "mode" => {
                self.mode = Some(match value {
                    "one-shot" => EngineMode::OneShot,
                    "multi-check" => EngineMode::MultiCheck,
                    "push-pop" => EngineMode::PushPop,
                    "interactive" => EngineMode::Interactive,
                    _ => return Err(invalid()),
                })
            }
            "solver-type" => {
                self.solver_type = Some(match value {
                    "dpllt" => SolverType::Dpllt,
                    "mcsat" => SolverType::Mcsat,
                    _ => return Err(invalid()),
                })
            }
            "uf-solver" => self.uf = Some(switch()?),
            "bv-solver" => self.bv = Some(switch()?),
            "array-solver" => self.arrays = Some(switch()?),
            "arith-solver" => match value {
                "none" => self.arith = Some(None),
                "default" | "simplex" | "ifw" | "rfw" => {
                    if let Some(None) = self.arith {
                        self.arith = Some(Some(ArithFragment::Lira));
                    }
                }
                _ => return Err(invalid()),
            },
            "arith-fragment" => {
                let fragment = ArithFragment::parse(value).ok_or_else(invalid)?;
                self.arith = Some(Some(fragment));
            }
            _ => {
                return Err(Failure::new(
                    ErrorCode::InvalidConfigName,
                    format!("unknown configuration option `{name}`"),
                ))
            }
        }
        Ok(())
    }
}

/// **(internal)** Run `action` on the configuration record behind `config`.
fn with_config<F, R>(config: RawHandle, action: F) -> Result<R, Failure>
where
    F: FnOnce(&mut ConfigRecord) -> Result<R, Failure>,
{
    with_engine(|engine| match engine.configs.get_mut(&config) {
        Some(record) => action(record),
        None => Err(Failure::new(
            ErrorCode::InvalidHandle,
            format!("invalid configuration handle {config} (unknown on this thread)"),
        )),
    })
}

/// **(internal)** The resolved settings of a configuration (`NULL_HANDLE` means
/// the default configuration).
pub(crate) fn config_settings(config: RawHandle) -> Result<ContextSettings, Failure> {
    if config == NULL_HANDLE {
        return ConfigRecord::default().settings();
    }
    with_config(config, |record| record.settings())
}

pub fn new_config() -> RawHandle {
    let handle = fresh_handle();
    with_engine(|engine| engine.configs.insert(handle, ConfigRecord::default()));
    handle
}

/// Release a configuration. Unknown handles are ignored.
pub fn free_config(config: RawHandle) {
    with_engine(|engine| engine.configs.remove(&config));
}

/// Set one option of a configuration. On failure the record is unchanged.
pub fn set_config(config: RawHandle, name: &str, value: &str) -> i32 {
    match with_config(config, |record| record.set(name, value)) {
        Ok(()) => 0,
        Err(failure) => failure.report(),
    }
}

/// Prepare a configuration for the given logic.
pub fn default_config_for_logic(config: RawHandle, logic: &str) -> i32 {
    let result = with_config(config, |record| {
        parse_logic(logic)?;
        record.logic = Some(logic.to_string());
        Ok(())
    });
    match result {
        Ok(()) => 0,
        Err(failure) => failure.report(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{error_code, ErrorCode};

    #[test]
    fn logic_names_are_decomposed() {
        let desc = parse_logic("QF_UFLRA").unwrap();
        assert!(desc.uf && !desc.bv && !desc.arrays);
        assert_eq!(desc.arith, Some(ArithFragment::Lra));
        let desc = parse_logic("QF_ABV").unwrap();
        assert!(desc.arrays && desc.bv && desc.arith.is_none());
        assert_eq!(parse_logic("NONE").unwrap().arith, None);
        assert_eq!(parse_logic("QF_").unwrap_err().code, ErrorCode::UnknownLogic);
        assert_eq!(parse_logic("QF_FOO").unwrap_err().code, ErrorCode::UnknownLogic);
        assert_eq!(parse_logic("UFLIA").unwrap_err().code, ErrorCode::LogicNotSupported);
    }

    #[test]
    fn nonlinear_logics_select_mcsat() {
        let record = ConfigRecord {
            logic: Some("QF_NRA".to_string()),
            ..Default::default()
        };
        assert_eq!(record.settings().unwrap().solver_type, SolverType::Mcsat);

        let record = ConfigRecord {
            logic: Some("QF_NRA".to_string()),
            mode: Some(EngineMode::Interactive),
            ..Default::default()
        };
        assert_eq!(record.settings().unwrap_err().code, ErrorCode::InvalidConfig);
    }

    #[test]
    fn invalid_options_leave_the_record_usable() {
        let config = new_config();
        assert!(set_config(config, "mode", "sometimes") < 0);
        assert_eq!(error_code(), ErrorCode::InvalidConfigValue);
        assert!(set_config(config, "colour", "blue") < 0);
        assert_eq!(error_code(), ErrorCode::InvalidConfigName);
        assert_eq!(set_config(config, "mode", "one-shot"), 0);
        assert_eq!(set_config(config, "arith-fragment", "LIA"), 0);
        let settings = config_settings(config).unwrap();
        assert_eq!(settings.mode, EngineMode::OneShot);
        assert_eq!(settings.arith, Some(ArithFragment::Lia));
        free_config(config);
        assert!(set_config(config, "mode", "one-shot") < 0);
        assert_eq!(error_code(), ErrorCode::InvalidHandle);
    }
}
