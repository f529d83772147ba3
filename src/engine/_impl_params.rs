use crate::engine::_impl_error_report::{ErrorCode, Failure};
use crate::engine::{fresh_handle, with_engine, Engine, ParamRecord, RawHandle, NULL_HANDLE};
use z3::Params;

impl Default for ParamRecord {
    fn default() -> ParamRecord {
        ParamRecord {
            random_seed: 0,
            timeout: None,
        }
    }
}

impl ParamRecord {
    fn set(&mut self, name: &str, value: &str) -> Result<(), Failure> {
        let invalid = || {
            Failure::new(
                ErrorCode::InvalidParamValue,
                format!("invalid value `{value}` for `{name}`"),
            )
        };
        match name {
            "random-seed" => self.random_seed = value.parse::<u32>().map_err(|_| invalid())?,
            "timeout" => match value.parse::<u32>() {
                Ok(millis) if millis > 0 => self.timeout = Some(millis),
                _ => return Err(invalid()),
            },
            _ => {
                return Err(Failure::new(
                    ErrorCode::InvalidParamName,
                    format!("unknown search parameter `{name}`"),
                ))
            }
        }
        Ok(())
    }

    /// The Z3 solver parameters of this record. The seed is only passed when it
    /// differs from the Z3 default.
    pub(crate) fn to_z3(&self, z3: &'static z3::Context) -> Params<'static> {
        let mut params = Params::new(z3);
        if self.random_seed != 0 {
            params.set_u32("random_seed", self.random_seed);
        }
        params.set_u32("timeout", self.timeout.unwrap_or(u32::MAX));
        params
    }
}

impl Engine {
    /// **(internal)** A copy of the parameter record behind `params`, or the defaults
    /// for `NULL_HANDLE`.
    pub(crate) fn param_record(&self, params: RawHandle) -> Result<ParamRecord, Failure> {
        if params == NULL_HANDLE {
            return Ok(ParamRecord::default());
        }
        self.params.get(&params).cloned().ok_or_else(|| {
            Failure::new(
                ErrorCode::InvalidHandle,
                format!("invalid parameter handle {params} (unknown on this thread)"),
            )
        })
    }
}

pub fn new_param_record() -> RawHandle {
    let handle = fresh_handle();
    with_engine(|engine| engine.params.insert(handle, ParamRecord::default()));
    handle
}

/// Release a parameter record. Unknown handles are ignored.
pub fn free_param_record(params: RawHandle) {
    with_engine(|engine| engine.params.remove(&params));
}

/// Set one search parameter: `random-seed` (any `u32`) or `timeout` (positive
/// milliseconds). On failure the record is unchanged.
pub fn set_param(params: RawHandle, name: &str, value: &str) -> i32 {
    let result = with_engine(|engine| match engine.params.get_mut(&params) {
        Some(record) => record.set(name, value),
        None => Err(Failure::new(
            ErrorCode::InvalidHandle,
            format!("invalid parameter handle {params} (unknown on this thread)"),
        )),
    });
    match result {
        Ok(()) => 0,
        Err(failure) => failure.report(),
    }
}

/// Fill `params` with the recommended parameters for `ctx`. Z3 tunes itself to the
/// logic of the solver, so these are the defaults: no seed and no time limit.
pub fn default_params_for_context(ctx: RawHandle, params: RawHandle) -> i32 {
    let result = with_engine(|engine| {
        if !engine.contexts.contains_key(&ctx) {
            return Err(Failure::new(
                ErrorCode::InvalidHandle,
                format!("invalid context handle {ctx} (unknown on this thread)"),
            ));
        }
        match engine.params.get_mut(&params) {
            Some(record) => {
                *record = ParamRecord::default();
                Ok(())
            }
            None => Err(Failure::new(
                ErrorCode::InvalidHandle,
                format!("invalid parameter handle {params} (unknown on this thread)"),
            )),
        }
    });
    match result {
        Ok(()) => 0,
        Err(failure) => failure.report(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{error_code, free_context, new_context};

    #[test]
    fn parameters_are_validated() {
        let params = new_param_record();
        assert_eq!(set_param(params, "random-seed", "17"), 0);
        assert_eq!(set_param(params, "timeout", "250"), 0);
        assert!(set_param(params, "timeout", "0") < 0);
        assert_eq!(error_code(), ErrorCode::InvalidParamValue);
        assert!(set_param(params, "restarts", "on") < 0);
        assert_eq!(error_code(), ErrorCode::InvalidParamName);
        let record = with_engine(|engine| engine.param_record(params)).unwrap();
        assert_eq!(record.random_seed, 17);
        assert_eq!(record.timeout, Some(250));
        free_param_record(params);
        assert!(with_engine(|engine| engine.param_record(params)).is_err());
    }

    #[test]
    fn context_defaults_clear_the_record() {
        let ctx = new_context(NULL_HANDLE);
        let params = new_param_record();
        assert_eq!(set_param(params, "timeout", "10"), 0);
        assert_eq!(default_params_for_context(ctx, params), 0);
        let record = with_engine(|engine| engine.param_record(params)).unwrap();
        assert_eq!(record, ParamRecord::default());
        free_context(ctx);
        assert!(default_params_for_context(ctx, params) < 0);
        assert_eq!(error_code(), ErrorCode::InvalidHandle);
        free_param_record(params);
    }
}
