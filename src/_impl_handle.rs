use crate::engine::{self, RawHandle, NULL_HANDLE};
use crate::{population, Handle, ResourceKind, SolverError};
use std::fmt::{Display, Formatter};
use tracing::debug;

impl ResourceKind {
    /// All resource kinds, in the order used by the population registry.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Config,
        ResourceKind::Session,
        ResourceKind::Parameters,
        ResourceKind::Model,
    ];

    /// **(internal)** Position of this kind in `ResourceKind::ALL`.
    pub(crate) fn index(self) -> usize {
        match self {
            ResourceKind::Config => 0,
            ResourceKind::Session => 1,
            ResourceKind::Parameters => 2,
            ResourceKind::Model => 3,
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Config => "config",
            ResourceKind::Session => "session",
            ResourceKind::Parameters => "parameters",
            ResourceKind::Model => "model",
        };
        write!(f, "{}", name)
    }
}

impl Handle {
    /// **(internal)** Take ownership of a resource just allocated by the engine.
    ///
    /// Returns `None` for the null handle, i.e. when the allocation failed. In that case
    /// nothing is counted and nothing needs to be released.
    pub(crate) fn acquire(kind: ResourceKind, raw: RawHandle) -> Option<Handle> {
        if raw == NULL_HANDLE {
            return None;
        }
        population::acquired(kind);
        debug!(%kind, raw, "acquired engine handle");
        Some(Handle { kind, raw })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.raw == NULL_HANDLE
    }

    /// The raw engine handle, or `ResourceClosed` once the handle has been released.
    pub fn raw(&self) -> Result<RawHandle, SolverError> {
        if self.is_closed() {
            Err(SolverError::ResourceClosed(self.kind))
        } else {
            Ok(self.raw)
        }
    }

    /// Release the resource. Calling this again (or dropping the handle afterwards)
    /// has no effect.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        let raw = self.raw;
        self.raw = NULL_HANDLE;
        match self.kind {
            ResourceKind::Config => engine::free_config(raw),
            ResourceKind::Session => engine::free_context(raw),
            ResourceKind::Parameters => engine::free_param_record(raw),
            ResourceKind::Model => engine::free_model(raw),
        }
        population::released(self.kind);
        debug!(kind = %self.kind, raw, "released engine handle");
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{self, NULL_HANDLE};
    use crate::{Handle, ResourceKind, SolverError};

    #[test]
    fn null_handles_are_never_acquired() {
        assert!(Handle::acquire(ResourceKind::Config, NULL_HANDLE).is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let raw = engine::new_param_record();
        let mut handle = Handle::acquire(ResourceKind::Parameters, raw).unwrap();
        assert_eq!(handle.raw(), Ok(raw));
        handle.close();
        assert!(handle.is_closed());
        handle.close();
        assert_eq!(
            handle.raw(),
            Err(SolverError::ResourceClosed(ResourceKind::Parameters))
        );
        // The engine record is really gone.
        assert!(engine::set_param(raw, "timeout", "4") < 0);
    }

    #[test]
    fn kinds_are_indexed_in_order() {
        for (i, kind) in ResourceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(ResourceKind::Parameters.to_string(), "parameters");
    }
}
