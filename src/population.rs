//! Process-wide counters of live engine resources, one per [`ResourceKind`].
//!
//! Every successful handle acquisition increments the counter of its kind and every
//! release decrements it, so a clear [`Census`] after a workload means nothing leaked.
//! All counters start at zero.

use crate::ResourceKind;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::error;

static LIVE: [AtomicUsize; 4] = [
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
];

/// A snapshot of the live resource counts of all kinds.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Census {
    counts: [usize; 4],
}

/// Number of live resources of the given kind.
pub fn census(kind: ResourceKind) -> usize {
    LIVE[kind.index()].load(Ordering::SeqCst)
}

/// Counts of all kinds. The counts are read one by one, so under concurrent acquisition
/// the snapshot is not atomic as a whole.
pub fn snapshot() -> Census {
    let mut counts = [0; 4];
    for kind in ResourceKind::ALL {
        counts[kind.index()] = census(kind);
    }
    Census { counts }
}

/// **(internal)** Record the acquisition of one resource.
pub(crate) fn acquired(kind: ResourceKind) {
    LIVE[kind.index()].fetch_add(1, Ordering::SeqCst);
}

/// **(internal)** Record the release of one resource. A release that would make the
/// count negative is refused (and logged), the count then stays at zero.
pub(crate) fn released(kind: ResourceKind) {
    let update = LIVE[kind.index()].fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
        count.checked_sub(1)
    });
    if update.is_err() {
        error!(%kind, "released more resources than were acquired");
    }
}

impl Census {
    pub fn get(&self, kind: ResourceKind) -> usize {
        self.counts[kind.index()]
    }

    /// Total number of live resources.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `true` if no resource of any kind is alive.
    pub fn is_clear(&self) -> bool {
        self.total() == 0
    }
}

impl Display for Census {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for kind in ResourceKind::ALL {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}: {}", kind, self.get(kind))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn census_accessors() {
        let census = Census {
            counts: [1, 0, 2, 0],
        };
        assert_eq!(census.get(ResourceKind::Config), 1);
        assert_eq!(census.get(ResourceKind::Parameters), 2);
        assert_eq!(census.total(), 3);
        assert!(!census.is_clear());
        assert!(Census::default().is_clear());
        assert_eq!(
            census.to_string(),
            "config: 1, session: 0, parameters: 2, model: 0"
        );
    }
}
