use crate::engine::{self, RawHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// The shortest deadline a check can be given. Shorter timeouts are rounded up.
pub(crate) const MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Once the deadline elapsed, the stop request is repeated with this period until the
/// check finishes. A request which reaches the engine just before the search starts
/// would otherwise be lost.
const RETRY_PERIOD: Duration = Duration::from_millis(250);

/// **(internal)** A background timer which asks the engine to stop the search of one
/// session once a deadline elapses.
///
/// The timer is tagged with the generation of the check it guards and only fires while
/// the session is still in that generation. Disarming the timer (explicitly or by
/// dropping it) cancels it and waits for its thread, so a timer never outlives its check.
pub(crate) struct Watchdog {
    cancel: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// **(internal)** The body of the timer thread.
fn watch(
    session: RawHandle,
    generation: Arc<AtomicU64>,
    tag: u64,
    deadline: Duration,
    cancelled: Receiver<()>,
) {
    let mut wait = deadline;
    let mut fired = false;
    loop {
        match cancelled.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            // Cancelled, the check is over.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
        if generation.load(Ordering::SeqCst) != tag {
            return;
        }
        if !fired {
            warn!(session, ?deadline, "deadline elapsed, interrupting search");
            fired = true;
        }
        engine::stop_search(session);
        wait = RETRY_PERIOD;
    }
}

impl Watchdog {
    pub(crate) fn arm(
        session: RawHandle,
        generation: Arc<AtomicU64>,
        tag: u64,
        timeout: Duration,
    ) -> Watchdog {
        let deadline = timeout.max(MIN_TIMEOUT);
        let (cancel, cancelled) = mpsc::channel::<()>();
        let spawned = thread::Builder::new()
            .name(format!("watchdog-{session}"))
            .spawn(move || watch(session, generation, tag, deadline, cancelled));
        let thread = match spawned {
            Ok(thread) => Some(thread),
            Err(error) => {
                warn!(session, %error, "cannot start watchdog, the check runs without a deadline");
                None
            }
        };
        Watchdog {
            cancel: Some(cancel),
            thread,
        }
    }

    /// Cancel the timer (if it did not fire yet) and wait for its thread.
    pub(crate) fn disarm(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // The receiver is gone if the timer thread already returned.
            let _ = cancel.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                debug!("watchdog thread panicked, treating the timer as cancelled");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Session, Status, Term, Type};
    use std::time::Instant;

    /// Thirteen pigeons in twelve holes as a propositional formula. Unsatisfiable, but
    /// far beyond what a CDCL search refutes in a few seconds.
    fn assert_pigeonhole(session: &mut Session) {
        let (pigeons, holes) = (13, 12);
        let mut at = Vec::new();
        for _ in 0..pigeons {
            let row: Vec<Term> = (0..holes)
                .map(|_| Term::new_uninterpreted(Type::bool()).unwrap())
                .collect();
            session.assert_formula(Term::or(&row).unwrap()).unwrap();
            at.push(row);
        }
        for hole in 0..holes {
            for i in 0..pigeons {
                for j in (i + 1)..pigeons {
                    let clash = Term::or(&[
                        at[i][hole].not().unwrap(),
                        at[j][hole].not().unwrap(),
                    ])
                    .unwrap();
                    session.assert_formula(clash).unwrap();
                }
            }
        }
    }

    #[test]
    fn disarmed_watchdog_returns_promptly() {
        let generation = Arc::new(AtomicU64::new(1));
        let started = Instant::now();
        let watchdog = Watchdog::arm(u64::MAX, generation, 1, Duration::from_secs(30));
        watchdog.disarm();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn stale_generation_does_not_fire() {
        let mut session = Session::new().unwrap();
        assert_eq!(session.check().unwrap(), Status::Sat);
        // The check above ran under this tag, the session has moved past it since.
        let stale = session.generation.load(Ordering::SeqCst) - 1;
        assert_pigeonhole(&mut session);

        let ctx = session.handle.raw().unwrap();
        let timer = Watchdog::arm(ctx, session.generation.clone(), stale, Duration::ZERO);
        let started = Instant::now();
        let status = session.check_with_timeout(Duration::from_secs(3)).unwrap();
        let elapsed = started.elapsed();
        timer.disarm();

        // Only the deadline of the check stopped it, not the stale timer which was due
        // after one second.
        assert_eq!(status, Status::Interrupted);
        assert!(elapsed >= Duration::from_secs(3), "stopped after {elapsed:?}");
    }
}
