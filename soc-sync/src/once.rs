use portable_atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;

/// Result of an [OnceFlag::try_init] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitOutcome {
    /// This call ran the initialiser and it succeeded.
    Initialized,
    /// A previous call already completed the initialisation.
    AlreadyDone,
    /// Another context is running the initialiser right now.
    InProgress,
}

/// An atomic single-winner initialisation flag.
///
/// Exactly one caller of [Self::try_init] gets to run its initialiser at a
/// time. Once an initialiser returns `Ok`, the flag is done for the lifetime
/// of the value and every later call returns [InitOutcome::AlreadyDone]. If
/// the initialiser fails (or panics), the flag returns to its clear state.
pub struct OnceFlag {
    state: AtomicU8,
}

impl Default for OnceFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl OnceFlag {
    /// Create a new, clear flag.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
        }
    }

    /// Returns `true` once an initialiser has completed successfully.
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// Runs `init` unless the flag is already done or claimed.
    pub fn try_init<E>(&self, init: impl FnOnce() -> Result<(), E>) -> Result<InitOutcome, E> {
        if let Err(current) =
            self.state
                .compare_exchange(IDLE, RUNNING, Ordering::Acquire, Ordering::Acquire)
        {
            return Ok(if current == DONE {
                InitOutcome::AlreadyDone
            } else {
                InitOutcome::InProgress
            });
        }

        let claim = Claim { flag: self };
        init()?;
        claim.complete();

        Ok(InitOutcome::Initialized)
    }
}

/// Puts the flag back to idle unless completed.
struct Claim<'a> {
    flag: &'a OnceFlag,
}

impl Claim<'_> {
    fn complete(self) {
        self.flag.state.store(DONE, Ordering::Release);
        core::mem::forget(self);
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.flag.state.store(IDLE, Ordering::Release);
    }
}
