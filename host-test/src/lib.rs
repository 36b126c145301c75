//! Simulated SoC platform for running the drivers on the host.
//!
//! Every capability the drivers consume has a simulated counterpart here.
//! The clock tree, the operating-point tables and the register blocks share
//! one event log, so tests can assert on the exact order of side effects
//! across all of them.

use std::sync::{Mutex, Once, PoisonError};

use log::Log;

pub mod chain;
pub mod clock;
pub mod node;
pub mod opp;
pub mod regs;

pub use chain::{FlakyChain, Registration};
pub use clock::{Event, SimClock, SimClockTree};
pub use node::SimNode;
pub use opp::{SimOppResolver, SimOppTable};
pub use regs::SimRegisters;

/// Routes `log` output of the code under test to the test harness.
///
/// Honours `RUST_LOG`; safe to call from every test. Records at warn level
/// and above are also kept for [logged_warnings].
pub fn init_logger() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let inner = env_logger::Builder::new()
            .is_test(true)
            .filter_level(log::LevelFilter::Debug)
            .parse_default_env()
            .build();
        let max_level = inner.filter().max(log::LevelFilter::Warn);

        if log::set_boxed_logger(Box::new(Capture { inner })).is_ok() {
            log::set_max_level(max_level);
        }
    });
}

/// Messages logged at warn level or above since the logger was installed,
/// by every test of the process.
pub fn logged_warnings() -> Vec<String> {
    WARNINGS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());

struct Capture {
    inner: env_logger::Logger,
}

impl Log for Capture {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::Level::Warn || self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record<'_>) {
        if record.level() <= log::Level::Warn {
            WARNINGS
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record.args().to_string());
        }

        if self.inner.matches(record) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}
