//! # CPU frequency transition coordinator for SpacemiT SoCs
//!
//! ## Overview
//!
//! On SpacemiT SoCs several clock domains hang off the CPU cluster clock:
//! the cache-coherent interconnect (`cci`), the tightly-coupled memory
//! (`tcm`) and the accelerator clocks (`ace0`, `ace1`). The [Coordinator]
//! keeps them within safe margins while the cluster frequency changes:
//!
//! - When a frequency policy is attached for the first time, the `cci` clock
//!   is set to the `cci-hz` rate of the cluster's operating-point table. This
//!   happens once per coordinator; if the clock is not available yet, a later
//!   attachment retries.
//! - Before a frequency change, `ace0`, `ace1` and `tcm` are dropped to half
//!   their parent's rate. Changing between two turbo operating points first
//!   moves the cluster clock to a stable intermediate rate.
//! - After the change, `tcm`, `ace0` and `ace1` are restored to the
//!   `tcm-hz`, `ace0-hz` and `ace1-hz` rates of the table.
//!
//! Absent optional clocks are skipped. The coordinator never aborts the
//! notifier chain: failures are logged and recorded in its [Diagnostics].
//!
//! ## Usage
//!
//! ```rust, ignore
//! static CHAIN: StaticNotifierChain<'static, 4> = StaticNotifierChain::new();
//!
//! let coordinator = Coordinator::new(opp_resolver, clock_provider, Config::default());
//! soc_cpufreq::register(&coordinator, &CHAIN)?;
//! ```
//!
//! ## Config Options
#![doc = include_str!(concat!(env!("OUT_DIR"), "/soc_cpufreq_config_table.md"))]
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![deny(missing_docs, rust_2018_idioms)]
#![cfg_attr(not(test), no_std)]

// MUST be the first module
mod fmt;

mod coordinator;

pub use coordinator::{register, unregister, Coordinator, Diagnostics};
use soc_config::soc_config_int;
use soc_hal::{CpuId, Rate};

struct BuildConfig {
    turbo_threshold_hz: u64,
    stable_rate_hz: u64,
}

const BUILD_CONFIG: BuildConfig = BuildConfig {
    turbo_threshold_hz: soc_config_int!(u64, "SOC_CPUFREQ_CONFIG_TURBO_THRESHOLD_HZ"),
    stable_rate_hz: soc_config_int!(u64, "SOC_CPUFREQ_CONFIG_STABLE_RATE_HZ"),
};

/// Coordinator configuration.
///
/// The defaults come from the build-time config options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    turbo_threshold: Rate,
    stable_rate: Rate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            turbo_threshold: Rate::from_raw(BUILD_CONFIG.turbo_threshold_hz),
            stable_rate: Rate::from_raw(BUILD_CONFIG.stable_rate_hz),
        }
    }
}

impl Config {
    /// Frequencies at or above this are turbo operating points.
    pub fn turbo_threshold(&self) -> Rate {
        self.turbo_threshold
    }

    /// The cluster rate used between two turbo operating points.
    pub fn stable_rate(&self) -> Rate {
        self.stable_rate
    }

    /// Sets the turbo threshold.
    pub fn with_turbo_threshold(mut self, threshold: Rate) -> Self {
        self.turbo_threshold = threshold;
        self
    }

    /// Sets the stable intermediate rate.
    pub fn with_stable_rate(mut self, rate: Rate) -> Self {
        self.stable_rate = rate;
        self
    }
}

/// Coordinator errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The operating-point table of a CPU could not be resolved.
    OppTable {
        /// The CPU that was looked up.
        cpu: CpuId,
        /// Why the lookup failed.
        cause: soc_hal::Error,
    },
    /// A clock operation failed.
    Clock {
        /// The clock involved.
        name: &'static str,
        /// Why it failed.
        cause: soc_hal::Error,
    },
    /// A table property could not be read.
    Property {
        /// The property name.
        name: &'static str,
        /// Why it could not be read.
        cause: soc_hal::Error,
    },
    /// A notifier could not be registered.
    Registration(soc_hal::Error),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::OppTable { cpu, cause } => {
                write!(f, "No OPP table for CPU {}: {}", cpu.0, cause)
            }
            Error::Clock { name, cause } => write!(f, "Clock {name}: {cause}"),
            Error::Property { name, cause } => write!(f, "Property {name}: {cause}"),
            Error::Registration(cause) => write!(f, "Register cpufreq notifier failed: {cause}"),
        }
    }
}

impl core::error::Error for Error {}
