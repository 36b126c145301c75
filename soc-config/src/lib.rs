//! Build-time configuration for the SoC clock-domain crates
//!
//! A crate declares its options from its build script with
//! [generate_config] (requires the `build` feature). Every option can be
//! overridden through a `SCREAMING_SNAKE_CASE` environment variable made of
//! the crate prefix, `_CONFIG_` and the option name, for example
//! `SOC_CPUFREQ_CONFIG_STABLE_RATE_HZ=1000000000`. The selected values are
//! emitted as `rustc-env` variables and read back from the crate with the
//! [soc_config_int] macro.
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![cfg_attr(not(feature = "build"), no_std)]

#[cfg(feature = "build")]
mod generate;
#[cfg(feature = "build")]
pub use generate::*;

/// Parse an integer configuration value at compile time.
#[macro_export]
macro_rules! soc_config_int {
    ($ty:ty, $var:expr) => {
        match <$ty>::from_str_radix(env!($var), 10) {
            Ok(val) => val,
            _ => unreachable!(),
        }
    };
}

