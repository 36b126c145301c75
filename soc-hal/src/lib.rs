//! # Capabilities for SoC clock-domain drivers
//!
//! ## Overview
//!
//! The drivers in this workspace never talk to a clock controller, a device
//! tree or a notifier dispatcher directly. They consume the small set of
//! capability traits defined here, which a platform implements once:
//!
//! - [clock::Clock] and [clock::ClockProvider]: named clock lines, looked up
//!   from a device node. A handle is released when it is dropped.
//! - [opp::DeviceNode], [opp::OppTable] and [opp::OppResolver]: per-CPU
//!   operating-point tables and the properties of their device nodes.
//! - [reg_access::RegisterBlock]: 32-bit register I/O.
//! - [notifier]: frequency transition and policy notifiers and the chains
//!   that dispatch to them.
//!
//! On top of the clock capability, [clock::sequencer] brings an ordered list
//! of resources up with exact rollback on failure.
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![deny(missing_docs, rust_2018_idioms)]
#![cfg_attr(not(test), no_std)]

// MUST be the first module
mod fmt;

pub mod clock;
pub mod notifier;
pub mod opp;
pub mod reg_access;

/// Clock rate in Hz.
pub type Rate = fugit::HertzU64;

/// CPU frequency, as reported by frequency transitions.
pub type Frequency = fugit::KilohertzU32;

/// Identifies a logical CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CpuId(pub u32);

/// Errors reported by platform capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The named clock, property or table does not exist.
    NotFound,
    /// The request was rejected, for example an unsupported rate.
    InvalidInput,
    /// The resource is in use, or has no free slots left.
    Busy,
    /// The hardware did not respond in time.
    Timeout,
    /// A bus or controller failure.
    Io,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotFound => write!(f, "Resource not found"),
            Error::InvalidInput => write!(f, "Invalid input"),
            Error::Busy => write!(f, "Resource busy"),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::Io => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for Error {}
