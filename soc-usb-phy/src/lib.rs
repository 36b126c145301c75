//! # USB PHY driver for Sophgo CV1800 SoCs
//!
//! ## Overview
//!
//! The CV1800 USB PHY is fed by five clocks (`axi`, `apb`, `125m`, `33k` and
//! `12m`) that must be brought up in this order. Its host/device role is not
//! taken from the ID pin but forced through a separate pin register.
//!
//! [UsbPhy::probe] looks the clocks up and resolves the role from the
//! `dr_role` property of the PHY's device node. The PHY framework then drives
//! the controller through [PhyOps]:
//!
//! ```text
//!                 init() ok
//!  Uninitialized ----------> Active
//!      ^    |                  |
//!      |    | init() fails     | exit()
//!      |    v                  |
//!      |  Failed --init()-->   |
//!      +-----------------------+
//! ```
//!
//! A failing [UsbPhy::init] leaves no clock enabled. [UsbPhy::exit] disables
//! `33k`, `125m`, `apb` and `axi` in that order and leaves `12m` running.
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![deny(missing_docs, rust_2018_idioms)]
#![cfg_attr(not(test), no_std)]

// MUST be the first module
mod fmt;

pub mod regs;

use core::str::FromStr;

use soc_hal::{
    clock::{
        sequencer::{acquire_all, release_in_reverse, AcquireError, Named},
        Clock,
        ClockProvider,
    },
    opp::DeviceNode,
    reg_access::RegisterBlock,
};
use soc_sync::NonReentrantMutex;

/// Clocks disabled again by [UsbPhy::exit], counted from the front.
const EXIT_CLOCKS: usize = 4;

/// The role the PHY is forced into.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum PhyRole {
    /// USB host.
    Host = 0,
    /// USB device (peripheral).
    #[default]
    Device = 1,
}

impl FromStr for PhyRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Self::Host),
            "device" => Ok(Self::Device),
            _ => Err(ConfigError::InvalidRole),
        }
    }
}

impl PhyRole {
    /// Resolves the role from the `dr_role` property of `node`.
    ///
    /// A missing property selects [PhyRole::Device].
    pub fn from_node<N: DeviceNode + ?Sized>(node: &N) -> Result<Self, ConfigError> {
        match node.read_str("dr_role") {
            Ok(role) => role.parse(),
            Err(soc_hal::Error::NotFound) => Ok(Self::default()),
            Err(cause) => Err(ConfigError::Unreadable(cause)),
        }
    }
}

/// Lifecycle state of a [UsbPhy].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// [UsbPhy::init] has not run, or [UsbPhy::exit] undid it. `12m` stays
    /// enabled after an exit.
    Uninitialized,
    /// All clocks are enabled and the role is applied.
    Active,
    /// The last [UsbPhy::init] failed and was rolled back.
    Failed,
}

/// Invalid PHY configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `dr_role` is neither `"host"` nor `"device"`.
    InvalidRole,
    /// `dr_role` exists but could not be read as a string.
    Unreadable(soc_hal::Error),
}

/// USB PHY errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The device node describes an invalid configuration.
    Config(ConfigError),
    /// A clock could not be looked up.
    Clock {
        /// Lookup name of the clock.
        name: &'static str,
        /// Why the lookup failed.
        cause: soc_hal::Error,
    },
    /// A clock could not be enabled. Every clock enabled before it was
    /// disabled again.
    Acquire(AcquireError),
    /// The operation is not allowed in the current state.
    InvalidState(State),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(ConfigError::InvalidRole) => write!(f, "Invalid dr_role"),
            Error::Config(ConfigError::Unreadable(cause)) => {
                write!(f, "Failed to read dr_role: {cause}")
            }
            Error::Clock { name, cause } => write!(f, "Failed to get clock {name}: {cause}"),
            Error::Acquire(e) => write!(f, "{e}"),
            Error::InvalidState(state) => write!(f, "Operation not allowed in state {state:?}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<AcquireError> for Error {
    fn from(e: AcquireError) -> Self {
        Self::Acquire(e)
    }
}

/// Lifecycle hooks called by the PHY framework.
pub trait PhyOps {
    /// Powers the PHY up.
    fn init(&self) -> Result<(), Error>;

    /// Powers the PHY down.
    fn exit(&self) -> Result<(), Error>;
}

/// Charger detection status, see [UsbPhy::charger_status].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargerStatus {
    /// A charging port was detected.
    pub charger: bool,
    /// The data pins made contact.
    pub data_contact: bool,
}

struct Inner<C> {
    state: State,
    clocks: [Named<C>; 5],
}

/// A CV1800 USB PHY instance.
pub struct UsbPhy<C, R> {
    role: PhyRole,
    regs: R,
    pin: R,
    inner: NonReentrantMutex<Inner<C>>,
}

impl<C, R> UsbPhy<C, R>
where
    C: Clock,
    R: RegisterBlock,
{
    /// Creates the PHY described by `node`.
    ///
    /// `regs` is the `phy-reg` block, `pin` the `pin-reg` window. Fails if
    /// `dr_role` is invalid or any of the five clocks is missing; clocks
    /// already looked up are released again.
    pub fn probe<P>(provider: &P, node: &P::Node, regs: R, pin: R) -> Result<Self, Error>
    where
        P: ClockProvider<Clock = C>,
    {
        let role = PhyRole::from_node(node).inspect_err(|e| {
            error!("Failed to parse dt: {:?}", e);
        })?;

        // Bring-up order.
        let clocks = [
            Named::new("axi", get_clock(provider, node, "clk_axi")?),
            Named::new("apb", get_clock(provider, node, "clk_apb")?),
            Named::new("125m", get_clock(provider, node, "clk_125m")?),
            Named::new("33k", get_clock(provider, node, "clk_33k")?),
            Named::new("12m", get_clock(provider, node, "clk_12m")?),
        ];

        debug!("Probed USB PHY, role {:?}", role);

        Ok(Self {
            role,
            regs,
            pin,
            inner: NonReentrantMutex::new(Inner {
                state: State::Uninitialized,
                clocks,
            }),
        })
    }

    /// The configured role.
    pub fn role(&self) -> PhyRole {
        self.role
    }

    /// The current lifecycle state.
    pub fn state(&self) -> State {
        self.inner.with(|inner| inner.state)
    }

    /// Enables the clocks in order and applies the role.
    ///
    /// Allowed from [State::Uninitialized] and [State::Failed]. If a clock
    /// fails to enable, the ones before it are disabled in reverse order, the
    /// PHY enters [State::Failed] and the failing clock is reported.
    pub fn init(&self) -> Result<(), Error> {
        self.inner.with(|inner| {
            if inner.state == State::Active {
                return Err(Error::InvalidState(inner.state));
            }

            match acquire_all(&mut inner.clocks) {
                // `exit` releases all but `12m`.
                Ok(enabled) => {
                    enabled.commit();
                }
                Err(e) => {
                    error!("Failed to enable clock {}: {:?}", e.name, e.cause);
                    inner.state = State::Failed;
                    return Err(e.into());
                }
            }

            self.set_role(self.role);
            inner.state = State::Active;

            info!("USB PHY up as {:?}", self.role);
            Ok(())
        })
    }

    /// Disables the clocks again, `33k` first.
    ///
    /// Only allowed from [State::Active]. The `12m` clock stays enabled.
    pub fn exit(&self) -> Result<(), Error> {
        self.inner.with(|inner| {
            if inner.state != State::Active {
                return Err(Error::InvalidState(inner.state));
            }

            release_in_reverse(&mut inner.clocks[..EXIT_CLOCKS]);
            inner.state = State::Uninitialized;

            debug!("USB PHY down");
            Ok(())
        })
    }

    /// Reads the battery-charger detection result.
    ///
    /// The PHY registers are only clocked while [State::Active].
    pub fn charger_status(&self) -> Result<ChargerStatus, Error> {
        self.inner.with(|inner| {
            if inner.state != State::Active {
                return Err(Error::InvalidState(inner.state));
            }

            let status = self.regs.read32(regs::REG20);
            Ok(ChargerStatus {
                charger: status & regs::REG20_CHG_DET != 0,
                data_contact: status & regs::REG20_DP_DET != 0,
            })
        })
    }

    fn set_role(&self, role: PhyRole) {
        self.pin.write32(
            regs::PIN_REG,
            regs::PIN_ID_OVERWRITE_EN | regs::pin_id_overwrite_value(role as u32),
        );
    }
}

impl<C, R> PhyOps for UsbPhy<C, R>
where
    C: Clock,
    R: RegisterBlock,
{
    fn init(&self) -> Result<(), Error> {
        UsbPhy::init(self)
    }

    fn exit(&self) -> Result<(), Error> {
        UsbPhy::exit(self)
    }
}

fn get_clock<P: ClockProvider>(
    provider: &P,
    node: &P::Node,
    name: &'static str,
) -> Result<P::Clock, Error> {
    provider.get(node, name).map_err(|cause| {
        error!("Failed to get clock {}: {:?}", name, cause);
        Error::Clock { name, cause }
    })
}
