use soc_hal::{
    clock::{Clock, ClockProvider},
    notifier::{
        FreqTransition,
        NotifierChain,
        NotifyResult,
        PolicyAttach,
        PolicyNotifier,
        TransitionNotifier,
        TransitionPhase,
    },
    opp::{DeviceNode, OppResolver, OppTable},
    CpuId,
    Frequency,
    Rate,
};
use soc_sync::{InitOutcome, NonReentrantMutex, OnceFlag};

use crate::{Config, Error};

type TableNode<O> = <<O as OppResolver>::Table as OppTable>::Node;

/// Failures swallowed by the notifier handlers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    /// Number of failures recorded.
    pub suppressed: u32,
    /// The most recent failure.
    pub last_error: Option<Error>,
}

impl Diagnostics {
    fn record(&mut self, result: Result<(), Error>) {
        if let Err(e) = result {
            warn!("cpufreq notifier: {:?}", e);
            self.suppressed = self.suppressed.saturating_add(1);
            self.last_error = Some(e);
        }
    }
}

/// Sequences the dependent clock domains of a CPU cluster across frequency
/// changes.
///
/// Every handler invocation runs under the coordinator's lock, so a
/// concurrent event never observes a half-applied sequence.
pub struct Coordinator<O, C> {
    opp: O,
    clocks: C,
    config: Config,
    cci: OnceFlag,
    diagnostics: NonReentrantMutex<Diagnostics>,
}

impl<O, C> Coordinator<O, C>
where
    O: OppResolver,
    C: ClockProvider<Node = TableNode<O>>,
{
    /// Creates a coordinator on top of the platform's operating-point tables
    /// and clocks.
    pub const fn new(opp: O, clocks: C, config: Config) -> Self {
        Self {
            opp,
            clocks,
            config,
            cci: OnceFlag::new(),
            diagnostics: NonReentrantMutex::new(Diagnostics {
                suppressed: 0,
                last_error: None,
            }),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the one-time `cci` initialisation has completed.
    pub fn cci_initialized(&self) -> bool {
        self.cci.is_done()
    }

    /// Failures swallowed so far.
    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.with(|d| *d)
    }

    fn table(&self, cpu: CpuId) -> Result<O::Table, Error> {
        self.opp
            .table_for_cpu(cpu)
            .map_err(|cause| Error::OppTable { cpu, cause })
    }

    fn attach(&self, event: &PolicyAttach) -> Result<(), Error> {
        let table = self.table(event.cpu)?;

        let outcome = self.cci.try_init(|| self.init_cci(table.node()));
        match outcome {
            Ok(InitOutcome::Initialized) => {
                info!("cci initialized from CPU {}", event.cpu.0);
                Ok(())
            }
            Ok(_) => Ok(()),
            // Not provided (yet), retried on the next attach.
            Err(Error::Clock {
                cause: soc_hal::Error::NotFound,
                ..
            }) => {
                debug!("No cci clock, deferring its initialization");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn init_cci(&self, node: &TableNode<O>) -> Result<(), Error> {
        let mut cci = self.clock(node, "cci")?;
        let rate = read_rate(node, "cci-hz")?;
        set_rate(&mut cci, "cci", rate)
    }

    fn transition(&self, event: &FreqTransition, diag: &mut Diagnostics) -> Result<(), Error> {
        let mut table = self.table(event.cpu)?;

        let mut tcm = self.optional_clock(table.node(), "tcm", diag);
        let mut ace0 = self.optional_clock(table.node(), "ace0", diag);
        let mut ace1 = self.optional_clock(table.node(), "ace1", diag);

        match event.phase {
            TransitionPhase::PreChange => {
                // Binary division is safe at any cluster rate.
                for (name, clock) in [("ace0", &mut ace0), ("ace1", &mut ace1), ("tcm", &mut tcm)] {
                    if let Some(clock) = clock {
                        diag.record(halve(clock, name));
                    }
                }

                if self.is_turbo(event.new) && self.is_turbo(event.old) {
                    debug!(
                        "Turbo to turbo ({} -> {} kHz), passing through {} Hz",
                        event.old.raw(),
                        event.new.raw(),
                        self.config.stable_rate.raw()
                    );
                    diag.record(
                        table
                            .set_clock_rate(self.config.stable_rate)
                            .map_err(|cause| Error::Clock { name: "cpu", cause }),
                    );
                }
            }
            TransitionPhase::PostChange => {
                for (name, property, clock) in [
                    ("tcm", "tcm-hz", &mut tcm),
                    ("ace0", "ace0-hz", &mut ace0),
                    ("ace1", "ace1-hz", &mut ace1),
                ] {
                    if let Some(clock) = clock {
                        diag.record(
                            read_rate(table.node(), property)
                                .and_then(|rate| set_rate(clock, name, rate)),
                        );
                    }
                }
            }
        }

        Ok(())
    }

    fn is_turbo(&self, frequency: Frequency) -> bool {
        Rate::from_raw(u64::from(frequency.raw()) * 1000) >= self.config.turbo_threshold
    }

    fn clock(&self, node: &TableNode<O>, name: &'static str) -> Result<C::Clock, Error> {
        self.clocks
            .get(node, name)
            .map_err(|cause| Error::Clock { name, cause })
    }

    fn optional_clock(
        &self,
        node: &TableNode<O>,
        name: &'static str,
        diag: &mut Diagnostics,
    ) -> Option<C::Clock> {
        match self.clock(node, name) {
            Ok(clock) => Some(clock),
            Err(Error::Clock {
                cause: soc_hal::Error::NotFound,
                ..
            }) => {
                debug!("No {} clock, skipping", name);
                None
            }
            Err(e) => {
                diag.record(Err(e));
                None
            }
        }
    }
}

fn read_rate<N: DeviceNode + ?Sized>(node: &N, name: &'static str) -> Result<Rate, Error> {
    node.read_rate(name)
        .map_err(|cause| Error::Property { name, cause })
}

fn set_rate(clock: &mut impl Clock, name: &'static str, rate: Rate) -> Result<(), Error> {
    clock
        .set_rate(rate)
        .map_err(|cause| Error::Clock { name, cause })
}

fn halve(clock: &mut impl Clock, name: &'static str) -> Result<(), Error> {
    let parent = clock.parent_rate().ok_or(Error::Clock {
        name,
        cause: soc_hal::Error::NotFound,
    })?;
    set_rate(clock, name, Rate::from_raw(parent.raw() / 2))
}

impl<O, C> PolicyNotifier for Coordinator<O, C>
where
    O: OppResolver + Sync,
    C: ClockProvider<Node = TableNode<O>> + Sync,
{
    fn on_policy_attach(&self, event: &PolicyAttach) -> NotifyResult {
        self.diagnostics.with(|diag| diag.record(self.attach(event)));
        NotifyResult::Done
    }
}

impl<O, C> TransitionNotifier for Coordinator<O, C>
where
    O: OppResolver + Sync,
    C: ClockProvider<Node = TableNode<O>> + Sync,
{
    fn on_transition(&self, event: &FreqTransition) -> NotifyResult {
        self.diagnostics.with(|diag| {
            let result = self.transition(event, diag);
            diag.record(result);
        });
        NotifyResult::Done
    }
}

/// Registers `coordinator` for transition and policy events on `chain`.
///
/// If the policy notifier cannot be registered, the transition notifier is
/// unregistered again. Failure is fatal to cpufreq startup.
pub fn register<'d, O, C, N>(coordinator: &'d Coordinator<O, C>, chain: &N) -> Result<(), Error>
where
    O: OppResolver + Sync,
    C: ClockProvider<Node = TableNode<O>> + Sync,
    N: NotifierChain<'d> + ?Sized,
{
    chain.register_transition(coordinator).map_err(|e| {
        error!("Register cpufreq transition notifier failed: {:?}", e);
        Error::Registration(e)
    })?;

    if let Err(e) = chain.register_policy(coordinator) {
        error!("Register cpufreq policy notifier failed: {:?}", e);
        chain.unregister_transition(coordinator);
        return Err(Error::Registration(e));
    }

    Ok(())
}

/// Removes both notifiers of `coordinator` from `chain`.
pub fn unregister<'d, O, C, N>(coordinator: &'d Coordinator<O, C>, chain: &N)
where
    O: OppResolver + Sync,
    C: ClockProvider<Node = TableNode<O>> + Sync,
    N: NotifierChain<'d> + ?Sized,
{
    chain.unregister_policy(coordinator);
    chain.unregister_transition(coordinator);
}
