//! Frequency transitions on a simulated SpacemiT cluster.

use std::{sync::Barrier, thread};

use host_test::{Event, FlakyChain, Registration, SimClockTree, SimNode, SimOppResolver};
use soc_cpufreq::{register, Config, Coordinator, Error};
use soc_hal::{
    notifier::{
        FreqTransition,
        NotifyResult,
        PolicyAttach,
        PolicyNotifier,
        StaticNotifierChain,
        TransitionNotifier,
        TransitionPhase,
    },
    CpuId,
    Frequency,
    Rate,
};

const CLUSTER: &str = "cluster0";

type SimCoordinator = Coordinator<SimOppResolver, SimClockTree>;

fn table_node() -> SimNode {
    SimNode::new()
        .with_u64("cci-hz", 800_000_000)
        .with_u64("tcm-hz", 500_000_000)
        .with_u64("ace0-hz", 600_000_000)
        .with_u64("ace1-hz", 614_400_000)
}

fn platform_with(node: SimNode) -> (SimClockTree, SimCoordinator) {
    host_test::init_logger();

    let tree = SimClockTree::new();
    tree.add(CLUSTER, 1_000_000_000);
    tree.add_child("ace0", 600_000_000, 800_000_000);
    tree.add_child("ace1", 614_400_000, 1_228_800_000);
    tree.add_child("tcm", 500_000_000, 1_000_000_000);
    tree.add("cci", 400_000_000);

    let opp = SimOppResolver::new(&tree)
        .with_table(CpuId(0), node.clone(), CLUSTER)
        .with_table(CpuId(4), node, CLUSTER);
    let coordinator = Coordinator::new(opp, tree.clone(), Config::default());

    (tree, coordinator)
}

fn platform() -> (SimClockTree, SimCoordinator) {
    platform_with(table_node())
}

fn event(phase: TransitionPhase, old_khz: u32, new_khz: u32) -> FreqTransition {
    FreqTransition {
        cpu: CpuId(0),
        old: Frequency::kHz(old_khz),
        new: Frequency::kHz(new_khz),
        phase,
    }
}

fn changes(list: &[(&str, u64)]) -> Vec<(String, u64)> {
    list.iter().map(|(n, hz)| (n.to_string(), *hz)).collect()
}

fn cci_sets(tree: &SimClockTree) -> usize {
    tree.rate_changes()
        .iter()
        .filter(|(name, _)| name == "cci")
        .count()
}

#[test]
fn pre_change_halves_dependent_clocks() {
    let (tree, coordinator) = platform();

    let result = coordinator.on_transition(&event(TransitionPhase::PreChange, 1_000_000, 1_200_000));

    assert_eq!(result, NotifyResult::Done);
    assert_eq!(
        tree.rate_changes(),
        changes(&[
            ("ace0", 400_000_000),
            ("ace1", 614_400_000),
            ("tcm", 500_000_000),
        ])
    );
    assert_eq!(coordinator.diagnostics().suppressed, 0);
}

#[test]
fn pre_change_skips_absent_clocks() {
    let (tree, coordinator) = platform();
    tree.remove("ace1");

    coordinator.on_transition(&event(TransitionPhase::PreChange, 1_000_000, 1_200_000));

    assert_eq!(
        tree.rate_changes(),
        changes(&[("ace0", 400_000_000), ("tcm", 500_000_000)])
    );
    assert_eq!(coordinator.diagnostics().suppressed, 0);
}

#[test]
fn turbo_to_turbo_passes_through_stable_rate() {
    let (tree, coordinator) = platform();

    coordinator.on_transition(&event(TransitionPhase::PreChange, 1_600_000, 1_600_000));

    assert_eq!(tree.rate(CLUSTER), 1_200_000_000);
    assert_eq!(
        tree.rate_changes().last(),
        Some(&(CLUSTER.to_string(), 1_200_000_000))
    );
}

#[test]
fn entering_or_leaving_turbo_keeps_cluster_rate() {
    let (tree, coordinator) = platform();

    coordinator.on_transition(&event(TransitionPhase::PreChange, 1_000_000, 1_600_000));
    coordinator.on_transition(&event(TransitionPhase::PreChange, 1_600_000, 1_000_000));
    coordinator.on_transition(&event(TransitionPhase::PreChange, 1_599_999, 1_800_000));

    assert!(tree.rate_changes().iter().all(|(name, _)| name != CLUSTER));
    assert_eq!(tree.rate(CLUSTER), 1_000_000_000);
}

#[test]
fn turbo_threshold_is_configurable() {
    let (tree, _) = platform();
    let opp = SimOppResolver::new(&tree).with_table(CpuId(0), table_node(), CLUSTER);
    let config = Config::default()
        .with_turbo_threshold(Rate::from_raw(2_000_000_000))
        .with_stable_rate(Rate::from_raw(1_000_000_000));
    let coordinator = Coordinator::new(opp, tree.clone(), config);

    coordinator.on_transition(&event(TransitionPhase::PreChange, 1_600_000, 1_600_000));
    assert!(tree.rate_changes().iter().all(|(name, _)| name != CLUSTER));

    coordinator.on_transition(&event(TransitionPhase::PreChange, 2_000_000, 2_000_000));
    assert_eq!(tree.rate(CLUSTER), 1_000_000_000);
}

#[test]
fn default_config_matches_build_options() {
    let config = Config::default();

    assert_eq!(config.turbo_threshold(), Rate::from_raw(1_600_000_000));
    assert_eq!(config.stable_rate(), Rate::from_raw(1_200_000_000));
}

#[test]
fn post_change_restores_table_rates() {
    let (tree, coordinator) = platform();

    coordinator.on_transition(&event(TransitionPhase::PostChange, 1_000_000, 1_200_000));

    assert_eq!(
        tree.rate_changes(),
        changes(&[
            ("tcm", 500_000_000),
            ("ace0", 600_000_000),
            ("ace1", 614_400_000),
        ])
    );
}

#[test]
fn post_change_with_missing_property_continues() {
    let node = SimNode::new()
        .with_u64("tcm-hz", 500_000_000)
        .with_u64("ace1-hz", 614_400_000);
    let (tree, coordinator) = platform_with(node);

    coordinator.on_transition(&event(TransitionPhase::PostChange, 1_000_000, 1_200_000));

    assert_eq!(
        tree.rate_changes(),
        changes(&[("tcm", 500_000_000), ("ace1", 614_400_000)])
    );
    let diagnostics = coordinator.diagnostics();
    assert_eq!(diagnostics.suppressed, 1);
    assert_eq!(
        diagnostics.last_error,
        Some(Error::Property {
            name: "ace0-hz",
            cause: soc_hal::Error::NotFound,
        })
    );
}

#[test]
fn clock_failure_is_recorded_and_sequence_continues() {
    let (tree, coordinator) = platform();
    tree.fail_set_rate("ace0");

    let result = coordinator.on_transition(&event(TransitionPhase::PreChange, 1_000_000, 1_200_000));

    assert_eq!(result, NotifyResult::Done);
    assert_eq!(
        tree.rate_changes(),
        changes(&[("ace1", 614_400_000), ("tcm", 500_000_000)])
    );
    assert_eq!(
        coordinator.diagnostics().last_error,
        Some(Error::Clock {
            name: "ace0",
            cause: soc_hal::Error::InvalidInput,
        })
    );
}

#[test]
fn every_handle_and_table_is_released() {
    let (tree, coordinator) = platform();

    for phase in [TransitionPhase::PreChange, TransitionPhase::PostChange] {
        tree.clear_events();
        coordinator.on_transition(&event(phase, 1_600_000, 1_600_000));

        assert_eq!(tree.live_handles(), 0);
        assert_eq!(tree.events().last(), Some(&Event::TablePut(0)));
        let gets = tree
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Get(_)))
            .count();
        let puts = tree
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Put(_)))
            .count();
        assert_eq!((gets, puts), (3, 3));
    }

    coordinator.on_policy_attach(&PolicyAttach { cpu: CpuId(0) });
    assert_eq!(tree.live_handles(), 0);
}

#[test]
fn unknown_cpu_is_recorded() {
    let (tree, coordinator) = platform();

    let result = coordinator.on_transition(&FreqTransition {
        cpu: CpuId(7),
        ..event(TransitionPhase::PreChange, 1_000_000, 1_200_000)
    });

    assert_eq!(result, NotifyResult::Done);
    assert!(tree.rate_changes().is_empty());
    assert_eq!(
        coordinator.diagnostics().last_error,
        Some(Error::OppTable {
            cpu: CpuId(7),
            cause: soc_hal::Error::NotFound,
        })
    );
}

#[test]
fn cci_is_initialized_once() {
    let (tree, coordinator) = platform();

    for cpu in [0, 4, 0, 4] {
        let result = coordinator.on_policy_attach(&PolicyAttach { cpu: CpuId(cpu) });
        assert_eq!(result, NotifyResult::Done);
    }

    assert!(coordinator.cci_initialized());
    assert_eq!(tree.rate("cci"), 800_000_000);
    assert_eq!(cci_sets(&tree), 1);
}

#[test]
fn cci_initialization_waits_for_the_clock() {
    let (tree, coordinator) = platform();
    tree.remove("cci");

    coordinator.on_policy_attach(&PolicyAttach { cpu: CpuId(0) });
    assert!(!coordinator.cci_initialized());
    assert_eq!(coordinator.diagnostics().suppressed, 0);

    tree.add("cci", 400_000_000);
    coordinator.on_policy_attach(&PolicyAttach { cpu: CpuId(4) });
    assert!(coordinator.cci_initialized());
    assert_eq!(tree.rate("cci"), 800_000_000);
}

#[test]
fn cci_failure_leaves_initialization_pending() {
    let (tree, coordinator) = platform_with(SimNode::new());

    coordinator.on_policy_attach(&PolicyAttach { cpu: CpuId(0) });

    assert!(!coordinator.cci_initialized());
    assert_eq!(cci_sets(&tree), 0);
    assert_eq!(
        coordinator.diagnostics().last_error,
        Some(Error::Property {
            name: "cci-hz",
            cause: soc_hal::Error::NotFound,
        })
    );

    let (tree, coordinator) = platform();
    tree.fail_set_rate("cci");
    coordinator.on_policy_attach(&PolicyAttach { cpu: CpuId(0) });
    assert!(!coordinator.cci_initialized());

    tree.heal("cci");
    coordinator.on_policy_attach(&PolicyAttach { cpu: CpuId(0) });
    assert!(coordinator.cci_initialized());
    assert_eq!(cci_sets(&tree), 1);
}

#[test]
fn concurrent_attaches_initialize_cci_once() {
    const THREADS: usize = 16;

    let (tree, coordinator) = platform();
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for i in 0..THREADS {
            let coordinator = &coordinator;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                coordinator.on_policy_attach(&PolicyAttach {
                    cpu: CpuId(if i % 2 == 0 { 0 } else { 4 }),
                });
            });
        }
    });

    assert!(coordinator.cci_initialized());
    assert_eq!(cci_sets(&tree), 1);
}

#[test]
fn concurrent_transitions_are_not_interleaved() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 10;

    let (tree, coordinator) = platform();
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for i in 0..THREADS {
            let coordinator = &coordinator;
            let barrier = &barrier;
            s.spawn(move || {
                let phase = if i % 2 == 0 {
                    TransitionPhase::PreChange
                } else {
                    TransitionPhase::PostChange
                };
                barrier.wait();
                for _ in 0..ROUNDS {
                    coordinator.on_transition(&event(phase, 1_600_000, 1_600_000));
                }
            });
        }
    });

    let pre = changes(&[
        ("ace0", 400_000_000),
        ("ace1", 614_400_000),
        ("tcm", 500_000_000),
        (CLUSTER, 1_200_000_000),
    ]);
    let post = changes(&[
        ("tcm", 500_000_000),
        ("ace0", 600_000_000),
        ("ace1", 614_400_000),
    ]);

    let log = tree.rate_changes();
    let mut rest = &log[..];
    let (mut pres, mut posts) = (0, 0);
    while !rest.is_empty() {
        if rest.starts_with(&pre) {
            rest = &rest[pre.len()..];
            pres += 1;
        } else if rest.starts_with(&post) {
            rest = &rest[post.len()..];
            posts += 1;
        } else {
            panic!("handler sequences interleaved at {:?}", &rest[..rest.len().min(4)]);
        }
    }

    assert_eq!((pres, posts), (THREADS / 2 * ROUNDS, THREADS / 2 * ROUNDS));
    assert_eq!(tree.live_handles(), 0);
    assert_eq!(coordinator.diagnostics().suppressed, 0);
}

#[test]
fn notifier_failures_are_logged() {
    let (tree, coordinator) = platform();
    tree.fail_set_rate("ace1");

    coordinator.on_transition(&event(TransitionPhase::PostChange, 1_000_000, 1_200_000));

    assert!(host_test::logged_warnings()
        .iter()
        .any(|m| m.starts_with("cpufreq notifier") && m.contains(r#"name: "ace1""#)));
}

#[test]
fn chain_orders_pre_change_apply_and_post_change() {
    let (tree, coordinator) = platform();
    let chain = StaticNotifierChain::<'_, 4>::new();
    register(&coordinator, &chain).unwrap();

    chain.attach_policy(CpuId(0));
    assert!(coordinator.cci_initialized());

    tree.clear_events();
    chain
        .transition(
            CpuId(0),
            Frequency::kHz(1_600_000),
            Frequency::kHz(1_800_000),
            || {
                // Pre-change work is complete when the new rate is applied.
                assert_eq!(tree.rate("ace0"), 400_000_000);
                assert_eq!(tree.rate(CLUSTER), 1_200_000_000);
                tree.add(CLUSTER, 1_800_000_000);
                Ok(())
            },
        )
        .unwrap();

    assert_eq!(tree.rate("tcm"), 500_000_000);
    assert_eq!(tree.rate("ace0"), 600_000_000);
    assert_eq!(tree.rate(CLUSTER), 1_800_000_000);
    assert_eq!(coordinator.diagnostics().suppressed, 0);
}

#[test]
fn failed_policy_registration_rolls_back() {
    let (_tree, coordinator) = platform();
    let chain = FlakyChain::new().failing_policy();

    let result = register(&coordinator, &chain);

    assert_eq!(result, Err(Error::Registration(soc_hal::Error::Busy)));
    assert_eq!(
        chain.calls(),
        [
            Registration::Transition,
            Registration::Policy,
            Registration::UnregisterTransition,
        ]
    );
    assert_eq!(chain.inner.registered(), (0, 0));
}

#[test]
fn failed_transition_registration_stops_early() {
    let (_tree, coordinator) = platform();
    let chain = FlakyChain::new().failing_transition();

    let result = register(&coordinator, &chain);

    assert_eq!(result, Err(Error::Registration(soc_hal::Error::Busy)));
    assert_eq!(chain.calls(), [Registration::Transition]);
}

#[test]
fn successful_registration_and_unregistration() {
    let (_tree, coordinator) = platform();
    let chain = FlakyChain::new();

    register(&coordinator, &chain).unwrap();
    assert_eq!(chain.inner.registered(), (1, 1));

    soc_cpufreq::unregister(&coordinator, &chain);
    assert_eq!(chain.inner.registered(), (0, 0));
}
