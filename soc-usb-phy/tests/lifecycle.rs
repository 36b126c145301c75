//! Lifecycle of the USB PHY on a simulated clock tree.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use host_test::{Event, SimClock, SimClockTree, SimNode, SimRegisters};
use soc_hal::{clock::sequencer::AcquireError, reg_access::RegisterBlock};
use soc_usb_phy::{regs, ConfigError, Error, PhyOps, PhyRole, State, UsbPhy};

const CLOCKS: [&str; 5] = ["clk_axi", "clk_apb", "clk_125m", "clk_33k", "clk_12m"];

fn tree() -> SimClockTree {
    host_test::init_logger();

    let tree = SimClockTree::new();
    for name in CLOCKS {
        tree.add(name, 25_000_000);
    }
    tree
}

fn probe(tree: &SimClockTree, node: SimNode) -> Result<UsbPhy<SimClock, SimRegisters>, Error> {
    UsbPhy::probe(
        tree,
        &node,
        SimRegisters::new("phy-reg", tree),
        SimRegisters::new("pin-reg", tree),
    )
}

fn enables(tree: &SimClockTree) -> Vec<String> {
    tree.events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Enable(name) => Some(name),
            _ => None,
        })
        .collect()
}

fn disables(tree: &SimClockTree) -> Vec<String> {
    tree.events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Disable(name) => Some(name),
            _ => None,
        })
        .collect()
}

#[test]
fn role_from_device_node() {
    let tree = tree();

    let host = probe(&tree, SimNode::new().with_str("dr_role", "host")).unwrap();
    assert_eq!(host.role(), PhyRole::Host);

    let device = probe(&tree, SimNode::new().with_str("dr_role", "device")).unwrap();
    assert_eq!(device.role(), PhyRole::Device);

    let default = probe(&tree, SimNode::new()).unwrap();
    assert_eq!(default.role(), PhyRole::Device);

    let bogus = probe(&tree, SimNode::new().with_str("dr_role", "bogus"));
    assert_eq!(bogus.err(), Some(Error::Config(ConfigError::InvalidRole)));
}

#[test]
fn probe_reports_missing_clock_and_releases_the_others() {
    let tree = tree();
    tree.remove("clk_33k");

    let result = probe(&tree, SimNode::new());

    assert!(matches!(
        result,
        Err(Error::Clock {
            name: "clk_33k",
            cause: soc_hal::Error::NotFound
        })
    ));
    assert_eq!(tree.live_handles(), 0);
}

#[test]
fn init_enables_in_order_then_writes_role() {
    let tree = tree();
    let phy = probe(&tree, SimNode::new().with_str("dr_role", "host")).unwrap();
    tree.clear_events();

    phy.init().unwrap();

    assert_eq!(phy.state(), State::Active);
    assert_eq!(enables(&tree), CLOCKS);
    assert_eq!(
        tree.events().last(),
        Some(&Event::Write32 {
            block: "pin-reg",
            offset: regs::PIN_REG,
            value: regs::PIN_ID_OVERWRITE_EN,
        })
    );
}

#[test]
fn device_role_sets_override_value() {
    let tree = tree();
    let pin = SimRegisters::new("pin-reg", &tree);
    let phy = UsbPhy::probe(
        &tree,
        &SimNode::new(),
        SimRegisters::new("phy-reg", &tree),
        pin,
    )
    .unwrap();

    phy.init().unwrap();

    assert!(tree.events().contains(&Event::Write32 {
        block: "pin-reg",
        offset: regs::PIN_REG,
        value: 0xc0,
    }));
}

#[test]
fn failed_init_rolls_back() {
    let tree = tree();
    tree.fail_enable("clk_125m");
    let phy = probe(&tree, SimNode::new()).unwrap();
    tree.clear_events();

    let err = phy.init().unwrap_err();

    assert_eq!(
        err,
        Error::Acquire(AcquireError {
            index: 2,
            name: "125m",
            cause: soc_hal::Error::Io,
        })
    );
    assert_eq!(phy.state(), State::Failed);
    assert_eq!(enables(&tree), ["clk_axi", "clk_apb"]);
    assert_eq!(disables(&tree), ["clk_apb", "clk_axi"]);
    for name in CLOCKS {
        assert!(!tree.is_enabled(name), "{name} left enabled");
    }
    // No role write without clocks.
    assert!(!tree
        .events()
        .iter()
        .any(|e| matches!(e, Event::Write32 { .. })));
}

#[test]
fn init_can_be_retried_after_failure() {
    let tree = tree();
    tree.fail_enable("clk_12m");
    let phy = probe(&tree, SimNode::new()).unwrap();

    assert!(phy.init().is_err());
    assert_eq!(phy.state(), State::Failed);
    assert_eq!(disables(&tree), ["clk_33k", "clk_125m", "clk_apb", "clk_axi"]);

    tree.heal("clk_12m");
    assert_eq!(phy.init(), Ok(()));
    assert_eq!(phy.state(), State::Active);
    for name in CLOCKS {
        assert_eq!(tree.enable_count(name), 1, "{name}");
    }
}

#[test]
fn exit_leaves_12m_running() {
    let tree = tree();
    let phy = probe(&tree, SimNode::new()).unwrap();
    phy.init().unwrap();
    tree.clear_events();

    PhyOps::exit(&phy).unwrap();

    assert_eq!(phy.state(), State::Uninitialized);
    assert_eq!(disables(&tree), ["clk_33k", "clk_125m", "clk_apb", "clk_axi"]);
    for name in &CLOCKS[..4] {
        assert!(!tree.is_enabled(name));
    }
    assert!(tree.is_enabled("clk_12m"));
}

#[test]
fn lifecycle_state_checks() {
    let tree = tree();
    let phy = probe(&tree, SimNode::new()).unwrap();

    assert_eq!(phy.exit(), Err(Error::InvalidState(State::Uninitialized)));
    assert_eq!(
        phy.charger_status(),
        Err(Error::InvalidState(State::Uninitialized))
    );

    phy.init().unwrap();
    assert_eq!(phy.init(), Err(Error::InvalidState(State::Active)));
    assert_eq!(tree.enable_count("clk_axi"), 1);

    phy.exit().unwrap();
    phy.init().unwrap();
    assert_eq!(tree.enable_count("clk_axi"), 1);
    assert_eq!(tree.enable_count("clk_12m"), 2);
}

#[test]
fn charger_status_reads_detection_bits() {
    let tree = tree();
    let phy_regs = SimRegisters::new("phy-reg", &tree);
    phy_regs.write32(regs::REG20, regs::REG20_CHG_DET | regs::REG20_BC_EN);

    let phy = UsbPhy::probe(
        &tree,
        &SimNode::new(),
        phy_regs,
        SimRegisters::new("pin-reg", &tree),
    )
    .unwrap();
    phy.init().unwrap();

    let status = phy.charger_status().unwrap();
    assert!(status.charger);
    assert!(!status.data_contact);
}

#[test]
fn concurrent_init_and_exit_stay_balanced() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 25;

    let tree = tree();
    let phy = probe(&tree, SimNode::new()).unwrap();
    let inits = AtomicUsize::new(0);
    let exits = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    match phy.init() {
                        Ok(()) => {
                            inits.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => assert_eq!(e, Error::InvalidState(State::Active)),
                    }
                    match phy.exit() {
                        Ok(()) => {
                            exits.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => assert_eq!(e, Error::InvalidState(State::Uninitialized)),
                    }
                }
            });
        }
    });

    let inits = inits.load(Ordering::SeqCst);
    let exits = exits.load(Ordering::SeqCst);
    let active = u32::from(phy.state() == State::Active);

    assert!(inits > 0);
    assert_eq!(inits - exits, active as usize);
    for name in &CLOCKS[..4] {
        assert_eq!(tree.enable_count(name), active, "{name}");
    }
    assert_eq!(tree.enable_count("clk_12m") as usize, inits);
}

#[test]
fn failed_init_is_logged() {
    let tree = tree();
    tree.fail_enable("clk_33k");
    let phy = probe(&tree, SimNode::new()).unwrap();

    assert!(phy.init().is_err());

    assert!(host_test::logged_warnings()
        .iter()
        .any(|m| m == "Failed to enable clock 33k: Io"));
}
