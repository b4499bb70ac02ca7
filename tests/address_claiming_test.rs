//! Address claiming between several stacks sharing a simulated bus.
mod helpers;

use helpers::{all_online, node_name, run, run_only, run_until, Node, SimNetwork};
use korri_rvc::protocol::managment::address_ranges::{
    default_address, device_function, POWER_COMPONENTS,
};
use korri_rvc::protocol::managment::iso_name::IsoName;
use korri_rvc::protocol::managment::roster::NodeChange;
use korri_rvc::protocol::messages::PGN_ADDRESS_CLAIM;
use korri_rvc::protocol::stack::StackConfig;
use korri_rvc::protocol::transport::GLOBAL_ADDRESS;

fn inverter(unique: u32) -> Node {
    Node::start(StackConfig::new(node_name(unique, device_function::INVERTER)))
}

fn static_inverter(unique: u32) -> Node {
    let name = IsoName::builder()
        .unique_number(unique)
        .manufacturer_code(119)
        .device_function(device_function::INVERTER)
        .arbitrary_address_capable(false)
        .build();
    Node::start(StackConfig::new(name))
}

fn distinct_addresses(nodes: &[Node]) -> bool {
    nodes
        .iter()
        .enumerate()
        .all(|(i, a)| nodes[i + 1..].iter().all(|b| a.address() != b.address()))
}

#[test]
/// Two self-configurable nodes start on the same address; the lower NAME keeps it.
fn test_winner_keeps_contested_address() {
    let net = SimNetwork::new(2);
    let mut nodes = [inverter(1), inverter(2)];
    assert_eq!(nodes[0].address(), POWER_COMPONENTS.end);
    assert_eq!(nodes[1].address(), POWER_COMPONENTS.end);

    assert!(run_until(&net, &mut nodes, 300, all_online));
    run(&net, &mut nodes, 50);
    assert!(all_online(&nodes));

    assert_eq!(nodes[0].address(), 143);
    assert_eq!(nodes[1].address(), 142);
    assert_eq!(nodes[1].hooks.address, Some(142));

    let loser = nodes[1].stack.name();
    let entry = nodes[0].stack.roster().find_by_name(&loser).unwrap();
    assert_eq!(entry.address, 142);
    assert!(nodes[0]
        .hooks
        .node_changes
        .iter()
        .any(|(change, _, new, name)| *change == NodeChange::NewNode && *new == 142 && *name == loser));
}

#[test]
/// Six nodes of the same function settle on six distinct power-component addresses.
fn test_addresses_stay_unique() {
    let net = SimNetwork::new(6);
    let mut nodes = [
        inverter(6),
        inverter(3),
        inverter(1),
        inverter(5),
        inverter(2),
        inverter(4),
    ];

    let settled = run_until(&net, &mut nodes, 3000, |nodes| {
        all_online(nodes) && distinct_addresses(nodes)
    });
    assert!(settled);
    run(&net, &mut nodes, 5);
    assert!(nodes
        .iter()
        .all(|node| POWER_COMPONENTS.contains(node.address())));
    assert_eq!(nodes[2].address(), 143);

    // every node knows the five others
    for node in &nodes {
        assert_eq!(node.stack.roster().len(), 5);
    }
}

#[test]
/// A static node losing its default address stays silent until the winner leaves.
fn test_static_conflict_blocks_loser() {
    let net = SimNetwork::new(2);
    let mut nodes = [static_inverter(1), static_inverter(2)];

    run(&net, &mut nodes, 100);
    assert!(nodes[0].stack.is_online());
    assert!(!nodes[1].stack.is_online());
    assert_eq!(nodes[0].address(), default_address::INVERTER);

    net.clear_log();
    run(&net, &mut nodes, 100);
    assert!(net.sent_by(1, PGN_ADDRESS_CLAIM).is_empty());

    // only the loser keeps running: the winner ages out of its roster
    run_only(&net, &mut nodes, &[1], 600);
    assert!(nodes[1]
        .hooks
        .node_changes
        .iter()
        .any(|(change, old, new, _)| {
            *change == NodeChange::TimedOut && *old == default_address::INVERTER && *new == GLOBAL_ADDRESS
        }));
    assert!(nodes[1].stack.is_online());
    assert_eq!(nodes[1].address(), default_address::INVERTER);
}

#[test]
/// Refreshed claims keep a node in the roster; a silent one times out.
fn test_claim_refresh_keeps_roster_entry() {
    let net = SimNetwork::new(3);
    let refreshing = |unique| {
        Node::start(
            StackConfig::new(node_name(unique, device_function::INVERTER))
                .with_claim_refresh_ms(Some(1000)),
        )
    };
    let mut nodes = [refreshing(1), refreshing(2), inverter(3)];
    assert!(run_until(&net, &mut nodes, 500, all_online));
    run(&net, &mut nodes, 5);
    let (second, silent) = (nodes[1].address(), nodes[2].address());
    assert_eq!(nodes[0].stack.roster().len(), 2);

    net.clear_log();
    run_only(&net, &mut nodes, &[0, 1], 700);

    // 700 ticks of 10 ms with a 1 s period
    assert_eq!(net.sent_by(1, PGN_ADDRESS_CLAIM).len(), 7);
    let roster = nodes[0].stack.roster();
    assert!(roster.find_by_address(second).is_some());
    assert!(roster.find_by_address(silent).is_none());
    assert!(nodes[0]
        .hooks
        .node_changes
        .iter()
        .any(|(change, old, _, _)| *change == NodeChange::TimedOut && *old == silent));
}
