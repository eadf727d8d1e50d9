/// Utilities for unit tests.
use crate::network::Network;
use crate::node::NodeIndex;
use crate::scenario::{ScenarioBuilder, ScenarioCollection};
use crate::storage::StorageInitialVolume;
use crate::timestep::{TimeDomain, Timestep, Timestepper};
use chrono::{NaiveDate, TimeDelta};

pub fn default_timestepper() -> Timestepper {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 1, 15)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    Timestepper::new(start, end, TimeDelta::days(1))
}

pub fn default_time_domain() -> TimeDomain {
    default_timestepper().try_into().unwrap()
}

/// The first time-step of the default time domain.
pub fn first_timestep() -> Timestep {
    *default_time_domain().first().unwrap()
}

/// A scenario collection with a single scenario of `size` members.
pub fn single_scenario(size: usize) -> ScenarioCollection {
    let mut scenarios = ScenarioCollection::default();
    scenarios
        .add_scenario(ScenarioBuilder::new("test-scenario", size).build().unwrap())
        .unwrap();
    scenarios
}

/// Create a simple test network with three nodes: input -> link -> output.
pub fn simple_network(num_scenarios: usize) -> Network {
    let mut network = Network::new(single_scenario(num_scenarios));

    let input_node = network.add_input_node("input", None).unwrap();
    let link_node = network.add_link_node("link", None).unwrap();
    let output_node = network.add_output_node("output", None).unwrap();

    network.connect_nodes(input_node, link_node).unwrap();
    network.connect_nodes(link_node, output_node).unwrap();

    network.set_node_max_flow(input_node, 10.0.into()).unwrap();
    network.set_node_cost(output_node, (-10.0).into()).unwrap();

    network
}

/// Create a test network with a storage between an input and an output.
///
/// The storage holds 50 of a maximum 100 at the start of the simulation.
pub fn simple_storage_network(num_scenarios: usize) -> (Network, NodeIndex) {
    let mut network = Network::new(single_scenario(num_scenarios));

    let input_node = network.add_input_node("input", None).unwrap();
    let storage_node = network
        .add_storage_node(
            "reservoir",
            StorageInitialVolume::Absolute(50.0.into()),
            0.0.into(),
            100.0.into(),
        )
        .unwrap();
    let output_node = network.add_output_node("output", None).unwrap();

    network.connect_nodes(input_node, storage_node).unwrap();
    network.connect_nodes(storage_node, output_node).unwrap();

    (network, storage_node)
}
