/// Benchmarks of the per time-step state update.
///
/// Each network is made up of a number of simple systems (input->reservoir->output) and an
/// aggregated storage over every reservoir. A time-step commits a flow to each reservoir's
/// inflow and outflow and then runs `after`, exercising the storage and aggregate updates
/// across all scenario combinations.
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hydronet_core::network::{Network, NetworkError};
use hydronet_core::node::NodeIndex;
use hydronet_core::scenario::{ScenarioBuilder, ScenarioCollection};
use hydronet_core::storage::StorageInitialVolume;
use hydronet_core::test_utils::default_time_domain;

struct System {
    inflow: NodeIndex,
    outflow: NodeIndex,
}

fn make_network(num_systems: usize, num_scenarios: usize) -> Result<(Network, Vec<System>), NetworkError> {
    let mut scenarios = ScenarioCollection::default();
    let scenario = ScenarioBuilder::new("test-scenario", num_scenarios).build()?;
    scenarios.add_scenario(scenario)?;

    let mut network = Network::new(scenarios);
    let mut systems = Vec::with_capacity(num_systems);
    let mut reservoirs = Vec::with_capacity(num_systems);

    for i in 0..num_systems {
        let suffix = format!("{i}");
        let input = network.add_input_node("input", Some(&suffix))?;
        let reservoir = network.add_storage_node(
            &format!("reservoir-{i}"),
            StorageInitialVolume::Proportional(0.5),
            0.0.into(),
            1000.0.into(),
        )?;
        let output = network.add_output_node("output", Some(&suffix))?;

        network.connect_nodes(input, reservoir)?;
        network.connect_nodes(reservoir, output)?;

        let satellites = network
            .get_node(&reservoir)
            .and_then(|n| n.storage_node())
            .and_then(|s| s.satellites())
            .ok_or(NetworkError::NodeIndexNotFound { index: reservoir })?;
        let (inflow, outflow) = (satellites.output, satellites.input);

        systems.push(System { inflow, outflow });
        reservoirs.push(reservoir);
    }

    network.add_aggregated_storage_node("total", None, &reservoirs)?;
    network.setup()?;

    Ok((network, systems))
}

fn network_step_benchmark(c: &mut Criterion) {
    let domain = default_time_domain();
    let timesteps = domain.timesteps();

    let mut group = c.benchmark_group("network-step");

    for &n_sys in &[10, 100] {
        for &n_sc in &[1, 64, 1024] {
            let (mut network, systems) = make_network(n_sys, n_sc).expect("Failed to build the network.");
            let inflow = vec![2.0; n_sc];
            let outflow = vec![1.0; n_sc];

            group.throughput(Throughput::Elements((timesteps.len() * n_sc) as u64));
            group.bench_with_input(
                BenchmarkId::new("simple-systems", format!("{n_sys} * {n_sc}")),
                &(n_sys, n_sc),
                |b, _n| {
                    b.iter(|| {
                        network.reset(&timesteps[0]).expect("Failed to reset the network.");
                        for ts in timesteps {
                            network.before(ts).expect("Failed to start the time-step.");
                            for system in &systems {
                                network.commit_all(system.inflow, &inflow).expect("Failed to commit.");
                                network.commit_all(system.outflow, &outflow).expect("Failed to commit.");
                            }
                            network.after(ts).expect("Failed to end the time-step.");
                        }
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, network_step_benchmark);
criterion_main!(benches);
