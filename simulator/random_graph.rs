// Random Graph Example
//
// Ten nodes, each pair connected with probability 0.4 and each node an
// initiator with probability 0.1. The diameter is measured first; a
// disconnected draw or one with no initiators is reported and retried
// with the next seed.

use le_rust::le_delay::Synchrony;
use le_rust::le_topology::TopologyError;
use le_rust::{InitiatorConfig, LeError, Session, SimConfig, TopologyConfig};

const ATTEMPTS: u64 = 20;

fn main() {
    let _ = simple_logger::init_with_level(log::Level::Info);

    println!("╔════════════════════════════════════════════════════════╗");
    println!("║    Random Graph Election                               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let base_seed = SimConfig::default().resolve_seed();

    for attempt in 0..ATTEMPTS {
        let config = SimConfig {
            topology: TopologyConfig::Random {
                nodes: 10,
                edge_probability: 0.4,
            },
            initiators: InitiatorConfig::Probability(0.1),
            synchrony: Synchrony::Asynchronous,
            find_diameter: true,
            seed: Some(base_seed.wrapping_add(attempt)),
            ..Default::default()
        };

        match Session::execute(config) {
            Ok(report) => {
                report.print_summary();
                return;
            }
            Err(LeError::Disconnected) => {
                println!("attempt {}: graph is disconnected, retrying", attempt + 1);
            }
            Err(LeError::Topology(TopologyError::NoInitiators)) => {
                println!("attempt {}: no node became an initiator, retrying", attempt + 1);
            }
            Err(e) => {
                eprintln!("election failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    eprintln!("no usable graph after {} attempts", ATTEMPTS);
    std::process::exit(1);
}
