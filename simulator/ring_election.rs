// Ring Election Example
//
// 500 nodes in a ring, every node an initiator, Poisson(5) transit delays.

use le_rust::le_delay::{DelayConfig, Synchrony};
use le_rust::{InitiatorConfig, Session, SimConfig, TopologyConfig};

fn main() {
    let _ = simple_logger::init_with_level(log::Level::Info);

    println!("╔════════════════════════════════════════════════════════╗");
    println!("║    Ring Election                                       ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let config = SimConfig {
        topology: TopologyConfig::Ring { nodes: 500 },
        initiators: InitiatorConfig::All,
        synchrony: Synchrony::Asynchronous,
        delay: DelayConfig::Poisson { mean: 5.0 },
        find_diameter: true,
        ..Default::default()
    };

    match Session::execute(config) {
        Ok(report) => {
            report.print_summary();
            if report.run.leader != 499 {
                eprintln!("unexpected leader {}", report.run.leader);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("election failed: {}", e);
            std::process::exit(1);
        }
    }
}
