//! Connect to a nearby trainer and print live status
//!
//! Falls back to the simulator when the host has no Bluetooth adapter.
//!
//! Run with: cargo run --example connect_trainer
//!
//! To look for a different trainer name:
//!   cargo run --example connect_trainer -- --name snap

use kickr_rust_ble::{ControllerConfig, LifecycleState, RecordingSink, Result, TrainerController};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("warn,kickr_rust_ble=debug")
        .init();

    let args: Vec<String> = std::env::args().collect();
    let target_name = args
        .iter()
        .position(|arg| arg == "--name")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "KICKR".to_string());

    let config = ControllerConfig::default().with_target_name(&target_name);
    let sink = RecordingSink::new();
    let controller = TrainerController::detect(config, Arc::new(sink.clone())).await?;

    if controller.is_simulated() {
        println!("No Bluetooth adapter found, running the simulator.\n");
    } else {
        println!("Looking for a trainer named *{}*...\n", target_name);
    }

    controller.connect();

    let mut last_state = LifecycleState::Idle;
    for _ in 0..60 {
        tokio::time::sleep(Duration::from_millis(500)).await;

        let state = controller.state();
        if state != last_state {
            println!("State: {} -> {}", last_state, state);
            last_state = state;
        }

        if state.is_connected() {
            let (power, cadence) = sink.stats();
            println!("  {} | {} | {}", power, cadence, sink.status());
        }

        if !controller.is_active() {
            println!("Session ended: {}", sink.status());
            break;
        }
    }

    controller.shutdown().await?;

    println!("\nLog:");
    print!("{}", sink.log_text());

    Ok(())
}
