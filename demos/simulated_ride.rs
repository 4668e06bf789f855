//! Simulated ride: stream synthetic telemetry without Bluetooth
//!
//! Run with: cargo run --example simulated_ride
//!
//! To change the sample period (milliseconds):
//!   cargo run --example simulated_ride -- --period 250

use kickr_rust_ble::{
    Capability, ControllerConfig, RecordingSink, Result, SimulatorConfig, TrainerController,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kickr_rust_ble=debug".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let period_ms = args
        .iter()
        .position(|arg| arg == "--period")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(500);

    let config = ControllerConfig::default()
        .with_simulator(SimulatorConfig::default().with_period(Duration::from_millis(period_ms)));

    let sink = RecordingSink::new();
    let controller = TrainerController::new(Capability::Simulator, config, Arc::new(sink.clone()))?;

    println!("Simulated ride ({} ms samples)", period_ms);
    println!("==============================\n");
    println!("Status: {}", sink.status());

    controller.toggle();

    for second in 1..=5 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let (power, cadence) = sink.stats();
        println!("[{:>2}s] {:>7} | {:>8} | {}", second, power, cadence, sink.status());
    }

    controller.toggle();

    let (power, cadence) = sink.stats();
    println!("\nAfter stop: {} | {} | {}", power, cadence, sink.status());

    println!("\nLog:");
    print!("{}", sink.log_text());

    controller.shutdown().await?;
    Ok(())
}
