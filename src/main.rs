//! Offline demo: runs the synthetic scenarios through the pipeline and
//! prints each analysis plus the session summary.
//!
//! Usage: axis-trainer [SCENARIO] [--thermal]
//!   --thermal  simulate a Serious thermal state halfway through each run

use std::sync::mpsc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use axis_trainer::capability::{Capabilities, CapabilityMonitor, ThermalState};
use axis_trainer::config::Config;
use axis_trainer::demo::DemoScenario;
use axis_trainer::pipeline::{FrameOutcome, Pipeline};

const CONFIG_PATH: &str = "config.toml";
const FRAMES: usize = 60;
const FPS: f32 = 30.0;
// 全フレームを出すと長いので間引く
const PRINT_EVERY: usize = 10;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load_or_default(CONFIG_PATH);

    let mut scenarios = Vec::new();
    let mut simulate_thermal = false;
    for arg in std::env::args().skip(1) {
        if arg == "--thermal" {
            simulate_thermal = true;
        } else {
            scenarios.push(arg.parse::<DemoScenario>()?);
        }
    }
    if scenarios.is_empty() {
        scenarios = DemoScenario::ALL.to_vec();
    }

    println!("=== Axis Trainer - Offline Demo ({}) ===", env!("GIT_VERSION"));
    println!(
        "Frame budget: {:.1} ms, confidence threshold: {:.2}",
        config.governor.frame_budget_ms(),
        config.fusion.confidence_threshold
    );
    println!();

    for scenario in scenarios {
        run_scenario(&config, scenario, simulate_thermal);
    }
    Ok(())
}

fn run_scenario(config: &Config, scenario: DemoScenario, simulate_thermal: bool) {
    let mut monitor = CapabilityMonitor::new(Capabilities::from_config(&config.capability));
    let (tx, rx) = mpsc::channel();
    let mut pipeline =
        Pipeline::from_config(config, scenario.exercise(), monitor.handle()).with_results(tx);

    println!(
        "--- {} ({}, {} mode) ---",
        scenario.name(),
        scenario.exercise(),
        pipeline.mode()
    );

    for (i, frame) in scenario.frames(FRAMES, FPS).iter().enumerate() {
        if simulate_thermal && i == FRAMES / 2 {
            if let Some(event) = monitor.on_thermal(ThermalState::Serious) {
                println!("  [thermal] {:?} -> {} mode", event, event.mode());
            }
        }
        if let FrameOutcome::Dropped = pipeline.process(frame) {
            println!("  t={:.3}s dropped", frame.timestamp);
        }
    }

    // 結果はチャネル経由で受け取る
    for (i, result) in rx.try_iter().enumerate() {
        if i % PRINT_EVERY == 0 {
            println!("  t={:.3}s {}", result.timestamp, result);
        }
    }

    let summary = pipeline.finish();
    let governor = pipeline.governor();
    info!(
        scenario = scenario.name(),
        fps = governor.fps(),
        over_budget = governor.over_budget_count(),
        "scenario finished"
    );
    println!("{}", summary);
    println!();
}
