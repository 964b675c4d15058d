//! Trainer server: receives detector output from a capture client over TCP,
//! analyzes form and streams results back. One client at a time.

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use axis_trainer::biomechanics::ExerciseKind;
use axis_trainer::config::Config;
use axis_trainer::server::run_session;

const CONFIG_PATH: &str = "trainer_server.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load_or_default(CONFIG_PATH);
    let default_exercise: ExerciseKind = config
        .server
        .exercise
        .parse()
        .context("invalid server.exercise")?;

    println!("=== Axis Trainer Server ({}) ===", env!("GIT_VERSION"));
    println!("Listen: {}", config.server.listen_addr);
    println!("Default exercise: {}", default_exercise);
    println!(
        "Frame budget: {:.1} ms ({} fps)",
        config.governor.frame_budget_ms(),
        config.governor.target_fps
    );
    println!();

    let bind_addr: std::net::SocketAddr = config
        .server
        .listen_addr
        .parse()
        .context("invalid listen_addr")?;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "listening");

    loop {
        let (tcp_stream, addr) = listener.accept().await?;
        tcp_stream.set_nodelay(true)?;
        info!(%addr, "client connected");

        if let Err(e) = run_session(tcp_stream, &config, default_exercise).await {
            warn!("session ended with error: {:#}", e);
        }
        info!("client disconnected, waiting for next connection...");
    }
}
