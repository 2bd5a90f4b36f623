// Vehicle Registration Dashboard - Web Server
// JSON metrics API with Axum

use anyhow::{Context, Result};
use registration_dashboard::api::{router, AppState};
use registration_dashboard::{init_tracing, DashboardConfig};
use std::path::PathBuf;

fn main() -> Result<()> {
    init_tracing("info");

    println!("🚗 Vehicle Registration Dashboard - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Optional config path as the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = DashboardConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    // Loaded before the runtime starts: remote sources use a blocking client
    let (dataset, provenance) = cfg.loader().load().context("Failed to load dataset")?;
    println!("✓ {} records, {}", dataset.len(), provenance);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    runtime.block_on(serve(&cfg.server_addr, AppState::new(dataset, provenance)))
}

async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/metrics?granularity=quarter", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}
