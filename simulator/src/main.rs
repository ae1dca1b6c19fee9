mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use telemetry::Telemetry;
use tracing::{error, info, warn};

/// Posts random hive readings to a running ingestor
#[derive(Debug, Parser)]
#[command(name = "hive-simulator", version)]
struct Args {
    /// Ingest endpoint
    #[arg(long, env = "INGEST_URL", default_value = "http://localhost:5000/telemetry")]
    url: String,

    /// Readings per second
    #[arg(long, env = "RATE", default_value_t = 10)]
    rate: u64,

    /// Number of distinct hives
    #[arg(long, env = "HIVES", default_value_t = 5)]
    hives: usize,

    /// Stop after this many readings, 0 runs until interrupted
    #[arg(long, env = "COUNT", default_value_t = 0)]
    count: u64,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    anyhow::ensure!(
        (1..=1_000_000).contains(&args.rate),
        "rate must be between 1 and 1000000"
    );
    anyhow::ensure!(args.hives > 0, "hives must be positive");

    info!("Starting hive simulator");
    info!(
        "Target: {}, Rate: {} readings/s, Hives: {}",
        args.url, args.rate, args.hives
    );

    let client = Client::builder()
        .timeout(Duration::from_millis(args.timeout_ms))
        .build()
        .context("failed to build HTTP client")?;

    let (sent, failed) = run(&client, &args, shutdown_signal()).await;

    info!("Done: {} readings logged, {} failed", sent, failed);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

/// Posts readings until `count` is reached or `shutdown` resolves, returning
/// `(logged, failed)`. An in-flight request is abandoned on shutdown.
async fn run(client: &Client, args: &Args, shutdown: impl Future<Output = ()>) -> (u64, u64) {
    let mut ticker = tokio::time::interval(Duration::from_micros(1_000_000 / args.rate));
    let mut rng = rand::thread_rng();
    let mut sent = 0u64;
    let mut failed = 0u64;

    tokio::pin!(shutdown);

    loop {
        if args.count > 0 && sent + failed >= args.count {
            break;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let hive_id = format!("hive-{}", (sent + failed) % args.hives as u64);
        let reading = generate_reading(&mut rng, hive_id);

        let outcome = tokio::select! {
            outcome = client.post(&args.url).json(&reading).send() => outcome,
            _ = &mut shutdown => break,
        };

        match outcome {
            Ok(response) if response.status() == StatusCode::OK => sent += 1,
            Ok(response) => {
                failed += 1;
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!("Reading for {} rejected ({}): {}", reading.hive_id, status, body);
            }
            Err(e) => {
                failed += 1;
                error!("Failed to send reading for {}: {}", reading.hive_id, e);
            }
        }

        // Log progress periodically
        if (sent + failed) % 100 == 0 {
            info!("Sent {} readings ({} failed)", sent, failed);
        }
    }

    (sent, failed)
}

fn generate_reading(rng: &mut impl Rng, hive_id: String) -> Telemetry {
    let temperature = if rng.gen_bool(0.05) {
        rng.gen_range(10.0..45.0) // 5% outliers, brood chilled or overheating
    } else {
        rng.gen_range(32.0..36.0) // Normal brood nest range
    };

    Telemetry {
        hive_id,
        temperature: round2(temperature),
        humidity: round2(rng.gen_range(40.0..70.0)),
        audio: round2(rng.gen_range(0.0..1.0)),
        bee_count: rng.gen_range(0..=500),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
