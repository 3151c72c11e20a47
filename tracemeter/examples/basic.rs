//! Traces a few simulated requests and records job samples directly.
//!
//! Run with an optional configuration file:
//!
//! ```sh
//! cargo run --example basic -- telemetry.toml
//! ```
//!
//! Without a file, metrics are printed to the console every half second.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracemeter::{Fields, Handler, TelemetryConfig, Tracer};

#[tokio::main]
async fn main() -> tracemeter::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => TelemetryConfig::load(Some(Path::new(&path)))?,
        None => TelemetryConfig {
            console: true,
            period_ms: 500,
            ..TelemetryConfig::default()
        },
    };

    // Trace metrics
    let handler = Arc::new(settings.build_handler()?);
    let tracer = Tracer::new();
    let root = tracer.scope().with_handler(handler.clone());

    // Direct samples
    let monitor = settings.build_monitor("demo")?.start()?;
    let recorder = monitor.recorder();

    for i in 0..20u64 {
        let request = root.start("Request", "*");

        // Spans can be carried into other tasks
        let worker = request.clone();
        tokio::spawn(async move {
            let db = worker.enter("Database");
            tokio::time::sleep(Duration::from_millis(5 + i % 7)).await;
            db.count("Rows", i);
            db.leave("Done");
        })
        .await
        .expect("database task panicked");

        request.set("Queue", 20 - i);
        request.log("Route", if i % 3 == 0 { "/health" } else { "/api" });
        request.leave("Served");

        recorder.record(
            "jobs",
            Fields::new()
                .counter("Processed", 1)
                .histogram("Size", i * 100)
                .labels("Kind", if i % 2 == 0 { "even" } else { "odd" }),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Final reports may block on network sinks, keep them off the runtime
    tokio::task::spawn_blocking(move || {
        monitor.stop();
        handler.close();
    })
    .await
    .expect("shutdown panicked");

    println!("pool: {} timelines, {} idle", tracer.pool_size(), tracer.idle());
    Ok(())
}
