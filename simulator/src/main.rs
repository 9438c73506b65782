use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use generator::profile::{build_records, SwathGenerator};
use gui_bridge::bridge::{gui_bind_address, GuiBridge};
use log::{info, warn};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::mpsc;
use workflow::config::WorkflowConfig;
use workflow::runner::{Runner, RECORD_QUEUE_DEPTH};

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Synthetic multibeam feed for the water-column core")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Push a fixed batch of pings through the pipeline and print a summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Pings generated in offline mode
    #[arg(long, default_value_t = 200)]
    pings: usize,
    /// Stream pings in real time and expose the rings over HTTP
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value_t = 0.2)]
    bin_size_m: f64,
    #[arg(long, default_value_t = 500)]
    grid_size: usize,
    #[arg(long, default_value_t = 5)]
    along_track_avg_ping: usize,
    #[arg(long, default_value_t = 5000)]
    raw_ring_capacity: usize,
    #[arg(long, default_value_t = 9000)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        let config = WorkflowConfig::from_args(
            args.bin_size_m,
            args.grid_size,
            args.along_track_avg_ping,
            args.raw_ring_capacity,
        );
        config.validate().context("validating command-line settings")?;
        config
    };

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    let runner = Runner::new(workflow_config);

    if args.offline {
        runtime.block_on(run_offline(&runner, args.pings))?;
    }
    if args.serve {
        runtime.block_on(serve(&runner, args.port))?;
    }
    if !args.offline && !args.serve {
        info!("nothing to do; pass --offline or --serve");
    }

    Ok(())
}

async fn run_offline(runner: &Runner, pings: usize) -> anyhow::Result<()> {
    let records = build_records(&runner.config().generator, pings)?;
    let pipeline = runner.build_pipeline()?;
    let result = runner.execute(&pipeline, records).await?;
    let metrics = result.metrics;

    println!(
        "Offline run -> records {}, empty pies {}, discarded samples {}, windows {}",
        metrics.records_processed,
        metrics.empty_pies,
        metrics.samples_discarded,
        metrics.windows_reduced
    );
    println!(
        "Ring occupancy -> raw {}, averaged {}",
        result.raw_occupancy, result.averaged_occupancy
    );
    if let Some(slice) = result.latest_slice {
        let vertical = slice.vertical_profile.iter().flatten().count();
        let horizontal = slice.horizontal_profile.iter().flatten().count();
        println!(
            "Latest slice at t={:.2}s -> {} vertical / {} horizontal bins with data",
            slice.timestamp, vertical, horizontal
        );
    }
    Ok(())
}

async fn serve(runner: &Runner, port: u16) -> anyhow::Result<()> {
    let pipeline = Arc::new(runner.build_pipeline()?);
    let (tx, rx) = mpsc::channel(RECORD_QUEUE_DEPTH);
    let tasks = pipeline.spawn(rx);
    let cancel = pipeline.cancellation_token();

    let bridge = GuiBridge::new(Arc::clone(&pipeline), tx.clone());
    let shutdown = cancel.clone().cancelled_owned();
    let server = tokio::spawn(bridge.serve(gui_bind_address(port), shutdown));

    let mut generator = SwathGenerator::new(runner.config().generator.clone())?;
    let interval = Duration::from_secs_f64(runner.config().generator.ping_interval_s.max(0.001));
    let feed_cancel = cancel.clone();
    let feeder = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = feed_cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = tx.try_send(generator.next_record()) {
                        warn!("dropping synthetic ping: {}", err);
                    }
                }
            }
        }
    });

    info!("streaming synthetic pings (Ctrl+C to stop)");
    signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
    pipeline.shutdown();

    feeder.await.context("joining ping feeder")?;
    server.await.context("joining HTTP bridge")??;
    let metrics = tasks.join().await.context("joining pipeline tasks")?;
    info!(
        "stopped after {} records and {} windows",
        metrics.records_processed, metrics.windows_reduced
    );
    Ok(())
}
