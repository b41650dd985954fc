//! Demo pipelines for the rillflow runtime.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use rillflow_core::graph::ProcessGraph;
use rillflow_core::merge::blend_streams;
use rillflow_core::ops::{map_element, print_stream, stream_to_file};
use rillflow_core::pipeline::{run_pipeline, Connection};
use rillflow_core::process::StreamProcess;
use rillflow_core::source::Source;
use rillflow_core::window::map_window;

#[derive(Parser)]
#[command(name = "rillflow", about = "Incremental dataflow demos", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Two processes: a counting source scaled in one process, relayed to and
    /// printed by another.
    Sequence {
        /// Number of values to emit.
        #[arg(long, default_value_t = 10)]
        steps: usize,
        /// Milliseconds between emissions.
        #[arg(long, default_value_t = 50)]
        interval_ms: u64,
        /// Also write the received values to this file, one per line.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the final values as a JSON array instead of summarizing.
        #[arg(long)]
        json: bool,
    },
    /// One process: two jittery sensor sources blended into one stream and
    /// averaged over sliding windows.
    Sensors {
        /// Number of readings per sensor.
        #[arg(long, default_value_t = 20)]
        steps: usize,
        #[arg(long, default_value_t = 4)]
        window_size: usize,
        #[arg(long, default_value_t = 2)]
        step_size: usize,
        /// Milliseconds between readings.
        #[arg(long, default_value_t = 25)]
        interval_ms: u64,
        /// Seed for the sensor noise.
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    match Cli::parse().command {
        Commands::Sequence {
            steps,
            interval_ms,
            out,
            json,
        } => run_sequence(steps, Duration::from_millis(interval_ms), out, json),
        Commands::Sensors {
            steps,
            window_size,
            step_size,
            interval_ms,
            seed,
        } => run_sensors(
            steps,
            window_size,
            step_size,
            Duration::from_millis(interval_ms),
            seed,
        ),
    }
}

fn run_sequence(
    steps: usize,
    interval: Duration,
    out: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut g0 = ProcessGraph::new();
    let seq = g0.stream("seq")?;
    let t = g0.stream("t")?;
    map_element(&mut g0, "x10", seq, t, |v: &i64| v * 10)?;
    let producer = StreamProcess::new("producer", g0)
        .with_source(Source::unfold("seq", interval, Some(steps), 0i64, |s| {
            (s + 1, s + 1)
        }))
        .with_output("t");

    let mut g1 = ProcessGraph::new();
    let t = g1.stream("t")?;
    if let Some(path) = &out {
        stream_to_file::<i64>(&mut g1, "to_file", t, path)?;
    } else if !json {
        print_stream::<i64>(&mut g1, "print", t)?;
    }
    let printer = StreamProcess::new("printer", g1).with_input("t");

    let finished = run_pipeline(
        vec![producer, printer],
        &[Connection::new(0, "t", 1, "t")],
    )?;

    let values = finished[1].values::<i64>("t")?;
    if json {
        println!("{}", serde_json::to_string(&values)?);
    } else {
        tracing::info!(received = values.len(), "sequence pipeline finished");
    }
    Ok(())
}

fn run_sensors(
    steps: usize,
    window_size: usize,
    step_size: usize,
    interval: Duration,
    seed: u64,
) -> Result<()> {
    let mut g = ProcessGraph::new();
    let a = g.stream("sensor_a")?;
    let b = g.stream("sensor_b")?;
    let merged = g.stream("merged")?;
    let averages = g.stream("averages")?;

    let sensor = |stream: &str, base: f64, seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        Source::repeating(stream, interval, Some(steps), move || {
            Some(base + rng.random_range(-1.0..1.0))
        })
    };

    blend_streams(&mut g, "blend", &[a, b], merged, |v: &f64| *v)?;
    map_window(&mut g, "avg", merged, averages, window_size, step_size, |w: &[f64]| {
        w.iter().sum::<f64>() / w.len() as f64
    })?;
    print_stream::<f64>(&mut g, "print", averages)?;

    let finished = StreamProcess::new("sensors", g)
        .with_source(sensor("sensor_a", 20.0, seed))
        .with_source(sensor("sensor_b", 22.0, seed.wrapping_add(1)))
        .run()?;

    tracing::info!(
        readings = finished.stream_len("merged")?,
        averages = finished.stream_len("averages")?,
        "sensor pipeline finished"
    );
    Ok(())
}
