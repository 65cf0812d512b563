//! DAMA Frame Allocator Application
//!
//! Runs allocation ticks against a frame configuration, using either a JSON
//! request file or seeded synthetic traffic.

use clap::Parser;
use dama_alloc::{NoopListener, TracingListener};
use dama_app::{DemoSequencer, SequencerConfig, TickReport, TrafficGenerator, TrafficProfile};
use dama_core::{AllocatorConfig, CapacityRequest};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the frame configuration (JSON)
    #[arg(short, long)]
    config: String,

    /// Path to a capacity request list (JSON); synthetic traffic is used when omitted
    #[arg(short, long)]
    requests: Option<String>,

    /// Number of synthetic terminals
    #[arg(long, default_value_t = 8)]
    terminals: u32,

    /// Seed for synthetic traffic
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 1)]
    ticks: u64,

    /// Target frame utilization in [0, 1]
    #[arg(long, default_value_t = 0.95)]
    target: f64,

    /// Fill idle capacity after all deficits are served
    #[arg(long)]
    idle_fill: bool,

    /// Maximum encoded size of one grant message
    #[arg(long, default_value_t = 512)]
    max_message_bytes: usize,

    /// Dump encoded grant messages as hex
    #[arg(long)]
    hex: bool,

    /// Print tick reports as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    println!("DAMA Frame Allocator");
    println!("====================");

    let config_text = tokio::fs::read_to_string(&args.config).await?;
    let config = AllocatorConfig::from_json_str(&config_text)?;
    println!(
        "Frame {}: {} symbols on {} carriers, {} waveforms",
        config.frame_id,
        config.geometry.total_symbols,
        config.geometry.carrier_count,
        config.waveforms.len()
    );

    let fixed: Option<Vec<CapacityRequest>> = match &args.requests {
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            Some(serde_json::from_str(&text)?)
        }
        None => None,
    };
    let mut traffic = TrafficGenerator::with_seed(
        TrafficProfile {
            terminals: args.terminals,
            ..Default::default()
        },
        args.seed,
    );

    let sequencer_config = SequencerConfig {
        target_utilization: args.target,
        allow_idle_fill: args.idle_fill,
        max_message_bytes: args.max_message_bytes,
    };
    let mut sequencer = if args.verbose {
        DemoSequencer::with_listener(config, sequencer_config, Box::new(TracingListener))?
    } else {
        DemoSequencer::with_listener(config, sequencer_config, Box::new(NoopListener))?
    };

    for _ in 0..args.ticks {
        let requests = match &fixed {
            Some(requests) => requests.clone(),
            None => traffic.generate_tick(),
        };
        let report = sequencer.run_tick(&requests)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report, args.hex);
        }
    }

    Ok(())
}

fn print_report(report: &TickReport, dump_hex: bool) {
    println!("\n--- Tick {} ---", report.tick);
    for admitted in &report.admitted {
        println!("  {} admitted ({})", admitted.terminal, admitted.waveform);
    }
    for terminal in &report.rejected {
        println!("  {} rejected: frame full", terminal);
    }
    for terminal in &report.unadmittable {
        println!("  {} skipped: guaranteed rate exceeds carrier", terminal);
    }
    for terminal in &report.no_waveform {
        println!("  {} skipped: no usable waveform", terminal);
    }

    let table = &report.table;
    println!(
        "  Placed {} / {} symbols ({} wasted, {} filler discarded), unmet {}",
        table.placed_symbols,
        report.load.total,
        table.wasted_symbols,
        table.discarded_filler_symbols,
        report.load.unmet()
    );
    for grant in &table.terminals {
        println!(
            "  {}: {} bytes {:?}{}",
            grant.terminal,
            grant.total_bytes(),
            grant.bytes_per_channel,
            if grant.control_slot { " +control" } else { "" }
        );
    }
    for message in &table.messages {
        println!(
            "  Message #{}: {} slots, {} bytes",
            message.sequence,
            message.slots.len(),
            message.encoded_len()
        );
        if dump_hex {
            println!("    {}", hex::encode(message.encode()));
        }
    }
}
