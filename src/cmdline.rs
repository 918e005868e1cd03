use crate::bench::{bench, init};
use crate::stores::registered;
use crate::Result;
use clap::ValueHint::FilePath;
use clap::{Args, Parser, Subcommand};
use log::{debug, error, info};
use std::fs::read_to_string;

#[derive(Args, Debug)]
struct BenchArgs {
    #[arg(short = 's')]
    #[arg(value_hint = FilePath)]
    #[arg(help = "Path to the store's TOML config file")]
    store_config: String,

    #[arg(short = 'b')]
    #[arg(value_hint = FilePath)]
    #[arg(help = "Path to the benchmark's TOML config file")]
    benchmark_config: String,
}

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run a benchmark")]
    Bench(BenchArgs),
    #[command(about = "List all registered stores")]
    List,
}

fn read(path: &str) -> String {
    match read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            error!("Cannot read {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn bench_cli(args: &BenchArgs) -> Result<()> {
    let opt = read(&args.store_config) + "\n" + &read(&args.benchmark_config);
    let (store, workload, phases) = init(&opt)?;

    let interrupt = workload.interrupt().clone();
    if let Err(e) = ctrlc::set_handler(move || {
        interrupt.raise();
        debug!("SIGINT received, stopping the current phase");
    }) {
        error!("Error setting Ctrl-C handler: {}", e);
    }

    let results = bench(&*store, &workload, &phases);
    info!(
        "Benchmark finished, {} phases, {} operations",
        results.len(),
        results.iter().map(|r| r.total).sum::<u64>()
    );
    Ok(())
}

fn list_cli() {
    for name in registered() {
        println!("Registered store: {}", name);
    }
}

/// The default command line interface.
///
/// This function is public and can be called in a different crate. For example, one can integrate
/// their own transactional stores by registering the constructor function. Then, adding this
/// function will produce a benchmark binary the has the same usage as the one in this crate.
///
/// ## Usage
///
/// To get the usage of the command line interface, users can run:
///
/// ```bash
/// txbench -h
/// ```
///
/// The interface supports two modes, `bench` and `list`.
///
/// ### Benchmark Mode
///
/// Usage:
///
/// ```bash
/// txbench bench -s <STORE_CONFIG> -b <BENCH_CONFIG>
/// ```
///
/// Where `STORE_CONFIG` and `BENCH_CONFIG` are the paths to the store and benchmark
/// configuration files, respectively. The two files are concatenated before parsing. For their
/// format, you can refer to the documentations of [`crate::stores`] and [`crate::bench`].
///
/// Pressing Ctrl-C stops the running phase after the operations in flight, and every later phase
/// right away. Results of the interrupted phases are still printed.
///
/// ### List mode
///
/// Usage:
/// ``` bash
/// txbench list
/// ```
///
/// This command lists all registered stores' names.

pub fn cmdline() {
    env_logger::init();
    let cli = Cli::parse();
    debug!("Starting txbench with args: {:?}", cli);
    match cli.command {
        Commands::Bench(args) => {
            if let Err(e) = bench_cli(&args) {
                error!("{}", e);
                let mut source = std::error::Error::source(&e);
                while let Some(s) = source {
                    error!("caused by: {}", s);
                    source = s.source();
                }
                std::process::exit(1);
            }
        }
        Commands::List => list_cli(),
    }
}
