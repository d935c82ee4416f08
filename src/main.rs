use std::convert::TryFrom;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use modres::resolution::Resolution;
use modres::save::SaveDirectory;
use modres::utils::{Config, Heuristics, Interrupt};
use modres::Error;

const BOLD_ANSI_CODE: &str = "\x1b[1m";
const RESET_ANSI_CODE: &str = "\x1b[0m";

/// Computes a minimal free resolution of the trivial module over a modular group algebra.
#[derive(Parser, Debug)]
#[command(name = "modres")]
#[command(version)]
struct Args {
    /// The algebra: C<n>, V<k>, V<k>_<p>, Free<a>_<l> or the name of a JSON file, optionally
    /// followed by @R, @L or @J to choose the monomial ordering
    #[arg(value_name = "ALGEBRA")]
    algebra: String,

    /// The largest homological degree to compute
    #[arg(short = 'n', long, default_value = "10")]
    max_degree: usize,

    /// Unfruitful steps after which a kernel system pauses
    #[arg(long)]
    max_unfruitful: usize,

    /// Unfruitful image steps after which kernel work is forced
    #[arg(long)]
    overshoot: usize,

    /// Directory to load previous results from and save new results to
    #[arg(short, long, value_name = "DIR")]
    save_dir: Option<PathBuf>,

    /// Write new results here instead of the save directory
    #[arg(long, value_name = "DIR", requires = "save_dir")]
    write_dir: Option<PathBuf>,

    /// Move the rows of swept degrees out of memory
    #[arg(long)]
    spill: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::try_from(args.algebra.as_str())
        .with_context(|| format!("Failed to parse algebra {}", args.algebra))?;
    let algebra = Arc::new(config.build().context("Failed to construct algebra")?);
    println!("{algebra}");

    let heuristics = Heuristics {
        max_unfruitful: args.max_unfruitful,
        overshoot: args.overshoot,
    };
    let mut res = Resolution::trivial_module(Arc::clone(&algebra), heuristics);
    res.spill = args.spill;

    let save_dir = match (args.save_dir, args.write_dir) {
        (Some(read), Some(write)) => SaveDirectory::Split { read, write },
        (save_dir, _) => SaveDirectory::from(save_dir),
    };
    res.set_save_dir(save_dir)
        .context("Failed to create save directory")?;

    let interrupt = Interrupt::new();
    {
        let interrupt = interrupt.clone();
        ctrlc::set_handler(move || interrupt.trigger())
            .context("Failed to set ctrl-c handler")?;
    }
    res.set_interrupt(interrupt);

    match res.compute_through(args.max_degree) {
        Ok(()) => (),
        Err(Error::Interrupted { degree }) => {
            eprintln!(
                "Interrupted at degree {degree}; computed through homological degree {}",
                res.max_degree()
            );
        }
        Err(e) => return Err(e).context("Failed to compute resolution"),
    }

    println!();
    for (n, rank) in res.ranks().iter().enumerate() {
        println!("{BOLD_ANSI_CODE}P_{n}{RESET_ANSI_CODE} : rank {rank}");
    }
    Ok(())
}
