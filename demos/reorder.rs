//! Runs the reordering heuristics on a function whose size depends heavily
//! on the order of its variables:
//!
//! `f = (x₀ ∧ xₙ) ∨ (x₁ ∧ xₙ₊₁) ∨ ... ∨ (xₙ₋₁ ∧ x₂ₙ₋₁)`
//!
//! The initial order separates every pair, so `f` is exponential; a good
//! heuristic brings each pair together.
//!
//! Run with:
//! ```bash
//! cargo run --example reorder -- --pairs 8 --method symm-sift
//! ```

use clap::Parser;
use log::info;

use dd_rs::{Manager, ManagerConfig, Ref, ReorderMethod};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of variable pairs.
    #[arg(long, value_name = "INT", default_value = "6")]
    pairs: usize,

    /// Method to run; all of them when omitted.
    #[arg(long, value_name = "METHOD")]
    method: Option<ReorderMethod>,

    /// Seed of the random source used by the stochastic methods.
    #[arg(long, value_name = "INT", default_value = "1")]
    seed: u64,
}

fn pairs_function(mgr: &mut Manager, pairs: usize) -> color_eyre::Result<Ref> {
    let mut f = mgr.zero();
    for i in 0..pairs as u32 {
        let term = mgr.and(mgr.var(i), mgr.var(i + pairs as u32))?;
        let g = mgr.or(f, term)?;
        mgr.release(term);
        mgr.release(f);
        f = g;
    }
    Ok(f)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let methods: Vec<ReorderMethod> = match args.method {
        Some(method) => vec![method],
        None => ReorderMethod::ALL.to_vec(),
    };

    println!("{:<22} {:>8} {:>8} {:>8} {:>10}", "method", "before", "after", "swaps", "time");
    for method in methods {
        let config = ManagerConfig::default()
            .with_num_vars(2 * args.pairs)
            .with_seed(args.seed);
        let mut mgr = Manager::with_config(config);
        let f = pairs_function(&mut mgr, args.pairs)?;

        let stats = mgr.reduce_heap(method, 0)?;
        println!(
            "{:<22} {:>8} {:>8} {:>8} {:>8.3} s",
            method.name(),
            stats.initial_size,
            stats.final_size,
            stats.swaps,
            stats.elapsed.as_secs_f64()
        );

        let order: Vec<String> = mgr.order().iter().map(|v| v.to_string()).collect();
        info!("{}: order [{}]", method, order.join(", "));

        let report = mgr.debug_check();
        if !report.is_ok() {
            color_eyre::eyre::bail!("inconsistent manager after {}:\n{}", method, report);
        }
        mgr.release(f);
    }

    Ok(())
}
