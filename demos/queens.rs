use clap::Parser;

use dd_rs::{Manager, ManagerConfig, Ref, ReorderMethod};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of queens.
    #[arg(value_name = "INT", default_value = "6")]
    n: usize,

    /// Automatic reordering method (e.g. `sift`, `symm-sift`, `window3`).
    #[clap(long, value_name = "METHOD")]
    reorder: Option<ReorderMethod>,

    /// Disable garbage collection.
    #[clap(long)]
    no_gc: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let n = args.n;
    let mut config = ManagerConfig::default().with_num_vars(n * n).with_gc(!args.no_gc);
    if let Some(method) = args.reorder {
        config = config.with_auto_reorder(method);
    }
    let mut mgr = Manager::with_config(config);
    println!("mgr = {:?}", mgr);

    // Variable `i * n + j` is true iff a queen stands on row `i`, column `j`.
    let queen = |i: usize, j: usize| (i * n + j) as u32;

    println!("Encoding n-queens problem with n = {}", n);
    let mut constraints: Vec<Ref> = vec![];

    // At least one queen per row.
    for i in 0..n {
        let cells: Vec<Ref> = (0..n).map(|j| mgr.var(queen(i, j))).collect();
        let row = mgr.or_all(cells)?;
        constraints.push(row);
    }

    // A queen attacks every other square on its row, column and diagonals.
    for i in 0..n {
        for j in 0..n {
            let mut free = vec![];
            for k in 0..n {
                for l in 0..n {
                    if (k, l) == (i, j) {
                        continue;
                    }
                    let same_diag = (i as i64 - k as i64).abs() == (j as i64 - l as i64).abs();
                    if k == i || l == j || same_diag {
                        free.push(mgr.nvar(queen(k, l)));
                    }
                }
            }
            let free = mgr.and_all(free)?;
            let c = mgr.implies(mgr.var(queen(i, j)), free)?;
            mgr.release(free);
            constraints.push(c);
        }
    }

    println!(
        "Total {} constraints of total size {}",
        constraints.len(),
        mgr.shared_size(&constraints)
    );

    println!("Merging constraints...");
    let res = mgr.and_all(constraints.iter().copied())?;
    for c in constraints {
        mgr.release(c);
    }
    println!("mgr = {:?}", mgr);
    println!("res of size {}", mgr.dag_size(res));

    match mgr.one_sat_board(res, n) {
        Some(board) => {
            println!("One solution:");
            for row in board {
                println!("  {}", row);
            }
        }
        None => println!("No solution"),
    }
    mgr.release(res);

    let stats = mgr.cache_stats();
    println!("cache lookups: {}", stats.lookups);
    println!("cache hits: {}", stats.hits);
    println!("reorderings: {}", mgr.reorderings());
    println!("garbage collections: {}", mgr.gc_count());
    println!("peak nodes: {}", mgr.peak_nodes());

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}

trait Board {
    fn one_sat_board(&self, f: Ref, n: usize) -> Option<Vec<String>>;
}

impl Board for Manager {
    /// Walks one path to the constant one, placing queens on positive tests.
    fn one_sat_board(&self, f: Ref, n: usize) -> Option<Vec<String>> {
        if f == self.zero() {
            return None;
        }
        let mut cells = vec![false; n * n];
        let mut current = f;
        while current != self.one() {
            let var = self.top_var(current)?;
            let high = self.high(current);
            if high != self.zero() {
                cells[var.index()] = true;
                current = high;
            } else {
                current = self.low(current);
            }
        }
        Some(
            cells
                .chunks(n)
                .map(|row| row.iter().map(|&q| if q { 'Q' } else { '.' }).collect())
                .collect(),
        )
    }
}
