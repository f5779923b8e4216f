// Provenance Benchmark Runner v0.2.0
// Seeded synthetic logs, every provenance method, conservation audit per run
//
// Usage:
//   cargo run --release --bin bench                                  # All methods
//   cargo run --release --bin bench -- --method sparse --method budget
//   cargo run --release --bin bench -- --nodes 5000 --interactions 1000000
//   cargo run --release --bin bench -- --budget 20 --reduced-size 10 --self-residual
//   RUST_LOG=debug cargo run --release --bin bench -- --method windowed

mod report;
mod traffic;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::{Parser, ValueEnum};
use flow_provenance::attribution::{run_dense, run_grouped, run_selected, run_sparse};
use flow_provenance::bounded::{run_budget, run_windowed, BudgetConfig, ResidualKey, WindowConfig};
use flow_provenance::{
    baseline, exact, total_quantity, ConservationLedger, ExactConfig, ExactPolicy, Interaction,
    NodeId, ProvenanceError,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use report::*;
use traffic::LogGenerator;

// ─── CLI ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    NoProvenance,
    OldestFirst,
    NewestFirst,
    Lifo,
    Fifo,
    LifoPaths,
    Dense,
    Sparse,
    Selected,
    Grouped,
    Windowed,
    Budget,
}

impl Method {
    /// Numeric code of the legacy command-line runner.
    fn code(self) -> u32 {
        match self {
            Self::NoProvenance => 0,
            Self::OldestFirst => 1,
            Self::NewestFirst => 2,
            Self::Lifo => 3,
            Self::Fifo => 4,
            Self::LifoPaths => 31,
            Self::Dense => 100,
            Self::Sparse => 101,
            Self::Selected => 110,
            Self::Grouped => 111,
            Self::Windowed => 120,
            Self::Budget => 121,
        }
    }

    fn name(self) -> String {
        self.to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_else(|| format!("{self:?}"))
    }
}

#[derive(Debug, Parser)]
#[command(name = "bench", version, about = "Benchmark provenance methods on a synthetic interaction log")]
struct Cli {
    /// Methods to run (repeatable); all methods when omitted
    #[arg(short, long, value_enum)]
    method: Vec<Method>,

    #[arg(long, default_value_t = 1_000)]
    nodes: usize,

    #[arg(long, default_value_t = 100_000)]
    interactions: usize,

    /// Expected interactions per timestamp
    #[arg(long, default_value_t = 8.0)]
    lambda: f64,

    #[arg(long, default_value_t = 0.01)]
    self_loop_rate: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Timed repetitions per method
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Window size for the windowed method
    #[arg(long, default_value_t = 1_000)]
    window: u64,

    /// Maximum vector entries for the budget method
    #[arg(long, default_value_t = 100)]
    budget: usize,

    /// Entries kept by a budget shrink
    #[arg(long, default_value_t = 50)]
    reduced_size: usize,

    /// Fold shrunk quantity into the node's own id instead of the sentinel
    #[arg(long)]
    self_residual: bool,

    /// Number of selected origins (the first node ids)
    #[arg(long, default_value_t = 10)]
    selected: usize,

    /// Number of groups (node id modulo groups)
    #[arg(long, default_value_t = 10)]
    groups: usize,

    /// JSON report path; defaults to benchmark-results/bench-<timestamp>.json
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum BenchError {
    #[error("invalid parameters: {0}")]
    Provenance(#[from] ProvenanceError),

    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("report write failed: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Method Dispatch ────────────────────────────────────────────────────────

/// Final state of one run, reduced to what the audit and report need.
struct MethodRun {
    total_buffered: f64,
    total_born: f64,
    /// `(node, buffered, attributed)` for attribution methods
    nodes: Vec<(NodeId, f64, f64)>,
    detail: serde_json::Value,
}

fn run_method(method: Method, log: &[Interaction], cli: &Cli) -> Result<MethodRun, BenchError> {
    let numnodes = cli.nodes;
    let exact_run = |config: ExactConfig| -> Result<MethodRun, BenchError> {
        let outcome = exact::run(log, numnodes, &config);
        Ok(MethodRun {
            total_buffered: outcome.total_buffered(),
            total_born: outcome.stats.total_born,
            nodes: Vec::new(),
            detail: serde_json::to_value(&outcome.stats)?,
        })
    };

    let run = match method {
        Method::NoProvenance => {
            let outcome = baseline::run(log, numnodes);
            let contributors = outcome.contributions.iter().filter(|&&c| c > 0.0).count();
            MethodRun {
                total_buffered: outcome.total_buffered(),
                total_born: outcome.total_contributed(),
                nodes: Vec::new(),
                detail: serde_json::json!({ "contributors": contributors }),
            }
        }
        Method::OldestFirst => exact_run(ExactConfig::new(ExactPolicy::OldestFirst))?,
        Method::NewestFirst => exact_run(ExactConfig::new(ExactPolicy::NewestFirst))?,
        Method::Lifo => exact_run(ExactConfig::new(ExactPolicy::Lifo))?,
        Method::Fifo => exact_run(ExactConfig::new(ExactPolicy::Fifo))?,
        Method::LifoPaths => exact_run(ExactConfig::new(ExactPolicy::Lifo).with_paths())?,
        Method::Dense | Method::Selected | Method::Grouped => {
            let outcome = match method {
                Method::Dense => run_dense(log, numnodes),
                Method::Selected => {
                    let selected: Vec<NodeId> = (0..cli.selected.min(numnodes) as NodeId).collect();
                    run_selected(log, numnodes, &selected)?
                }
                _ => {
                    let groups: Vec<usize> = (0..numnodes).map(|n| n % cli.groups.max(1)).collect();
                    run_grouped(log, numnodes, &groups, cli.groups)?
                }
            };
            MethodRun {
                total_buffered: outcome.total_buffered(),
                total_born: outcome.stats.total_born,
                nodes: outcome
                    .nodes
                    .iter()
                    .enumerate()
                    .map(|(n, node)| (n as NodeId, node.buffered, node.vector.total()))
                    .collect(),
                detail: serde_json::to_value(&outcome.stats)?,
            }
        }
        Method::Sparse => {
            let outcome = run_sparse(log, numnodes);
            MethodRun {
                total_buffered: outcome.total_buffered(),
                total_born: outcome.stats.total_born,
                nodes: sparse_triples(&outcome.nodes),
                detail: serde_json::to_value(&outcome.stats)?,
            }
        }
        Method::Windowed => {
            let outcome = run_windowed(log, numnodes, WindowConfig::new(cli.window))?;
            let mut nodes = sparse_triples(&outcome.even);
            nodes.extend(sparse_triples(&outcome.odd));
            MethodRun {
                total_buffered: outcome.total_buffered(),
                total_born: outcome.even_stats.total_born,
                nodes,
                detail: serde_json::json!({
                    "even_resets": outcome.even_resets,
                    "odd_resets": outcome.odd_resets,
                    "even": outcome.even_stats,
                    "odd": outcome.odd_stats,
                }),
            }
        }
        Method::Budget => {
            let residual = if cli.self_residual { ResidualKey::SelfNode } else { ResidualKey::Sentinel };
            let config = BudgetConfig::new(cli.budget, cli.reduced_size).with_residual(residual);
            let outcome = run_budget(log, numnodes, config)?;
            MethodRun {
                total_buffered: outcome.total_buffered(),
                total_born: outcome.stats.total_born,
                nodes: sparse_triples(&outcome.nodes),
                detail: serde_json::json!({
                    "stats": outcome.stats,
                    "nonempty_buffers": outcome.shrinks.nonempty_buffers,
                    "nodes_shrunk": outcome.shrinks.nodes_shrunk,
                    "mean_shrinks_nonempty": outcome.shrinks.mean_shrinks_nonempty,
                    "folded": outcome.shrinks.folded,
                }),
            }
        }
    };
    Ok(run)
}

fn sparse_triples(nodes: &[flow_provenance::attribution::SparseNode]) -> Vec<(NodeId, f64, f64)> {
    nodes
        .iter()
        .enumerate()
        .map(|(n, node)| (n as NodeId, node.buffered, node.vector.total()))
        .collect()
}

fn benchmark(method: Method, log: &[Interaction], cli: &Cli) -> Result<MethodReport, BenchError> {
    let runs = cli.runs.max(1);
    let mut samples = Vec::with_capacity(runs);
    let start = Instant::now();
    let mut run = run_method(method, log, cli)?;
    samples.push(start.elapsed().as_secs_f64() * 1_000.0);
    for _ in 1..runs {
        let start = Instant::now();
        run = run_method(method, log, cli)?;
        samples.push(start.elapsed().as_secs_f64() * 1_000.0);
    }

    let mut ledger = ConservationLedger::new();
    let audit = ledger
        .verify_total(run.total_born, run.total_buffered)
        .and_then(|()| ledger.verify_nodes(run.nodes.iter().copied()));
    if let Err(err) = &audit {
        warn!(method = %method.name(), %err, "conservation violated");
    }

    let elapsed_ms = Stats::from_samples(&samples);
    let throughput_per_sec = if elapsed_ms.mean > 0.0 {
        log.len() as f64 / (elapsed_ms.mean / 1_000.0)
    } else {
        0.0
    };
    Ok(MethodReport {
        method: method.name(),
        code: method.code(),
        elapsed_ms,
        throughput_per_sec,
        total_buffered: run.total_buffered,
        total_born: run.total_born,
        conservation_holds: audit.is_ok(),
        conservation_error: ledger.cumulative_error().to_string(),
        detail: run.detail,
    })
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("  bench: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool, BenchError> {
    let methods: Vec<Method> = if cli.method.is_empty() {
        Method::value_variants().to_vec()
    } else {
        cli.method.clone()
    };

    let mut generator = LogGenerator::new(
        ChaCha8Rng::seed_from_u64(cli.seed),
        cli.nodes,
        cli.lambda,
        cli.self_loop_rate,
    );
    let log = generator.generate(cli.interactions);
    let total_input = total_quantity(&log);
    info!(
        nodes = cli.nodes,
        interactions = log.len(),
        self_loops = generator.self_loops,
        total_input,
        "synthetic log ready"
    );

    println!("\n  Provenance Benchmark Runner v0.2.0");
    println!("  PRNG: ChaCha8Rng | Seed: {} | Nodes: {} | Interactions: {}", cli.seed, cli.nodes, log.len());
    println!("  {:<16} {:>5} {:>10} {:>14} {:>16} {:>6}",
        "Method", "Code", "Time(ms)", "Ix/sec", "Buffered", "Cons.");
    println!("  {}", "-".repeat(74));

    let mut reports = Vec::with_capacity(methods.len());
    for method in methods {
        let report = benchmark(method, &log, cli)?;
        println!("  {:<16} {:>5} {:>10.1} {:>14.0} {:>16.2} {:>6}",
            report.method,
            report.code,
            report.elapsed_ms.mean,
            report.throughput_per_sec,
            report.total_buffered,
            if report.conservation_holds { "OK" } else { "FAIL" },
        );
        reports.push(report);
    }

    let summary = Summary::from_methods(&reports);
    println!("  {}", "-".repeat(74));
    println!("  Total: {}  Conserved: {}  Violated: {}\n", summary.total, summary.conserved, summary.violated);

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let timestamp = format!("{}", ts);
    let all_conserved = summary.violated == 0;

    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        seed: cli.seed,
        nodes: cli.nodes,
        interactions: log.len(),
        self_loops: generator.self_loops,
        tier_breakdown: generator.tier_counts,
        total_input,
        runs_per_method: cli.runs.max(1),
        summary,
        methods: reports,
    };

    let path = match &cli.output {
        Some(path) => path.clone(),
        None => {
            let dir = std::path::Path::new("benchmark-results");
            std::fs::create_dir_all(dir)?;
            dir.join(format!("bench-{}.json", timestamp))
        }
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, &json)?;
    println!("  Results saved to: {}\n", path.display());

    Ok(all_conserved)
}
