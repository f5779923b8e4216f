// Benchmark Report Types
// Structured JSON output, one entry per provenance method

use serde::Serialize;

// ─── Statistics (per-method timing aggregation) ─────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        Self {
            mean,
            std_dev: variance.sqrt(),
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Per-Method Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MethodReport {
    pub method: String,
    /// Numeric method code used by earlier tooling
    pub code: u32,
    pub elapsed_ms: Stats,
    pub throughput_per_sec: f64,
    pub total_buffered: f64,
    pub total_born: f64,
    pub conservation_holds: bool,
    pub conservation_error: String,
    /// Method-specific counters (serialized stats of the final run)
    pub detail: serde_json::Value,
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub seed: u64,
    pub nodes: usize,
    pub interactions: usize,
    pub self_loops: u64,
    pub tier_breakdown: [u64; 4],
    pub total_input: f64,
    pub runs_per_method: usize,
    pub summary: Summary,
    pub methods: Vec<MethodReport>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total: usize,
    pub conserved: usize,
    pub violated: usize,
}

impl Summary {
    pub fn from_methods(methods: &[MethodReport]) -> Self {
        let conserved = methods.iter().filter(|m| m.conservation_holds).count();
        Self {
            total: methods.len(),
            conserved,
            violated: methods.len() - conserved,
        }
    }
}
