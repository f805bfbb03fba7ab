//! Timing report lines and the strategy comparison.
//!
//! A run emits exactly one line, `"<label>: <seconds with 6 decimals> s"`,
//! from rank 0. [`TimingReport::parse_line`] reads the same format back, so
//! the output of separate runs can be compared.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{DiffusionConfig, ExchangeStrategy};
use crate::diffusion_error::DiffusionError;

static REPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<label>.+?):\s+(?P<secs>[0-9]+(?:\.[0-9]+)?)\s+s$")
        .expect("report line regex is valid")
});

/// Label printed in front of the elapsed time.
pub fn strategy_label(strategy: ExchangeStrategy, config: &DiffusionConfig) -> String {
    match strategy {
        ExchangeStrategy::Blocking => format!(
            "Versao 1 (Bloqueante - Send/Recv) | N={}, STEPS={}",
            config.global_size, config.steps
        ),
        ExchangeStrategy::NonBlockingWait => "Versao 2 (Nao Bloqueante - Wait)".to_string(),
        ExchangeStrategy::Overlap => "Versao 3 (Sobreposicao - Test)".to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingReport {
    pub label: String,
    pub seconds: f64,
}

impl TimingReport {
    pub fn new(label: impl Into<String>, seconds: f64) -> Self {
        Self {
            label: label.into(),
            seconds,
        }
    }

    /// Parse `"<label>: <seconds> s"`. Surrounding whitespace is ignored.
    pub fn parse_line(line: &str) -> Result<Self, DiffusionError> {
        let line = line.trim();
        let caps = REPORT_LINE
            .captures(line)
            .ok_or_else(|| DiffusionError::MalformedReport(line.to_string()))?;
        let seconds = caps["secs"]
            .parse::<f64>()
            .map_err(|_| DiffusionError::MalformedReport(line.to_string()))?;
        Ok(Self::new(&caps["label"], seconds))
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.6} s", self.label, self.seconds)
    }
}

impl FromStr for TimingReport {
    type Err = DiffusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonEntry {
    pub strategy: ExchangeStrategy,
    pub report: TimingReport,
    /// Baseline time divided by this entry's time.
    pub speedup: f64,
}

/// Timings of several strategies relative to the blocking baseline (or the
/// first entry when no blocking run is present).
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    entries: Vec<ComparisonEntry>,
}

impl Comparison {
    pub fn from_runs(runs: Vec<(ExchangeStrategy, TimingReport)>) -> Self {
        let baseline = runs
            .iter()
            .find(|(s, _)| *s == ExchangeStrategy::Blocking)
            .or_else(|| runs.first())
            .map(|(_, r)| r.seconds)
            .unwrap_or(0.0);
        let entries = runs
            .into_iter()
            .map(|(strategy, report)| {
                let speedup = if report.seconds > 0.0 {
                    baseline / report.seconds
                } else {
                    f64::INFINITY
                };
                ComparisonEntry {
                    strategy,
                    report,
                    speedup,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ComparisonEntry] {
        &self.entries
    }

    pub fn fastest(&self) -> Option<&ComparisonEntry> {
        self.entries
            .iter()
            .min_by(|a, b| a.report.seconds.total_cmp(&b.report.seconds))
    }

    pub fn overlap_is_fastest(&self) -> bool {
        self.fastest()
            .is_some_and(|e| e.strategy == ExchangeStrategy::Overlap)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<18} {:>12} {:>9}", "strategy", "time (s)", "speedup")?;
        for e in &self.entries {
            let name = match e.strategy {
                ExchangeStrategy::Blocking => "blocking",
                ExchangeStrategy::NonBlockingWait => "non-blocking-wait",
                ExchangeStrategy::Overlap => "overlap",
            };
            writeln!(f, "{:<18} {:>12.6} {:>8.2}x", name, e.report.seconds, e.speedup)?;
        }
        if self.overlap_is_fastest() {
            write!(f, "overlap was the fastest strategy")
        } else {
            write!(f, "overlap was NOT the fastest strategy")
        }
    }
}
