/// Result aggregation: owns every ResultRecord of a run and derives the
/// per-variant summary statistics from them on demand.

use serde::{Deserialize, Serialize};

use super::{round_to, ResultRecord};

/// Summary statistics for one variant.
///
/// Latency and hit figures cover error-free records only; `errors` counts
/// the rest. A variant with no error-free records reports zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStat {
    pub variant_name: String,
    pub count: usize,
    pub avg_query_time_ms: f64,
    pub median_query_time_ms: f64,
    pub min_query_time_ms: f64,
    pub max_query_time_ms: f64,
    pub avg_engine_took_ms: f64,
    pub avg_total_hits: f64,
    pub sum_total_hits: u64,
    pub errors: usize,
}

impl SummaryStat {
    fn empty(variant_name: &str, errors: usize) -> Self {
        SummaryStat {
            variant_name: variant_name.to_string(),
            count: 0,
            avg_query_time_ms: 0.0,
            median_query_time_ms: 0.0,
            min_query_time_ms: 0.0,
            max_query_time_ms: 0.0,
            avg_engine_took_ms: 0.0,
            avg_total_hits: 0.0,
            sum_total_hits: 0,
            errors,
        }
    }
}

/// Append-only record store for one run.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    variant_names: Vec<String>,
    records: Vec<ResultRecord>,
}

impl ResultAggregator {
    /// `variant_names` fixes the summary order; variants that never
    /// produced a record still get a (zeroed) summary row.
    pub fn new(variant_names: Vec<String>) -> Self {
        ResultAggregator {
            variant_names,
            records: Vec::new(),
        }
    }

    /// Append a record, success or failure, preserving arrival order.
    pub fn record(&mut self, result: ResultRecord) {
        self.records.push(result);
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_error()).count()
    }

    /// Recompute per-variant statistics from the full record set, one row
    /// per distinct variant name.
    pub fn summarize(&self) -> Vec<SummaryStat> {
        let mut names: Vec<&str> = Vec::with_capacity(self.variant_names.len());
        let seen = self
            .variant_names
            .iter()
            .chain(self.records.iter().map(|r| &r.variant_name));
        for name in seen {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }

        names
            .into_iter()
            .map(|name| self.summarize_variant(name))
            .collect()
    }

    fn summarize_variant(&self, name: &str) -> SummaryStat {
        let (ok, failed): (Vec<&ResultRecord>, Vec<&ResultRecord>) = self
            .records
            .iter()
            .filter(|r| r.variant_name == name)
            .partition(|r| !r.is_error());

        if ok.is_empty() {
            return SummaryStat::empty(name, failed.len());
        }

        let mut query_times: Vec<f64> = ok.iter().map(|r| r.query_time_ms).collect();
        query_times.sort_by(|a, b| a.total_cmp(b));

        let took: Vec<f64> = ok.iter().map(|r| r.engine_took_ms as f64).collect();
        let hits: Vec<f64> = ok.iter().map(|r| r.total_hits as f64).collect();

        SummaryStat {
            variant_name: name.to_string(),
            count: ok.len(),
            avg_query_time_ms: round_to(mean(&query_times), 2),
            median_query_time_ms: round_to(median(&query_times), 2),
            min_query_time_ms: round_to(query_times[0], 2),
            max_query_time_ms: round_to(query_times[query_times.len() - 1], 2),
            avg_engine_took_ms: round_to(mean(&took), 2),
            avg_total_hits: round_to(mean(&hits), 2),
            sum_total_hits: ok.iter().map(|r| r.total_hits).sum(),
            errors: failed.len(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median of sorted values; mean of the middle pair for even lengths.
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
