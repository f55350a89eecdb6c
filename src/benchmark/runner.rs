/// Benchmark pipeline orchestrator.
///
/// For each input row: skip empty text, then run every configured variant
/// through build -> execute -> analyze and record the outcome. Variants and
/// rows are processed strictly in order, one request in flight at a time,
/// so records come out grouped by row then by variant declaration order.
/// No variant failure stops the run.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Method;

use crate::errors::BenchError;

use super::aggregate::ResultAggregator;
use super::analyze::ResponseAnalyzer;
use super::executor::{Execution, RawResponse, RequestExecutor};
use super::query::{empty_result, BuiltQuery, QueryBuilder};
use super::variants::expand;
use super::{round_to, BenchmarkConfig, InputRow, QueryVariant, ResultRecord, SearchFields};

/// Counters for one `run` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows_processed: usize,
    pub rows_skipped: usize,
    pub records: usize,
    /// True when the stop flag ended the run early
    pub interrupted: bool,
}

/// Runs the configured variants for each input row.
pub struct Pipeline {
    variants: Vec<QueryVariant>,
    builder: QueryBuilder,
    executor: RequestExecutor,
    analyzer: ResponseAnalyzer,
    search_endpoint: String,
}

impl Pipeline {
    /// Validate the configuration and expand it into variants once.
    pub fn new(
        config: &BenchmarkConfig,
        fields: SearchFields,
        index_name: &str,
        executor: RequestExecutor,
    ) -> Result<Self, BenchError> {
        config.validate()?;
        if index_name.trim().is_empty() {
            return Err(BenchError::config("index_name", "must not be empty"));
        }

        let variants = expand(config);
        tracing::info!(
            variants = ?variants.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            "Query variants expanded"
        );

        Ok(Pipeline {
            variants,
            builder: QueryBuilder::new(fields.clone())?,
            executor,
            analyzer: ResponseAnalyzer::new(fields),
            search_endpoint: format!("{}/_search", index_name.trim().trim_matches('/')),
        })
    }

    pub fn variants(&self) -> &[QueryVariant] {
        &self.variants
    }

    /// An empty aggregator whose summary order follows this pipeline's variants.
    pub fn new_aggregator(&self) -> ResultAggregator {
        ResultAggregator::new(self.variants.iter().map(|v| v.name.clone()).collect())
    }

    /// Process all rows in order. Checks `stop` between variants; when set,
    /// returns early with everything recorded so far left in `aggregator`.
    pub async fn run(
        &self,
        rows: &[InputRow],
        aggregator: &mut ResultAggregator,
        stop: &AtomicBool,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        let pb = ProgressBar::new(rows.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{pos}/{len}] {msg} [{elapsed_precise} / {eta_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        'rows: for (idx, row) in rows.iter().enumerate() {
            pb.inc(1);

            if row.segment_text.trim().is_empty() {
                tracing::debug!(row = idx + 1, row_id = %row.row_id, "Skipping empty segment");
                summary.rows_skipped += 1;
                continue;
            }

            pb.set_message(row.segment_id.clone());
            tracing::debug!(
                row = idx + 1,
                total = rows.len(),
                segment_id = %row.segment_id,
                text = %preview(&row.segment_text, 50),
                "Processing segment"
            );

            for variant in &self.variants {
                if stop.load(Ordering::SeqCst) {
                    summary.interrupted = true;
                    break 'rows;
                }
                aggregator.record(self.run_variant(row, variant).await);
                summary.records += 1;
            }
            summary.rows_processed += 1;
        }

        if summary.interrupted {
            pb.abandon_with_message("interrupted");
            tracing::warn!(records = summary.records, "Run interrupted, keeping partial results");
        } else {
            pb.finish_with_message("done");
        }

        summary
    }

    /// Run every variant for one row, returning records in variant order.
    pub async fn run_row(&self, row: &InputRow) -> Vec<ResultRecord> {
        let mut records = Vec::with_capacity(self.variants.len());
        for variant in &self.variants {
            records.push(self.run_variant(row, variant).await);
        }
        records
    }

    /// Build, execute and analyze a single variant. Always yields a record.
    pub async fn run_variant(&self, row: &InputRow, variant: &QueryVariant) -> ResultRecord {
        let text = row.segment_text.trim();

        let execution = match self.builder.build(variant, text) {
            Ok(BuiltQuery::Search(body)) => {
                self.executor
                    .execute(Method::POST, &self.search_endpoint, Some(&body))
                    .await
            }
            Ok(BuiltQuery::Skipped) => {
                tracing::debug!(
                    variant = %variant.name,
                    segment_id = %row.segment_id,
                    "Multi-word text, single-word query skipped"
                );
                Execution {
                    response: RawResponse::Body(empty_result()),
                    elapsed_ms: 0.0,
                }
            }
            Err(e) => {
                tracing::warn!(variant = %variant.name, error = %e, "Failed to build query");
                return ResultRecord::failed(row, &variant.name, e.to_string());
            }
        };

        let stats = self.analyzer.analyze(&execution.response);
        if let Some(error) = &stats.error {
            tracing::warn!(
                variant = %variant.name,
                family = variant.family.label(),
                row_id = %row.row_id,
                error = %error,
                "Query failed"
            );
        }

        ResultRecord {
            timestamp: Utc::now(),
            row_id: row.row_id.clone(),
            segment_id: row.segment_id.clone(),
            segment_text: text.to_string(),
            variant_name: variant.name.clone(),
            query_time_ms: round_to(execution.elapsed_ms, 2),
            engine_took_ms: stats.took_ms,
            total_hits: stats.total_hits,
            max_score: stats.max_score,
            timed_out: stats.timed_out,
            error: stats.error,
            hit_digest_text: stats.digest.to_string(),
        }
    }

    /// Probe the engine with `GET /`. An error response is fatal for a run.
    pub async fn check_connection(&self) -> Result<String, BenchError> {
        let execution = self.executor.probe().await;
        match execution.response {
            RawResponse::Body(banner) => {
                let description = banner
                    .get("tagline")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| {
                        banner
                            .pointer("/version/number")
                            .and_then(|v| v.as_str())
                            .map(|n| format!("version {}", n))
                    })
                    .unwrap_or_else(|| "Unknown version".to_string());
                tracing::info!(
                    engine = %description,
                    elapsed_ms = execution.elapsed_ms,
                    "Connected to search engine"
                );
                Ok(description)
            }
            RawResponse::Error(message) => Err(BenchError::Connection(message)),
        }
    }
}

fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::executor::{RetryPolicy, SearchTransport, TransportError};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// Answers every search with the same body and remembers request bodies.
    struct FixedTransport {
        response: Result<Value, ()>,
        requests: Mutex<Vec<(String, Option<Value>)>>,
    }

    impl FixedTransport {
        fn new(response: Result<Value, ()>) -> Arc<Self> {
            Arc::new(FixedTransport {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SearchTransport for FixedTransport {
        async fn send(
            &self,
            _method: Method,
            endpoint: &str,
            body: Option<&Value>,
        ) -> Result<Value, TransportError> {
            self.requests
                .lock()
                .unwrap()
                .push((endpoint.to_string(), body.cloned()));
            self.response
                .clone()
                .map_err(|_| TransportError::Connection("connection refused".into()))
        }
    }

    fn pipeline(config: &BenchmarkConfig, transport: Arc<FixedTransport>) -> Pipeline {
        let executor = RequestExecutor::new(transport, RetryPolicy::default());
        Pipeline::new(config, SearchFields::default(), "docs", executor).unwrap()
    }

    fn row(id: &str, text: &str) -> InputRow {
        InputRow {
            row_id: id.into(),
            segment_id: format!("seg-{}", id),
            segment_text: text.into(),
        }
    }

    fn hits_body() -> Value {
        json!({
            "took": 4,
            "timed_out": false,
            "hits": {"total": {"value": 2}, "max_score": 1.5, "hits": [
                {"_score": 1.5, "_source": {"url": "u1"}, "highlight": {"text": ["<MATCH>hello</MATCH>"]}}
            ]}
        })
    }

    #[tokio::test]
    async fn test_run_records_every_variant_in_order() {
        let transport = FixedTransport::new(Ok(hits_body()));
        let p = pipeline(&BenchmarkConfig::default(), transport.clone());
        let mut agg = p.new_aggregator();
        let stop = AtomicBool::new(false);

        let summary = p
            .run(&[row("1", "hello world"), row("2", "  "), row("3", "grace")], &mut agg, &stop)
            .await;

        assert_eq!(summary.rows_processed, 2);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.records, 6);
        assert!(!summary.interrupted);

        let names: Vec<&str> = agg.records().iter().map(|r| r.variant_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "match_query", "match_phrase_query", "fuzzy_query",
                "match_query", "match_phrase_query", "fuzzy_query"
            ]
        );
        assert_eq!(agg.records()[3].row_id, "3");
        assert!(agg.records().iter().all(|r| r.total_hits == 2 && r.engine_took_ms == 4));

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 6);
        assert!(requests.iter().all(|(endpoint, _)| endpoint == "docs/_search"));
    }

    #[tokio::test]
    async fn test_transport_failure_recorded_not_fatal() {
        let transport = FixedTransport::new(Err(()));
        let p = pipeline(&BenchmarkConfig::default(), transport);
        let mut agg = p.new_aggregator();

        p.run(&[row("1", "a b"), row("2", "c")], &mut agg, &AtomicBool::new(false))
            .await;

        assert_eq!(agg.len(), 6);
        assert_eq!(agg.error_count(), 6);
        let first = &agg.records()[0];
        assert!(first.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(first.total_hits, 0);
        assert!(first.hit_digest_text.is_empty());
    }

    #[tokio::test]
    async fn test_stop_flag_halts_between_variants() {
        let transport = FixedTransport::new(Ok(hits_body()));
        let p = pipeline(&BenchmarkConfig::default(), transport);
        let mut agg = p.new_aggregator();

        let summary = p
            .run(&[row("1", "hello")], &mut agg, &AtomicBool::new(true))
            .await;

        assert!(summary.interrupted);
        assert!(agg.is_empty());
    }

    #[tokio::test]
    async fn test_skipped_single_word_variant() {
        let transport = FixedTransport::new(Ok(hits_body()));
        let config = BenchmarkConfig {
            execute_match_query: false,
            execute_match_phrase_query: false,
            execute_fuzzy_query: false,
            execute_term_query_exact: true,
            ..BenchmarkConfig::default()
        };
        let p = pipeline(&config, transport.clone());

        let records = p.run_row(&row("1", "grace hopper")).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].variant_name, "term_query_exact");
        assert_eq!(records[0].query_time_ms, 0.0);
        assert_eq!(records[0].total_hits, 0);
        assert_eq!(records[0].error, None);
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_error_becomes_error_record() {
        let transport = FixedTransport::new(Ok(hits_body()));
        let p = pipeline(&BenchmarkConfig::default(), transport);
        let variant = p.variants()[0].clone();

        let record = p.run_variant(&row("1", "   "), &variant).await;
        assert_eq!(record.error.as_deref(), Some("query text is empty"));
        assert_eq!(record.query_time_ms, 0.0);
    }

    #[tokio::test]
    async fn test_check_connection() {
        let transport = FixedTransport::new(Ok(json!({"tagline": "You Know, for Search"})));
        let p = pipeline(&BenchmarkConfig::default(), transport.clone());
        assert_eq!(p.check_connection().await.unwrap(), "You Know, for Search");
        assert_eq!(transport.requests.lock().unwrap()[0].0, "");

        let p = pipeline(&BenchmarkConfig::default(), FixedTransport::new(Err(())));
        assert!(matches!(p.check_connection().await, Err(BenchError::Connection(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BenchmarkConfig {
            match_phrase_slop: vec![],
            ..BenchmarkConfig::default()
        };
        let executor = RequestExecutor::new(FixedTransport::new(Ok(json!({}))), RetryPolicy::default());
        let result = Pipeline::new(&config, SearchFields::default(), "docs", executor);
        assert!(matches!(result, Err(BenchError::Config { .. })));
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
