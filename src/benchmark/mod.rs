/// Benchmark module for query-variant evaluation against Elasticsearch.
///
/// Provides the declarative benchmark configuration, the concrete variant and
/// record types shared by the expander, builder, executor, analyzer and
/// aggregator, and the pipeline that ties them together.

pub mod aggregate;
pub mod analyze;
pub mod dataset;
pub mod executor;
pub mod query;
pub mod report;
pub mod runner;
pub mod variants;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::BenchError;

/// Boolean operator used by match and bool queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[serde(alias = "AND")]
    And,
    #[serde(alias = "OR")]
    Or,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::And => write!(f, "and"),
            Operator::Or => write!(f, "or"),
        }
    }
}

/// Minimum-should-match threshold: either an absolute clause count or an
/// engine-style expression such as `"75%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MinimumShouldMatch {
    Count(i64),
    Expression(String),
}

/// Which query families run, and with which parameters.
///
/// Key names match the JSON configuration mapping accepted on the command
/// line. Fields that take "one or many" values are normalized to a list at
/// deserialization time; `validate()` rejects empty lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchmarkConfig {
    pub execute_match_query: bool,
    pub execute_match_phrase_query: bool,
    pub execute_term_query_exact: bool,
    pub execute_wildcard_query: bool,
    pub execute_fuzzy_query: bool,
    pub execute_bool_must_query: bool,
    #[serde(deserialize_with = "one_or_many")]
    pub match_query_operator: Vec<Operator>,
    #[serde(deserialize_with = "one_or_many")]
    pub match_phrase_slop: Vec<u32>,
    pub bool_must_operator: Operator,
    pub bool_must_max_words: usize,
    pub bool_must_minimum_should_match: Option<MinimumShouldMatch>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            execute_match_query: true,
            execute_match_phrase_query: true,
            execute_term_query_exact: false,
            execute_wildcard_query: false,
            execute_fuzzy_query: true,
            execute_bool_must_query: false,
            match_query_operator: vec![Operator::Or],
            match_phrase_slop: vec![0],
            bool_must_operator: Operator::And,
            bool_must_max_words: 3,
            bool_must_minimum_should_match: None,
        }
    }
}

impl BenchmarkConfig {
    /// Check the invariants variant expansion relies on.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.match_query_operator.is_empty() {
            return Err(BenchError::config(
                "match_query_operator",
                "must contain at least one operator",
            ));
        }
        if self.match_phrase_slop.is_empty() {
            return Err(BenchError::config(
                "match_phrase_slop",
                "must contain at least one slop value",
            ));
        }
        if self.bool_must_max_words == 0 {
            return Err(BenchError::config(
                "bool_must_max_words",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Index field names the queries and the response digest refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFields {
    /// Analyzed full-text field; queries and highlighting run against it.
    pub text: String,
    /// Keyword sub-field used by term and wildcard queries.
    pub exact: String,
    /// Stored field reported as the hit's source identifier.
    pub source_id: String,
}

impl Default for SearchFields {
    fn default() -> Self {
        SearchFields {
            text: "text".to_string(),
            exact: "text.exact".to_string(),
            source_id: "url".to_string(),
        }
    }
}

/// A query family together with its fully-resolved parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFamily {
    Match { operator: Operator },
    MatchPhrase { slop: u32 },
    TermExact,
    Wildcard,
    Fuzzy,
    BoolMust {
        operator: Operator,
        max_words: usize,
        minimum_should_match: Option<MinimumShouldMatch>,
    },
}

impl QueryFamily {
    /// Short family label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            QueryFamily::Match { .. } => "match",
            QueryFamily::MatchPhrase { .. } => "match_phrase",
            QueryFamily::TermExact => "term_exact",
            QueryFamily::Wildcard => "wildcard",
            QueryFamily::Fuzzy => "fuzzy",
            QueryFamily::BoolMust { .. } => "bool_must",
        }
    }
}

/// One named, fully-parameterized query shape.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVariant {
    pub name: String,
    pub family: QueryFamily,
}

/// One row of benchmark input. `segment_text` is the query subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRow {
    #[serde(default)]
    pub row_id: String,
    #[serde(default)]
    pub segment_id: String,
    #[serde(default)]
    pub segment_text: String,
}

/// Outcome of one (row, variant) attempt. Created for failures too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub timestamp: DateTime<Utc>,
    pub row_id: String,
    pub segment_id: String,
    pub segment_text: String,
    pub variant_name: String,
    pub query_time_ms: f64,
    pub engine_took_ms: u64,
    pub total_hits: u64,
    pub max_score: f64,
    pub timed_out: bool,
    pub error: Option<String>,
    pub hit_digest_text: String,
}

impl ResultRecord {
    /// Error record with zeroed metrics, used when a variant could not run.
    pub fn failed(row: &InputRow, variant_name: &str, error: String) -> Self {
        ResultRecord {
            timestamp: Utc::now(),
            row_id: row.row_id.clone(),
            segment_id: row.segment_id.clone(),
            segment_text: row.segment_text.clone(),
            variant_name: variant_name.to_string(),
            query_time_ms: 0.0,
            engine_took_ms: 0,
            total_hits: 0,
            max_score: 0.0,
            timed_out: false,
            error: Some(error),
            hit_digest_text: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Round to a fixed number of decimals for reporting.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
