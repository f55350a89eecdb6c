/// Response analysis: pulls relevance signals out of a raw `_search` response.
///
/// Produces hit count, top score, engine-reported latency, the timeout flag,
/// and a short human-readable digest of the top hits.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::executor::RawResponse;
use super::SearchFields;

/// Hits included in a digest.
pub const DIGEST_HITS: usize = 5;
/// Characters of raw source text kept when no highlight is available.
pub const SOURCE_SNIPPET_CHARS: usize = 300;
const MISSING_SOURCE_ID: &str = "No URL available";
const FRAGMENT_SEPARATOR: &str = " | ";

// --- Response shape (only the parts we read) ---

#[derive(Deserialize, Default)]
#[serde(default)]
struct SearchResponse {
    hits: HitsEnvelope,
    took: Option<u64>,
    timed_out: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct HitsEnvelope {
    total: Option<TotalHits>,
    max_score: Option<f64>,
    hits: Vec<SearchHit>,
}

/// `hits.total` is a bare integer on older engines, `{value, relation}` on newer.
#[derive(Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            TotalHits::Count(n) => *n,
            TotalHits::Object { value } => *value,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SearchHit {
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Map<String, Value>,
    highlight: HashMap<String, Vec<String>>,
}

// --- Digest ---

/// Where a digest snippet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetOrigin {
    Highlighted,
    SourceText,
}

impl fmt::Display for SnippetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnippetOrigin::Highlighted => write!(f, "HIGHLIGHTED"),
            SnippetOrigin::SourceText => write!(f, "SOURCE_TEXT"),
        }
    }
}

/// One line of the digest.
#[derive(Debug, Clone, PartialEq)]
pub struct HitSnippet {
    /// 1-based position in the result list
    pub rank: usize,
    pub score: f64,
    pub source_identifier: String,
    pub snippet_text: String,
    pub origin: SnippetOrigin,
}

impl fmt::Display for HitSnippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hit {} (Score: {:.3}, URL: {}, Type: {}): {}",
            self.rank, self.score, self.source_identifier, self.origin, self.snippet_text
        )
    }
}

/// Top hits of one response, at most `DIGEST_HITS` entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitDigest {
    pub entries: Vec<HitSnippet>,
}

impl HitDigest {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for HitDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Statistics extracted from one response.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedStats {
    pub total_hits: u64,
    pub max_score: f64,
    pub took_ms: u64,
    pub timed_out: bool,
    pub error: Option<String>,
    pub digest: HitDigest,
}

impl AnalyzedStats {
    fn failed(error: String) -> Self {
        AnalyzedStats {
            total_hits: 0,
            max_score: 0.0,
            took_ms: 0,
            timed_out: false,
            error: Some(error),
            digest: HitDigest::default(),
        }
    }
}

/// Extracts `AnalyzedStats` using the configured field names.
pub struct ResponseAnalyzer {
    fields: SearchFields,
}

impl ResponseAnalyzer {
    pub fn new(fields: SearchFields) -> Self {
        ResponseAnalyzer { fields }
    }

    pub fn analyze(&self, response: &RawResponse) -> AnalyzedStats {
        let body = match response {
            RawResponse::Error(message) => return AnalyzedStats::failed(message.clone()),
            RawResponse::Body(body) => body,
        };

        if let Some(error) = body.get("error") {
            return AnalyzedStats::failed(engine_error_message(error));
        }

        let parsed = match SearchResponse::deserialize(body) {
            Ok(parsed) => parsed,
            Err(e) => return AnalyzedStats::failed(format!("malformed response: {}", e)),
        };

        AnalyzedStats {
            total_hits: parsed.hits.total.as_ref().map(TotalHits::value).unwrap_or(0),
            max_score: parsed.hits.max_score.unwrap_or(0.0),
            took_ms: parsed.took.unwrap_or(0),
            timed_out: parsed.timed_out.unwrap_or(false),
            error: None,
            digest: self.digest(&parsed.hits.hits),
        }
    }

    fn digest(&self, hits: &[SearchHit]) -> HitDigest {
        let entries = hits
            .iter()
            .take(DIGEST_HITS)
            .enumerate()
            .map(|(i, hit)| {
                let (raw_snippet, origin) = match self.highlight_fragments(hit) {
                    Some(fragments) => (fragments.join(FRAGMENT_SEPARATOR), SnippetOrigin::Highlighted),
                    None => (self.source_snippet(hit), SnippetOrigin::SourceText),
                };
                HitSnippet {
                    rank: i + 1,
                    score: hit.score.unwrap_or(0.0),
                    source_identifier: self.source_identifier(hit),
                    snippet_text: collapse_whitespace(&raw_snippet),
                    origin,
                }
            })
            .collect();
        HitDigest { entries }
    }

    fn highlight_fragments<'a>(&self, hit: &'a SearchHit) -> Option<&'a Vec<String>> {
        hit.highlight
            .get(&self.fields.text)
            .filter(|fragments| !fragments.is_empty())
    }

    fn source_snippet(&self, hit: &SearchHit) -> String {
        let text = hit
            .source
            .get(&self.fields.text)
            .and_then(Value::as_str)
            .unwrap_or("");
        truncate_chars(text, SOURCE_SNIPPET_CHARS)
    }

    fn source_identifier(&self, hit: &SearchHit) -> String {
        match hit.source.get(&self.fields.source_id) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Null) | None => MISSING_SOURCE_ID.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Error text from an engine error body (`{"error": {"reason": ...}}` or a string).
fn engine_error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        other => other
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

/// First `limit` characters, with `...` appended when something was cut.
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
