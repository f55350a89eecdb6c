/// Query construction: turns a variant plus an input text into the exact
/// Elasticsearch `_search` request body.
///
/// Highlighting always targets the analyzed text field the query runs
/// against (never the `.exact` keyword sub-field), otherwise the engine may
/// legally return no highlight fragments. Sources are restricted to the
/// source-identifier field so the full indexed text never travels back.

use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

use super::{MinimumShouldMatch, Operator, QueryFamily, QueryVariant, SearchFields};

const DEFAULT_SIZE: u32 = 50;
const EXACT_SIZE: u32 = 100;
const ENGINE_TIMEOUT: &str = "30s";
const PRE_TAG: &str = "<MATCH>";
const POST_TAG: &str = "</MATCH>";
const FUZZY_MAX_EXPANSIONS: u32 = 50;

/// Errors raised while building a query body.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query text is empty")]
    EmptyText,

    #[error("invalid tokenizer pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// What the builder decided for one (variant, text) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltQuery {
    /// Send this body to `<index>/_search`.
    Search(Value),
    /// Single-word-only family on multi-word text: no request is sent and the
    /// caller records `empty_result()` with zero query time.
    Skipped,
}

/// Response-shaped sentinel recorded for skipped queries.
pub fn empty_result() -> Value {
    json!({
        "hits": {"total": {"value": 0}, "max_score": null, "hits": []},
        "took": 0,
        "timed_out": false
    })
}

/// Builds request bodies for every query family.
pub struct QueryBuilder {
    fields: SearchFields,
    word_re: Regex,
}

impl QueryBuilder {
    pub fn new(fields: SearchFields) -> Result<Self, QueryError> {
        Ok(QueryBuilder {
            fields,
            word_re: Regex::new(r"\b\w+\b")?,
        })
    }

    /// True when the text tokenizes to exactly one word, punctuation ignored.
    pub fn is_single_word(&self, text: &str) -> bool {
        self.word_re.find_iter(text.trim()).count() == 1
    }

    /// Build the request body for `variant` against `text`.
    pub fn build(&self, variant: &QueryVariant, text: &str) -> Result<BuiltQuery, QueryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::EmptyText);
        }

        let body = match &variant.family {
            QueryFamily::Match { operator } => self.match_query(text, *operator),
            QueryFamily::MatchPhrase { slop } => self.match_phrase_query(text, *slop),
            QueryFamily::TermExact => {
                if !self.is_single_word(text) {
                    return Ok(BuiltQuery::Skipped);
                }
                self.term_query_exact(text)
            }
            QueryFamily::Wildcard => {
                if !self.is_single_word(text) {
                    return Ok(BuiltQuery::Skipped);
                }
                self.wildcard_query(text)
            }
            QueryFamily::Fuzzy => {
                if self.is_single_word(text) {
                    self.fuzzy_query(text)
                } else {
                    self.fuzzy_multi_match(text)
                }
            }
            QueryFamily::BoolMust {
                operator,
                max_words,
                minimum_should_match,
            } => self.bool_query(text, *operator, *max_words, minimum_should_match.as_ref()),
        };

        Ok(BuiltQuery::Search(body))
    }

    fn highlight(&self, fragment_size: u32, number_of_fragments: u32) -> Value {
        let text_field = self.fields.text.as_str();
        json!({
            "fields": {
                text_field: {
                    "fragment_size": fragment_size,
                    "number_of_fragments": number_of_fragments,
                    "pre_tags": [PRE_TAG],
                    "post_tags": [POST_TAG],
                    "require_field_match": true
                }
            }
        })
    }

    fn source_filter(&self) -> Value {
        json!([self.fields.source_id])
    }

    fn match_query(&self, text: &str, operator: Operator) -> Value {
        let mut clause = json!({ "query": text });
        if operator != Operator::Or {
            clause["operator"] = json!(operator.to_string());
        }
        let text_field = self.fields.text.as_str();
        json!({
            "query": { "match": { text_field: clause } },
            "size": DEFAULT_SIZE,
            "_source": self.source_filter(),
            "highlight": self.highlight(150, 3),
            "timeout": ENGINE_TIMEOUT
        })
    }

    fn match_phrase_query(&self, text: &str, slop: u32) -> Value {
        let mut clause = json!({ "query": text });
        if slop > 0 {
            clause["slop"] = json!(slop);
        }
        let text_field = self.fields.text.as_str();
        json!({
            "query": { "match_phrase": { text_field: clause } },
            "size": DEFAULT_SIZE,
            "_source": self.source_filter(),
            "highlight": self.highlight(150, 3),
            "timeout": ENGINE_TIMEOUT
        })
    }

    fn term_query_exact(&self, text: &str) -> Value {
        let exact_field = self.fields.exact.as_str();
        json!({
            "query": { "term": { exact_field: text.to_lowercase() } },
            "size": EXACT_SIZE,
            "_source": self.source_filter(),
            "highlight": self.highlight(200, 5)
        })
    }

    fn wildcard_query(&self, text: &str) -> Value {
        let exact_field = self.fields.exact.as_str();
        json!({
            "query": { "wildcard": { exact_field: format!("*{}*", text.to_lowercase()) } },
            "size": EXACT_SIZE,
            "_source": self.source_filter(),
            "highlight": self.highlight(200, 5)
        })
    }

    fn fuzzy_query(&self, text: &str) -> Value {
        let text_field = self.fields.text.as_str();
        json!({
            "query": {
                "fuzzy": { text_field: { "value": text, "fuzziness": "AUTO" } }
            },
            "size": DEFAULT_SIZE,
            "_source": self.source_filter(),
            "highlight": self.highlight(150, 3)
        })
    }

    fn fuzzy_multi_match(&self, text: &str) -> Value {
        let words: Vec<&str> = text.split_whitespace().collect();
        let word_count = words.len();
        json!({
            "query": {
                "multi_match": {
                    "query": words.join(" "),
                    "fields": [self.fields.text],
                    "fuzziness": "AUTO",
                    "operator": "or",
                    "max_expansions": FUZZY_MAX_EXPANSIONS,
                    "minimum_should_match": fuzzy_minimum_should_match(word_count)
                }
            },
            "size": DEFAULT_SIZE,
            "_source": self.source_filter(),
            "highlight": self.highlight(150, 3),
            "timeout": ENGINE_TIMEOUT
        })
    }

    fn bool_query(
        &self,
        text: &str,
        operator: Operator,
        max_words: usize,
        minimum_should_match: Option<&MinimumShouldMatch>,
    ) -> Value {
        let mut words: Vec<&str> = match operator {
            Operator::And => text.split_whitespace().take(max_words).collect(),
            Operator::Or => text.split_whitespace().collect(),
        };
        // At least two clauses: repeat a lone word.
        if words.len() < 2 {
            let word = words.first().copied().unwrap_or(text);
            words = vec![word, word];
        }

        let text_field = self.fields.text.as_str();
        let clauses: Vec<Value> = words
            .iter()
            .map(|word| json!({ "match": { text_field: word } }))
            .collect();

        let bool_query = match operator {
            Operator::And => json!({ "must": clauses }),
            Operator::Or => {
                let mut should = json!({ "should": clauses });
                if let Some(threshold) = minimum_should_match {
                    should["minimum_should_match"] = json!(threshold);
                }
                should
            }
        };

        json!({
            "query": { "bool": bool_query },
            "size": DEFAULT_SIZE,
            "_source": self.source_filter(),
            "highlight": self.highlight(150, 3)
        })
    }
}

/// Share of words a multi-word fuzzy query must match, tiered by length.
pub fn fuzzy_minimum_should_match(word_count: usize) -> &'static str {
    match word_count {
        0..=2 => "100%",
        3..=4 => "75%",
        _ => "60%",
    }
}
