/// Variant expansion: turns a compact BenchmarkConfig into the concrete,
/// named list of query variants for a run.
///
/// Pure function of the configuration. Declaration order is fixed:
/// match, match_phrase, term_exact, wildcard, fuzzy, bool_must.

use super::{BenchmarkConfig, Operator, QueryFamily, QueryVariant};

/// Expand the configuration into an ordered list of variants.
///
/// Repeated parameter values collapse to their first occurrence, so variant
/// names are unique within a run. A family with a single parameter value
/// equal to its default (operator `or`, slop `0`) gets an unsuffixed name;
/// otherwise each value gets its own suffixed variant.
pub fn expand(config: &BenchmarkConfig) -> Vec<QueryVariant> {
    let mut variants = Vec::new();

    if config.execute_match_query {
        let operators = distinct(&config.match_query_operator);
        let silent_default = operators.len() == 1 && operators[0] == Operator::Or;
        for operator in operators {
            let name = if silent_default {
                "match_query".to_string()
            } else {
                format!("match_query_{}", operator)
            };
            variants.push(QueryVariant {
                name,
                family: QueryFamily::Match { operator },
            });
        }
    }

    if config.execute_match_phrase_query {
        let slops = distinct(&config.match_phrase_slop);
        let silent_default = slops.len() == 1 && slops[0] == 0;
        for slop in slops {
            let name = if silent_default {
                "match_phrase_query".to_string()
            } else {
                format!("match_phrase_query_slop_{}", slop)
            };
            variants.push(QueryVariant {
                name,
                family: QueryFamily::MatchPhrase { slop },
            });
        }
    }

    if config.execute_term_query_exact {
        variants.push(QueryVariant {
            name: "term_query_exact".to_string(),
            family: QueryFamily::TermExact,
        });
    }

    if config.execute_wildcard_query {
        variants.push(QueryVariant {
            name: "wildcard_query".to_string(),
            family: QueryFamily::Wildcard,
        });
    }

    if config.execute_fuzzy_query {
        variants.push(QueryVariant {
            name: "fuzzy_query".to_string(),
            family: QueryFamily::Fuzzy,
        });
    }

    if config.execute_bool_must_query {
        variants.push(QueryVariant {
            name: "bool_must_query".to_string(),
            family: QueryFamily::BoolMust {
                operator: config.bool_must_operator,
                max_words: config.bool_must_max_words,
                minimum_should_match: config.bool_must_minimum_should_match.clone(),
            },
        });
    }

    variants
}

/// Values in first-seen order, without repeats.
fn distinct<T: Copy + PartialEq>(values: &[T]) -> Vec<T> {
    let mut unique = Vec::with_capacity(values.len());
    for &value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}
