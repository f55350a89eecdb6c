/// Benchmark reporting: detailed per-(row, variant) CSV, per-variant summary
/// CSV, and a console summary.

use std::path::Path;

use crate::errors::BenchError;

use super::aggregate::SummaryStat;
use super::ResultRecord;

/// Column order of the detailed report.
pub const DETAILED_COLUMNS: [&str; 12] = [
    "timestamp",
    "row_id",
    "segment_id",
    "segment_text",
    "variant_name",
    "query_time_ms",
    "engine_took_ms",
    "total_hits",
    "max_score",
    "timed_out",
    "error",
    "hit_digest_text",
];

/// Marker row emitted between records of different segments.
fn separator_row(previous_segment: &str) -> Vec<String> {
    DETAILED_COLUMNS
        .iter()
        .map(|column| match *column {
            "segment_text" => format!("--- END SEGMENT {} ---", previous_segment),
            "hit_digest_text" => String::new(),
            _ => "---".to_string(),
        })
        .collect()
}

/// Write one row per record, with a separator row whenever the segment changes.
pub fn write_detailed(path: &Path, records: &[ResultRecord]) -> Result<(), BenchError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| BenchError::Output(format!("cannot create {}: {}", path.display(), e)))?;

    writer.write_record(DETAILED_COLUMNS)?;

    let mut current_segment: Option<&str> = None;
    for record in records {
        if let Some(previous) = current_segment {
            if previous != record.segment_id {
                writer.write_record(separator_row(previous))?;
            }
        }
        writer.serialize(record)?;
        current_segment = Some(record.segment_id.as_str());
    }

    writer
        .flush()
        .map_err(|e| BenchError::Output(format!("cannot write {}: {}", path.display(), e)))?;
    tracing::info!(path = %path.display(), records = records.len(), "Detailed results saved");
    Ok(())
}

/// Write one row per variant, in the given order.
pub fn write_summary(path: &Path, stats: &[SummaryStat]) -> Result<(), BenchError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| BenchError::Output(format!("cannot create {}: {}", path.display(), e)))?;

    for stat in stats {
        writer.serialize(stat)?;
    }

    writer
        .flush()
        .map_err(|e| BenchError::Output(format!("cannot write {}: {}", path.display(), e)))?;
    tracing::info!(path = %path.display(), variants = stats.len(), "Summary statistics saved");
    Ok(())
}

/// Print a formatted summary to stdout.
pub fn print_summary(records: &[ResultRecord], stats: &[SummaryStat]) {
    let total = records.len();
    let successful = records.iter().filter(|r| !r.is_error()).count();

    println!("{}", "=".repeat(60));
    println!("SEARCH BENCHMARK SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Total queries executed: {}", total);
    println!("Successful queries: {}", successful);
    println!("Failed queries: {}", total - successful);
    println!();

    if stats.is_empty() {
        println!("No results to analyze");
        return;
    }

    println!(
        "{:<32} {:>8} {:>12} {:>12} {:>8}",
        "Variant", "Queries", "Avg ms", "Avg hits", "Errors"
    );
    println!("{:-<76}", "");
    for stat in stats {
        println!(
            "{:<32} {:>8} {:>12.2} {:>12.2} {:>8}",
            stat.variant_name,
            stat.count,
            stat.avg_query_time_ms,
            stat.avg_total_hits,
            stat.errors
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(segment_id: &str, variant: &str, error: Option<&str>) -> ResultRecord {
        ResultRecord {
            timestamp: Utc::now(),
            row_id: format!("r-{}", segment_id),
            segment_id: segment_id.into(),
            segment_text: "hello, world".into(),
            variant_name: variant.into(),
            query_time_ms: 12.5,
            engine_took_ms: 3,
            total_hits: 2,
            max_score: 1.5,
            timed_out: false,
            error: error.map(str::to_string),
            hit_digest_text: "Hit 1 (Score: 1.500, URL: u, Type: HIGHLIGHTED): x\nHit 2".into(),
        }
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_detailed_report_separators() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detailed.csv");
        let records = vec![
            record("s1", "match_query", None),
            record("s1", "fuzzy_query", Some("Timeout after retries")),
            record("s2", "match_query", None),
        ];

        write_detailed(&path, &records).unwrap();
        let rows = read_rows(&path);

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], DETAILED_COLUMNS.map(str::to_string).to_vec());
        assert_eq!(rows[1][4], "match_query");
        assert_eq!(rows[1][10], "");
        assert_eq!(rows[2][10], "Timeout after retries");
        assert_eq!(rows[3][0], "---");
        assert_eq!(rows[3][3], "--- END SEGMENT s1 ---");
        assert_eq!(rows[3][11], "");
        assert_eq!(rows[4][2], "s2");
        assert!(rows[1][11].contains('\n'));
    }

    #[test]
    fn test_detailed_report_field_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detailed.csv");
        write_detailed(&path, &[record("s1", "match_query", None)]).unwrap();

        let row = &read_rows(&path)[1];
        assert_eq!(row[3], "hello, world");
        assert_eq!(row[5], "12.5");
        assert_eq!(row[6], "3");
        assert_eq!(row[7], "2");
        assert_eq!(row[8], "1.5");
        assert_eq!(row[9], "false");
    }

    #[test]
    fn test_summary_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let stats = vec![SummaryStat {
            variant_name: "match_query".into(),
            count: 2,
            avg_query_time_ms: 10.0,
            median_query_time_ms: 10.0,
            min_query_time_ms: 5.0,
            max_query_time_ms: 15.0,
            avg_engine_took_ms: 2.0,
            avg_total_hits: 3.5,
            sum_total_hits: 7,
            errors: 1,
        }];

        write_summary(&path, &stats).unwrap();
        let rows = read_rows(&path);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "variant_name");
        assert_eq!(rows[0][9], "errors");
        assert_eq!(rows[1][0], "match_query");
        assert_eq!(rows[1][8], "7");
        assert_eq!(rows[1][9], "1");
    }

    #[test]
    fn test_unwritable_path_is_output_error() {
        let result = write_summary(Path::new("/definitely/not/here/summary.csv"), &[]);
        assert!(matches!(result, Err(BenchError::Output(_))));
    }
}
