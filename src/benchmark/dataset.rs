/// Benchmark input loading.
///
/// Expects a headered CSV with `row_id`, `segment_id` and `segment_text`
/// columns. Extra columns are ignored; missing ones read as empty strings.

use std::path::Path;

use crate::errors::BenchError;

use super::InputRow;

/// Load every input row, trimming `segment_text`.
///
/// Rows whose text is empty after trimming are kept here; the pipeline
/// skips them so row numbering in logs matches the file.
pub fn load_rows(path: &Path) -> Result<Vec<InputRow>, BenchError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| BenchError::Input(format!("cannot open {}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<InputRow>().enumerate() {
        let mut row = result
            .map_err(|e| BenchError::Input(format!("{} record {}: {}", path.display(), line + 1, e)))?;
        row.segment_text = row.segment_text.trim().to_string();
        rows.push(row);
    }

    tracing::info!(path = %path.display(), count = rows.len(), "Input rows loaded");
    Ok(rows)
}
