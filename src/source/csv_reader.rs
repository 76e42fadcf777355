// ==========================================
// Coffee ETL - flat-file source
// ==========================================
// Header-driven field maps; every value is text.
// ==========================================

use crate::domain::clean_token;
use crate::source::error::{SourceError, SourceResult};
use crate::source::{FileSource, SourceRow};
use csv::ReaderBuilder;
use serde_json::Value;
use std::fs::File;
use std::path::Path;

pub struct CsvFileSource;

impl FileSource for CsvFileSource {
    fn read_rows(&self, path: &Path) -> SourceResult<Vec<SourceRow>> {
        if !path.exists() {
            return Err(SourceError::FileNotFound(path.display().to_string()));
        }

        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(SourceError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers: Vec<String> = reader.headers()?.iter().map(clean_token).collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            // every header gets a value; short rows are padded with ""
            let row: SourceRow = headers
                .iter()
                .enumerate()
                .map(|(idx, header)| {
                    let value = record.get(idx).unwrap_or_default().trim().to_string();
                    (header.clone(), Value::String(value))
                })
                .collect();

            // skip fully blank lines
            if row.values().all(|v| v.as_str().map(str::is_empty).unwrap_or(false)) {
                continue;
            }
            rows.push(row);
        }

        Ok(rows)
    }
}
