// ==========================================
// Coffee ETL - zone artifacts
// ==========================================
// One CSV per (zone, dataset, run). The record's own fields
// come first, then the metadata columns. Error artifacts add
// the joined violation reasons.
// ==========================================

use crate::domain::{MessageMetadata, Record};
use crate::zone::error::{ZoneError, ZoneResult};
use chrono::NaiveDateTime;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ROW_NUMBER_COLUMN: &str = "_row_number";
pub const SOURCE_COLUMN: &str = "_source";
pub const EXTRACT_TIME_COLUMN: &str = "_extract_time";
pub const RUN_ID_COLUMN: &str = "_run_id";
pub const ERRORS_COLUMN: &str = "_errors";

const META_COLUMNS: [&str; 4] = [ROW_NUMBER_COLUMN, SOURCE_COLUMN, EXTRACT_TIME_COLUMN, RUN_ID_COLUMN];
const EXTRACT_TIME_WIRE: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// One line of a zone artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRow {
    pub row_number: usize,
    pub fields: Record,
    pub metadata: MessageMetadata,
    /// Present in error artifacts only.
    pub errors: Option<String>,
}

/// Streaming writer. The header starts from the first row (or
/// `with_fields`); every append is flushed before it returns.
/// A row carrying a field the header lacks widens the header and
/// rewrites the rows already on disk.
pub struct ZoneWriter {
    path: PathBuf,
    with_errors: bool,
    fields: Option<Vec<String>>,
    inner: Option<csv::Writer<File>>,
    rows: usize,
}

impl ZoneWriter {
    pub fn new(path: impl Into<PathBuf>, with_errors: bool) -> Self {
        Self {
            path: path.into(),
            with_errors,
            fields: None,
            inner: None,
            rows: 0,
        }
    }

    /// Fix the record columns up front instead of taking them from the first row.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> &[String] {
        self.fields.as_deref().unwrap_or_default()
    }

    /// Truncate the file and write the header.
    fn create(&mut self) -> ZoneResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        let mut header: Vec<&str> = self.columns().iter().map(String::as_str).collect();
        header.extend(META_COLUMNS);
        if self.with_errors {
            header.push(ERRORS_COLUMN);
        }
        writer.write_record(&header)?;
        writer.flush()?;
        self.inner = Some(writer);
        Ok(())
    }

    fn open(&mut self, first: Option<&Record>) -> ZoneResult<()> {
        if self.inner.is_some() {
            return Ok(());
        }
        if self.fields.is_none() {
            self.fields = Some(first.map(|r| r.keys().cloned().collect()).unwrap_or_default());
        }
        self.create()
    }

    /// Add the fields of `record` missing from the header.
    fn widen(&mut self, record: &Record) -> ZoneResult<()> {
        let extra: Vec<String> = record
            .keys()
            .filter(|k| !self.columns().contains(*k))
            .cloned()
            .collect();
        if extra.is_empty() {
            return Ok(());
        }

        if let Some(mut writer) = self.inner.take() {
            writer.flush()?;
        }
        let existing = read_zone_file(&self.path)?;
        info!(path = %self.path.display(), fields = ?extra, rows = existing.len(), "artifact header widened");

        self.fields.get_or_insert_with(Vec::new).extend(extra);
        self.create()?;
        for row in &existing {
            self.write_line(row.row_number, &row.fields, &row.metadata, row.errors.as_deref())?;
        }
        Ok(())
    }

    fn write_line(
        &mut self,
        row_number: usize,
        fields: &Record,
        metadata: &MessageMetadata,
        errors: Option<&str>,
    ) -> ZoneResult<()> {
        let mut line: Vec<String> = self
            .columns()
            .iter()
            .map(|c| fields.get(c).cloned().unwrap_or_default())
            .collect();
        line.push(row_number.to_string());
        line.push(metadata.origin.clone());
        line.push(metadata.extract_time.format(EXTRACT_TIME_WIRE).to_string());
        line.push(metadata.run_id.clone());
        if self.with_errors {
            line.push(errors.unwrap_or_default().to_string());
        }

        let writer = self
            .inner
            .as_mut()
            .ok_or_else(|| ZoneError::Io(format!("{} not open", self.path.display())))?;
        writer.write_record(&line)?;
        writer.flush()?;
        Ok(())
    }

    pub fn append(
        &mut self,
        row_number: usize,
        fields: &Record,
        metadata: &MessageMetadata,
        errors: Option<&str>,
    ) -> ZoneResult<()> {
        self.open(Some(fields))?;
        self.widen(fields)?;
        self.write_line(row_number, fields, metadata, errors)?;
        self.rows += 1;
        Ok(())
    }

    /// Close the artifact; an artifact with no rows still gets its header.
    pub fn finish(mut self) -> ZoneResult<usize> {
        self.open(None)?;
        if let Some(mut writer) = self.inner.take() {
            writer.flush()?;
        }
        Ok(self.rows)
    }
}

/// Read every row of a zone artifact.
pub fn read_zone_file(path: &Path) -> ZoneResult<Vec<ZoneRow>> {
    let malformed = |message: String| ZoneError::Malformed {
        path: path.display().to_string(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new().flexible(false).from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let (Some(row_idx), Some(source_idx), Some(time_idx), Some(run_idx)) = (
        position(ROW_NUMBER_COLUMN),
        position(SOURCE_COLUMN),
        position(EXTRACT_TIME_COLUMN),
        position(RUN_ID_COLUMN),
    ) else {
        return Err(malformed("missing metadata columns".to_string()));
    };
    let errors_idx = position(ERRORS_COLUMN);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let get = |i: usize| record.get(i).unwrap_or_default().to_string();

        let row_number = get(row_idx)
            .parse::<usize>()
            .map_err(|e| malformed(format!("bad row number: {}", e)))?;
        let extract_time = get(time_idx)
            .parse::<NaiveDateTime>()
            .map_err(|e| malformed(format!("bad extract time: {}", e)))?;

        let fields: Record = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.starts_with('_'))
            .map(|(i, h)| (h.clone(), get(i)))
            .collect();

        rows.push(ZoneRow {
            row_number,
            fields,
            metadata: MessageMetadata {
                extract_time,
                run_id: get(run_idx),
                origin: get(source_idx),
            },
            errors: errors_idx.map(get),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn meta() -> MessageMetadata {
        MessageMetadata {
            extract_time: NaiveDate::from_ymd_opt(2025, 2, 3)
                .unwrap()
                .and_hms_milli_opt(4, 5, 6, 789)
                .unwrap(),
            run_id: "20250203_040506".to_string(),
            origin: "khachhang.csv".to_string(),
        }
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_error_artifact_keeps_reasons_and_row_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error").join("customer_csv_r.csv");

        let mut writer = ZoneWriter::new(&path, true);
        writer
            .append(3, &record(&[("id", "1"), ("email", "a, b")]), &meta(), Some("id: dup | email: bad"))
            .unwrap();
        writer.append(7, &record(&[("id", "")]), &meta(), Some("id: blank")).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let rows = read_zone_file(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 3);
        assert_eq!(rows[0].fields["email"], "a, b");
        assert_eq!(rows[0].errors.as_deref(), Some("id: dup | email: bad"));
        assert_eq!(rows[1].fields["email"], "");
        assert_eq!(rows[1].metadata, meta());
    }

    #[test]
    fn test_later_field_widens_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw").join("menu_category_csv_r.csv");

        let mut writer = ZoneWriter::new(&path, false);
        writer.append(1, &record(&[("id", "1"), ("ten_loai", "Trà")]), &meta(), None).unwrap();
        writer
            .append(2, &record(&[("id", "2"), ("ten_loai", "Cà phê"), ("mo_ta", "Đậm đà")]), &meta(), None)
            .unwrap();
        writer.append(3, &record(&[("id", "3"), ("ten_loai", "Bánh")]), &meta(), None).unwrap();
        assert_eq!(writer.finish().unwrap(), 3);

        let rows = read_zone_file(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].fields["mo_ta"], "");
        assert_eq!(rows[1].fields["mo_ta"], "Đậm đà");
        assert_eq!(rows[1].row_number, 2);
        assert_eq!(rows[2].fields["ten_loai"], "Bánh");
    }

    #[test]
    fn test_empty_artifact_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.csv");
        let writer = ZoneWriter::new(&path, false).with_fields(vec!["id".to_string()]);
        assert_eq!(writer.finish().unwrap(), 0);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), "id,_row_number,_source,_extract_time,_run_id");
        assert!(read_zone_file(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_metadata_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "id,name\n1,a\n").unwrap();
        assert!(matches!(read_zone_file(&path), Err(ZoneError::Malformed { .. })));
    }
}
