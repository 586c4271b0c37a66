use super::{BatchReport, ReportRow};
use crate::validate::SpecialCharFinding;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes report rows and findings as JSON Lines
pub struct ReportWriter<W: Write> {
    writer: W,
    rows_written: usize,
}

impl ReportWriter<BufWriter<File>> {
    /// Create a writer that truncates and writes to `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file: {}", path.display()))?;
        Ok(ReportWriter::new(BufWriter::new(file)))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        ReportWriter {
            writer,
            rows_written: 0,
        }
    }

    pub fn write_row(&mut self, row: &ReportRow) -> Result<()> {
        self.write_line(row)
    }

    pub fn write_rows<'a, I: IntoIterator<Item = &'a ReportRow>>(&mut self, rows: I) -> Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Write every row of a batch, followed by one line per special-character finding.
    pub fn write_report(&mut self, report: &BatchReport) -> Result<()> {
        self.write_rows(&report.rows())?;
        for finding in &report.findings {
            self.write_finding(finding)?;
        }
        self.flush()
    }

    pub fn write_finding(&mut self, finding: &SpecialCharFinding) -> Result<()> {
        #[derive(Serialize)]
        struct FindingLine<'a> {
            kind: &'static str,
            #[serde(flatten)]
            finding: &'a SpecialCharFinding,
        }
        self.write_line(&FindingLine {
            kind: "special_chars",
            finding,
        })
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize report line")?;
        writeln!(self.writer, "{}", json).context("Failed to write report line")?;
        self.rows_written += 1;
        Ok(())
    }

    /// Lines written so far.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FileComparison, MatchKind, MatchRecord, MatchStatus};
    use serde_json::{json, Value};

    fn lines(bytes: &[u8]) -> Vec<Value> {
        std::str::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_write_rows() {
        let mut writer = ReportWriter::new(Vec::new());
        let row = ReportRow {
            field_name: "Species".into(),
            status: MatchStatus::UnmatchedInJson,
            match_kind: "not_found".into(),
            source_file: Some("a.json".into()),
        };
        writer.write_row(&row).unwrap();
        assert_eq!(writer.rows_written(), 1);

        let out = lines(&writer.into_inner());
        assert_eq!(
            out[0],
            json!({
                "field_name": "Species",
                "status": "unmatched_in_json",
                "match_kind": "not_found",
                "source_file": "a.json"
            })
        );
    }

    #[test]
    fn test_write_report_with_files_and_findings() {
        let report = BatchReport {
            files: Some(vec![FileComparison {
                source_file: "a.json".into(),
                records: vec![
                    MatchRecord::Matched {
                        db_name: "CompoundID".into(),
                        json_name: "compound_id".into(),
                        kind: MatchKind::Exact,
                    },
                    MatchRecord::UnmatchedInDb {
                        json_name: "extra".into(),
                    },
                ],
                suppressed: vec![],
            }]),
            findings: vec![SpecialCharFinding {
                path: "Inhibition".into(),
                special_chars: vec!['%'],
                sample_value: "50%".into(),
                source_file: "a.json".into(),
                line_number: Some(3),
            }],
            ..BatchReport::default()
        };

        let mut writer = ReportWriter::new(Vec::new());
        writer.write_report(&report).unwrap();
        let out = lines(&writer.into_inner());

        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["match_kind"], "exact");
        assert_eq!(out[1]["status"], "unmatched_in_db");
        assert_eq!(out[2]["kind"], "special_chars");
        assert_eq!(out[2]["special_chars"], json!(["%"]));
        assert_eq!(out[2]["line_number"], 3);
    }

    #[test]
    fn test_create_file_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        let mut writer = ReportWriter::create(&path).unwrap();
        writer.write_rows(&BatchReport::default().rows()).unwrap();
        writer.flush().unwrap();
        assert!(path.exists());
    }
}
