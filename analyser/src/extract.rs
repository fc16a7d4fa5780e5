mod pattern;

use netcoord_log_model::{LogRecord, RecordStore};
use serde::Serialize;
use std::io::{BufRead as _, Read};
use std::path::{Path, PathBuf};

pub use self::pattern::RecordPattern;

/// Counts of how every consumed line was classified.
///
/// Each line lands in exactly one counter, so [ExtractionReport::total] equals the number of
/// lines consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// Lines that matched the record pattern
    pub valid: usize,
    /// Lines that did not match the record pattern and were skipped
    pub invalid: usize,
    /// `=== ... ===` section headers and `---` separators
    pub headers: usize,
    /// Empty or whitespace-only lines
    pub blank: usize,
}

impl ExtractionReport {
    pub fn total(&self) -> usize {
        self.valid + self.invalid + self.headers + self.blank
    }

    pub fn is_empty(&self) -> bool {
        self.valid == 0
    }
}

/// Turns lines into [LogRecord]s using a single [RecordPattern].
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    pattern: RecordPattern,
}

impl Extractor {
    pub fn new(pattern: RecordPattern) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> RecordPattern {
        self.pattern
    }

    /// Lazily extract records from a sequence of lines.
    ///
    /// Non-matching lines are skipped and counted, see [Records::report].
    pub fn extract<I>(&self, lines: I) -> Records<I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Records {
            lines: lines.into_iter(),
            pattern: self.pattern,
            line_number: 0,
            section: None,
            report: ExtractionReport::default(),
        }
    }

    /// Read everything from `reader` and extract all records.
    pub fn extract_reader<R>(&self, reader: R) -> std::io::Result<Extraction>
    where
        R: Read,
    {
        let lines = std::io::BufReader::new(reader)
            .lines()
            .collect::<std::io::Result<Vec<_>>>()?;

        let mut records = self.extract(&lines);
        let store = records.by_ref().collect::<RecordStore<_>>();

        Ok(Extraction {
            records: store,
            report: records.report(),
        })
    }

    /// Read the file at `path` and extract all records.
    ///
    /// The file is read completely and closed before this returns. A file without a single valid
    /// record is not an error, it is reported as empty.
    pub fn extract_file<P>(&self, path: P) -> Result<Extraction, ReadError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let extraction = self
            .extract_reader(file)
            .map_err(|source| ReadError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let report = extraction.report;
        log::debug!(
            "Extracted {} records from {} ({} invalid, {} headers, {} blank)",
            report.valid,
            path.display(),
            report.invalid,
            report.headers,
            report.blank
        );
        if report.is_empty() {
            log::warn!(
                "No valid {:?} records found in {}",
                self.pattern,
                path.display()
            );
        }

        Ok(extraction)
    }
}

/// Lazy iterator over the records of a line sequence.
pub struct Records<I> {
    lines: I,
    pattern: RecordPattern,
    line_number: usize,
    section: Option<String>,
    report: ExtractionReport,
}

impl<I> Records<I> {
    /// Classification counts for the lines consumed so far.
    pub fn report(&self) -> ExtractionReport {
        self.report
    }
}

impl<I> Iterator for Records<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = LogRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            self.line_number += 1;
            let line = line.as_ref().trim();

            if line.is_empty() {
                self.report.blank += 1;
                continue;
            }
            if let Some(label) = section_label(line) {
                self.section = (!label.is_empty()).then(|| label.to_string());
                self.report.headers += 1;
                continue;
            }
            if line.starts_with("---") {
                self.report.headers += 1;
                continue;
            }

            match self.pattern.parse_line(self.line_number, line) {
                Some(mut record) => {
                    self.report.valid += 1;
                    record.section = self.section.clone();
                    return Some(record);
                }
                None => {
                    log::trace!("Skipping line {}: {line}", self.line_number);
                    self.report.invalid += 1;
                }
            }
        }

        None
    }
}

/// `=== Intra-network pings for net_1 ===` yields `Intra-network pings for net_1`.
fn section_label(line: &str) -> Option<&str> {
    if !line.starts_with("===") {
        return None;
    }
    Some(line.trim_matches(|c: char| c == '=' || c.is_whitespace()))
}

/// The records of one file, together with how its lines were classified.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: RecordStore<LogRecord>,
    pub report: ExtractionReport,
}

impl Extraction {
    /// The primary value of every record, in input order.
    pub fn values(&self) -> Vec<f64> {
        self.records
            .iter()
            .map(|record| record.measurement.primary_value())
            .collect()
    }
}

/// The input could not be read at all.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PING_LOG: &str = "
=== Intra-network pings for net_1 ===
2025/05/26 12:00:01 [net_1] clab-nebula-serf1 (10.0.1.10) → [net_1] clab-nebula-serf2 (10.0.1.11): 7.707ms (test duration: 1.002s)
2025/05/26 12:00:02 [net_1] clab-nebula-serf1 (10.0.1.10) → [net_1] clab-nebula-serf3 (10.0.1.12): FAILED - timeout

=== Inter-network pings net_1 → net_2 ===
2025/05/26 12:00:03 [net_1] clab-nebula-serf1 (10.0.1.10) → [net_2] clab-nebula-serf7 (10.0.2.10): 31.250ms (test duration: 1.031s)
";

    #[test]
    fn counts_every_line_once() {
        let lines = PING_LOG.lines().collect::<Vec<_>>();
        let mut records = Extractor::new(RecordPattern::Rtt).extract(&lines);
        let extracted = records.by_ref().collect::<Vec<_>>();
        let report = records.report();

        assert_eq!(extracted.len(), 2);
        assert_eq!(
            report,
            ExtractionReport {
                valid: 2,
                invalid: 1,
                headers: 2,
                blank: 2,
            }
        );
        assert_eq!(report.total(), lines.len());
    }

    #[test]
    fn all_matching_lines_are_valid() {
        let lines = ["a → b: 1.0ms", "b → a: 2.0ms", "a → c: 3.0ms"];
        let mut records = Extractor::new(RecordPattern::Rtt).extract(lines);
        assert_eq!(records.by_ref().count(), 3);
        assert_eq!(records.report().valid, lines.len());
        assert_eq!(records.report().valid + records.report().invalid, lines.len());
    }

    #[test]
    fn records_carry_their_section() {
        let extraction = Extractor::new(RecordPattern::Rtt)
            .extract_reader(PING_LOG.as_bytes())
            .unwrap();
        let sections = extraction
            .records
            .iter()
            .map(|r| r.section.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            sections,
            vec![
                Some("Intra-network pings for net_1".to_string()),
                Some("Inter-network pings net_1 → net_2".to_string()),
            ]
        );
        assert_eq!(extraction.values(), vec![7.707, 31.25]);
    }

    #[test]
    fn extraction_is_lazy() {
        let lines = ["a → b: 1.0ms", "garbage", "a → c: 3.0ms", "b → c: 4.0ms"];
        let mut records = Extractor::new(RecordPattern::Rtt).extract(lines);
        assert!(records.next().is_some());
        assert_eq!(records.report().valid, 1);
        assert_eq!(records.report().invalid, 0);
    }

    #[test]
    fn empty_input_is_reported_as_empty() {
        let extraction = Extractor::new(RecordPattern::Coordinate)
            .extract_reader("".as_bytes())
            .unwrap();
        assert!(extraction.records.is_empty());
        assert!(extraction.report.is_empty());
        assert_eq!(extraction.report.total(), 0);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = Extractor::new(RecordPattern::Rtt).extract_file("/definitely/not/here.log");
        assert!(matches!(result, Err(ReadError::Open { .. })));
    }
}
