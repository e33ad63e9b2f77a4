//! Connection dataset loading.
//!
//! Reads a CSV whose header uses Zeek `conn.log` column names. Column order
//! is free and unknown columns are ignored. A cell that is empty or `-` takes
//! the value from the same column of the previous row (forward fill); a
//! missing cell in the first data row is an error.
//!
//! # Example file content
//! ```csv
//! id.orig_h,id.orig_p,id.resp_h,id.resp_p,proto,duration,orig_bytes,resp_bytes,conn_state,label
//! 192.168.1.5,51234,10.0.0.7,80,tcp,1.25,320,4100,SF,Benign
//! 192.168.1.9,5353,224.0.0.251,5353,udp,-,-,-,S0,Malicious
//! ```

use crate::record::ConnectionRecord;
use ct_common::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Columns every dataset must provide, in record-field order.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "id.orig_h",
    "id.orig_p",
    "id.resp_h",
    "id.resp_p",
    "proto",
    "duration",
    "orig_bytes",
    "resp_bytes",
    "conn_state",
];

/// Optional ground-truth column.
pub const LABEL_COLUMN: &str = "label";

/// Records loaded from one dataset file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<ConnectionRecord>,
}

impl Dataset {
    pub fn new(records: Vec<ConnectionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ConnectionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn durations(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.duration_seconds).collect()
    }

    /// Median connection duration, the default long/short threshold.
    pub fn median_duration(&self) -> f64 {
        ct_math::median(&self.durations())
    }
}

/// Load a dataset from disk.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ArtifactMissing {
                kind: "dataset".to_string(),
                path: path.to_path_buf(),
            })
        }
        Err(err) => return Err(Error::Io(err)),
    };
    parse_dataset(BufReader::new(file))
}

/// Parse dataset text already in memory.
pub fn parse_dataset_str(text: &str) -> Result<Dataset> {
    parse_dataset(text.as_bytes())
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Dataset {
        line,
        message: message.into(),
    }
}

/// Split one CSV line. Double-quoted fields may contain commas and `""`.
fn split_fields(line: &str, line_num: usize) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(parse_error(line_num, "unterminated quoted field"));
    }
    fields.push(current.trim().to_string());
    Ok(fields)
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell == "-"
}

fn parse_port(cell: &str, column: &str, line: usize) -> Result<u16> {
    parse_integer(cell, column, line, u16::MAX as u64).map(|v| v as u16)
}

fn parse_count(cell: &str, column: &str, line: usize) -> Result<u64> {
    parse_integer(cell, column, line, u64::MAX)
}

/// Integers may be written as `80` or `80.0`; fractional values are rejected.
fn parse_integer(cell: &str, column: &str, line: usize, max: u64) -> Result<u64> {
    let invalid = || parse_error(line, format!("column '{column}': invalid value '{cell}'"));
    let value = match cell.parse::<u64>() {
        Ok(v) => v,
        Err(_) => {
            let f: f64 = cell.parse().map_err(|_| invalid())?;
            if !f.is_finite() || f < 0.0 || f.fract() != 0.0 || f > max as f64 {
                return Err(invalid());
            }
            f as u64
        }
    };
    if value > max {
        return Err(invalid());
    }
    Ok(value)
}

fn parse_duration(cell: &str, line: usize) -> Result<f64> {
    match cell.parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Ok(d),
        _ => Err(parse_error(
            line,
            format!("column 'duration': expected a non-negative number, got '{cell}'"),
        )),
    }
}

/// Parse a dataset from any buffered reader.
pub fn parse_dataset<R: BufRead>(reader: R) -> Result<Dataset> {
    let mut lines = reader.lines().enumerate();

    let (header_line, header) = loop {
        match lines.next() {
            Some((idx, line)) => {
                let line = line?;
                let trimmed = line.trim().trim_start_matches('\u{feff}');
                if !trimmed.is_empty() {
                    break (idx + 1, split_fields(trimmed, idx + 1)?);
                }
            }
            None => return Err(parse_error(1, "dataset is empty")),
        }
    };

    let mut positions = [0usize; REQUIRED_COLUMNS.len()];
    for (slot, name) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| parse_error(header_line, format!("missing column '{name}'")))?;
    }
    let label_pos = header.iter().position(|h| h == LABEL_COLUMN);

    let mut previous: Option<Vec<String>> = None;
    let mut records = Vec::new();

    for (idx, line) in lines {
        let line_num = idx + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut fields = split_fields(trimmed, line_num)?;
        if fields.len() != header.len() {
            return Err(parse_error(
                line_num,
                format!("expected {} columns, got {}", header.len(), fields.len()),
            ));
        }

        for (col, cell) in fields.iter_mut().enumerate() {
            if is_missing(cell) {
                match previous.as_ref() {
                    Some(prev) => cell.clone_from(&prev[col]),
                    None if Some(col) == label_pos => {}
                    None if positions.contains(&col) => {
                        return Err(parse_error(
                            line_num,
                            format!("column '{}': missing value in first row", header[col]),
                        ))
                    }
                    None => {}
                }
            }
        }

        let cell = |i: usize| fields[positions[i]].as_str();
        let record = ConnectionRecord {
            origin_host: cell(0).to_string(),
            origin_port: parse_port(cell(1), REQUIRED_COLUMNS[1], line_num)?,
            responder_host: cell(2).to_string(),
            responder_port: parse_port(cell(3), REQUIRED_COLUMNS[3], line_num)?,
            protocol: cell(4).to_string(),
            duration_seconds: parse_duration(cell(5), line_num)?,
            origin_bytes: parse_count(cell(6), REQUIRED_COLUMNS[6], line_num)?,
            responder_bytes: parse_count(cell(7), REQUIRED_COLUMNS[7], line_num)?,
            connection_state: cell(8).to_string(),
            label: label_pos
                .map(|p| fields[p].clone())
                .filter(|l| !is_missing(l)),
        };
        records.push(record);
        previous = Some(fields);
    }

    if records.is_empty() {
        return Err(parse_error(header_line, "dataset has no data rows"));
    }
    Ok(Dataset::new(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "id.orig_h,id.orig_p,id.resp_h,id.resp_p,proto,duration,orig_bytes,resp_bytes,conn_state,label";

    fn parse(rows: &[&str]) -> Result<Dataset> {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        parse_dataset_str(&text)
    }

    #[test]
    fn parses_rows_in_order() {
        let ds = parse(&[
            "192.168.1.5,51234,10.0.0.7,80,tcp,1.25,320,4100,SF,Benign",
            "192.168.1.9,5353,224.0.0.251,5353,udp,0.5,10,0,S0,Malicious",
        ])
        .unwrap();
        assert_eq!(ds.len(), 2);
        let r = &ds.records()[1];
        assert_eq!(r.responder_host, "224.0.0.251");
        assert_eq!(r.protocol, "udp");
        assert_eq!(r.duration_seconds, 0.5);
        assert_eq!(r.label.as_deref(), Some("Malicious"));
    }

    #[test]
    fn forward_fills_missing_cells() {
        let ds = parse(&[
            "192.168.1.5,51234,10.0.0.7,80,tcp,1.25,320,4100,SF,Benign",
            "192.168.1.9,5353,10.0.0.8,53,udp,-,,-,S0,",
        ])
        .unwrap();
        let r = &ds.records()[1];
        assert_eq!(r.duration_seconds, 1.25);
        assert_eq!(r.origin_bytes, 320);
        assert_eq!(r.responder_bytes, 4100);
        assert_eq!(r.label.as_deref(), Some("Benign"));
    }

    #[test]
    fn missing_first_row_value_is_an_error() {
        let err = parse(&["192.168.1.5,51234,10.0.0.7,80,tcp,-,320,4100,SF,Benign"]).unwrap_err();
        assert!(matches!(err, Error::Dataset { line: 2, ref message } if message.contains("duration")));
    }

    #[test]
    fn column_order_is_free_and_label_optional() {
        let text = "proto,conn_state,duration,orig_bytes,resp_bytes,id.resp_h,id.resp_p,id.orig_h,id.orig_p,extra\n\
                    tcp,SF,2,1,1,10.0.0.1,443,10.0.0.2,40000,x\n";
        let ds = parse_dataset_str(text).unwrap();
        let r = &ds.records()[0];
        assert_eq!(r.responder_port, 443);
        assert_eq!(r.origin_port, 40000);
        assert!(r.label.is_none());
    }

    #[test]
    fn accepts_float_formatted_integers() {
        let ds = parse(&["10.0.0.2,40000.0,10.0.0.1,80.0,tcp,1,100.0,0,SF,Benign"]).unwrap();
        assert_eq!(ds.records()[0].origin_port, 40000);
        assert_eq!(ds.records()[0].origin_bytes, 100);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse(&["10.0.0.2,70000,10.0.0.1,80,tcp,1,1,1,SF,B"]).is_err());
        assert!(parse(&["10.0.0.2,1.5,10.0.0.1,80,tcp,1,1,1,SF,B"]).is_err());
        assert!(parse(&["10.0.0.2,1,10.0.0.1,80,tcp,-3,1,1,SF,B"]).is_err());
        assert!(parse(&["10.0.0.2,1,10.0.0.1,80,tcp,NaN,1,1,SF,B"]).is_err());
        assert!(parse(&["10.0.0.2,1,10.0.0.1,80,tcp,1,1,1,SF"]).is_err());
    }

    #[test]
    fn header_problems() {
        assert!(matches!(parse_dataset_str(""), Err(Error::Dataset { .. })));
        assert!(matches!(
            parse_dataset_str("id.orig_h,proto\n1,tcp\n"),
            Err(Error::Dataset { line: 1, ref message }) if message.contains("missing column")
        ));
        assert!(matches!(parse(&[]), Err(Error::Dataset { .. })));
    }

    #[test]
    fn quoted_fields() {
        let ds = parse(&[r#""10.0.0.2",1,10.0.0.1,80,tcp,1,1,1,SF,"Malicious, C&C""#]).unwrap();
        assert_eq!(ds.records()[0].label.as_deref(), Some("Malicious, C&C"));
        assert!(parse(&[r#""10.0.0.2,1,10.0.0.1,80,tcp,1,1,1,SF,B"#]).is_err());
    }

    #[test]
    fn median_duration_averages_middle_pair() {
        let ds = parse(&[
            "10.0.0.2,1,10.0.0.1,80,tcp,1,1,1,SF,B",
            "10.0.0.2,1,10.0.0.1,80,tcp,10,1,1,SF,B",
            "10.0.0.2,1,10.0.0.1,80,tcp,2,1,1,SF,B",
            "10.0.0.2,1,10.0.0.1,80,tcp,3,1,1,SF,B",
        ])
        .unwrap();
        assert_eq!(ds.median_duration(), 2.5);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_dataset(&dir.path().join("conn.csv")),
            Err(Error::ArtifactMissing { .. })
        ));
    }
}
