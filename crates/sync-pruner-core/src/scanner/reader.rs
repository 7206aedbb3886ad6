use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::{debug, trace};

/// JSON-lines records carry their timestamp under one of these keys, checked in order.
pub const JSON_TIMESTAMP_KEYS: [&str; 2] = ["TimeStamp", "timestamp"];

/// Shape of a capture file, sniffed once from its first non-empty line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// One JSON object per line.
    JsonLines,
    /// Header row plus delimited rows; `column` holds the timestamp.
    Delimited { column: usize },
    /// Delimited text whose header names no time column.
    NoTimeColumn,
}

/// Decide the format from the first non-empty line of a file.
pub fn detect_format(first_line: &str) -> FileFormat {
    let line = first_line.trim();
    if serde_json::from_str::<Map<String, Value>>(line).is_ok() {
        return FileFormat::JsonLines;
    }
    match find_time_column(line) {
        Some(column) => FileFormat::Delimited { column },
        None => FileFormat::NoTimeColumn,
    }
}

/// Index of the first header cell whose name contains "time", ignoring case.
pub fn find_time_column(header_line: &str) -> Option<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(header_line.as_bytes());
    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => time_column_in(record.iter()),
        _ => None,
    }
}

pub(crate) fn time_column_in<'a>(cells: impl Iterator<Item = &'a str>) -> Option<usize> {
    cells
        .enumerate()
        .find(|(_, name)| name.to_lowercase().contains("time"))
        .map(|(i, _)| i)
}

/// Parse a numeric timestamp cell. Non-finite values count as malformed.
pub fn parse_timestamp(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Pull the timestamp out of one JSON-lines record.
pub fn json_timestamp(line: impl AsRef<[u8]>) -> Option<f64> {
    let record: Map<String, Value> = serde_json::from_slice(line.as_ref()).ok()?;
    let value = JSON_TIMESTAMP_KEYS.iter().find_map(|k| record.get(*k))?;
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Read the first non-empty line of a file, if any.
pub fn first_non_empty_line(path: &Path) -> io::Result<Option<String>> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.split(b'\n') {
        let line = String::from_utf8_lossy(&line?).into_owned();
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

/// Every timestamp found in `path`, in file order.
///
/// A missing or unreadable file, or one without a usable timestamp, yields an
/// empty vector. Malformed rows are skipped.
pub fn read_timestamps(path: &Path) -> Vec<f64> {
    match try_read_timestamps(path) {
        Ok(ts) => ts,
        Err(e) => {
            debug!("Could not read timestamps from {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn try_read_timestamps(path: &Path) -> io::Result<Vec<f64>> {
    let Some(first) = first_non_empty_line(path)? else {
        return Ok(Vec::new());
    };

    let format = detect_format(&first);
    trace!("{} detected as {:?}", path.display(), format);

    match format {
        FileFormat::JsonLines => read_json_lines(path),
        FileFormat::Delimited { column } => read_delimited(path, column),
        FileFormat::NoTimeColumn => Ok(Vec::new()),
    }
}

fn read_json_lines(path: &Path) -> io::Result<Vec<f64>> {
    let reader = BufReader::new(File::open(path)?);
    let mut timestamps = Vec::new();
    // raw bytes per line: invalid UTF-8 only costs that line
    for line in reader.split(b'\n') {
        if let Some(ts) = json_timestamp(line?) {
            timestamps.push(ts);
        }
    }
    Ok(timestamps)
}

fn read_delimited(path: &Path, column: usize) -> io::Result<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_to_io)?;

    let mut timestamps = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {
                if let Some(ts) = record.get(column).and_then(parse_timestamp) {
                    timestamps.push(ts);
                }
            }
            Ok(false) => break,
            // bad UTF-8 or a broken quote only costs that row
            Err(e) if !e.is_io_error() => continue,
            Err(e) => return Err(csv_to_io(e)),
        }
    }
    Ok(timestamps)
}

fn csv_to_io(e: csv::Error) -> io::Error {
    if e.is_io_error() {
        match e.into_kind() {
            csv::ErrorKind::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, format!("{:?}", other)),
        }
    } else {
        io::Error::new(io::ErrorKind::InvalidData, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_detect_format_json() {
        assert_eq!(
            detect_format(r#"{"TimeStamp": 1700000000.5, "cpu": 3}"#),
            FileFormat::JsonLines
        );
    }

    #[test]
    fn test_detect_format_json_scalar_is_not_json_lines() {
        // a bare number is valid JSON but not a record
        assert_eq!(detect_format("12345"), FileFormat::NoTimeColumn);
    }

    #[test]
    fn test_detect_format_csv() {
        assert_eq!(
            detect_format("host,Timestamp,value"),
            FileFormat::Delimited { column: 1 }
        );
        assert_eq!(
            detect_format("TIME_S,a,b"),
            FileFormat::Delimited { column: 0 }
        );
    }

    #[test]
    fn test_detect_format_first_time_column_wins() {
        assert_eq!(
            detect_format("value,timestamp,uptime"),
            FileFormat::Delimited { column: 1 }
        );
    }

    #[test]
    fn test_detect_format_no_time_column() {
        assert_eq!(detect_format("a,b,c"), FileFormat::NoTimeColumn);
    }

    #[test]
    fn test_json_timestamp_variants() {
        assert_eq!(json_timestamp(r#"{"TimeStamp": 10}"#), Some(10.0));
        assert_eq!(json_timestamp(r#"{"timestamp": "11.5"}"#), Some(11.5));
        assert_eq!(json_timestamp(r#"{"TimeStamp": 1, "timestamp": 2}"#), Some(1.0));
        assert_eq!(json_timestamp(r#"{"time": 10}"#), None);
        assert_eq!(json_timestamp(r#"{"timestamp": null}"#), None);
        assert_eq!(json_timestamp("not json"), None);
    }

    #[test]
    fn test_parse_timestamp_rejects_non_finite() {
        assert_eq!(parse_timestamp(" 12.5 "), Some(12.5));
        assert_eq!(parse_timestamp("NaN"), None);
        assert_eq!(parse_timestamp("inf"), None);
        assert_eq!(parse_timestamp("abc"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_read_csv_skips_malformed_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cpu-load.csv");
        fs::write(&path, "timestamp,value\n1,a\nbad,b\n3,c\n\n4\n").unwrap();
        assert_eq!(read_timestamps(&path), vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_read_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proc-cpu.csv");
        fs::write(
            &path,
            "\n{\"TimeStamp\": 5}\n{broken\n{\"timestamp\": 6}\n\n{\"other\": 1}\n",
        )
        .unwrap();
        assert_eq!(read_timestamps(&path), vec![5.0, 6.0]);
    }

    #[test]
    fn test_read_json_lines_skips_invalid_utf8_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proc-mem.csv");
        let mut body = b"{\"TimeStamp\":1}\n{\"TimeStamp\":2}\n".to_vec();
        body.extend_from_slice(b"{\"TimeStamp\":\"\xff\"}\n");
        body.extend_from_slice(b"{\"TimeStamp\":4}\r\n");
        fs::write(&path, body).unwrap();
        assert_eq!(read_timestamps(&path), vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_first_line_with_invalid_utf8_is_still_sniffed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cpu-load.csv");
        fs::write(&path, b"\n\ntimestamp,\xffvalue\n1,a\n").unwrap();
        let first = first_non_empty_line(&path).unwrap().unwrap();
        assert!(first.starts_with("timestamp,"));
        assert_eq!(detect_format(&first), FileFormat::Delimited { column: 0 });
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        assert!(read_timestamps(&dir.path().join("nope.csv")).is_empty());
    }

    #[test]
    fn test_read_empty_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "\n\n").unwrap();
        assert!(read_timestamps(&path).is_empty());
    }

    #[test]
    fn test_read_header_only_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.csv");
        fs::write(&path, "timestamp,value\n").unwrap();
        assert!(read_timestamps(&path).is_empty());
    }
}
