use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::trace;

use crate::error::Error;
use crate::scanner::reader::{detect_format, first_non_empty_line, parse_timestamp, FileFormat};
use crate::timeline::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    Rewritten { kept: usize, dropped: usize },
    SkippedJsonLines,
    SkippedNoTimeColumn,
    SkippedEmpty,
}

/// Keeps a copy of everything read through it so raw record bytes can be
/// written back untouched.
struct CaptureReader<R> {
    inner: R,
    buf: Vec<u8>,
    base: u64,
}

impl<R: Read> CaptureReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            base: 0,
        }
    }

    fn end(&self) -> u64 {
        self.base + self.buf.len() as u64
    }

    /// Bytes `[start, end)` of the stream; everything before `end` is released.
    fn take(&mut self, start: u64, end: u64) -> Vec<u8> {
        let s = (start.saturating_sub(self.base) as usize).min(self.buf.len());
        let e = (end.saturating_sub(self.base) as usize).min(self.buf.len());
        let bytes = self.buf[s..e.max(s)].to_vec();
        self.buf.drain(..e);
        self.base += e as u64;
        bytes
    }
}

impl<R: Read> Read for CaptureReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(out)?;
        self.buf.extend_from_slice(&out[..n]);
        Ok(n)
    }
}

fn is_line_break(b: &u8) -> bool {
    *b == b'\n' || *b == b'\r'
}

/// Strip blank lines and terminators around a raw record.
fn record_content(raw: &[u8]) -> &[u8] {
    let start = raw.iter().position(|b| !is_line_break(b)).unwrap_or(raw.len());
    let end = raw.iter().rposition(|b| !is_line_break(b)).map_or(start, |i| i + 1);
    &raw[start..end.max(start)]
}

/// Line terminator used by the file, judged from its first line.
fn line_terminator(path: &Path) -> io::Result<&'static [u8]> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    Ok(if line.ends_with(b"\r\n") {
        b"\r\n"
    } else if line.ends_with(b"\n") {
        b"\n"
    } else if line.contains(&b'\r') {
        b"\r"
    } else {
        b"\n"
    })
}

fn row_timestamp(record: &csv::ByteRecord, column: usize) -> Option<f64> {
    let cell = record.get(column)?;
    parse_timestamp(std::str::from_utf8(cell).ok()?)
}

/// Rewrite a delimited file in place, keeping the header and every row whose
/// timestamp lies inside `keep`. Rows without a readable timestamp are dropped.
///
/// Output goes to a temporary file next to the original and replaces it with a
/// single rename; on any error the original is left as it was.
pub fn rewrite_file(path: &Path, keep: &Timeline) -> Result<RewriteOutcome, Error> {
    let column = match first_non_empty_line(path)? {
        None => return Ok(RewriteOutcome::SkippedEmpty),
        Some(first) => match detect_format(&first) {
            FileFormat::JsonLines => return Ok(RewriteOutcome::SkippedJsonLines),
            FileFormat::NoTimeColumn => return Ok(RewriteOutcome::SkippedNoTimeColumn),
            FileFormat::Delimited { column } => column,
        },
    };
    let terminator = line_terminator(path)?;
    let permissions = fs::metadata(path)?.permissions();

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent)?;

    let (kept, dropped) = {
        let mut out = BufWriter::new(temp.as_file_mut());
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(CaptureReader::new(File::open(path)?));

        let mut kept = 0usize;
        let mut dropped = 0usize;
        let mut is_header = true;
        // start offset and timestamp of the record waiting for its end boundary
        let mut pending: Option<(u64, Option<f64>)> = None;
        let mut record = csv::ByteRecord::new();

        loop {
            // any parse failure abandons the whole file; the temp file goes with it
            let more = reader.read_byte_record(&mut record)?;

            let boundary = if more {
                record.position().map(|p| p.byte()).unwrap_or(reader.position().byte())
            } else {
                reader.get_ref().end()
            };

            if let Some((start, ts)) = pending.take() {
                let raw = reader.get_mut().take(start, boundary);
                let content = record_content(&raw);
                if is_header {
                    out.write_all(content)?;
                    out.write_all(terminator)?;
                    is_header = false;
                } else if ts.map_or(false, |t| keep.contains(t)) {
                    out.write_all(content)?;
                    out.write_all(terminator)?;
                    kept += 1;
                } else {
                    dropped += 1;
                }
            }

            if !more {
                break;
            }
            pending = Some((boundary, row_timestamp(&record, column)));
        }

        out.flush()?;
        (kept, dropped)
    };

    fs::set_permissions(temp.path(), permissions)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    trace!("{}: kept {} rows, dropped {}", path.display(), kept, dropped);
    Ok(RewriteOutcome::Rewritten { kept, dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn keep_100_200() -> Timeline {
        Timeline::from(vec![(100.0, 200.0)])
    }

    #[test]
    fn test_row_filtering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cpu-load.csv");
        fs::write(&path, "timestamp,value\n50,a\n150,b\n250,c\n").unwrap();

        let outcome = rewrite_file(&path, &keep_100_200()).unwrap();
        assert_eq!(outcome, RewriteOutcome::Rewritten { kept: 1, dropped: 2 });
        assert_eq!(fs::read_to_string(&path).unwrap(), "timestamp,value\n150,b\n");
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "time,v\n100,x\n200,y\n201,z\n").unwrap();

        rewrite_file(&path, &keep_100_200()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "time,v\n100,x\n200,y\n");
    }

    #[test]
    fn test_keeps_raw_bytes_and_crlf() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(
            &path,
            "\"Host Name\",TimeStamp,\"note\"\r\nalpha, 150 ,\"x, y\"\r\nbeta,bad,z\r\ngamma,120,\"multi\nline\"\r\n",
        )
        .unwrap();

        let outcome = rewrite_file(&path, &keep_100_200()).unwrap();
        assert_eq!(outcome, RewriteOutcome::Rewritten { kept: 2, dropped: 1 });
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "\"Host Name\",TimeStamp,\"note\"\r\nalpha, 150 ,\"x, y\"\r\ngamma,120,\"multi\nline\"\r\n"
        );
    }

    #[test]
    fn test_missing_trailing_newline_and_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "timestamp,v\n\n150,a\n\n\n160,b").unwrap();

        rewrite_file(&path, &keep_100_200()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "timestamp,v\n150,a\n160,b\n");
    }

    #[test]
    fn test_rewrite_is_a_fixed_point() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "timestamp,v\n90,a\n110,b\n190,c\n210,d\n").unwrap();

        rewrite_file(&path, &keep_100_200()).unwrap();
        let first = fs::read(&path).unwrap();
        rewrite_file(&path, &keep_100_200()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "timestamp,v").unwrap();

        let outcome = rewrite_file(&path, &keep_100_200()).unwrap();
        assert_eq!(outcome, RewriteOutcome::Rewritten { kept: 0, dropped: 0 });
        assert_eq!(fs::read_to_string(&path).unwrap(), "timestamp,v\n");
    }

    #[test]
    fn test_json_lines_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let body = "{\"timestamp\": 50}\n{\"timestamp\": 150}\n";
        fs::write(&path, body).unwrap();

        assert_eq!(
            rewrite_file(&path, &keep_100_200()).unwrap(),
            RewriteOutcome::SkippedJsonLines
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), body);
    }

    #[test]
    fn test_no_time_column_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let body = "a,b\n1,2\n";
        fs::write(&path, body).unwrap();

        assert_eq!(
            rewrite_file(&path, &keep_100_200()).unwrap(),
            RewriteOutcome::SkippedNoTimeColumn
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), body);
    }

    #[test]
    fn test_missing_file_is_an_error_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        assert!(rewrite_file(&dir.path().join("gone.csv"), &keep_100_200()).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_record_content() {
        assert_eq!(record_content(b"\n\r\nabc\r\n\n"), b"abc");
        assert_eq!(record_content(b"abc"), b"abc");
        assert_eq!(record_content(b"\n\n"), b"");
    }
}
