//! Logic analyzer table export reader
//!
//! Reads the comma separated export one line at a time. The first line is the
//! header; every following line becomes a [`TraceRecord`].
//!
//! ## Split records
//! A quoted field containing a literal newline ends up split across two
//! physical lines, which leaves the first part short of fields. Such a record
//! is re-joined with the following line: its last field and the next line's
//! first field are concatenated around a `\n`, and the rest of the next line's
//! fields are appended. This repeats until the record is at least as wide as
//! the header or the input ends. Records that still do not match the header
//! width are passed on unchanged; reconstructors decide whether to skip them.

use crate::types::{DecoderError, Result, TraceHeader, TraceRecord};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Streaming reader over an export file
pub struct TraceSource<R> {
    header: TraceHeader,
    lines: Lines<R>,
    line_no: usize,
    repaired: usize,
}

impl TraceSource<BufReader<File>> {
    /// Open an export file and parse its header
    pub fn open(path: &Path) -> Result<Self> {
        log::info!("Opening export file: {:?}", path);

        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: BufRead> TraceSource<R> {
    /// Read the header from any buffered reader
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => TraceHeader::parse(line?.trim_end()),
            None => return Err(DecoderError::EmptyExport),
        };
        log::debug!("Export header has {} columns", header.len());

        Ok(Self {
            header,
            lines,
            line_no: 1,
            repaired: 0,
        })
    }

    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    /// Number of records re-joined so far
    pub fn repaired(&self) -> usize {
        self.repaired
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(line.map(|l| l.trim_end().to_string()).map_err(DecoderError::from))
    }
}

impl<R: BufRead> Iterator for TraceSource<R> {
    type Item = Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        // Blank lines never start a record
        let line = loop {
            match self.next_line()? {
                Ok(line) if line.is_empty() => continue,
                other => break other,
            }
        };
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(e)),
        };

        let start = self.line_no;
        let mut fields: Vec<String> = line.split(',').map(str::to_string).collect();

        while fields.len() < self.header.len() {
            let continuation = match self.next_line() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            };
            let mut rest = continuation.split(',');
            if let (Some(last), Some(first)) = (fields.last_mut(), rest.next()) {
                last.push('\n');
                last.push_str(first);
            }
            fields.extend(rest.map(str::to_string));
        }

        if self.line_no > start {
            self.repaired += 1;
            log::debug!(
                "Re-joined record at line {} across {} lines ({} fields)",
                start,
                self.line_no - start + 1,
                fields.len()
            );
        }

        Some(Ok(TraceRecord::new(start, fields)))
    }
}
