//! I2C address scan
//!
//! Finds the rows whose address field contains a target string and collects
//! each one together with the `data` rows that immediately follow it. The
//! match is a case-sensitive substring test on the raw field, so `0x50` does
//! not match `0X50`.
//!
//! Legacy exports use an `Address` column and have no per-byte data rows;
//! there only the matching row itself is collected.

use super::Reconstructor;
use crate::diagnostics::Diagnostics;
use crate::types::{DecoderError, I2cTransaction, Result, TraceHeader, TraceRecord};

const DATA_MARKER: &str = "data";

/// Collects rows addressed to one I2C target
pub struct I2cScanner {
    target: String,
    address: usize,
    /// `type` column, when data rows should be followed
    kind: Option<usize>,
    width: usize,
    current: Option<I2cTransaction>,
    matches: Vec<I2cTransaction>,
}

impl I2cScanner {
    pub fn new(header: &TraceHeader, target: impl Into<String>) -> Result<Self> {
        let (address, kind) = match (header.position("address"), header.position("Address")) {
            (Some(pos), _) => (pos, header.position("type")),
            (None, Some(pos)) => (pos, None),
            (None, None) => {
                return Err(DecoderError::MissingColumn {
                    column: "address".to_string(),
                    available: header.names(),
                })
            }
        };

        Ok(Self {
            target: target.into(),
            address,
            kind,
            width: header.len(),
            current: None,
            matches: Vec::new(),
        })
    }

    fn is_data_row(&self, record: &TraceRecord) -> bool {
        self.kind
            .and_then(|pos| record.value(pos))
            .is_some_and(|kind| kind == DATA_MARKER)
    }

    fn close(&mut self) {
        if let Some(transaction) = self.current.take() {
            self.matches.push(transaction);
        }
    }
}

impl Reconstructor for I2cScanner {
    type Output = Vec<I2cTransaction>;

    fn push(&mut self, record: TraceRecord, diagnostics: &mut Diagnostics) {
        if record.fields.len() != self.width {
            diagnostics.skip_row(
                record.line,
                format!("expected {} fields, found {}", self.width, record.fields.len()),
            );
            return;
        }

        let is_data = self.is_data_row(&record);
        if let Some(current) = self.current.as_mut() {
            if is_data {
                current.data_rows.push(record);
                return;
            }
        }
        self.close();

        let addressed = record
            .field(self.address)
            .is_some_and(|field| field.contains(self.target.as_str()));
        if addressed {
            log::trace!("Address {} matched at line {}", self.target, record.line);
            self.current = Some(I2cTransaction::new(record));
        }
    }

    fn finish(mut self, _diagnostics: &mut Diagnostics) -> Self::Output {
        self.close();
        log::info!("Found {} I2C transactions for {}", self.matches.len(), self.target);
        self.matches
    }
}
