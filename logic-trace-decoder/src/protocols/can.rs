//! CAN frame grouping
//!
//! The CAN analyzer exports one row per frame field. An `identifier_field` row
//! opens a frame, the `data_field` rows after it supply its payload in order,
//! and the next `identifier_field` row closes it. The last frame is closed at
//! end of stream.

use super::Reconstructor;
use crate::diagnostics::Diagnostics;
use crate::types::{CanFrame, CanGrouping, Result, TraceHeader, TraceRecord};

const IDENTIFIER_FIELD: &str = "identifier_field";
const DATA_FIELD: &str = "data_field";

/// Groups identifier and data rows into frames
pub struct CanGrouper {
    kind: usize,
    identifier: usize,
    data: usize,
    width: usize,
    open: Option<CanFrame>,
    grouping: CanGrouping,
}

impl CanGrouper {
    pub fn new(header: &TraceHeader) -> Result<Self> {
        Ok(Self {
            kind: header.require("type")?,
            identifier: header.require("identifier")?,
            data: header.require("data")?,
            width: header.len(),
            open: None,
            grouping: CanGrouping::default(),
        })
    }

    fn close(&mut self) {
        if let Some(frame) = self.open.take() {
            self.grouping.frames.push(frame);
        }
    }
}

impl Reconstructor for CanGrouper {
    type Output = CanGrouping;

    fn push(&mut self, record: TraceRecord, diagnostics: &mut Diagnostics) {
        if record.fields.len() != self.width {
            diagnostics.skip_row(
                record.line,
                format!("expected {} fields, found {}", self.width, record.fields.len()),
            );
            return;
        }

        match record.value(self.kind) {
            Some(IDENTIFIER_FIELD) => {
                self.close();
                let identifier = record.field(self.identifier).unwrap_or_default();
                self.grouping.tally.record(identifier);
                self.open = Some(CanFrame::new(identifier, record.line));
            }
            Some(DATA_FIELD) => match self.open.as_mut() {
                Some(frame) => frame
                    .data
                    .push(record.field(self.data).unwrap_or_default().to_string()),
                None => log::debug!("Data field at line {} outside any frame", record.line),
            },
            _ => {}
        }
    }

    fn finish(mut self, _diagnostics: &mut Diagnostics) -> Self::Output {
        self.close();
        log::info!(
            "Grouped {} CAN frames ({} identifiers)",
            self.grouping.frames.len(),
            self.grouping.tally.len()
        );
        self.grouping
    }
}
