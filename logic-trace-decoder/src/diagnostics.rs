//! Non-fatal findings raised while reconstructing a trace
//!
//! Anything that does not abort the run (skipped rows, an unknown device name,
//! a read command whose data cannot be recovered) is recorded here and logged.

use crate::types::SpiCommand;
use serde::Serialize;
use std::fmt;

/// Row-level warnings logged before further ones are suppressed
const MAX_ROW_WARNINGS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A row was excluded from reconstruction
    RowSkipped { line: usize, reason: String },
    /// The requested device profile does not exist; DEFAULT was used
    UnknownDevice { name: String },
    /// A read command was recognised but its data cannot be recovered
    UnsupportedVariant { line: usize, command: SpiCommand },
    /// A transaction was still open when the stream ended
    UnterminatedTransaction { line: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::RowSkipped { line, reason } => write!(f, "Skipping line {}: {}", line, reason),
            Diagnostic::UnknownDevice { name } => {
                write!(f, "Unknown device '{}', using DEFAULT", name)
            }
            Diagnostic::UnsupportedVariant { line, command } => write!(
                f,
                "{} at line {}: data recovery is not supported, only counting cycles",
                command, line
            ),
            Diagnostic::UnterminatedTransaction { line } => write!(
                f,
                "Transaction started at line {} was not terminated before end of trace",
                line
            ),
        }
    }
}

/// Collects diagnostics and logs them as they arrive
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    row_warnings: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::RowSkipped { .. } => {
                self.row_warnings += 1;
                if self.row_warnings <= MAX_ROW_WARNINGS {
                    log::warn!("{}", diagnostic);
                } else if self.row_warnings == MAX_ROW_WARNINGS + 1 {
                    log::warn!("... suppressing further row warnings");
                } else {
                    log::debug!("{}", diagnostic);
                }
            }
            _ => log::warn!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    /// Record a skipped row
    pub fn skip_row(&mut self, line: usize, reason: impl Into<String>) {
        self.push(Diagnostic::RowSkipped {
            line,
            reason: reason.into(),
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn rows_skipped(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| matches!(d, Diagnostic::RowSkipped { .. }))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_warnings_are_all_collected() {
        let mut diagnostics = Diagnostics::new();
        for line in 0..(MAX_ROW_WARNINGS + 5) {
            diagnostics.skip_row(line, "bad field count");
        }
        diagnostics.push(Diagnostic::UnknownDevice {
            name: "MX25".to_string(),
        });

        assert_eq!(diagnostics.rows_skipped(), MAX_ROW_WARNINGS + 5);
        assert_eq!(diagnostics.len(), MAX_ROW_WARNINGS + 6);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::UnsupportedVariant {
            line: 7,
            command: SpiCommand::FastQuadRead,
        };
        assert_eq!(
            d.to_string(),
            "FAST_QUAD_READ at line 7: data recovery is not supported, only counting cycles"
        );
    }
}
