//! SPI flash read reconstruction
//!
//! Rebuilds the reads a host issued to a SPI NOR flash from a byte-per-row SPI
//! export. Each read starts with an opcode on MOSI, followed by:
//!
//! ```text
//! READ            03 | A2 A1 A0 | D D D ...             (data on MISO)
//! FAST_READ       0B | A2 A1 A0 | dummy | D D D ...     (data on MISO)
//! FAST_DUAL_READ  3B | A2 A1 A0 | dummy | DD DD ...     (data on MISO + MOSI)
//! FAST_QUAD_READ  EB | cycles counted only
//! ```
//!
//! ## Transaction boundaries
//! - Typed exports (with a `type` column) mark chip-select release with a
//!   `disable` row, which closes the open read. Only the first `result` row
//!   after a release can carry an opcode.
//! - Untyped exports have no such marker. A read is closed when a valid opcode
//!   shows up on MOSI at cycle 5 or later; that row then starts the next read.
//!   A data byte that happens to equal an opcode will split a read.

use super::Reconstructor;
use crate::devices::DeviceProfile;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::types::{parse_hex_byte, Result, SpiCommand, SpiTransaction, TraceHeader, TraceRecord};

/// Address bytes following every read opcode
const ADDRESS_CYCLES: u32 = 3;

/// First cycle at which an opcode may start a new read in untyped exports
const BOUNDARY_MIN_CYCLE: u32 = 5;

const DISABLE_MARKER: &str = "disable";
const RESULT_MARKER: &str = "result";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// `type` column at this position carries `disable`/`result`
    Marker(usize),
    /// No `type` column; boundaries inferred from opcodes
    Heuristic,
}

#[derive(Debug)]
enum SpiState {
    /// Next cycle may carry an opcode
    Idle,
    /// First cycle was not a read; waiting for chip-select release
    CommandWait,
    /// Inside a read; `cycle` is the number of the next cycle
    InTransaction { cycle: u32, tx: SpiTransaction },
}

/// Spread a nibble onto the even bit positions 6, 4, 2, 0
fn spread_nibble(nibble: u8) -> u8 {
    ((nibble & 0x8) << 3) | ((nibble & 0x4) << 2) | ((nibble & 0x2) << 1) | (nibble & 0x1)
}

/// Gather the even bit positions 6, 4, 2, 0 back into a nibble
fn gather_nibble(byte: u8) -> u8 {
    ((byte >> 3) & 0x8) | ((byte >> 2) & 0x4) | ((byte >> 1) & 0x2) | (byte & 0x1)
}

/// Recover the two bytes transferred during one dual-I/O cycle pair
///
/// IO1 (MISO) carries bits 7, 5, 3, 1 and IO0 (MOSI) bits 6, 4, 2, 0 of each
/// output byte. The high nibbles of both lines form the first byte, the low
/// nibbles the second.
pub fn interleave_dual(data_line: u8, command_line: u8) -> [u8; 2] {
    let upper = (spread_nibble(data_line >> 4) << 1) | spread_nibble(command_line >> 4);
    let lower = (spread_nibble(data_line & 0x0F) << 1) | spread_nibble(command_line & 0x0F);
    [upper, lower]
}

/// Inverse of [`interleave_dual`]: returns `(data_line, command_line)`
pub fn deinterleave_dual(bytes: [u8; 2]) -> (u8, u8) {
    let [upper, lower] = bytes;
    let data_line = (gather_nibble(upper >> 1) << 4) | gather_nibble(lower >> 1);
    let command_line = (gather_nibble(upper) << 4) | gather_nibble(lower);
    (data_line, command_line)
}

/// Rebuilds flash reads from SPI cycles
pub struct SpiReconstructor {
    profile: DeviceProfile,
    mosi: usize,
    miso: usize,
    width: usize,
    boundary: Boundary,
    state: SpiState,
    transactions: Vec<SpiTransaction>,
}

impl SpiReconstructor {
    /// Resolve the SPI columns; fails if MOSI or MISO is missing
    pub fn new(header: &TraceHeader, profile: DeviceProfile) -> Result<Self> {
        let mosi = header.resolve_any(&["mosi", "MOSI"])?;
        let miso = header.resolve_any(&["miso", "MISO"])?;
        let boundary = header
            .position("type")
            .map(Boundary::Marker)
            .unwrap_or(Boundary::Heuristic);

        log::debug!(
            "SPI reconstruction for {} ({:?} boundaries)",
            profile.name,
            boundary
        );

        Ok(Self {
            profile,
            mosi,
            miso,
            width: header.len(),
            boundary,
            state: SpiState::Idle,
            transactions: Vec::new(),
        })
    }

    fn byte_at(&self, record: &TraceRecord, pos: usize, diagnostics: &mut Diagnostics) -> Option<u8> {
        let raw = record.field(pos).unwrap_or_default();
        let byte = parse_hex_byte(raw);
        if byte.is_none() {
            diagnostics.skip_row(record.line, format!("'{}' is not a hex byte", raw));
        }
        byte
    }

    fn close(&mut self) {
        if let SpiState::InTransaction { tx, .. } = std::mem::replace(&mut self.state, SpiState::Idle) {
            log::trace!(
                "{} at 0x{} closed with {} bytes",
                tx.command,
                tx.address_hex(),
                tx.data.len()
            );
            self.transactions.push(tx);
        }
    }

    fn detect(&self, mosi: u8, line: usize, diagnostics: &mut Diagnostics) -> SpiState {
        match self.profile.command_for(mosi) {
            Some(command) => {
                log::trace!("{} detected at line {}", command, line);
                if command == SpiCommand::FastQuadRead {
                    diagnostics.push(Diagnostic::UnsupportedVariant { line, command });
                }
                SpiState::InTransaction {
                    cycle: 1,
                    tx: SpiTransaction::new(command, line),
                }
            }
            None => match self.boundary {
                Boundary::Marker(_) => SpiState::CommandWait,
                Boundary::Heuristic => SpiState::Idle,
            },
        }
    }

    /// Apply one cycle to an open read; false if the row had to be skipped
    ///
    /// MOSI is only parsed on the cycles that use it (address and dual data);
    /// READ and FAST_READ data cycles depend on MISO alone.
    fn step(
        &self,
        cycle: u32,
        tx: &mut SpiTransaction,
        record: &TraceRecord,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let data_start = ADDRESS_CYCLES + tx.command.dummy_cycles() + 1;
        match tx.command {
            SpiCommand::FastQuadRead => {}
            _ if cycle <= ADDRESS_CYCLES => match self.byte_at(record, self.mosi, diagnostics) {
                Some(mosi) => tx.address.push(mosi),
                None => return false,
            },
            _ if cycle < data_start => {}
            SpiCommand::Read | SpiCommand::FastRead => match self.byte_at(record, self.miso, diagnostics) {
                Some(miso) => tx.data.push(miso),
                None => return false,
            },
            SpiCommand::FastDualRead => {
                let Some(mosi) = self.byte_at(record, self.mosi, diagnostics) else {
                    return false;
                };
                match self.byte_at(record, self.miso, diagnostics) {
                    Some(miso) => tx.data.extend(interleave_dual(miso, mosi)),
                    None => return false,
                }
            }
        }
        true
    }

    fn on_cycle(&mut self, record: &TraceRecord, diagnostics: &mut Diagnostics) {
        if self.boundary == Boundary::Heuristic
            && matches!(self.state, SpiState::InTransaction { cycle, .. } if cycle >= BOUNDARY_MIN_CYCLE)
            && record
                .field(self.mosi)
                .and_then(parse_hex_byte)
                .and_then(|mosi| self.profile.command_for(mosi))
                .is_some()
        {
            self.close();
        }

        self.state = match std::mem::replace(&mut self.state, SpiState::Idle) {
            SpiState::Idle => match self.byte_at(record, self.mosi, diagnostics) {
                Some(mosi) => self.detect(mosi, record.line, diagnostics),
                // The command slot after a release is used up even when unreadable
                None => match self.boundary {
                    Boundary::Marker(_) => SpiState::CommandWait,
                    Boundary::Heuristic => SpiState::Idle,
                },
            },
            SpiState::CommandWait => SpiState::CommandWait,
            SpiState::InTransaction { cycle, mut tx } => {
                let next = if self.step(cycle, &mut tx, record, diagnostics) {
                    cycle + 1
                } else {
                    cycle
                };
                SpiState::InTransaction { cycle: next, tx }
            }
        };
    }
}

impl Reconstructor for SpiReconstructor {
    type Output = Vec<SpiTransaction>;

    fn push(&mut self, record: TraceRecord, diagnostics: &mut Diagnostics) {
        if record.fields.len() != self.width {
            diagnostics.skip_row(
                record.line,
                format!("expected {} fields, found {}", self.width, record.fields.len()),
            );
            return;
        }

        match self.boundary {
            Boundary::Marker(pos) => match record.value(pos) {
                Some(DISABLE_MARKER) => self.close(),
                Some(RESULT_MARKER) => self.on_cycle(&record, diagnostics),
                _ => {}
            },
            Boundary::Heuristic => self.on_cycle(&record, diagnostics),
        }
    }

    fn finish(mut self, diagnostics: &mut Diagnostics) -> Self::Output {
        if let SpiState::InTransaction { tx, .. } = &self.state {
            diagnostics.push(Diagnostic::UnterminatedTransaction { line: tx.line });
            self.close();
        }
        log::info!("Reconstructed {} SPI reads", self.transactions.len());
        self.transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::DeviceRegistry;
    use crate::protocols::run;

    fn profile() -> DeviceProfile {
        DeviceRegistry::builtin().get("W25Q16JV").cloned().unwrap()
    }

    fn reconstruct(header: &str, rows: &[&str]) -> (Vec<SpiTransaction>, Diagnostics) {
        let header = TraceHeader::parse(header);
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| Ok(TraceRecord::new(i + 2, row.split(',').map(str::to_string).collect())));
        let mut diagnostics = Diagnostics::new();
        let spi = SpiReconstructor::new(&header, profile()).unwrap();
        let transactions = run(spi, records, &mut diagnostics).unwrap();
        (transactions, diagnostics)
    }

    const TYPED: &str = "name,type,start_time,duration,mosi,miso";

    fn result(mosi: &str, miso: &str) -> String {
        format!("\"SPI\",\"result\",0.1,0.1,{},{}", mosi, miso)
    }

    const DISABLE: &str = "\"SPI\",\"disable\",0.2,0.0,,";
    const ENABLE: &str = "\"SPI\",\"enable\",0.0,0.0,,";

    #[test]
    fn test_interleave_known_value() {
        assert_eq!(interleave_dual(0xF0, 0x0F), [0xAA, 0x55]);
        assert_eq!(interleave_dual(0x00, 0xFF), [0x55, 0x55]);
        assert_eq!(interleave_dual(0x80, 0x00), [0x80, 0x00]);
    }

    #[test]
    fn test_interleave_round_trip_all_pairs() {
        for data_line in 0..=255u8 {
            for command_line in 0..=255u8 {
                let bytes = interleave_dual(data_line, command_line);
                assert_eq!(deinterleave_dual(bytes), (data_line, command_line));
            }
        }
    }

    #[test]
    fn test_fast_read_skips_dummy_cycle() {
        let rows = [
            ENABLE.to_string(),
            result("0x0B", "0xFF"),
            result("0x12", "0xFF"),
            result("0x34", "0xFF"),
            result("0x56", "0xFF"),
            result("0x00", "0xEE"),
            result("0x00", "0x01"),
            result("0x00", "0x02"),
            DISABLE.to_string(),
        ];
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (transactions, diagnostics) = reconstruct(TYPED, &rows);

        assert!(diagnostics.is_empty());
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].command, SpiCommand::FastRead);
        assert_eq!(transactions[0].address_hex(), "123456");
        assert_eq!(transactions[0].data, vec![0x01, 0x02]);
    }

    #[test]
    fn test_non_read_command_waits_for_disable() {
        let rows = [
            result("0x9F", "0xFF"),
            result("0x03", "0xEF"),
            result("0x00", "0x40"),
            DISABLE.to_string(),
            result("0x03", "0xFF"),
            result("0x00", "0xFF"),
            result("0x00", "0xFF"),
            result("0x10", "0xFF"),
            result("0x00", "0x5A"),
            DISABLE.to_string(),
        ];
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (transactions, _) = reconstruct(TYPED, &rows);

        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].address_hex(), "000010");
        assert_eq!(transactions[0].data_hex(), vec!["5A"]);
    }

    #[test]
    fn test_quad_read_counts_cycles_only() {
        let rows = [
            result("0xEB", "0xFF"),
            result("0x00", "0x00"),
            result("0x00", "0x11"),
            DISABLE.to_string(),
        ];
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (transactions, diagnostics) = reconstruct(TYPED, &rows);

        assert_eq!(transactions.len(), 1);
        assert!(transactions[0].address.is_empty());
        assert!(transactions[0].data.is_empty());
        assert_eq!(
            diagnostics.entries(),
            &[Diagnostic::UnsupportedVariant {
                line: 2,
                command: SpiCommand::FastQuadRead
            }]
        );
    }

    #[test]
    fn test_untyped_boundary_on_next_opcode() {
        let (transactions, diagnostics) = reconstruct(
            "Time [s],Packet ID,MOSI,MISO",
            &[
                "0.1,0,0x03,0xFF",
                "0.2,0,0x00,0xFF",
                "0.3,0,0x01,0xFF",
                "0.4,0,0x00,0xFF",
                "0.5,0,0x00,0xAA",
                "0.6,0,0x00,0xBB",
                "0.7,1,0x03,0xFF",
                "0.8,1,0x00,0xFF",
                "0.9,1,0x02,0xFF",
                "1.0,1,0x00,0xFF",
                "1.1,1,0x00,0xCC",
            ],
        );

        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].address_hex(), "000100");
        assert_eq!(transactions[0].data_hex(), vec!["AA", "BB"]);
        assert_eq!(transactions[1].address_hex(), "000200");
        assert_eq!(transactions[1].data_hex(), vec!["CC"]);
        // Second read had no terminating opcode
        assert_eq!(
            diagnostics.entries(),
            &[Diagnostic::UnterminatedTransaction { line: 8 }]
        );
    }

    #[test]
    fn test_opcode_inside_address_does_not_split() {
        let (transactions, _) = reconstruct(
            "mosi,miso",
            &["0x03,0xFF", "0x03,0xFF", "0x0B,0xFF", "0x3B,0xFF", "0x00,0x42"],
        );
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].address_hex(), "030B3B");
        assert_eq!(transactions[0].data, vec![0x42]);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let rows = [
            result("0x03", "0xFF"),
            result("0x00", "0xFF"),
            "\"SPI\",\"result\",0.1".to_string(),
            result("0x00", "0xFF"),
            result("0x80", "0xFF"),
            result("0x00", "zz"),
            result("0x00", "0x7E"),
            DISABLE.to_string(),
        ];
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (transactions, diagnostics) = reconstruct(TYPED, &rows);

        assert_eq!(diagnostics.rows_skipped(), 2);
        assert_eq!(transactions[0].address_hex(), "000080");
        assert_eq!(transactions[0].data_hex(), vec!["7E"]);
    }

    #[test]
    fn test_read_data_needs_only_miso() {
        let rows = [
            result("0x03", "0xFF"),
            result("0x00", "0xFF"),
            result("0x00", "0xFF"),
            result("0x10", "0xFF"),
            result("", "0xAA"),
            result("", "0xBB"),
            DISABLE.to_string(),
            result("0x0B", "0xFF"),
            result("0x00", "0xFF"),
            result("0x00", "0xFF"),
            result("0x20", "0xFF"),
            result("", ""),
            result("", "0xCC"),
            DISABLE.to_string(),
        ];
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (transactions, diagnostics) = reconstruct(TYPED, &rows);

        assert!(diagnostics.is_empty());
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].address_hex(), "000010");
        assert_eq!(transactions[0].data_hex(), vec!["AA", "BB"]);
        // Blank dummy cycle still counts
        assert_eq!(transactions[1].address_hex(), "000020");
        assert_eq!(transactions[1].data_hex(), vec!["CC"]);
    }

    #[test]
    fn test_unreadable_first_row_uses_command_slot() {
        let rows = [
            result("zz", "0xFF"),
            result("0x03", "0xFF"),
            result("0x00", "0xFF"),
            result("0x00", "0xFF"),
            result("0x10", "0xFF"),
            result("0x00", "0x11"),
            DISABLE.to_string(),
            result("0x03", "0xFF"),
            result("0x00", "0xFF"),
            result("0x00", "0xFF"),
            result("0x20", "0xFF"),
            result("0x00", "0x5A"),
            DISABLE.to_string(),
        ];
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (transactions, diagnostics) = reconstruct(TYPED, &rows);

        assert_eq!(diagnostics.rows_skipped(), 1);
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].address_hex(), "000020");
        assert_eq!(transactions[0].data_hex(), vec!["5A"]);
    }

    #[test]
    fn test_untyped_dual_read_splits_on_opcode_data() {
        let (transactions, diagnostics) = reconstruct(
            "mosi,miso",
            &[
                "0x3B,0xFF",
                "0x00,0xFF",
                "0x01,0xFF",
                "0x00,0xFF",
                "0xFF,0xFF",
                "0x0F,0xF0",
                // MOSI carries data bits here, but 0x03 reads as a new opcode
                "0x03,0x00",
                "0x00,0xFF",
                "0x02,0xFF",
                "0x00,0xFF",
                "0x00,0x11",
            ],
        );

        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].command, SpiCommand::FastDualRead);
        assert_eq!(transactions[0].address_hex(), "000100");
        assert_eq!(transactions[0].data_hex(), vec!["AA", "55"]);
        assert_eq!(transactions[1].command, SpiCommand::Read);
        assert_eq!(transactions[1].address_hex(), "000200");
        assert_eq!(transactions[1].data_hex(), vec!["11"]);
        assert_eq!(
            diagnostics.entries(),
            &[Diagnostic::UnterminatedTransaction { line: 8 }]
        );
    }

    #[test]
    fn test_missing_miso_is_fatal() {
        let header = TraceHeader::parse("name,type,mosi");
        let result = SpiReconstructor::new(&header, profile());
        assert!(matches!(
            result,
            Err(crate::types::DecoderError::MissingColumn { .. })
        ));
    }
}
