//! Text reports
//!
//! Renders a [`Decoded`] export as the plain text the tool prints: the row
//! listing (optionally projected onto one column), the CAN special report,
//! the I2C address report and the S-record stream. Every writer takes any
//! `io::Write` so the same code serves stdout, `--output` files and tests.

use anyhow::{Context, Result};
use logic_trace_decoder::types::{unquote, Fields};
use logic_trace_decoder::{
    encode_srecords, CanGrouping, Decoded, I2cTransaction, Reconstruction, SpiOutput,
    TraceHeader, TraceRecord,
};
use std::io::Write;

const CAN_SPACER: &str = "|";

/// Write the text report for a decoded export
///
/// Binary SPI output has no text form; the caller writes those artifacts.
pub fn write_report<W: Write>(
    out: &mut W,
    decoded: &Decoded,
    column: Option<&str>,
    separated: bool,
) -> Result<()> {
    match &decoded.reconstruction {
        Reconstruction::Records { records } => match column {
            Some(column) => write_column(out, &decoded.header, records, column),
            None => write_listing(out, &decoded.header, records, separated),
        },
        Reconstruction::SpiReads {
            output: SpiOutput::SRecord,
            transactions,
            ..
        } => {
            for record in encode_srecords(transactions) {
                writeln!(out, "{}", record)?;
            }
            Ok(())
        }
        Reconstruction::SpiReads { .. } => Ok(()),
        Reconstruction::CanFrames { grouping } => write_can_report(out, grouping),
        Reconstruction::I2cScan {
            address,
            transactions,
        } => write_i2c_report(out, &decoded.header, address, transactions),
    }
}

/// Header, blank line, then every record; context blocks surround anchors
///
/// With `separated` set, each anchor group ends with a blank line.
pub fn write_listing<W: Write>(
    out: &mut W,
    header: &TraceHeader,
    records: &[TraceRecord],
    separated: bool,
) -> Result<()> {
    writeln!(out, "{}", header.columns().join(","))?;
    writeln!(out)?;

    for record in records {
        write_rows(out, record.before.as_deref())?;
        writeln!(out, "{}", record.raw_line())?;
        write_rows(out, record.after.as_deref())?;
        if separated {
            writeln!(out)?;
        }
    }
    Ok(())
}

fn write_rows<W: Write>(out: &mut W, rows: Option<&[Fields]>) -> Result<()> {
    for row in rows.unwrap_or_default() {
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

/// Non-empty values of one column, one per line
pub fn write_column<W: Write>(
    out: &mut W,
    header: &TraceHeader,
    records: &[TraceRecord],
    column: &str,
) -> Result<()> {
    let pos = header
        .require(column)
        .with_context(|| format!("Cannot project column '{}'", column))?;

    writeln!(out, "Column Filter: {}", column)?;
    writeln!(out)?;
    for value in records.iter().filter_map(|r| r.field(pos)) {
        if !value.is_empty() {
            writeln!(out, "{}", value)?;
        }
    }
    Ok(())
}

/// Identifier tally followed by every frame's bytes with their text rendering
pub fn write_can_report<W: Write>(out: &mut W, grouping: &CanGrouping) -> Result<()> {
    writeln!(out, "CAN Special Output")?;
    for (identifier, count) in grouping.tally.iter() {
        writeln!(out, "ID: {}\tCount:{}", identifier, count)?;
    }
    writeln!(out)?;

    for frame in &grouping.frames {
        writeln!(out, "{}", frame.identifier)?;
        for byte in &frame.data {
            writeln!(out, "{}{:>4}{:>4}", byte, CAN_SPACER, byte_text(byte))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Text rendering of a hex data field; undecodable bytes become U+FFFD
fn byte_text(field: &str) -> String {
    let digits = unquote(field);
    let digits = match digits.find("0x") {
        Some(pos) => &digits[pos + 2..],
        None => digits,
    };
    match hex::decode(digits) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            log::debug!("CAN data '{}' is not hex: {}", field, e);
            String::new()
        }
    }
}

/// Matched address rows, each followed by its data rows
pub fn write_i2c_report<W: Write>(
    out: &mut W,
    header: &TraceHeader,
    address: &str,
    transactions: &[I2cTransaction],
) -> Result<()> {
    // Legacy exports have no data rows, so no group separators either
    let grouped = header.contains("address");

    writeln!(out, "Address: {}", address)?;
    for transaction in transactions {
        writeln!(out, "{}", transaction.address_row.raw_line())?;
        for row in &transaction.data_rows {
            writeln!(out, "{}", row.raw_line())?;
        }
        if grouped {
            writeln!(out)?;
        }
    }
    Ok(())
}
