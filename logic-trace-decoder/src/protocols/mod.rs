//! Protocol reconstructors
//!
//! Each reconstructor is a state machine fed one record at a time, in capture
//! order. Column positions are resolved from the header when the reconstructor
//! is built, so a missing column fails before any row is read.

pub mod can;
pub mod i2c;
pub mod spi;

pub use can::CanGrouper;
pub use i2c::I2cScanner;
pub use spi::SpiReconstructor;

use crate::diagnostics::Diagnostics;
use crate::types::{Result, TraceRecord};

/// A state machine turning ordered records into higher-level output
pub trait Reconstructor {
    type Output;

    /// Consume the next record
    fn push(&mut self, record: TraceRecord, diagnostics: &mut Diagnostics);

    /// Close whatever is still open and return the result
    fn finish(self, diagnostics: &mut Diagnostics) -> Self::Output;
}

/// Drive a reconstructor over a record stream
pub fn run<R, I>(mut reconstructor: R, records: I, diagnostics: &mut Diagnostics) -> Result<R::Output>
where
    R: Reconstructor,
    I: IntoIterator<Item = Result<TraceRecord>>,
{
    for record in records {
        reconstructor.push(record?, diagnostics);
    }
    Ok(reconstructor.finish(diagnostics))
}
