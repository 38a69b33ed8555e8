//! Trace export readers
//!
//! Each reader turns an exported trace into a header plus an ordered stream of
//! [`TraceRecord`](crate::types::TraceRecord)s.

pub mod export;

pub use export::TraceSource;
