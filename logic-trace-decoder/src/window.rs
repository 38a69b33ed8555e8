//! Context window filter
//!
//! Without a pattern every record passes through untouched. With a pattern,
//! only matching records (anchors) are emitted, each carrying up to `before`
//! preceding non-matching rows and up to `after` following ones:
//!
//! - Non-matching rows go into a FIFO of the `before` most recent rows. An
//!   anchor takes the whole FIFO, which is then cleared.
//! - Non-matching rows following an anchor are also appended to that anchor's
//!   `after` list until it holds `after` rows; the anchor is emitted then, or
//!   when the next anchor arrives, or at end of stream.
//! - A capacity of zero disables that side; the context stays `None`.

use crate::types::{Fields, Result, TraceRecord};
use regex::Regex;
use std::collections::VecDeque;

/// Iterator adapter attaching context to matching records
pub struct ContextWindow<I> {
    records: I,
    pattern: Option<Regex>,
    before_capacity: usize,
    after_capacity: usize,
    before: VecDeque<Fields>,
    /// Most recent anchor, still collecting `after` rows
    pending: Option<TraceRecord>,
    ready: VecDeque<TraceRecord>,
    exhausted: bool,
}

impl<I> ContextWindow<I>
where
    I: Iterator<Item = Result<TraceRecord>>,
{
    pub fn new(records: I, pattern: Option<Regex>, before: usize, after: usize) -> Self {
        Self {
            records,
            pattern,
            before_capacity: before,
            after_capacity: after,
            before: VecDeque::with_capacity(before),
            pending: None,
            ready: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Window that passes every record through
    pub fn passthrough(records: I) -> Self {
        Self::new(records, None, 0, 0)
    }

    fn observe(&mut self, record: TraceRecord) {
        let matched = match &self.pattern {
            Some(pattern) => pattern.is_match(&record.raw_line()),
            None => {
                self.ready.push_back(record);
                return;
            }
        };

        if matched {
            self.anchor(record);
        } else {
            self.context(record.fields);
        }
    }

    fn anchor(&mut self, mut record: TraceRecord) {
        log::trace!("Anchor at line {}", record.line);

        if let Some(previous) = self.pending.take() {
            self.ready.push_back(previous);
        }
        if self.before_capacity > 0 {
            record.before = Some(self.before.drain(..).collect());
        }
        if self.after_capacity > 0 {
            record.after = Some(Vec::with_capacity(self.after_capacity));
            self.pending = Some(record);
        } else {
            self.ready.push_back(record);
        }
    }

    fn context(&mut self, fields: Fields) {
        if let Some(anchor) = self.pending.as_mut() {
            let after = anchor.after.get_or_insert_with(Vec::new);
            after.push(fields.clone());
            if after.len() >= self.after_capacity {
                if let Some(full) = self.pending.take() {
                    self.ready.push_back(full);
                }
            }
        }

        if self.before_capacity > 0 {
            if self.before.len() == self.before_capacity {
                self.before.pop_front();
            }
            self.before.push_back(fields);
        }
    }
}

impl<I> Iterator for ContextWindow<I>
where
    I: Iterator<Item = Result<TraceRecord>>,
{
    type Item = Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(Ok(record));
            }
            if self.exhausted {
                return None;
            }
            match self.records.next() {
                Some(Ok(record)) => self.observe(record),
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.exhausted = true;
                    if let Some(last) = self.pending.take() {
                        self.ready.push_back(last);
                    }
                }
            }
        }
    }
}
