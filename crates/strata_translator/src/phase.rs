//! The step a read is in.
//!
//! Every thread checks the step to decide what to do with a new
//! connection, so it lives in an atomic and only moves forward through
//! [`ReadPhase::advance`].

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{ReadError, ReadResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ReadStep {
    NotStarted = 0,
    /// Walking the stage and creating nodes; connections are queued
    Traverse = 1,
    /// Each thread resolves the connections it queued
    ProcessConnections = 2,
    /// Unresolved connections are retried and applied immediately
    DanglingConnections = 3,
    Finished = 4,
}

impl ReadStep {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ReadStep::Traverse,
            2 => ReadStep::ProcessConnections,
            3 => ReadStep::DanglingConnections,
            4 => ReadStep::Finished,
            _ => ReadStep::NotStarted,
        }
    }

    /// The only step allowed after this one.
    pub fn next(self) -> Option<ReadStep> {
        match self {
            ReadStep::NotStarted => Some(ReadStep::Traverse),
            ReadStep::Traverse => Some(ReadStep::ProcessConnections),
            ReadStep::ProcessConnections => Some(ReadStep::DanglingConnections),
            ReadStep::DanglingConnections => Some(ReadStep::Finished),
            ReadStep::Finished => None,
        }
    }
}

/// Shared, thread-safe read step.
#[derive(Debug)]
pub struct ReadPhase(AtomicU8);

impl Default for ReadPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadPhase {
    pub fn new() -> Self {
        Self(AtomicU8::new(ReadStep::NotStarted as u8))
    }

    pub fn get(&self) -> ReadStep {
        ReadStep::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next`, which must directly follow the current step.
    pub fn advance(&self, next: ReadStep) -> ReadResult<()> {
        let current = self.get();
        if current.next() != Some(next) {
            return Err(ReadError::StepOrder { from: current, to: next });
        }
        self.0
            .compare_exchange(current as u8, next as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| ReadError::StepOrder {
                from: ReadStep::from_u8(actual),
                to: next,
            })
    }

    /// Back to `NotStarted` before a new read.
    pub fn reset(&self) {
        self.0.store(ReadStep::NotStarted as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_in_order() {
        let phase = ReadPhase::new();
        assert_eq!(phase.get(), ReadStep::NotStarted);

        for step in [
            ReadStep::Traverse,
            ReadStep::ProcessConnections,
            ReadStep::DanglingConnections,
            ReadStep::Finished,
        ] {
            phase.advance(step).unwrap();
            assert_eq!(phase.get(), step);
        }
        assert!(phase.advance(ReadStep::Traverse).is_err());
    }

    #[test]
    fn test_out_of_order_rejected() {
        let phase = ReadPhase::new();
        let err = phase.advance(ReadStep::ProcessConnections).unwrap_err();
        assert!(matches!(
            err,
            ReadError::StepOrder {
                from: ReadStep::NotStarted,
                to: ReadStep::ProcessConnections
            }
        ));
        assert_eq!(phase.get(), ReadStep::NotStarted);

        phase.advance(ReadStep::Traverse).unwrap();
        assert!(phase.advance(ReadStep::DanglingConnections).is_err());
        assert!(phase.advance(ReadStep::Traverse).is_err());
        assert_eq!(phase.get(), ReadStep::Traverse);

        phase.reset();
        assert_eq!(phase.get(), ReadStep::NotStarted);
    }
}
