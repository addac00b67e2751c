use std::fmt::{Display, Formatter, Result};

use crate::assemble::Phase;

use AssembleError::*;

/// Contract violations surfaced by the linker.
///
/// Every variant indicates a broken producer, not a runtime condition;
/// callers are not expected to recover from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssembleError {
    /// An alignment width outside {0, 1, 4, 8, 16} was requested.
    InvalidAlignment { width: u32 },
    /// A phase-gated operation was invoked out of order.
    WrongPhase { expected: Phase, actual: Phase },
    /// Bytes were appended after both section passes had completed.
    AppendAfterAssembly,
    /// `get_linked_file` was called before any bytes were assembled.
    NothingAssembled,
}

impl AssembleError {
    fn message(&self) -> String {
        match self {
            InvalidAlignment { width } =>
                format!("invalid alignment width: {} (expected 0, 1, 4, 8, or 16)", width),
            WrongPhase { expected, actual } =>
                format!("operation invalid in phase {:?}; expected {:?}", actual, expected),
            AppendAfterAssembly =>
                String::from("cannot append bytes: both section passes are complete"),
            NothingAssembled =>
                String::from("cannot link: no bytes have been assembled"),
        }
    }
}

impl Display for AssembleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AssembleError {}
