//! Per-stream reordering options.

use std::fmt;
use std::ops::BitOr;

use super::error::SchedulerError;
use super::op::OpClass;

/// Bitmask selecting which op classes may overtake each other inside a stream.
///
/// Captured once at `Scheduler::init` and immutable until shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReorderOptions(u32);

impl ReorderOptions {
    /// Dispatch in admission order, one op in flight per stream.
    pub const STRICTLY_ORDERED: Self = Self(0);
    /// Reads may pass earlier reads.
    pub const REORDER_READS: Self = Self(1 << 0);
    /// Writes may pass earlier writes.
    pub const REORDER_WRITES: Self = Self(1 << 1);
    /// Reads may pass earlier writes.
    pub const REORDER_READS_AHEAD_OF_WRITES: Self = Self(1 << 2);
    /// Writes may pass earlier reads.
    pub const REORDER_WRITES_AHEAD_OF_READS: Self = Self(1 << 3);
    pub const FULLY_OUT_OF_ORDER: Self = Self(0b1111);

    /// Build from a raw bitmask, rejecting unknown bits.
    pub fn from_bits(bits: u32) -> Result<Self, SchedulerError> {
        if bits & !Self::FULLY_OUT_OF_ORDER.0 != 0 {
            return Err(SchedulerError::InvalidArgument(format!(
                "unknown reorder bits {bits:#x}"
            )));
        }
        Ok(Self(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_strict(self) -> bool {
        self.0 == 0
    }

    /// Whether `later` may be dispatched ahead of, or concurrently with, an
    /// earlier-admitted `earlier` op of the same stream.
    pub fn may_pass(self, later: OpClass, earlier: OpClass) -> bool {
        let flag = match (later, earlier) {
            (OpClass::Read, OpClass::Read) => Self::REORDER_READS,
            (OpClass::Write, OpClass::Write) => Self::REORDER_WRITES,
            (OpClass::Read, OpClass::Write) => Self::REORDER_READS_AHEAD_OF_WRITES,
            (OpClass::Write, OpClass::Read) => Self::REORDER_WRITES_AHEAD_OF_READS,
            _ => return false,
        };
        self.contains(flag)
    }
}

impl BitOr for ReorderOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ReorderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_strict() {
            return write!(f, "strict");
        }
        let names = [
            (Self::REORDER_READS, "reads"),
            (Self::REORDER_WRITES, "writes"),
            (Self::REORDER_READS_AHEAD_OF_WRITES, "reads-ahead-of-writes"),
            (Self::REORDER_WRITES_AHEAD_OF_READS, "writes-ahead-of-reads"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}
