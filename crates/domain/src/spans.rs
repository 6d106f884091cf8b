//! Line spans for chunk locations.

use crate::primitives::PrimitiveError;
use serde::{Deserialize, Serialize};

/// Inclusive line span with 1-indexed boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    start_line: u32,
    end_line: u32,
}

impl LineSpan {
    /// Construct a validated line span.
    pub const fn new(start_line: u32, end_line: u32) -> Result<Self, PrimitiveError> {
        if start_line == 0 || end_line == 0 {
            return Err(PrimitiveError::LineSpanNonPositive {
                start_line,
                end_line,
            });
        }

        if start_line > end_line {
            return Err(PrimitiveError::LineSpanStartAfterEnd {
                start_line,
                end_line,
            });
        }

        Ok(Self {
            start_line,
            end_line,
        })
    }

    /// Returns the starting line (1-indexed).
    #[must_use]
    pub const fn start_line(&self) -> u32 {
        self.start_line
    }

    /// Returns the ending line (1-indexed).
    #[must_use]
    pub const fn end_line(&self) -> u32 {
        self.end_line
    }

    /// Number of lines covered by the span.
    #[must_use]
    pub const fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_inverted_spans() {
        assert!(matches!(
            LineSpan::new(0, 3),
            Err(PrimitiveError::LineSpanNonPositive { .. })
        ));
        assert!(matches!(
            LineSpan::new(5, 3),
            Err(PrimitiveError::LineSpanStartAfterEnd { .. })
        ));
    }

    #[test]
    fn counts_inclusive_lines() -> Result<(), PrimitiveError> {
        assert_eq!(LineSpan::new(3, 3)?.line_count(), 1);
        assert_eq!(LineSpan::new(1, 40)?.line_count(), 40);
        Ok(())
    }
}
