//! Result alias and small combinators over [`ErrorEnvelope`].

use crate::errors::ErrorEnvelope;

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Extension helpers for enriching envelope errors on the way up.
pub trait ResultExt<T> {
    /// Attach a metadata entry to the error, if any.
    fn with_metadata(self, key: &'static str, value: impl Into<String>) -> Result<T>;

    /// Attach the failing operation name to the error, if any.
    fn for_operation(self, operation: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_metadata(self, key: &'static str, value: impl Into<String>) -> Result<T> {
        self.map_err(|error| error.with_metadata(key, value))
    }

    fn for_operation(self, operation: &'static str) -> Result<T> {
        self.map_err(|error| error.with_metadata("operation", operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn with_metadata_only_touches_errors() {
        let ok: Result<u32> = Ok(3);
        assert!(matches!(ok.with_metadata("field", "x"), Ok(3)));

        let failed: Result<u32> = Err(ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad"));
        let enriched = failed.for_operation("checkpoint.save");
        assert!(enriched.is_err());
        if let Err(error) = enriched {
            assert_eq!(
                error.metadata.get("operation").map(String::as_str),
                Some("checkpoint.save")
            );
        }
    }
}
