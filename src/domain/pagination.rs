use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("offset must not be negative")]
    NegativeOffset,
    #[error("limit must be positive")]
    NonPositiveLimit,
}

/// Offset/limit window applied after ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    /// Resolves client supplied values. A missing limit falls back to `default_limit`
    /// and any limit is capped at `max_limit`.
    ///
    /// # Errors
    /// Returns `PageError` if the offset is negative or the limit is not positive.
    pub fn resolve(
        offset: Option<i64>,
        limit: Option<i64>,
        default_limit: i64,
        max_limit: i64,
    ) -> Result<Self, PageError> {
        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(PageError::NegativeOffset);
        }
        let limit = limit.unwrap_or(default_limit);
        if limit <= 0 {
            return Err(PageError::NonPositiveLimit);
        }
        Ok(Self { offset, limit: limit.min(max_limit) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        assert_eq!(Page::resolve(None, None, 20, 100), Ok(Page { offset: 0, limit: 20 }));
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(Page::resolve(Some(5), Some(1000), 20, 100), Ok(Page { offset: 5, limit: 100 }));
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(Page::resolve(Some(-1), None, 20, 100), Err(PageError::NegativeOffset));
        assert_eq!(Page::resolve(None, Some(0), 20, 100), Err(PageError::NonPositiveLimit));
    }
}
