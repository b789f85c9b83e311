use crate::error::{Error, Result};
use crate::stages::StageLabelMap;

/// Immutable engine configuration, passed in at construction.
///
/// Values are plain data loaded by the embedding application (environment,
/// flags, whatever) — the engine never reads ambient process state, which
/// keeps it testable in isolation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Page size for interactive browsing cursors.
    pub browse_page_size: usize,
    /// Page size for the bulk fetches (task listing, event histories).
    pub fetch_page_size: usize,
    /// Fire the progress sink after every this many processed tasks.
    pub progress_step: usize,
    /// Bound on concurrently running per-task fetches (remote rate limits).
    pub max_concurrency: usize,
    /// Retries per failed page fetch, applied at the fetch boundary only.
    pub max_retries: u32,
    /// On cancellation, return the settled portion of the report (marked
    /// incomplete) instead of `Error::Cancelled`.
    pub partial_on_cancel: bool,
    /// Explicit label→stage table. When absent, the table is derived per
    /// project from its label list by naming convention.
    pub stage_map: Option<StageLabelMap>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            browse_page_size: 4,
            fetch_page_size: 100,
            progress_step: 10,
            max_concurrency: 4,
            max_retries: 3,
            partial_on_cancel: false,
            stage_map: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.browse_page_size == 0 || self.fetch_page_size == 0 {
            return Err(Error::Config("page sizes must be positive".into()));
        }
        if self.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be positive".into()));
        }
        if self.progress_step == 0 {
            return Err(Error::Config("progress_step must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.browse_page_size, 4);
        assert_eq!(config.progress_step, 10);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = EngineConfig {
            fetch_page_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = EngineConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
