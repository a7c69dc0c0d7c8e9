use super::types::SpoolConfig;
use crate::error::SpoolError;
use crate::policy::ConcurrencyPolicy;

impl SpoolConfig {
    /// Validate the config: reject zero-sized capacities, limits and windows.
    pub fn validate(&self) -> Result<(), SpoolError> {
        self.validate_queue()?;
        self.validate_pool()?;
        self.validate_flush()?;
        Ok(())
    }

    fn validate_queue(&self) -> Result<(), SpoolError> {
        if self.queue.capacity == Some(0) {
            return Err(SpoolError::Config(
                "queue.capacity must be at least 1 (omit it for an unbounded queue)".into(),
            ));
        }
        Ok(())
    }

    fn validate_pool(&self) -> Result<(), SpoolError> {
        if let ConcurrencyPolicy::Bounded { limit: 0 } = self.pool.policy {
            return Err(SpoolError::Config(
                "pool.policy bounded requires limit >= 1".into(),
            ));
        }
        if self.pool.batch_size == 0 {
            return Err(SpoolError::Config("pool.batch_size must be at least 1".into()));
        }
        Ok(())
    }

    fn validate_flush(&self) -> Result<(), SpoolError> {
        if self.flush.window_ms == 0 {
            return Err(SpoolError::Config("flush.window_ms must be at least 1".into()));
        }
        Ok(())
    }
}
