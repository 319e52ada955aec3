use crate::error::PoolError;
use crate::job::Job;
use crate::pool::{PoolOptions, WorkerPool};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Owns the names of the pools it created, so each name backs at most one live pool.
///
/// The manager is an ordinary value: whoever composes the pools keeps it and passes it by
/// reference.
#[derive(Debug, Default)]
pub struct PoolManager {
    names: Mutex<HashSet<String>>,
}

impl PoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and pre-warms a pool under `name`.
    ///
    /// Fails with [`PoolError::AlreadyExists`] when a pool with the same name is still
    /// registered. Must be called from within a tokio runtime.
    pub fn create_pool<J: Job>(
        &self,
        name: impl Into<String>,
        job: J,
        options: PoolOptions,
    ) -> Result<WorkerPool<J>, PoolError> {
        let name = name.into();
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        if names.contains(&name) {
            warn!(pool = %name, "pool already exists");
            return Err(PoolError::already_exists(name));
        }

        let pool = WorkerPool::start(name.clone(), job, options)?;
        names.insert(name);
        Ok(pool)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().unwrap_or_else(PoisonError::into_inner).contains(name)
    }

    /// Terminates the pool and frees its name.
    pub async fn terminate<J: Job>(&self, pool: WorkerPool<J>) {
        pool.terminate().await;
        self.names.lock().unwrap_or_else(PoisonError::into_inner).remove(pool.name());
    }
}

#[cfg(test)]
mod tests {
    use super::PoolManager;
    use crate::error::PoolError;
    use crate::job::job_fn;
    use crate::pool::PoolOptions;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_names_are_unique() {
        let manager = PoolManager::new();

        let pool = manager.create_pool("/parallel/2", job_fn(|n: u8| n), PoolOptions::new(1, 2)).unwrap();
        let duplicate = manager.create_pool("/parallel/2", job_fn(|n: u8| n), PoolOptions::new(1, 2));
        assert!(matches!(duplicate, Err(PoolError::AlreadyExists { .. })));
        assert!(manager.contains("/parallel/2"));

        manager.terminate(pool).await;
        assert!(!manager.contains("/parallel/2"));

        let again = manager.create_pool("/parallel/2", job_fn(|n: u8| n), PoolOptions::new(0, 1)).unwrap();
        assert_eq!(again.run(9).await.unwrap(), 9);
        manager.terminate(again).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_invalid_options_do_not_reserve_name() {
        let manager = PoolManager::new();

        let result = manager.create_pool("broken", job_fn(|n: u8| n), PoolOptions::new(2, 1));
        assert!(matches!(result, Err(PoolError::InvalidOptions { min: 2, max: 1 })));
        assert!(!manager.contains("broken"));
    }
}
