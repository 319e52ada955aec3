//! A bounded pool of worker threads for CPU-bound one-shot work.
//!
//! A [`WorkerPool`] runs a [`Job`] on isolated execution units (OS threads) and hands the
//! results back as futures, so async code never blocks on hashing, compression and the
//! like.
//!
//! - idle units are reused first, new units are spawned lazily up to `max`
//! - once `max` units are busy, requests wait in a FIFO queue
//! - a unit that panics fails only the request it was running, the pool replenishes itself
//!   back to `min` standing units
//!
//! Pools are created through a [`PoolManager`], which keeps pool names unique.
//!
//! # Example
//!
//! ```no_run
//! use micro_pool::{job_fn, PoolManager, PoolOptions};
//!
//! # async fn example() -> Result<(), micro_pool::PoolError> {
//! let manager = PoolManager::new();
//! let pool = manager.create_pool("square", job_fn(|n: u64| n * n), PoolOptions::new(1, 4))?;
//!
//! assert_eq!(pool.run(12).await?, 144);
//! manager.terminate(pool).await;
//! # Ok(())
//! # }
//! ```

mod error;
mod job;
mod manager;
mod pool;
mod unit;

pub use error::PoolError;
pub use job::job_fn;
pub use job::FnJob;
pub use job::Job;
pub use manager::PoolManager;
pub use pool::PoolOptions;
pub use pool::PoolStats;
pub use pool::WorkerPool;
