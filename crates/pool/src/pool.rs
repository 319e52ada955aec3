//! Pool coordinator and the handle callers talk to.
//!
//! The roster of execution units and the FIFO queue of waiting requests belong to a single
//! coordinator task. Callers, units and the handle only ever send it [`Command`]s, so no
//! lock guards the pool state.

use crate::error::PoolError;
use crate::job::Job;
use crate::unit::{Reply, Unit, UnitMessage};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Bounds of a pool: `min` units are kept standing, at most `max` run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    pub min: usize,
    pub max: usize,
}

impl PoolOptions {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    fn validate(&self) -> Result<(), PoolError> {
        if self.max == 0 || self.min > self.max {
            return Err(PoolError::invalid_options(self.min, self.max));
        }
        Ok(())
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self { min: 1, max: num_cpus::get() }
    }
}

/// A snapshot of the pool roster. `idle + busy == size` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub idle: usize,
    pub busy: usize,
    pub queued: usize,
}

pub(crate) enum Command<J: Job> {
    Run { input: J::Input, reply: Reply<J> },
    Idle { unit: usize },
    Exited { unit: usize },
    Stats { reply: oneshot::Sender<PoolStats> },
    Terminate { done: Option<oneshot::Sender<()>> },
}

/// Handle to a running pool.
///
/// Dropping the handle terminates the pool without waiting for it.
pub struct WorkerPool<J: Job> {
    name: String,
    options: PoolOptions,
    commands: UnboundedSender<Command<J>>,
}

impl<J: Job> std::fmt::Debug for WorkerPool<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("name", &self.name).field("options", &self.options).finish()
    }
}

impl<J: Job> WorkerPool<J> {
    /// Starts the coordinator and pre-warms `options.min` units.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn start(name: String, job: J, options: PoolOptions) -> Result<Self, PoolError> {
        options.validate()?;

        let (commands, receiver) = mpsc::unbounded_channel();
        let mut coordinator = Coordinator {
            name: name.clone(),
            job: Arc::new(job),
            options,
            units: Vec::with_capacity(options.min),
            queue: VecDeque::new(),
            next_unit_id: 0,
            terminating: false,
            waiters: Vec::new(),
            commands: commands.clone(),
        };

        for _ in 0..options.min {
            coordinator.spawn_unit()?;
        }

        info!(pool = %name, min = options.min, max = options.max, "pool started");
        tokio::spawn(coordinator.run(receiver));

        Ok(Self { name, options, commands })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> PoolOptions {
        self.options
    }

    /// Runs one input on the first free unit, a new unit, or after the queued ones.
    pub async fn run(&self, input: J::Input) -> Result<J::Output, PoolError> {
        let (reply, result) = oneshot::channel();
        self.commands.send(Command::Run { input, reply }).map_err(|_| PoolError::Terminated)?;
        result.await.unwrap_or(Err(PoolError::Terminated))
    }

    pub async fn stats(&self) -> PoolStats {
        let (reply, stats) = oneshot::channel();
        if self.commands.send(Command::Stats { reply }).is_err() {
            return PoolStats::default();
        }
        stats.await.unwrap_or_default()
    }

    /// Asks every unit to stop and resolves once the roster is empty.
    ///
    /// Requests still queued are rejected with [`PoolError::Terminated`], requests already
    /// running on a unit finish first.
    pub async fn terminate(&self) {
        let (done, finished) = oneshot::channel();
        if self.commands.send(Command::Terminate { done: Some(done) }).is_err() {
            return;
        }
        let _ = finished.await;
    }
}

impl<J: Job> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Terminate { done: None });
    }
}

struct Pending<J: Job> {
    input: J::Input,
    reply: Reply<J>,
}

struct Coordinator<J: Job> {
    name: String,
    job: Arc<J>,
    options: PoolOptions,
    units: Vec<Unit<J>>,
    queue: VecDeque<Pending<J>>,
    next_unit_id: usize,
    terminating: bool,
    waiters: Vec<oneshot::Sender<()>>,
    commands: UnboundedSender<Command<J>>,
}

impl<J: Job> Coordinator<J> {
    async fn run(mut self, mut receiver: UnboundedReceiver<Command<J>>) {
        while let Some(command) = receiver.recv().await {
            match command {
                Command::Run { input, reply } => self.submit(input, reply),
                Command::Idle { unit } => self.on_idle(unit),
                Command::Exited { unit } => self.on_exit(unit),
                Command::Stats { reply } => {
                    let _ = reply.send(self.stats());
                }
                Command::Terminate { done } => self.terminate(done),
            }

            if self.terminating && self.units.is_empty() {
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(());
                }
                info!(pool = %self.name, "pool terminated");
                break;
            }
        }
    }

    fn submit(&mut self, input: J::Input, reply: Reply<J>) {
        if self.terminating {
            let _ = reply.send(Err(PoolError::Terminated));
            return;
        }

        if let Some(index) = self.units.iter().position(|unit| !unit.is_busy()) {
            self.dispatch(index, input, reply);
            return;
        }

        if self.units.len() < self.options.max {
            match self.spawn_unit() {
                Ok(index) => self.dispatch(index, input, reply),
                Err(e) => {
                    error!(pool = %self.name, cause = %e, "can't grow pool");
                    let _ = reply.send(Err(e));
                }
            }
            return;
        }

        self.queue.push_back(Pending { input, reply });
        debug!(pool = %self.name, queued = self.queue.len(), "all units busy, request queued");
    }

    fn dispatch(&mut self, index: usize, input: J::Input, reply: Reply<J>) {
        let unit = &mut self.units[index];
        if let Err(UnitMessage::Run { reply, .. }) = unit.dispatch(input, reply) {
            warn!(pool = %self.name, unit = unit.id(), "dispatch to a dead execution unit");
            let _ = reply.send(Err(PoolError::unit_failure(unit.id(), "execution unit is gone")));
        }
    }

    fn on_idle(&mut self, id: usize) {
        let Some(index) = self.units.iter().position(|unit| unit.id() == id) else {
            return;
        };
        self.units[index].set_idle();

        if self.terminating {
            return;
        }
        if let Some(Pending { input, reply }) = self.queue.pop_front() {
            self.dispatch(index, input, reply);
        }
    }

    fn on_exit(&mut self, id: usize) {
        self.units.retain(|unit| unit.id() != id);
        debug!(pool = %self.name, unit = id, size = self.units.len(), "execution unit exited");

        if self.terminating {
            return;
        }

        while self.units.len() < self.options.min {
            if let Err(e) = self.spawn_unit() {
                error!(pool = %self.name, cause = %e, "can't replenish pool");
                break;
            }
        }

        // queued work may have been waiting on the unit that just went away
        while !self.queue.is_empty() {
            let index = match self.units.iter().position(|unit| !unit.is_busy()) {
                Some(index) => index,
                None if self.units.len() < self.options.max => match self.spawn_unit() {
                    Ok(index) => index,
                    Err(e) => {
                        error!(pool = %self.name, cause = %e, "can't grow pool");
                        break;
                    }
                },
                None => break,
            };
            if let Some(Pending { input, reply }) = self.queue.pop_front() {
                self.dispatch(index, input, reply);
            }
        }
    }

    fn terminate(&mut self, done: Option<oneshot::Sender<()>>) {
        if let Some(done) = done {
            self.waiters.push(done);
        }
        if self.terminating {
            return;
        }
        self.terminating = true;

        for Pending { reply, .. } in self.queue.drain(..) {
            let _ = reply.send(Err(PoolError::Terminated));
        }
        for unit in &self.units {
            unit.stop();
        }
        info!(pool = %self.name, size = self.units.len(), "pool terminating");
    }

    fn spawn_unit(&mut self) -> Result<usize, PoolError> {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        let unit = Unit::spawn(&self.name, id, Arc::clone(&self.job), self.commands.clone())?;
        self.units.push(unit);
        Ok(self.units.len() - 1)
    }

    fn stats(&self) -> PoolStats {
        let size = self.units.len();
        let busy = self.units.iter().filter(|unit| unit.is_busy()).count();
        PoolStats { size, idle: size - busy, busy, queued: self.queue.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::{PoolOptions, PoolStats, WorkerPool};
    use crate::error::PoolError;
    use crate::job::{job_fn, Job};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn sleepy_echo() -> impl Job<Input = (String, u64), Output = String> {
        job_fn(|(value, wait): (String, u64)| {
            thread::sleep(Duration::from_millis(wait));
            value
        })
    }

    async fn wait_for_stats<J: Job>(pool: &WorkerPool<J>, expected: impl Fn(&PoolStats) -> bool) -> PoolStats {
        let mut stats = pool.stats().await;
        for _ in 0..100 {
            if expected(&stats) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            stats = pool.stats().await;
        }
        stats
    }

    #[test]
    fn test_invalid_options() {
        assert!(PoolOptions::new(0, 0).validate().is_err());
        assert!(PoolOptions::new(3, 2).validate().is_err());
        assert!(PoolOptions::new(0, 1).validate().is_ok());
        assert!(PoolOptions::default().validate().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_prewarm_min_units() {
        let pool = WorkerPool::start("prewarm".into(), sleepy_echo(), PoolOptions::new(5, 8)).unwrap();

        let stats = pool.stats().await;
        assert_eq!(stats, PoolStats { size: 5, idle: 5, busy: 0, queued: 0 });

        pool.terminate().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_busy_units_and_results() {
        let pool = Arc::new(WorkerPool::start("busy".into(), sleepy_echo(), PoolOptions::new(5, 5)).unwrap());

        let first = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.run(("1".into(), 300)).await }
        });
        let second = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.run(("2".into(), 300)).await }
        });

        let stats = wait_for_stats(&pool, |stats| stats.busy == 2).await;
        assert_eq!(stats.idle, 3);
        assert_eq!(stats.idle + stats.busy, stats.size);

        assert_eq!(first.await.unwrap().unwrap(), "1");
        assert_eq!(second.await.unwrap().unwrap(), "2");

        let one = pool.run(("one".into(), 0)).await.unwrap();
        let two = pool.run(("two".into(), 0)).await.unwrap();
        assert_eq!(one, "one");
        assert_eq!(two, "two");

        pool.terminate().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_queue_when_max_reached() {
        let pool = Arc::new(WorkerPool::start("queue".into(), sleepy_echo(), PoolOptions::new(2, 2)).unwrap());

        let handles = ["1", "2", "3"]
            .into_iter()
            .map(|value| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.run((value.to_string(), 300)).await })
            })
            .collect::<Vec<_>>();

        let stats = wait_for_stats(&pool, |stats| stats.queued == 1).await;
        assert_eq!(stats, PoolStats { size: 2, idle: 0, busy: 2, queued: 1 });

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(results, vec!["1", "2", "3"]);

        pool.terminate().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bounded_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let job = {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            job_fn(move |n: usize| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
                n
            })
        };

        let pool = Arc::new(WorkerPool::start("bounded".into(), job, PoolOptions::new(0, 3)).unwrap());
        let handles = (0..12)
            .map(|n| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.run(n).await })
            })
            .collect::<Vec<_>>();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        results.sort_unstable();

        assert_eq!(results, (0..12).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(pool.stats().await.size <= 3);

        pool.terminate().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unit_failure_is_isolated() {
        let job = job_fn(|n: u32| {
            if n == 0 {
                panic!("boom");
            }
            n
        });
        let pool = WorkerPool::start("crash".into(), job, PoolOptions::new(2, 2)).unwrap();

        let result = pool.run(0).await;
        assert!(matches!(result, Err(PoolError::UnitFailure { .. })));

        let stats = wait_for_stats(&pool, |stats| stats.size == 2 && stats.idle == 2).await;
        assert_eq!(stats.size, 2);

        assert_eq!(pool.run(7).await.unwrap(), 7);

        pool.terminate().await;
    }

    struct Fallible;

    impl Job for Fallible {
        type Input = i32;
        type Output = i32;
        type Error = std::io::Error;

        fn run(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
            if input < 0 {
                return Err(std::io::Error::other("negative input"));
            }
            Ok(input)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_job_error_keeps_unit() {
        let pool = WorkerPool::start("fallible".into(), Fallible, PoolOptions::new(1, 1)).unwrap();

        let result = pool.run(-1).await;
        assert!(matches!(result, Err(PoolError::Job { .. })));
        assert_eq!(pool.run(3).await.unwrap(), 3);
        assert_eq!(pool.stats().await.size, 1);

        pool.terminate().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_terminate() {
        let pool = Arc::new(WorkerPool::start("terminate".into(), sleepy_echo(), PoolOptions::new(1, 1)).unwrap());

        let running = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.run(("running".into(), 200)).await }
        });
        wait_for_stats(&pool, |stats| stats.busy == 1).await;

        let queued = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.run(("queued".into(), 0)).await }
        });
        wait_for_stats(&pool, |stats| stats.queued == 1).await;

        pool.terminate().await;

        assert_eq!(running.await.unwrap().unwrap(), "running");
        assert!(matches!(queued.await.unwrap(), Err(PoolError::Terminated)));
        assert_eq!(pool.stats().await.size, 0);
        assert!(matches!(pool.run(("late".into(), 0)).await, Err(PoolError::Terminated)));
    }
}
