//! The unit of work executed by a pool.
//!
//! A [`Job`] is shared by every execution unit of a pool, each unit calls [`Job::run`] with
//! one input at a time on its own thread. Implementations must therefore be `Send + Sync`
//! and should not block on async code.

use std::convert::Infallible;
use std::error::Error;
use std::marker::PhantomData;

pub trait Job: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;
    type Error: Into<Box<dyn Error + Send + Sync>> + Send + 'static;

    fn run(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;
}

/// a `Fn` holder which represents an infallible job
pub struct FnJob<F, I, O> {
    f: F,
    _phantom: PhantomData<fn(I) -> O>,
}

impl<F, I, O> std::fmt::Debug for FnJob<F, I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnJob").finish_non_exhaustive()
    }
}

pub fn job_fn<F, I, O>(f: F) -> FnJob<F, I, O>
where
    F: Fn(I) -> O + Send + Sync + 'static,
{
    FnJob { f, _phantom: PhantomData }
}

impl<F, I, O> Job for FnJob<F, I, O>
where
    F: Fn(I) -> O + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;
    type Error = Infallible;

    fn run(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        Ok((self.f)(input))
    }
}

#[cfg(test)]
mod tests {
    use super::{job_fn, Job};

    fn assert_is_job<J: Job>(_job: &J) {
        // no op
    }

    #[test]
    fn closure_is_job() {
        let job = job_fn(|input: u32| input * 2);
        assert_is_job(&job);
        assert_eq!(job.run(21).unwrap(), 42);
    }
}
