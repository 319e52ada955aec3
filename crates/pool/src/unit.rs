//! Execution units: one OS thread per unit, fed through a channel by the coordinator.
//!
//! A unit reports back to the coordinator with [`Command::Idle`] once a job finished and
//! with [`Command::Exited`] when its thread ends, whatever the reason. The job result
//! itself goes straight to the caller through the one-shot reply.

use crate::error::PoolError;
use crate::job::Job;
use crate::pool::Command;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::{debug, error};

pub(crate) type Reply<J> = oneshot::Sender<Result<<J as Job>::Output, PoolError>>;

pub(crate) enum UnitMessage<J: Job> {
    Run { input: J::Input, reply: Reply<J> },
    Stop,
}

pub(crate) struct Unit<J: Job> {
    id: usize,
    busy: bool,
    sender: mpsc::Sender<UnitMessage<J>>,
}

impl<J: Job> Unit<J> {
    pub(crate) fn spawn(
        pool_name: &str,
        id: usize,
        job: Arc<J>,
        commands: UnboundedSender<Command<J>>,
    ) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new().name(format!("{pool_name}-{id}")).spawn(move || {
            let _guard = ExitGuard { id, commands: commands.clone() };
            work(id, job.as_ref(), &receiver, &commands);
        })?;
        debug!(pool = pool_name, unit = id, "execution unit started");
        Ok(Self { id, busy: false, sender })
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy
    }

    pub(crate) fn set_idle(&mut self) {
        self.busy = false;
    }

    /// Hands one input to the unit. Gives the message back when the unit thread is gone.
    pub(crate) fn dispatch(&mut self, input: J::Input, reply: Reply<J>) -> Result<(), UnitMessage<J>> {
        self.sender.send(UnitMessage::Run { input, reply }).map_err(|mpsc::SendError(message)| message)?;
        self.busy = true;
        Ok(())
    }

    pub(crate) fn stop(&self) {
        // a closed channel means the thread is already on its way out
        let _ = self.sender.send(UnitMessage::Stop);
    }
}

struct ExitGuard<J: Job> {
    id: usize,
    commands: UnboundedSender<Command<J>>,
}

impl<J: Job> Drop for ExitGuard<J> {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Exited { unit: self.id });
    }
}

fn work<J: Job>(
    id: usize,
    job: &J,
    receiver: &mpsc::Receiver<UnitMessage<J>>,
    commands: &UnboundedSender<Command<J>>,
) {
    while let Ok(message) = receiver.recv() {
        let (input, reply) = match message {
            UnitMessage::Run { input, reply } => (input, reply),
            UnitMessage::Stop => {
                debug!(unit = id, "execution unit asked to stop");
                return;
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(|| job.run(input))) {
            Ok(result) => {
                // idle is reported before the caller wakes up, so a caller observing the
                // result never sees this unit as busy
                let coordinator_alive = commands.send(Command::Idle { unit: id }).is_ok();
                let _ = reply.send(result.map_err(PoolError::job));
                if !coordinator_alive {
                    return;
                }
            }
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!(unit = id, reason = %reason, "execution unit crashed");
                let _ = reply.send(Err(PoolError::unit_failure(id, reason)));
                return;
            }
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
