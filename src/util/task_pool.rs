use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};

use anyhow::Error;
use log::error;
use tokio::runtime::Runtime;

/// Runs work closures on a pool of blocking worker threads and hands their results back to the thread owning
/// the pool. Nothing is applied until the owner drains the completions, so all shared state stays on one thread.
pub struct TaskPool<C: Send + 'static> {
    runtime: Runtime,
    sender: Sender<Option<C>>,
    receiver: Receiver<Option<C>>,
    outstanding: usize,
}

impl<C: Send + 'static> TaskPool<C> {
    pub fn new(worker_threads: usize) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(worker_threads.max(1))
            .thread_name("terrain-worker")
            .enable_all()
            .build()?;
        let (sender, receiver) = channel();

        Ok(TaskPool {
            runtime,
            sender,
            receiver,
            outstanding: 0,
        })
    }

    pub fn spawn<F>(&mut self, work: F)
    where
        F: FnOnce() -> C + Send + 'static,
    {
        self.outstanding += 1;
        let sender = self.sender.clone();
        self.runtime.spawn_blocking(move || {
            let completion = std::panic::catch_unwind(AssertUnwindSafe(work)).ok();
            // The receiving side only disappears when the pool is dropped, nobody is left to care then.
            let _ = sender.send(completion);
        });
    }

    /// Number of spawned tasks whose completion has not been received yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Returns the next finished completion without blocking.
    pub fn try_recv(&mut self) -> Option<C> {
        loop {
            match self.receiver.try_recv() {
                Ok(completion) => {
                    self.outstanding -= 1;
                    match completion {
                        Some(completion) => return Some(completion),
                        None => error!("A terrain task panicked, its result is lost"),
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Blocks until the next completion arrives. `None` once nothing is outstanding anymore.
    pub fn recv_blocking(&mut self) -> Option<C> {
        while self.outstanding > 0 {
            let completion = self.receiver.recv().ok()?;
            self.outstanding -= 1;
            match completion {
                Some(completion) => return Some(completion),
                None => error!("A terrain task panicked, its result is lost"),
            }
        }
        None
    }
}
