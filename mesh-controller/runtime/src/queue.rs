use anyhow::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

/// The change kinds handlers are notified about.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Add,
    Update,
    Delete,
}

pub type Handler<T> = Arc<dyn Fn(&T, Event) -> Result<()> + Send + Sync>;

/// One work ticket: the object, what happened to it, and the handler to
/// run. Failed tickets are re-enqueued after a fixed delay.
pub struct Task<T> {
    pub handler: Handler<T>,
    pub obj: T,
    pub event: Event,
}

impl<T> Task<T> {
    pub fn new(handler: Handler<T>, obj: T, event: Event) -> Self {
        Self {
            handler,
            obj,
            event,
        }
    }
}

struct State<T> {
    queue: VecDeque<Task<T>>,
    closing: bool,
}

/// FIFO queue of work tickets processed by a single run loop. Because the
/// loop is the only consumer, rebuilds queued for the same proxy can never
/// overlap.
pub struct Queue<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    error_delay: Duration,
}

impl<T: Send + 'static> Queue<T> {
    pub fn new(error_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closing: false,
            }),
            notify: Notify::new(),
            error_delay,
        })
    }

    /// Enqueues a ticket unless the queue is closing.
    pub fn push(&self, task: Task<T>) {
        {
            let mut state = self.state.lock();
            if !state.closing {
                state.queue.push_back(task);
            }
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        self.state.lock().closing = true;
        // notify_one stores a permit, so the run loop cannot miss a close
        // signal sent between its state check and its wait.
        self.notify.notify_one();
    }

    /// Runs tickets until `closed` fires and the queue drains. Handler
    /// failures re-enqueue the ticket after the configured delay.
    pub async fn run(self: &Arc<Self>, closed: oneshot::Receiver<()>) {
        let watcher = Arc::clone(self);
        tokio::spawn(async move {
            let _ = closed.await;
            watcher.close();
        });

        loop {
            loop {
                {
                    let state = self.state.lock();
                    if state.closing || !state.queue.is_empty() {
                        break;
                    }
                }
                self.notify.notified().await;
            }

            let task = {
                let mut state = self.state.lock();
                match state.queue.pop_front() {
                    Some(task) => task,
                    // Empty and closing: we are shutting down.
                    None => return,
                }
            };

            if let Err(error) = (task.handler)(&task.obj, task.event) {
                tracing::info!(%error, delay = ?self.error_delay, "work item failed, retrying after delay");
                let queue = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(queue.error_delay).await;
                    queue.push(task);
                });
            }
        }
    }
}

/// Applies handlers in sequence, stopping at the first failure.
pub struct ChainHandler<T> {
    handlers: Vec<Handler<T>>,
}

impl<T> Default for ChainHandler<T> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<T> ChainHandler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, handler: Handler<T>) {
        self.handlers.push(handler);
    }

    pub fn apply(&self, obj: &T, event: Event) -> Result<()> {
        for handler in &self.handlers {
            handler(obj, event)?;
        }
        Ok(())
    }
}
