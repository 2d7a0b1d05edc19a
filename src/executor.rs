use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::{waker, ArcWake, Context, Poll};
use intmap::IntMap;
use queues::{IsQueue, Queue};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::error::HarnessResult;

pub type TaskId = u64;

type TaskFuture = LocalBoxFuture<'static, HarnessResult<()>>;

// Ids of woken tasks, in wake order. Wakers only carry an id, so they stay
// Send + Sync even though the futures themselves are thread-local.
type ReadyQueue = Arc<Mutex<Queue<TaskId>>>;

fn lock(ready: &ReadyQueue) -> MutexGuard<'_, Queue<TaskId>> {
    // The executor is single threaded; a poisoned lock still holds a usable queue.
    ready.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct TaskWaker {
    id: TaskId,
    ready: ReadyQueue,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let _ = lock(&arc_self.ready).add(arc_self.id);
    }
}

struct Task {
    name: String,
    future: TaskFuture,
    // One waker per task for its whole life, so a trigger registered once
    // stays valid however often the task is polled.
    waker: Arc<TaskWaker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Done,
    Cancelled,
    Unknown,
}

/// Cooperative executor for one scenario. Tasks run only when woken and run
/// until their next suspension point; `run_ready` drains everything woken so
/// far, including tasks woken while it runs.
pub struct Executor {
    tasks: IntMap<Task>,
    done: IntMap<()>,
    ready: ReadyQueue,
    next_id: TaskId,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            tasks: IntMap::new(),
            done: IntMap::new(),
            ready: Arc::new(Mutex::new(Queue::new())),
            next_id: 0,
        }
    }

    /// Adds a task and schedules its first poll.
    pub fn spawn(&mut self, name: &str, future: impl Future<Output = HarnessResult<()>> + 'static) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        let task = Task {
            name: name.to_string(),
            future: future.boxed_local(),
            waker: Arc::new(TaskWaker {
                id,
                ready: self.ready.clone(),
            }),
        };
        self.tasks.insert(id, task);
        let _ = lock(&self.ready).add(id);
        debug!(task = name, id, "spawned");
        id
    }

    /// Polls woken tasks until none are left. The first task to finish with
    /// an error stops the drain and the error is returned; remaining woken
    /// tasks are left queued.
    pub fn run_ready(&mut self) -> HarnessResult<()> {
        while let Some(id) = self.next_ready() {
            // Already finished, cancelled, or a duplicate wake.
            let Some(mut task) = self.tasks.remove(id) else {
                continue;
            };
            let waker = waker(task.waker.clone());
            let mut cx = Context::from_waker(&waker);
            trace!(task = %task.name, id, "poll");
            match task.future.as_mut().poll(&mut cx) {
                Poll::Pending => {
                    self.tasks.insert(id, task);
                }
                Poll::Ready(Ok(())) => {
                    debug!(task = %task.name, id, "finished");
                    self.done.insert(id, ());
                }
                Poll::Ready(Err(err)) => {
                    debug!(task = %task.name, id, error = %err, "failed");
                    self.done.insert(id, ());
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn next_ready(&self) -> Option<TaskId> {
        lock(&self.ready).remove().ok()
    }

    pub fn state(&self, id: TaskId) -> TaskState {
        if self.tasks.contains_key(id) {
            TaskState::Pending
        } else if self.done.contains_key(id) {
            TaskState::Done
        } else if id < self.next_id {
            TaskState::Cancelled
        } else {
            TaskState::Unknown
        }
    }

    pub fn is_done(&self, id: TaskId) -> bool {
        self.state(id) == TaskState::Done
    }

    /// Drops a task without running it again.
    pub fn cancel(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.remove(id) {
            debug!(task = %task.name, id, "cancelled");
        }
    }

    /// Drops every pending task and forgets queued wakes.
    pub fn clear(&mut self) {
        let ids: Vec<TaskId> = self.tasks.keys().copied().collect();
        for id in ids {
            self.cancel(id);
        }
        *lock(&self.ready) = Queue::new();
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use crate::shared::Shared;
    use futures::channel::oneshot;

    #[test]
    fn tasks_run_in_spawn_order() {
        let log = Shared::new(Vec::new());
        let mut exec = Executor::new();
        for i in 0..3 {
            let log = log.clone();
            exec.spawn("t", async move {
                log.get_mut().push(i);
                Ok(())
            });
        }
        exec.run_ready().unwrap();
        assert_eq!(*log.get(), vec![0, 1, 2]);
        assert_eq!(exec.pending(), 0);
    }

    #[test]
    fn woken_task_runs_in_same_drain() {
        let (tx, rx) = oneshot::channel::<u32>();
        let got = Shared::new(None);
        let mut exec = Executor::new();
        let sink = got.clone();
        let waiter = exec.spawn("waiter", async move {
            let v = rx.await.unwrap_or(0);
            *sink.get_mut() = Some(v);
            Ok(())
        });
        let sender = exec.spawn("sender", async move {
            let _ = tx.send(7);
            Ok(())
        });
        exec.run_ready().unwrap();
        assert_eq!(*got.get(), Some(7));
        assert!(exec.is_done(waiter));
        assert!(exec.is_done(sender));
    }

    #[test]
    fn failing_task_stops_the_drain() {
        let mut exec = Executor::new();
        exec.spawn("bad", async { Err(HarnessError::UnknownBin("x".into())) });
        let after = exec.spawn("after", async { Ok(()) });
        assert_eq!(exec.run_ready(), Err(HarnessError::UnknownBin("x".into())));
        assert_eq!(exec.state(after), TaskState::Pending);
        exec.cancel(after);
        assert_eq!(exec.state(after), TaskState::Cancelled);
    }
}
