use std::{
    collections::VecDeque,
    fmt::{self, Debug},
    io,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

use crate::{backend::Backend, event::EventRevision, worker::Worker, DeviceLost, OutOfMemory};

/// Error that may occur when command list is submitted to the device.
#[derive(Clone, Copy, Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    OutOfMemory {
        #[from]
        source: OutOfMemory,
    },

    #[error(transparent)]
    DeviceLost {
        #[from]
        source: DeviceLost,
    },
}

/// Error returned when command list is submitted to stopped queue.
#[derive(Clone, Copy, Debug, thiserror::Error, PartialEq, Eq)]
#[error("Submission queue is stopped")]
pub struct QueueStopped;

struct Entry<B: Backend> {
    list: Arc<B::CommandList>,
    events: SmallVec<[EventRevision; 2]>,
}

struct QueueState<B: Backend> {
    entries: VecDeque<Entry<B>>,
    stop: bool,
}

struct Shared<B: Backend> {
    device: Arc<B>,
    state: Mutex<QueueState<B>>,
    condvar: Condvar,
}

impl<B> Shared<B>
where
    B: Backend,
{
    fn run(&self) {
        loop {
            let entry = {
                let mut state = self.state.lock();
                while state.entries.is_empty() && !state.stop {
                    self.condvar.wait(&mut state);
                }

                // Remaining entries are drained after stop is requested.
                match state.entries.pop_front() {
                    Some(entry) => entry,
                    None => break,
                }
            };

            if catch_unwind(AssertUnwindSafe(|| self.execute(&entry))).is_err() {
                error!("Command list {:?} submission panicked", entry.list);
            }
        }

        trace!("Submission queue drained");
    }

    fn execute(&self, entry: &Entry<B>) {
        if let Err(err) = self.device.submit(&entry.list) {
            error!("Failed to submit command list {:?}: {}", entry.list, err);
            return;
        }

        if let Err(err) = self.device.wait(&entry.list) {
            error!("Failed to wait for command list {:?}: {}", entry.list, err);
            return;
        }

        for event in &entry.events {
            event.signal();
        }
    }
}

/// Submits command lists on a dedicated thread, in order of arrival.
///
/// Submitting never blocks on the device.
/// Events attached to a command list are signaled after it completes.
pub struct SubmissionQueue<B: Backend> {
    shared: Arc<Shared<B>>,
    worker: Mutex<Worker>,
}

impl<B> Debug for SubmissionQueue<B>
where
    B: Backend,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("SubmissionQueue")
            .field("pending", &self.pending())
            .field("worker", &*self.worker.lock())
            .finish()
    }
}

impl<B> SubmissionQueue<B>
where
    B: Backend,
{
    pub fn new(device: Arc<B>) -> io::Result<Self> {
        SubmissionQueue::with_thread_name(device, "pipewright-submit")
    }

    pub fn with_thread_name(device: Arc<B>, name: impl Into<String>) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            device,
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                stop: false,
            }),
            condvar: Condvar::new(),
        });

        let worker = Worker::spawn(
            name,
            {
                let shared = Arc::clone(&shared);
                move || shared.run()
            },
            {
                let shared = Arc::clone(&shared);
                move || {
                    shared.state.lock().stop = true;
                    shared.condvar.notify_all();
                }
            },
        )?;

        Ok(SubmissionQueue {
            shared,
            worker: Mutex::new(worker),
        })
    }

    /// Enqueues command list for submission.
    pub fn submit(&self, list: Arc<B::CommandList>) -> Result<(), QueueStopped> {
        self.submit_with_events(list, None)
    }

    /// Enqueues command list for submission.
    /// Event revisions are signaled when command list completes.
    pub fn submit_with_events(
        &self,
        list: Arc<B::CommandList>,
        events: impl IntoIterator<Item = EventRevision>,
    ) -> Result<(), QueueStopped> {
        let entry = Entry {
            list,
            events: events.into_iter().collect(),
        };

        let mut state = self.shared.state.lock();
        if state.stop {
            return Err(QueueStopped);
        }
        state.entries.push_back(entry);
        drop(state);

        self.shared.condvar.notify_one();
        Ok(())
    }

    /// Number of command lists waiting for submission.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Submits every queued command list and joins the thread.
    /// Calls after the first one do nothing.
    pub fn stop(&self) {
        self.worker.lock().stop();
    }
}

impl<B> Drop for SubmissionQueue<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        self.stop();
    }
}
