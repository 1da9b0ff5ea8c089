use std::{
    fmt::{self, Debug},
    io,
    thread::{self, JoinHandle},
};

enum WorkerState {
    Running(JoinHandle<()>),
    StopRequested,
    Joined,
}

impl Debug for WorkerState {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Running(handle) => {
                write!(fmt, "Running({:?})", handle.thread().name())
            }
            WorkerState::StopRequested => fmt.write_str("StopRequested"),
            WorkerState::Joined => fmt.write_str("Joined"),
        }
    }
}

/// Owned background thread.
///
/// Lifecycle is `Running -> StopRequested -> Joined`.
/// `stop` drives it to `Joined` exactly once, later calls do nothing.
/// Dropping the worker stops it.
pub(crate) struct Worker {
    name: String,
    state: WorkerState,
    signal: Option<Box<dyn FnOnce() + Send>>,
}

impl Debug for Worker {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Worker")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}

impl Worker {
    /// Spawns thread running `f`.
    /// `signal` is called once on stop and must make `f` return.
    pub fn spawn<F, S>(name: impl Into<String>, f: F, signal: S) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
        S: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new().name(name.clone()).spawn(f)?;

        trace!("Worker {} spawned", name);
        Ok(Worker {
            name,
            state: WorkerState::Running(handle),
            signal: Some(Box::new(signal)),
        })
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, WorkerState::Running(_))
    }

    /// Signals the thread to stop and joins it.
    pub fn stop(&mut self) {
        let handle = match std::mem::replace(&mut self.state, WorkerState::StopRequested) {
            WorkerState::Running(handle) => handle,
            state => {
                self.state = state;
                return;
            }
        };

        if let Some(signal) = self.signal.take() {
            signal();
        }

        if handle.join().is_err() {
            error!("Worker {} panicked", self.name);
        }

        self.state = WorkerState::Joined;
        trace!("Worker {} joined", self.name);
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
