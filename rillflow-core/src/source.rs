//! External input sources.
//!
//! A source is a generator polled on its own thread at a fixed interval, each
//! value sent as one append into the owning process's scheduler inbox. The
//! thread exits after `num_steps` emissions (if set) or when the scheduler is
//! gone; a cycle where the generator yields nothing is logged and skipped, not
//! fatal.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::channel::Append;
use crate::types::{Sample, StreamId};

pub struct Source {
    name: String,
    stream: String,
    interval: Duration,
    num_steps: Option<usize>,
    generate: Box<dyn FnMut() -> Option<Sample> + Send>,
}

impl Source {
    /// A source that polls `f` each cycle. `None` skips the cycle; with
    /// `num_steps` set, only emitted values count toward the limit.
    pub fn repeating<T, F>(
        stream: &str,
        interval: Duration,
        num_steps: Option<usize>,
        mut f: F,
    ) -> Self
    where
        T: Clone + Send + 'static,
        F: FnMut() -> Option<T> + Send + 'static,
    {
        Self {
            name: stream.to_string(),
            stream: stream.to_string(),
            interval,
            num_steps,
            generate: Box::new(move || f().map(Sample::new)),
        }
    }

    /// A source driven by a state machine: each cycle emits `value` and
    /// carries `next` into the following cycle.
    pub fn unfold<S, T, F>(
        stream: &str,
        interval: Duration,
        num_steps: Option<usize>,
        state: S,
        mut f: F,
    ) -> Self
    where
        S: Send + 'static,
        T: Clone + Send + 'static,
        F: FnMut(S) -> (T, S) + Send + 'static,
    {
        let mut state = Some(state);
        Self::repeating(stream, interval, num_steps, move || {
            match state.take() {
                Some(s) => {
                    let (value, next) = f(s);
                    state = Some(next);
                    Some(value)
                }
                None => None,
            }
        })
    }

    /// Override the log name (defaults to the target stream's name).
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Name of the stream this source feeds.
    pub fn stream_name(&self) -> &str {
        &self.stream
    }

    /// Spawn the polling thread. The [`ReadyHandle`] resolves once the thread
    /// is up, before the first emission.
    pub(crate) fn spawn(
        self,
        target: StreamId,
        inbox: Sender<Append>,
    ) -> std::io::Result<(JoinHandle<()>, ReadyHandle)> {
        let Source {
            name,
            interval,
            num_steps,
            mut generate,
            ..
        } = self;
        let (ready_tx, ready_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name(format!("source-{name}"))
            .spawn(move || {
                let _ = ready_tx.send(());
                let mut emitted = 0usize;
                loop {
                    if num_steps.is_some_and(|limit| emitted >= limit) {
                        tracing::debug!(source = %name, emitted, "step limit reached");
                        return;
                    }
                    thread::sleep(interval);
                    match generate() {
                        Some(value) => {
                            emitted += 1;
                            let append = Append {
                                stream: target,
                                values: vec![value],
                            };
                            if inbox.send(append).is_err() {
                                tracing::debug!(source = %name, "scheduler gone, source exiting");
                                return;
                            }
                        }
                        None => {
                            tracing::warn!(source = %name, "no value this cycle, skipping");
                        }
                    }
                }
            })?;
        Ok((handle, ReadyHandle { ready: ready_rx }))
    }
}

/// Resolves once the source thread has started polling.
pub struct ReadyHandle {
    ready: Receiver<()>,
}

impl ReadyHandle {
    /// Block until the source thread is running.
    pub fn wait(&self) {
        // A disconnect means the thread already ran (and possibly finished).
        let _ = self.ready.recv();
    }
}
