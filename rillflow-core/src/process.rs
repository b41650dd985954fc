//! A schedulable process: one graph, its sources, and its boundary streams.
//!
//! Each [`StreamProcess`] runs its scheduler on a dedicated thread and each of
//! its sources on another. Boundary declarations name the streams a pipeline
//! may wire across processes: an input stream is produced remotely (no local
//! producer allowed), an output stream is readable remotely. A process with
//! no pipeline wiring runs standalone through [`StreamProcess::run`].
//!
//! Termination is structural, not polled: the scheduler exits when every
//! sender on its inbox is gone, which happens once local sources finish and
//! upstream processes have exited their relays.

use std::collections::HashMap;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::channel::Append;
use crate::error::RillError;
use crate::graph::ProcessGraph;
use crate::scheduler::Scheduler;
use crate::source::{ReadyHandle, Source};
use crate::stream::Producer;
use crate::types::{Sample, StreamId};

pub struct StreamProcess {
    name: String,
    graph: ProcessGraph,
    inputs: Vec<String>,
    outputs: Vec<String>,
    sources: Vec<Source>,
}

impl StreamProcess {
    pub fn new(name: &str, graph: ProcessGraph) -> Self {
        Self {
            name: name.to_string(),
            graph,
            inputs: Vec::new(),
            outputs: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Declare a boundary input: a stream fed from another process.
    pub fn with_input(mut self, stream: &str) -> Self {
        self.inputs.push(stream.to_string());
        self
    }

    /// Declare a boundary output: a stream other processes may consume.
    pub fn with_output(mut self, stream: &str) -> Self {
        self.outputs.push(stream.to_string());
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn graph_ref(&self) -> &ProcessGraph {
        &self.graph
    }

    pub(crate) fn declares_input(&self, stream: &str) -> bool {
        self.inputs.iter().any(|s| s == stream)
    }

    pub(crate) fn declares_output(&self, stream: &str) -> bool {
        self.outputs.iter().any(|s| s == stream)
    }

    /// Check boundary declarations and claim producers for inputs and source
    /// targets. Runs once, at start.
    fn validate(&mut self) -> Result<(), RillError> {
        for name in &self.inputs {
            let id = self.graph.stream_id(name).ok_or_else(|| {
                RillError::Config(format!(
                    "process `{}` declares unknown input stream `{name}`",
                    self.name
                ))
            })?;
            self.graph.claim_producer(id, Producer::Boundary)?;
        }
        for name in &self.outputs {
            if self.graph.stream_id(name).is_none() {
                return Err(RillError::Config(format!(
                    "process `{}` declares unknown output stream `{name}`",
                    self.name
                )));
            }
        }
        for source in &self.sources {
            let id = self.graph.stream_id(source.stream_name()).ok_or_else(|| {
                RillError::Config(format!(
                    "process `{}` has a source for unknown stream `{}`",
                    self.name,
                    source.stream_name()
                ))
            })?;
            self.graph.claim_producer(id, Producer::Source)?;
        }
        Ok(())
    }

    /// Start standalone, with no cross-process wiring.
    pub fn start(self) -> anyhow::Result<RunningProcess> {
        let (inbox_tx, inbox_rx) = unbounded();
        self.start_wired(HashMap::new(), inbox_tx, inbox_rx)
    }

    /// Run standalone to completion.
    pub fn run(self) -> anyhow::Result<FinishedProcess> {
        self.start()?.join()
    }

    pub(crate) fn start_wired(
        mut self,
        relays: HashMap<StreamId, Vec<Sender<Vec<Sample>>>>,
        inbox_tx: Sender<Append>,
        inbox_rx: Receiver<Append>,
    ) -> anyhow::Result<RunningProcess> {
        self.validate()?;
        let mut targets = Vec::with_capacity(self.sources.len());
        for source in std::mem::take(&mut self.sources) {
            // Validated above.
            let id = self
                .graph
                .stream_id(source.stream_name())
                .ok_or_else(|| anyhow!("source stream vanished"))?;
            targets.push((source, id));
        }

        let mut scheduler = Scheduler::new(self.graph);
        scheduler.set_relays(relays);
        let scheduler = thread::Builder::new()
            .name(format!("{}-scheduler", self.name))
            .spawn(move || scheduler.run_live(inbox_rx))
            .with_context(|| format!("spawning scheduler for `{}`", self.name))?;

        let mut sources = Vec::with_capacity(targets.len());
        let mut readies = Vec::with_capacity(targets.len());
        for (source, id) in targets {
            let (handle, ready) = source
                .spawn(id, inbox_tx.clone())
                .with_context(|| format!("spawning source in `{}`", self.name))?;
            sources.push(handle);
            readies.push(ready);
        }
        // The scheduler must only see source and relay senders, or it would
        // never observe disconnect.
        drop(inbox_tx);

        tracing::info!(process = %self.name, sources = sources.len(), "process started");
        Ok(RunningProcess {
            name: self.name,
            scheduler,
            sources,
            readies,
        })
    }
}

pub struct RunningProcess {
    name: String,
    scheduler: JoinHandle<Result<ProcessGraph, RillError>>,
    sources: Vec<JoinHandle<()>>,
    readies: Vec<ReadyHandle>,
}

impl RunningProcess {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until every source thread of this process is polling.
    pub fn wait_sources_ready(&self) {
        for ready in &self.readies {
            ready.wait();
        }
    }

    /// Wait for sources to finish and the scheduler to drain, then hand back
    /// the final graph.
    pub fn join(self) -> anyhow::Result<FinishedProcess> {
        for handle in self.sources {
            if handle.join().is_err() {
                tracing::warn!(process = %self.name, "source thread panicked");
            }
        }
        let graph = self
            .scheduler
            .join()
            .map_err(|_| anyhow!("scheduler thread for `{}` panicked", self.name))?
            .with_context(|| format!("process `{}` failed", self.name))?;
        tracing::info!(process = %self.name, "process finished");
        Ok(FinishedProcess {
            name: self.name,
            graph,
        })
    }
}

/// The final state of a process after its scheduler exited.
pub struct FinishedProcess {
    name: String,
    graph: ProcessGraph,
}

impl FinishedProcess {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &ProcessGraph {
        &self.graph
    }

    /// Clone out the full contents of a stream as `T`.
    pub fn values<T: Clone + 'static>(&self, stream: &str) -> anyhow::Result<Vec<T>> {
        let id = self
            .graph
            .stream_id(stream)
            .ok_or_else(|| anyhow!("no stream `{stream}` in process `{}`", self.name))?;
        Ok(self.graph.values(id)?)
    }

    pub fn stream_len(&self, stream: &str) -> anyhow::Result<usize> {
        let id = self
            .graph
            .stream_id(stream)
            .ok_or_else(|| anyhow!("no stream `{stream}` in process `{}`", self.name))?;
        Ok(self.graph.stream_len(id).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::map_element;
    use std::time::Duration;

    #[test]
    fn test_single_process_with_source_runs_to_completion() {
        let mut g = ProcessGraph::new();
        let seq = g.stream("seq").unwrap();
        let t = g.stream("t").unwrap();
        map_element(&mut g, "x10", seq, t, |v: &i64| v * 10).unwrap();

        let source = Source::unfold("seq", Duration::from_millis(2), Some(4), 0i64, |s| {
            (s + 1, s + 1)
        });
        let finished = StreamProcess::new("p", g)
            .with_source(source)
            .run()
            .unwrap();
        assert_eq!(finished.values::<i64>("t").unwrap(), vec![10, 20, 30, 40]);
        assert_eq!(finished.stream_len("seq").unwrap(), 4);
    }

    #[test]
    fn test_sourceless_process_terminates_immediately() {
        let mut g = ProcessGraph::new();
        g.stream("t").unwrap();
        let finished = StreamProcess::new("idle", g).run().unwrap();
        assert_eq!(finished.stream_len("t").unwrap(), 0);
    }

    #[test]
    fn test_unknown_boundary_stream_rejected() {
        let g = ProcessGraph::new();
        let err = StreamProcess::new("p", g).with_input("nope").run();
        assert!(err.is_err());
    }

    #[test]
    fn test_source_cannot_feed_agent_output() {
        let mut g = ProcessGraph::new();
        let x = g.stream("x").unwrap();
        let y = g.stream("y").unwrap();
        map_element(&mut g, "id", x, y, |v: &i64| *v).unwrap();
        let source = Source::unfold("y", Duration::from_millis(1), Some(1), 0i64, |s| (s, s));
        assert!(StreamProcess::new("p", g).with_source(source).run().is_err());
    }
}
