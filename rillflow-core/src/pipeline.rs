//! Multi-process pipelines.
//!
//! A pipeline owns a set of [`StreamProcess`]es and the connections between
//! their boundary streams. [`Pipeline::run`] wires one bounded relay edge per
//! connection, starts everything, and joins in order: processes whose sources
//! finish close their relays, which closes downstream inboxes, and the whole
//! pipeline winds down without any shutdown signal.

use std::collections::HashMap;

use anyhow::Context;
use crossbeam_channel::{bounded, unbounded, Sender};
use serde::{Deserialize, Serialize};

use crate::channel::{spawn_relay, EDGE_CAPACITY};
use crate::error::RillError;
use crate::process::{FinishedProcess, StreamProcess};
use crate::types::{ProcessId, Sample, StreamId};

/// One cross-process edge: appends to `output` of process `from` are relayed,
/// in order, onto `input` of process `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: ProcessId,
    pub output: String,
    pub to: ProcessId,
    pub input: String,
}

impl Connection {
    pub fn new(from: ProcessId, output: &str, to: ProcessId, input: &str) -> Self {
        Self {
            from,
            output: output.to_string(),
            to,
            input: input.to_string(),
        }
    }
}

#[derive(Default)]
pub struct Pipeline {
    processes: Vec<StreamProcess>,
    connections: Vec<Connection>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, process: StreamProcess) -> ProcessId {
        self.processes.push(process);
        self.processes.len() - 1
    }

    /// Connect a declared output of one process to a declared input of
    /// another. An output may feed several inputs; an input accepts exactly
    /// one connection (it has a single remote producer).
    pub fn attach(
        &mut self,
        from: ProcessId,
        output: &str,
        to: ProcessId,
        input: &str,
    ) -> Result<(), RillError> {
        let producer = self.processes.get(from).ok_or_else(|| {
            RillError::Config(format!("unknown process id {from}"))
        })?;
        let consumer = self.processes.get(to).ok_or_else(|| {
            RillError::Config(format!("unknown process id {to}"))
        })?;
        if !producer.declares_output(output) {
            return Err(RillError::Config(format!(
                "process `{}` does not declare output stream `{output}`",
                producer.name()
            )));
        }
        if !consumer.declares_input(input) {
            return Err(RillError::Config(format!(
                "process `{}` does not declare input stream `{input}`",
                consumer.name()
            )));
        }
        if self
            .connections
            .iter()
            .any(|c| c.to == to && c.input == input)
        {
            return Err(RillError::Config(format!(
                "input `{input}` of process `{}` is already connected",
                consumer.name()
            )));
        }
        self.connections.push(Connection::new(from, output, to, input));
        Ok(())
    }

    pub fn attach_all(&mut self, connections: &[Connection]) -> Result<(), RillError> {
        for c in connections {
            self.attach(c.from, &c.output, c.to, &c.input)?;
        }
        Ok(())
    }

    /// Start every process and block until the whole pipeline has drained.
    pub fn run(self) -> anyhow::Result<Vec<FinishedProcess>> {
        let inboxes: Vec<_> = (0..self.processes.len()).map(|_| unbounded()).collect();
        let mut relay_maps: Vec<HashMap<StreamId, Vec<Sender<Vec<Sample>>>>> =
            (0..self.processes.len()).map(|_| HashMap::new()).collect();

        let mut relays = Vec::with_capacity(self.connections.len());
        for conn in &self.connections {
            let producer = &self.processes[conn.from];
            let consumer = &self.processes[conn.to];
            let out_id = producer.graph_ref().stream_id(&conn.output).ok_or_else(|| {
                RillError::Config(format!(
                    "process `{}` has no stream `{}`",
                    producer.name(),
                    conn.output
                ))
            })?;
            let in_id = consumer.graph_ref().stream_id(&conn.input).ok_or_else(|| {
                RillError::Config(format!(
                    "process `{}` has no stream `{}`",
                    consumer.name(),
                    conn.input
                ))
            })?;
            let label = format!(
                "{}:{} -> {}:{}",
                producer.name(),
                conn.output,
                consumer.name(),
                conn.input
            );
            let (edge_tx, edge_rx) = bounded(EDGE_CAPACITY);
            relay_maps[conn.from].entry(out_id).or_default().push(edge_tx);
            relays.push(spawn_relay(label, edge_rx, inboxes[conn.to].0.clone(), in_id));
        }

        let mut running = Vec::with_capacity(self.processes.len());
        let mut relay_maps = relay_maps.into_iter();
        for (process, (inbox_tx, inbox_rx)) in self.processes.into_iter().zip(inboxes) {
            let map = relay_maps.next().unwrap_or_default();
            let name = process.name().to_string();
            running.push(
                process
                    .start_wired(map, inbox_tx, inbox_rx)
                    .with_context(|| format!("starting process `{name}`"))?,
            );
        }

        let mut finished = Vec::with_capacity(running.len());
        for process in running {
            finished.push(process.join()?);
        }
        for relay in relays {
            if relay.join().is_err() {
                tracing::warn!("relay thread panicked");
            }
        }
        Ok(finished)
    }
}

/// Build a pipeline from parts and run it to completion.
pub fn run_pipeline(
    processes: Vec<StreamProcess>,
    connections: &[Connection],
) -> anyhow::Result<Vec<FinishedProcess>> {
    let mut pipeline = Pipeline::new();
    for process in processes {
        pipeline.add(process);
    }
    pipeline.attach_all(connections)?;
    pipeline.run().context("running pipeline")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ProcessGraph;

    fn proc_with(name: &str, streams: &[&str]) -> StreamProcess {
        let mut g = ProcessGraph::new();
        for s in streams {
            g.stream(s).unwrap();
        }
        StreamProcess::new(name, g)
    }

    #[test]
    fn test_attach_checks_declarations() {
        let mut pipeline = Pipeline::new();
        let a = pipeline.add(proc_with("a", &["t"]).with_output("t"));
        let b = pipeline.add(proc_with("b", &["t"]));
        // `b` never declared `t` as an input.
        assert!(pipeline.attach(a, "t", b, "t").is_err());

        let mut pipeline = Pipeline::new();
        let a = pipeline.add(proc_with("a", &["t"]).with_output("t"));
        let b = pipeline.add(proc_with("b", &["t"]).with_input("t"));
        pipeline.attach(a, "t", b, "t").unwrap();
        // Second producer for the same input.
        assert!(pipeline.attach(a, "t", b, "t").is_err());
    }

    #[test]
    fn test_attach_rejects_unknown_process() {
        let mut pipeline = Pipeline::new();
        let a = pipeline.add(proc_with("a", &["t"]).with_output("t"));
        assert!(pipeline.attach(a, "t", 9, "t").is_err());
    }

    #[test]
    fn test_connection_round_trips_through_json() {
        let conn = Connection::new(0, "t", 1, "u");
        let json = serde_json::to_string(&conn).unwrap();
        assert_eq!(serde_json::from_str::<Connection>(&json).unwrap(), conn);
    }
}
