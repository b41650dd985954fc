//! The per-process scheduler.
//!
//! Scheduling is growth driven: whenever a stream grows, its subscribers join
//! a ready set (each agent at most once), and [`run_to_quiescence`] pops and
//! invokes agents until the set is empty. Outputs appended during an
//! invocation mark downstream subscribers ready inside the same drain, so a
//! whole cascade settles in one call. Between quiescent phases a live
//! scheduler blocks on its inbox (see [`crate::process`]) instead of spinning.
//!
//! Agent failures are contained: a transition error or contract violation is
//! logged, the agent is permanently unscheduled, and everything else keeps
//! running. Only an internal [`RillError::Range`] aborts the process run.
//!
//! [`run_to_quiescence`]: Scheduler::run_to_quiescence

use std::collections::{HashMap, VecDeque};

use crossbeam_channel::{Receiver, Sender};

use crate::agent::InputSlice;
use crate::channel::Append;
use crate::error::RillError;
use crate::graph::ProcessGraph;
use crate::types::{AgentId, Sample, StreamId};

pub struct Scheduler {
    graph: ProcessGraph,
    ready: VecDeque<AgentId>,
    queued: Vec<bool>,
    /// Boundary-output forwarding: local stream -> relay edges to feed on
    /// every append, before the local append happens.
    relays: HashMap<StreamId, Vec<Sender<Vec<Sample>>>>,
}

impl Scheduler {
    pub fn new(graph: ProcessGraph) -> Self {
        let queued = vec![false; graph.agents.len()];
        Self {
            graph,
            ready: VecDeque::new(),
            queued,
            relays: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &ProcessGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ProcessGraph {
        self.graph
    }

    pub(crate) fn set_relays(&mut self, relays: HashMap<StreamId, Vec<Sender<Vec<Sample>>>>) {
        self.relays = relays;
    }

    /// Append typed values to a stream and mark its subscribers ready. Call
    /// [`run_to_quiescence`](Self::run_to_quiescence) afterwards to propagate.
    pub fn extend<T, I>(&mut self, stream: StreamId, values: I) -> Result<(), RillError>
    where
        T: Clone + Send + 'static,
        I: IntoIterator<Item = T>,
    {
        let samples: Vec<Sample> = values.into_iter().map(Sample::new).collect();
        self.apply_append(stream, samples)
    }

    pub(crate) fn apply_append(
        &mut self,
        stream: StreamId,
        values: Vec<Sample>,
    ) -> Result<(), RillError> {
        if values.is_empty() {
            return Ok(());
        }
        if stream >= self.graph.streams.len() {
            return Err(RillError::Config(format!("unknown stream id {stream}")));
        }
        if let Some(edges) = self.relays.get(&stream) {
            for edge in edges {
                // Blocks when the consumer is behind; backpressure, not loss.
                if edge.send(values.clone()).is_err() {
                    tracing::warn!(
                        stream = %self.graph.streams[stream].name(),
                        "relay edge closed, skipping forward"
                    );
                }
            }
        }
        let subscribers = {
            let s = &mut self.graph.streams[stream];
            s.extend(values);
            s.subscribers.clone()
        };
        for agent in subscribers {
            self.mark_ready(agent);
        }
        Ok(())
    }

    fn mark_ready(&mut self, agent: AgentId) {
        if !self.queued[agent] && !self.graph.agents[agent].failed {
            self.queued[agent] = true;
            self.ready.push_back(agent);
        }
    }

    /// Drain the ready set. On return no agent has input it has not already
    /// been offered.
    pub fn run_to_quiescence(&mut self) -> Result<(), RillError> {
        while let Some(agent) = self.ready.pop_front() {
            self.queued[agent] = false;
            self.step(agent)?;
        }
        Ok(())
    }

    fn step(&mut self, id: AgentId) -> Result<(), RillError> {
        let step = {
            let (streams, agents) = self.graph.split_mut();
            let agent = &mut agents[id];
            if agent.failed {
                return Ok(());
            }
            let mut slices = Vec::with_capacity(agent.inputs.len());
            for sub in &agent.inputs {
                let s = &streams[sub.stream];
                slices.push(InputSlice {
                    stream: sub.stream,
                    name: s.name(),
                    start: sub.pointer,
                    values: s.slice(sub.pointer, s.len())?,
                });
            }
            match agent.transition.transition(&slices) {
                Ok(step) => step,
                Err(err) => {
                    tracing::error!(agent = %agent.name, %err, "transition failed, agent unscheduled");
                    agent.failed = true;
                    return Ok(());
                }
            }
        };

        let (arity_in, arity_out) = {
            let a = &self.graph.agents[id];
            (a.inputs.len(), a.outputs.len())
        };
        if step.consumed.len() != arity_in || step.outputs.len() != arity_out {
            self.fail(
                id,
                format!(
                    "returned {} consumed counts and {} output batches, declared {} inputs and {} outputs",
                    step.consumed.len(),
                    step.outputs.len(),
                    arity_in,
                    arity_out
                ),
            );
            return Ok(());
        }
        for (i, &n) in step.consumed.iter().enumerate() {
            let sub = self.graph.agents[id].inputs[i];
            let available = self.graph.streams[sub.stream].len() - sub.pointer;
            if n > available {
                let detail = format!(
                    "consumed {n} of {available} offered on `{}`",
                    self.graph.streams[sub.stream].name()
                );
                self.fail(id, detail);
                return Ok(());
            }
        }
        for (i, &n) in step.consumed.iter().enumerate() {
            self.graph.agents[id].inputs[i].pointer += n;
        }

        let outputs: Vec<StreamId> = self.graph.agents[id].outputs.clone();
        for (stream, values) in outputs.into_iter().zip(step.outputs) {
            self.apply_append(stream, values)?;
        }
        Ok(())
    }

    fn fail(&mut self, id: AgentId, detail: String) {
        let err = RillError::ContractViolation { detail };
        let agent = &mut self.graph.agents[id];
        tracing::error!(agent = %agent.name, %err, "agent unscheduled");
        agent.failed = true;
    }

    /// Run until every inbox sender is dropped: settle, block for the next
    /// batch, coalesce whatever else is already queued, settle again. A
    /// disconnected inbox is end of input, not an error.
    pub(crate) fn run_live(mut self, inbox: Receiver<Append>) -> Result<ProcessGraph, RillError> {
        self.run_to_quiescence()?;
        while let Ok(append) = inbox.recv() {
            self.apply_append(append.stream, append.values)?;
            while let Ok(more) = inbox.try_recv() {
                self.apply_append(more.stream, more.values)?;
            }
            self.run_to_quiescence()?;
        }
        tracing::debug!("all inputs finished, scheduler exiting");
        Ok(self.into_graph())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Incremental, Transition};

    fn map_i64(
        f: impl Fn(i64) -> i64 + Send + 'static,
    ) -> impl Transition + 'static {
        Incremental::new(move |values: &[Sample]| {
            let out = values
                .iter()
                .map(|v| Sample::new(f(*v.downcast_ref::<i64>().unwrap())))
                .collect();
            Ok((out, values.len()))
        })
    }

    #[test]
    fn test_cascade_settles_in_one_drain() {
        let mut g = ProcessGraph::new();
        let x = g.stream("x").unwrap();
        let y = g.stream("y").unwrap();
        let z = g.stream("z").unwrap();
        g.add_agent("double", &[x], &[y], map_i64(|v| v * 2)).unwrap();
        g.add_agent("inc", &[y], &[z], map_i64(|v| v + 1)).unwrap();

        let mut sched = Scheduler::new(g);
        sched.extend(x, [1i64, 2, 3]).unwrap();
        sched.run_to_quiescence().unwrap();
        assert_eq!(sched.graph().values::<i64>(z).unwrap(), vec![3, 5, 7]);
    }

    #[test]
    fn test_fan_out_feeds_every_subscriber() {
        let mut g = ProcessGraph::new();
        let x = g.stream("x").unwrap();
        let y = g.stream("y").unwrap();
        let z = g.stream("z").unwrap();
        g.add_agent("double", &[x], &[y], map_i64(|v| v * 2)).unwrap();
        g.add_agent("triple", &[x], &[z], map_i64(|v| v * 3)).unwrap();

        let mut sched = Scheduler::new(g);
        sched.extend(x, [1i64, 2]).unwrap();
        sched.run_to_quiescence().unwrap();
        assert_eq!(sched.graph().values::<i64>(y).unwrap(), vec![2, 4]);
        assert_eq!(sched.graph().values::<i64>(z).unwrap(), vec![3, 6]);
    }

    #[test]
    fn test_partial_consumption_advances_cursor_only_so_far() {
        let mut g = ProcessGraph::new();
        let x = g.stream("x").unwrap();
        let y = g.stream("y").unwrap();
        // Takes at most two elements per invocation.
        let take_two = Incremental::new(|values: &[Sample]| {
            let n = values.len().min(2);
            Ok((values[..n].to_vec(), n))
        });
        let a = g.add_agent("take_two", &[x], &[y], take_two).unwrap();

        let mut sched = Scheduler::new(g);
        sched.extend(x, [0i64, 1, 2, 3, 4]).unwrap();
        sched.run_to_quiescence().unwrap();
        // One invocation per growth event, not a loop to exhaustion.
        assert_eq!(sched.graph().subscriptions(a)[0].pointer, 2);

        sched.extend(x, [5i64]).unwrap();
        sched.run_to_quiescence().unwrap();
        // Re-offered slice started at the old cursor.
        assert_eq!(sched.graph().subscriptions(a)[0].pointer, 4);
        assert_eq!(sched.graph().values::<i64>(y).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_over_consumption_unschedules_only_the_offender() {
        let mut g = ProcessGraph::new();
        let x = g.stream("x").unwrap();
        let y = g.stream("y").unwrap();
        let z = g.stream("z").unwrap();
        let greedy = Incremental::new(|values: &[Sample]| Ok((Vec::new(), values.len() + 1)));
        let bad = g.add_agent("greedy", &[x], &[y], greedy).unwrap();
        let good = g.add_agent("double", &[x], &[z], map_i64(|v| v * 2)).unwrap();

        let mut sched = Scheduler::new(g);
        sched.extend(x, [1i64]).unwrap();
        sched.run_to_quiescence().unwrap();
        assert!(sched.graph().agent_failed(bad));
        assert!(!sched.graph().agent_failed(good));

        // The survivor keeps processing later growth.
        sched.extend(x, [2i64]).unwrap();
        sched.run_to_quiescence().unwrap();
        assert_eq!(sched.graph().values::<i64>(z).unwrap(), vec![2, 4]);
        assert_eq!(sched.graph().subscriptions(bad)[0].pointer, 0);
    }

    #[test]
    fn test_transition_error_unschedules_agent() {
        let mut g = ProcessGraph::new();
        let x = g.stream("x").unwrap();
        let y = g.stream("y").unwrap();
        let failing = Incremental::new(|_: &[Sample]| {
            Err(RillError::TypeMismatch {
                context: "failing".into(),
                expected: "i64",
            })
        });
        let a = g.add_agent("failing", &[x], &[y], failing).unwrap();

        let mut sched = Scheduler::new(g);
        sched.extend(x, ["oops".to_string()]).unwrap();
        sched.run_to_quiescence().unwrap();
        assert!(sched.graph().agent_failed(a));

        // Further growth does not re-enqueue the failed agent.
        sched.extend(x, ["more".to_string()]).unwrap();
        sched.run_to_quiescence().unwrap();
        assert_eq!(sched.graph().stream_len(y), Some(0));
    }
}
