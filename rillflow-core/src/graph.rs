//! The process-scoped arena of streams and agents.
//!
//! All wiring is index based: streams and agents live in flat vectors owned by
//! a single [`ProcessGraph`], and agents refer to streams through
//! [`StreamId`]s rather than shared pointers. Each process in a pipeline owns
//! exactly one graph; nothing here is shared across threads.

use std::collections::HashMap;

use crate::agent::{Agent, Subscription, Transition};
use crate::error::RillError;
use crate::stream::{Producer, Stream};
use crate::types::{AgentId, StreamId};

#[derive(Default)]
pub struct ProcessGraph {
    pub(crate) streams: Vec<Stream>,
    pub(crate) agents: Vec<Agent>,
    names: HashMap<String, StreamId>,
}

impl ProcessGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream. Names are unique within a process.
    pub fn stream(&mut self, name: &str) -> Result<StreamId, RillError> {
        if self.names.contains_key(name) {
            return Err(RillError::Config(format!(
                "stream `{name}` already exists in this process"
            )));
        }
        let id = self.streams.len();
        self.streams.push(Stream::new(name));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn stream_id(&self, name: &str) -> Option<StreamId> {
        self.names.get(name).copied()
    }

    pub fn stream_name(&self, id: StreamId) -> Option<&str> {
        self.streams.get(id).map(Stream::name)
    }

    pub fn stream_len(&self, id: StreamId) -> Option<usize> {
        self.streams.get(id).map(Stream::len)
    }

    /// Register an agent subscribed to `inputs` and exclusively producing
    /// `outputs`. The agent starts with all input cursors at zero and becomes
    /// runnable as soon as any input grows.
    pub fn add_agent(
        &mut self,
        name: &str,
        inputs: &[StreamId],
        outputs: &[StreamId],
        transition: impl Transition + 'static,
    ) -> Result<AgentId, RillError> {
        for &id in inputs.iter().chain(outputs) {
            if id >= self.streams.len() {
                return Err(RillError::Config(format!(
                    "agent `{name}` refers to unknown stream id {id}"
                )));
            }
        }
        let agent_id = self.agents.len();
        for &id in outputs {
            self.claim_producer(id, Producer::Agent(agent_id))?;
        }
        for &id in inputs {
            self.streams[id].subscribers.push(agent_id);
        }
        self.agents.push(Agent {
            name: name.to_string(),
            transition: Box::new(transition),
            inputs: inputs
                .iter()
                .map(|&stream| Subscription { stream, pointer: 0 })
                .collect(),
            outputs: outputs.to_vec(),
            failed: false,
        });
        Ok(agent_id)
    }

    /// The agent's input cursors, in declaration order.
    pub fn subscriptions(&self, agent: AgentId) -> &[Subscription] {
        self.agents.get(agent).map(|a| a.inputs.as_slice()).unwrap_or(&[])
    }

    /// Whether the agent has been unscheduled after a failure.
    pub fn agent_failed(&self, agent: AgentId) -> bool {
        self.agents.get(agent).is_some_and(|a| a.failed)
    }

    /// Clone out the full contents of a stream as `T`.
    pub fn values<T: Clone + 'static>(&self, id: StreamId) -> Result<Vec<T>, RillError> {
        let stream = self.streams.get(id).ok_or_else(|| {
            RillError::Config(format!("unknown stream id {id}"))
        })?;
        stream
            .slice(0, stream.len())?
            .iter()
            .map(|v| {
                v.downcast_ref::<T>().cloned().ok_or_else(|| RillError::TypeMismatch {
                    context: stream.name().to_string(),
                    expected: std::any::type_name::<T>(),
                })
            })
            .collect()
    }

    pub(crate) fn claim_producer(
        &mut self,
        id: StreamId,
        producer: Producer,
    ) -> Result<(), RillError> {
        let stream = self.streams.get_mut(id).ok_or_else(|| {
            RillError::Config(format!("unknown stream id {id}"))
        })?;
        if stream.producer.is_some() {
            return Err(RillError::Config(format!(
                "stream `{}` already has a producer",
                stream.name()
            )));
        }
        stream.producer = Some(producer);
        Ok(())
    }

    /// Disjoint borrows for the scheduler: streams read-only, agents mutable.
    pub(crate) fn split_mut(&mut self) -> (&[Stream], &mut [Agent]) {
        (&self.streams, &mut self.agents)
    }
}
