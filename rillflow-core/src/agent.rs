//! Agents and the transition contract.
//!
//! An agent is a stateful function wired to input and output streams. The
//! scheduler invokes [`Transition::transition`] with one [`InputSlice`] per
//! input, covering everything appended since the agent last consumed. The
//! returned [`Step`] says what to append to each output and how much of each
//! offered slice the agent is done with. Anything not consumed is offered
//! again on the next invocation, so partial consumption (sliding windows,
//! uneven merges) costs nothing.
//!
//! Most callers never implement [`Transition`] directly; the adapters
//! [`Incremental`], [`IncrementalMerge`] and [`Consume`] wrap plain closures
//! over `&[Sample]` views, and the helpers in [`crate::ops`],
//! [`crate::window`] and [`crate::merge`] build typed agents on top of those.

use crate::error::RillError;
use crate::types::{Sample, StreamId};

/// One input view passed to a transition: the unconsumed region of a
/// subscribed stream at invocation time.
pub struct InputSlice<'a> {
    pub stream: StreamId,
    pub name: &'a str,
    /// Absolute stream position of `values[0]`.
    pub start: usize,
    pub values: &'a [Sample],
}

/// The result of one transition invocation.
pub struct Step {
    /// Values to append, one batch per declared output stream.
    pub outputs: Vec<Vec<Sample>>,
    /// Elements consumed per input, relative to the offered slice.
    pub consumed: Vec<usize>,
}

impl Step {
    pub fn new(outputs: Vec<Vec<Sample>>, consumed: Vec<usize>) -> Self {
        Self { outputs, consumed }
    }
}

/// A transition function together with whatever state it carries between
/// invocations.
pub trait Transition: Send {
    fn transition(&mut self, inputs: &[InputSlice<'_>]) -> Result<Step, RillError>;
}

// ── Closure adapters ──

/// Single-input, single-output discipline.
///
/// The callback receives the unconsumed slice and returns the values to emit
/// plus how many input elements it will not need again.
pub struct Incremental<F> {
    callback: F,
}

impl<F> Incremental<F>
where
    F: FnMut(&[Sample]) -> Result<(Vec<Sample>, usize), RillError> + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Transition for Incremental<F>
where
    F: FnMut(&[Sample]) -> Result<(Vec<Sample>, usize), RillError> + Send,
{
    fn transition(&mut self, inputs: &[InputSlice<'_>]) -> Result<Step, RillError> {
        let [input] = inputs else {
            return Err(RillError::Config(format!(
                "single-input discipline wired to {} inputs",
                inputs.len()
            )));
        };
        let (out, consumed) = (self.callback)(input.values)?;
        Ok(Step::new(vec![out], vec![consumed]))
    }
}

/// Multi-input, single-output discipline.
///
/// The callback sees every unconsumed slice at once and reports a per-input
/// consumed count, so it can wait for slower inputs without blocking faster
/// ones.
pub struct IncrementalMerge<F> {
    callback: F,
}

impl<F> IncrementalMerge<F>
where
    F: FnMut(&[&[Sample]]) -> Result<(Vec<Sample>, Vec<usize>), RillError> + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Transition for IncrementalMerge<F>
where
    F: FnMut(&[&[Sample]]) -> Result<(Vec<Sample>, Vec<usize>), RillError> + Send,
{
    fn transition(&mut self, inputs: &[InputSlice<'_>]) -> Result<Step, RillError> {
        let views: Vec<&[Sample]> = inputs.iter().map(|s| s.values).collect();
        let (out, consumed) = (self.callback)(&views)?;
        Ok(Step::new(vec![out], consumed))
    }
}

/// Single-input terminal discipline: consumes everything offered, emits
/// nothing.
pub struct Consume<F> {
    callback: F,
}

impl<F> Consume<F>
where
    F: FnMut(&[Sample]) -> Result<(), RillError> + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Transition for Consume<F>
where
    F: FnMut(&[Sample]) -> Result<(), RillError> + Send,
{
    fn transition(&mut self, inputs: &[InputSlice<'_>]) -> Result<Step, RillError> {
        let [input] = inputs else {
            return Err(RillError::Config(format!(
                "terminal discipline wired to {} inputs",
                inputs.len()
            )));
        };
        (self.callback)(input.values)?;
        Ok(Step::new(Vec::new(), vec![input.values.len()]))
    }
}

// ── Graph-internal agent slot ──

/// One input subscription: which stream, and how far it has been consumed.
#[derive(Debug, Clone, Copy)]
pub struct Subscription {
    pub stream: StreamId,
    /// Everything before this position has been consumed by the agent.
    pub pointer: usize,
}

pub(crate) struct Agent {
    pub(crate) name: String,
    pub(crate) transition: Box<dyn Transition>,
    pub(crate) inputs: Vec<Subscription>,
    pub(crate) outputs: Vec<StreamId>,
    /// Set when the agent violated its contract or returned an error; a failed
    /// agent is never invoked again.
    pub(crate) failed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice<'a>(name: &'a str, start: usize, values: &'a [Sample]) -> InputSlice<'a> {
        InputSlice {
            stream: 0,
            name,
            start,
            values,
        }
    }

    #[test]
    fn test_incremental_adapter() {
        // Keeps the last element unconsumed each round.
        let mut t = Incremental::new(|values: &[Sample]| {
            let keep = values.len().saturating_sub(1);
            Ok((values[..keep].to_vec(), keep))
        });
        let data: Vec<Sample> = (0..5i64).map(Sample::new).collect();
        let step = t.transition(&[slice("t", 0, &data)]).unwrap();
        assert_eq!(step.consumed, vec![4]);
        assert_eq!(step.outputs.len(), 1);
        assert_eq!(step.outputs[0].len(), 4);
    }

    #[test]
    fn test_incremental_rejects_multiple_inputs() {
        let mut t = Incremental::new(|values: &[Sample]| Ok((Vec::new(), values.len())));
        let a: Vec<Sample> = vec![Sample::new(1i64)];
        let b: Vec<Sample> = vec![Sample::new(2i64)];
        let inputs = [slice("a", 0, &a), slice("b", 0, &b)];
        assert!(matches!(
            t.transition(&inputs),
            Err(RillError::Config(_))
        ));
    }

    #[test]
    fn test_merge_adapter_reports_per_input_counts() {
        let mut t = IncrementalMerge::new(|views: &[&[Sample]]| {
            let rows = views.iter().map(|v| v.len()).min().unwrap_or(0);
            Ok((Vec::new(), vec![rows; views.len()]))
        });
        let a: Vec<Sample> = (0..3i64).map(Sample::new).collect();
        let b: Vec<Sample> = (0..7i64).map(Sample::new).collect();
        let inputs = [slice("a", 0, &a), slice("b", 0, &b)];
        let step = t.transition(&inputs).unwrap();
        assert_eq!(step.consumed, vec![3, 3]);
    }

    #[test]
    fn test_consume_adapter_takes_everything() {
        let mut seen = 0usize;
        let data: Vec<Sample> = (0..4i64).map(Sample::new).collect();
        let mut t = Consume::new(|values: &[Sample]| {
            seen = values.len();
            Ok(())
        });
        let step = t.transition(&[slice("t", 0, &data)]).unwrap();
        assert!(step.outputs.is_empty());
        assert_eq!(step.consumed, vec![4]);
        drop(t);
        assert_eq!(seen, 4);
    }
}
