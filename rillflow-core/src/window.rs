//! Sliding-window operators.
//!
//! Built on the single-input incremental discipline: with `n` elements
//! offered, the agent emits `(n - window_size) / step_size + 1` window results
//! (zero if `n < window_size`), consumes `steps * step_size` elements, and
//! leaves the tail to be re-offered when the input grows again. No window is
//! ever computed twice.

use crate::agent::Incremental;
use crate::error::RillError;
use crate::graph::ProcessGraph;
use crate::ops::downcast_values;
use crate::types::{AgentId, Sample, StreamId};

/// Apply `reduce` to every full window of `input`, appending one result per
/// window to `output`. Windows are `window_size` long and start `step_size`
/// apart; overlapping windows (step < window) and gapped windows
/// (step > window) both work.
pub fn map_window<T, U, F>(
    graph: &mut ProcessGraph,
    name: &str,
    input: StreamId,
    output: StreamId,
    window_size: usize,
    step_size: usize,
    mut reduce: F,
) -> Result<AgentId, RillError>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    F: FnMut(&[T]) -> U + Send + 'static,
{
    if window_size == 0 || step_size == 0 {
        return Err(RillError::Config(format!(
            "`{name}`: window_size and step_size must be positive"
        )));
    }
    let context = name.to_string();
    let transition = Incremental::new(move |values: &[Sample]| {
        if values.len() < window_size {
            return Ok((Vec::new(), 0));
        }
        let rows = downcast_values::<T>(&context, values)?;
        let steps = (rows.len() - window_size) / step_size + 1;
        let mut out = Vec::with_capacity(steps);
        for i in 0..steps {
            let lo = i * step_size;
            out.push(Sample::new(reduce(&rows[lo..lo + window_size])));
        }
        Ok((out, steps * step_size))
    });
    graph.add_agent(name, &[input], &[output], transition)
}
