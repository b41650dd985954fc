//! Merge operators over several input streams.
//!
//! [`zip_streams`] aligns inputs positionally and only advances over the
//! prefix every input has reached, so a slow input stalls emission without
//! losing anything from the fast ones. [`blend_streams`] is the opposite
//! trade: it consumes whatever has arrived on any input, in arrival order,
//! with no alignment at all.

use crate::agent::IncrementalMerge;
use crate::error::RillError;
use crate::graph::ProcessGraph;
use crate::ops::downcast_values;
use crate::types::{AgentId, Sample, StreamId};

/// Positional merge: emit one `Vec<T>` row per index that every input has
/// reached, consuming exactly that prefix from each.
pub fn zip_streams<T>(
    graph: &mut ProcessGraph,
    name: &str,
    inputs: &[StreamId],
    output: StreamId,
) -> Result<AgentId, RillError>
where
    T: Clone + Send + 'static,
{
    if inputs.is_empty() {
        return Err(RillError::Config(format!("`{name}`: zip needs at least one input")));
    }
    let context = name.to_string();
    let transition = IncrementalMerge::new(move |views: &[&[Sample]]| {
        let rows = views.iter().map(|v| v.len()).min().unwrap_or(0);
        if rows == 0 {
            return Ok((Vec::new(), vec![0; views.len()]));
        }
        let mut columns = Vec::with_capacity(views.len());
        for view in views {
            columns.push(downcast_values::<T>(&context, &view[..rows])?);
        }
        let mut out = Vec::with_capacity(rows);
        for r in 0..rows {
            let row: Vec<T> = columns.iter().map(|c| c[r].clone()).collect();
            out.push(Sample::new(row));
        }
        Ok((out, vec![rows; views.len()]))
    });
    graph.add_agent(name, inputs, &[output], transition)
}

/// Arrival-order merge: apply `f` to every element of every input as it shows
/// up, consuming each input fully on every invocation.
pub fn blend_streams<T, U, F>(
    graph: &mut ProcessGraph,
    name: &str,
    inputs: &[StreamId],
    output: StreamId,
    mut f: F,
) -> Result<AgentId, RillError>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    F: FnMut(&T) -> U + Send + 'static,
{
    if inputs.is_empty() {
        return Err(RillError::Config(format!("`{name}`: blend needs at least one input")));
    }
    let context = name.to_string();
    let transition = IncrementalMerge::new(move |views: &[&[Sample]]| {
        let mut out = Vec::new();
        let mut consumed = Vec::with_capacity(views.len());
        for view in views {
            for v in view.iter() {
                let typed = v.downcast_ref::<T>().ok_or_else(|| RillError::TypeMismatch {
                    context: context.clone(),
                    expected: std::any::type_name::<T>(),
                })?;
                out.push(Sample::new(f(typed)));
            }
            consumed.push(view.len());
        }
        Ok((out, consumed))
    });
    graph.add_agent(name, inputs, &[output], transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;

    #[test]
    fn test_zip_waits_for_the_slow_input() {
        let mut g = ProcessGraph::new();
        let a = g.stream("a").unwrap();
        let b = g.stream("b").unwrap();
        let out = g.stream("out").unwrap();
        let zip = zip_streams::<i64>(&mut g, "zip", &[a, b], out).unwrap();
        let mut sched = Scheduler::new(g);

        // Only `a` has data: nothing to emit, nothing consumed.
        sched.extend(a, 0..5i64).unwrap();
        sched.run_to_quiescence().unwrap();
        assert_eq!(sched.graph().stream_len(out), Some(0));
        assert_eq!(sched.graph().subscriptions(zip)[0].pointer, 0);

        // `b` catches up past `a`: five rows, emitted exactly once, and the
        // three extra elements of `b` stay unconsumed.
        sched.extend(b, 100..108i64).unwrap();
        sched.run_to_quiescence().unwrap();
        let rows = sched.graph().values::<Vec<i64>>(out).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![0, 100],
                vec![1, 101],
                vec![2, 102],
                vec![3, 103],
                vec![4, 104],
            ]
        );
        assert_eq!(sched.graph().subscriptions(zip)[0].pointer, 5);
        assert_eq!(sched.graph().subscriptions(zip)[1].pointer, 5);
    }

    #[test]
    fn test_zip_three_inputs() {
        let mut g = ProcessGraph::new();
        let a = g.stream("a").unwrap();
        let b = g.stream("b").unwrap();
        let c = g.stream("c").unwrap();
        let out = g.stream("out").unwrap();
        zip_streams::<i64>(&mut g, "zip3", &[a, b, c], out).unwrap();
        let mut sched = Scheduler::new(g);

        sched.extend(a, [1i64, 2]).unwrap();
        sched.extend(b, [10i64, 20, 30]).unwrap();
        sched.extend(c, [100i64]).unwrap();
        sched.run_to_quiescence().unwrap();
        assert_eq!(
            sched.graph().values::<Vec<i64>>(out).unwrap(),
            vec![vec![1, 10, 100]]
        );
    }

    #[test]
    fn test_blend_takes_arrival_order() {
        let mut g = ProcessGraph::new();
        let a = g.stream("a").unwrap();
        let b = g.stream("b").unwrap();
        let out = g.stream("out").unwrap();
        blend_streams(&mut g, "blend", &[a, b], out, |v: &i64| v * 10).unwrap();
        let mut sched = Scheduler::new(g);

        sched.extend(a, [1i64]).unwrap();
        sched.run_to_quiescence().unwrap();
        sched.extend(b, [2i64, 3]).unwrap();
        sched.run_to_quiescence().unwrap();
        sched.extend(a, [4i64]).unwrap();
        sched.run_to_quiescence().unwrap();
        assert_eq!(
            sched.graph().values::<i64>(out).unwrap(),
            vec![10, 20, 30, 40]
        );
    }

    #[test]
    fn test_merges_need_inputs() {
        let mut g = ProcessGraph::new();
        let out = g.stream("out").unwrap();
        assert!(zip_streams::<i64>(&mut g, "zip", &[], out).is_err());
        assert!(blend_streams(&mut g, "blend", &[], out, |v: &i64| *v).is_err());
    }
}
