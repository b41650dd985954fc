//! Typed element-wise operators and sinks.
//!
//! These helpers wrap plain closures over concrete element types into agents,
//! doing the [`Sample`] downcasting at the edge. A mismatched element type
//! surfaces as a [`RillError::TypeMismatch`], which fails the one agent that
//! hit it and leaves the rest of the graph running.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::agent::{Consume, Incremental};
use crate::error::RillError;
use crate::graph::ProcessGraph;
use crate::types::{AgentId, Sample, StreamId};

/// Clone a slice of samples out as concrete `T`s.
pub fn downcast_values<T: Clone + 'static>(
    context: &str,
    values: &[Sample],
) -> Result<Vec<T>, RillError> {
    values
        .iter()
        .map(|v| {
            v.downcast_ref::<T>().cloned().ok_or_else(|| RillError::TypeMismatch {
                context: context.to_string(),
                expected: std::any::type_name::<T>(),
            })
        })
        .collect()
}

/// Apply `f` to every element of `input`, appending the results to `output`.
pub fn map_element<T, U, F>(
    graph: &mut ProcessGraph,
    name: &str,
    input: StreamId,
    output: StreamId,
    mut f: F,
) -> Result<AgentId, RillError>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    F: FnMut(&T) -> U + Send + 'static,
{
    let context = name.to_string();
    let transition = Incremental::new(move |values: &[Sample]| {
        let mut out = Vec::with_capacity(values.len());
        for v in values {
            let v = v.downcast_ref::<T>().ok_or_else(|| RillError::TypeMismatch {
                context: context.clone(),
                expected: std::any::type_name::<T>(),
            })?;
            out.push(Sample::new(f(v)));
        }
        Ok((out, values.len()))
    });
    graph.add_agent(name, &[input], &[output], transition)
}

/// Copy the elements of `input` for which `pred` holds into `output`.
pub fn filter_element<T, F>(
    graph: &mut ProcessGraph,
    name: &str,
    input: StreamId,
    output: StreamId,
    mut pred: F,
) -> Result<AgentId, RillError>
where
    T: Clone + Send + 'static,
    F: FnMut(&T) -> bool + Send + 'static,
{
    let context = name.to_string();
    let transition = Incremental::new(move |values: &[Sample]| {
        let mut out = Vec::new();
        for v in values {
            let typed = v.downcast_ref::<T>().ok_or_else(|| RillError::TypeMismatch {
                context: context.clone(),
                expected: std::any::type_name::<T>(),
            })?;
            if pred(typed) {
                out.push(v.clone());
            }
        }
        Ok((out, values.len()))
    });
    graph.add_agent(name, &[input], &[output], transition)
}

/// Terminal observer: `f` sees every element of `input` exactly once.
pub fn sink<T, F>(
    graph: &mut ProcessGraph,
    name: &str,
    input: StreamId,
    mut f: F,
) -> Result<AgentId, RillError>
where
    T: Clone + Send + 'static,
    F: FnMut(&T) + Send + 'static,
{
    let context = name.to_string();
    let transition = Consume::new(move |values: &[Sample]| {
        for v in values {
            let typed = v.downcast_ref::<T>().ok_or_else(|| RillError::TypeMismatch {
                context: context.clone(),
                expected: std::any::type_name::<T>(),
            })?;
            f(typed);
        }
        Ok(())
    });
    graph.add_agent(name, &[input], &[], transition)
}

/// Write each element of `input` as one line to `path`, flushed per batch so
/// the file tails cleanly while the pipeline runs.
pub fn stream_to_file<T>(
    graph: &mut ProcessGraph,
    name: &str,
    input: StreamId,
    path: impl AsRef<Path>,
) -> Result<AgentId, RillError>
where
    T: Display + 'static,
{
    let mut writer = BufWriter::new(File::create(path)?);
    let context = name.to_string();
    let transition = Consume::new(move |values: &[Sample]| {
        for v in values {
            let typed = v.downcast_ref::<T>().ok_or_else(|| RillError::TypeMismatch {
                context: context.clone(),
                expected: std::any::type_name::<T>(),
            })?;
            writeln!(writer, "{typed}")?;
        }
        writer.flush()?;
        Ok(())
    });
    graph.add_agent(name, &[input], &[], transition)
}

/// Print each element of `input` to stdout, one per line.
pub fn print_stream<T>(
    graph: &mut ProcessGraph,
    name: &str,
    input: StreamId,
) -> Result<AgentId, RillError>
where
    T: Display + 'static,
{
    let context = name.to_string();
    let transition = Consume::new(move |values: &[Sample]| {
        for v in values {
            let typed = v.downcast_ref::<T>().ok_or_else(|| RillError::TypeMismatch {
                context: context.clone(),
                expected: std::any::type_name::<T>(),
            })?;
            println!("{typed}");
        }
        Ok(())
    });
    graph.add_agent(name, &[input], &[], transition)
}
