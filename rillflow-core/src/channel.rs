//! Cross-thread plumbing: scheduler inboxes and inter-process relays.
//!
//! Every running process owns one unbounded inbox of [`Append`] messages, fed
//! by its source threads and by relay threads carrying boundary-stream data
//! from other processes. The scheduler drains the inbox between quiescent
//! phases and exits once every sender is gone.
//!
//! Relay edges themselves are bounded: a producer that outruns a consumer
//! blocks on `send` until the consumer catches up, which keeps memory flat
//! without dropping or reordering anything.

use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::types::{Sample, StreamId};

/// Capacity of one inter-process relay edge.
pub(crate) const EDGE_CAPACITY: usize = 1024;

/// One batch of values bound for a stream, in append order.
pub(crate) struct Append {
    pub stream: StreamId,
    pub values: Vec<Sample>,
}

/// Forward batches from a bounded edge into a consumer's inbox, preserving
/// order. Exits when the producer side closes.
pub(crate) fn spawn_relay(
    label: String,
    edge: Receiver<Vec<Sample>>,
    inbox: Sender<Append>,
    target: StreamId,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(values) = edge.recv() {
            if inbox.send(Append { stream: target, values }).is_err() {
                tracing::warn!(relay = %label, "consumer inbox closed, dropping remaining data");
                return;
            }
        }
        tracing::debug!(relay = %label, "producer closed, relay finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};

    #[test]
    fn test_relay_preserves_order_and_closes() {
        let (edge_tx, edge_rx) = bounded::<Vec<Sample>>(4);
        let (inbox_tx, inbox_rx) = unbounded();
        let handle = spawn_relay("a:t -> b:t".into(), edge_rx, inbox_tx, 7);

        for batch in 0..3i64 {
            edge_tx
                .send(vec![Sample::new(batch * 2), Sample::new(batch * 2 + 1)])
                .unwrap();
        }
        drop(edge_tx);
        handle.join().unwrap();

        let mut seen = Vec::new();
        while let Ok(append) = inbox_rx.recv() {
            assert_eq!(append.stream, 7);
            seen.extend(append.values.iter().map(|v| *v.downcast_ref::<i64>().unwrap()));
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }
}
