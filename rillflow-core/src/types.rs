use std::any::Any;

/// Index of a stream within its owning [`ProcessGraph`](crate::graph::ProcessGraph).
pub type StreamId = usize;

/// Index of an agent within its owning [`ProcessGraph`](crate::graph::ProcessGraph).
pub type AgentId = usize;

/// Index of a process within a [`Pipeline`](crate::pipeline::Pipeline).
pub type ProcessId = usize;

// --- Type-erased cloneable element unit ---

/// Trait object bound for values flowing through streams: `Any + Clone + Send`.
pub trait SampleData: Any + Send {
    fn clone_box(&self) -> Box<dyn SampleData>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any + Clone + Send> SampleData for T {
    fn clone_box(&self) -> Box<dyn SampleData> {
        Box::new(self.clone())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A cloneable, type-erased stream element.
///
/// The runtime is generic over opaque element kinds: streams store `Sample`s
/// and the typed operator helpers in [`ops`](crate::ops), [`window`](crate::window)
/// and [`merge`](crate::merge) downcast at the boundary.
pub struct Sample(Box<dyn SampleData>);

impl Sample {
    /// Wrap a concrete value into a type-erased sample.
    pub fn new<T: Any + Clone + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Try to get a reference to the inner value as type `T`. Returns `None` on mismatch.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }

    /// Unwrap the inner value. Returns `None` on type mismatch.
    pub fn downcast<T: Any>(self) -> Option<T> {
        self.0.into_any().downcast::<T>().ok().map(|boxed| *boxed)
    }
}

impl Clone for Sample {
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl std::fmt::Debug for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sample(<type-erased>)")
    }
}
