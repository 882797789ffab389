/// The two independent lower bounds the remote node tracks before pruning blocks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RetainHeights {
    /// Retain height owned by the application.
    pub app: u64,
    /// Retain height owned by the pruning service, i.e. this companion.
    pub pruning_service: u64,
}

impl RetainHeights {
    /// Creates a new [`RetainHeights`].
    pub const fn new(app: u64, pruning_service: u64) -> Self {
        Self { app, pruning_service }
    }

    /// Returns the oldest height the node guarantees to retain.
    pub const fn effective(&self) -> u64 {
        if self.app < self.pruning_service { self.app } else { self.pruning_service }
    }
}
