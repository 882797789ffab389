//! Handoff between the height stream reader and the persistence worker.

use companion_types::Block;
use tokio::sync::mpsc;

/// Slots in the job queue. A single slot makes a slow worker stall the stream reader.
pub const JOB_QUEUE_CAPACITY: usize = 1;

/// One fetched block waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    block: Block,
    done: bool,
}

impl Job {
    /// Wraps a fetched block.
    pub const fn new(block: Block) -> Self {
        Self { block, done: false }
    }

    /// Returns the wrapped block.
    pub const fn block(&self) -> &Block {
        &self.block
    }

    /// Returns the height of the wrapped block.
    pub const fn height(&self) -> i64 {
        self.block.height()
    }

    /// Marks the job as processed.
    pub const fn mark_done(&mut self) {
        self.done = true;
    }

    /// Returns `true` once the job was processed, successfully or not.
    pub const fn is_done(&self) -> bool {
        self.done
    }
}

/// Sending half of the job queue, owned by the stream reader.
pub type JobSender = mpsc::Sender<Job>;

/// Receiving half of the job queue, owned by the persistence worker.
pub type JobReceiver = mpsc::Receiver<Job>;

/// Creates the single-producer single-consumer job queue.
pub fn job_queue() -> (JobSender, JobReceiver) {
    mpsc::channel(JOB_QUEUE_CAPACITY)
}
