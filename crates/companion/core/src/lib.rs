//! Ingestion pipeline of the companion.
//!
//! A [`Fetcher`] follows the node's height subscription, fetches every new block and hands it to
//! a single [`PersistenceWorker`] over a one-slot [`job_queue`]. After each successful write the
//! [`RetentionCoordinator`] moves the node's pruning service retain height up to the persisted
//! height. [`IngestService`] wires the pieces together behind a start/stop [`Lifecycle`].
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod config;
pub use config::{Config, ConfigError};

pub mod node;
pub use node::{BlockSource, NodeClient, NodeClientError, RetentionControl};

mod lifecycle;
pub use lifecycle::{Lifecycle, LifecycleError, ServiceState};

mod retry;
pub use retry::RetryPolicy;

mod metrics;
pub use metrics::Metrics;

mod queue;
pub use queue::{JOB_QUEUE_CAPACITY, Job, JobReceiver, JobSender, job_queue};

mod retention;
pub use retention::{RetentionCoordinator, RetentionError};

mod worker;
pub use worker::{PersistenceWorker, WorkerError};

mod fetcher;
pub use fetcher::{Fetcher, FetcherError};

mod backfill;
pub use backfill::{Backfill, BackfillReport};

mod ingest;
pub use ingest::{IngestError, IngestService, run_backfill};
