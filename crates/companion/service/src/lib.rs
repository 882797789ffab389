//! Actors and read side of the companion.
//!
//! - [`IngestActor`] runs the ingestion pipeline until the height stream closes or shutdown.
//! - [`QueryRpcActor`] serves persisted blocks over plain HTTP (`GET /v1/block?height=H`,
//!   `GET /v1/header?height=H`) and over the `companion` JSON-RPC namespace.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod actors;
pub use actors::{
    CancellableContext, CompanionActor, DEFAULT_RESTARTS, IngestActor, IngestActorError,
    IngestContext, QueryRpcActor, QueryRpcActorError, QueryRpcConfig, QueryRpcContext,
};

mod query;
pub use query::{NOT_FOUND_CODE, QueryError, QueryKind, QueryRpc};

mod height_query;
pub use height_query::{BLOCK_PATH, HEADER_PATH, HeightQueryLayer, HeightQueryMiddleware, parse_height};
