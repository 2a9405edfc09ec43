pub mod client;
pub mod config;
pub mod error;
pub mod fleet;
pub mod machine;
pub mod queue;
pub mod reconfig;
pub mod registry;
pub mod remote;

pub use client::{HttpNodeClient, NodeClient, SyncRequestBody};
pub use config::{EngineConfig, MODULO_BASE};
pub use error::{EngineError, EngineResult};
pub use fleet::PeerSetView;
pub use machine::{IterationSummary, StateMachine};
pub use queue::{SyncKind, SyncQueues};
pub use reconfig::{ReconfigOp, ReconfigPlanner};
pub use registry::{
    Discovery, Endpoint, EndpointMap, LocalStore, ReplicaRegistry, ReplicaSet, Selection,
    UserRecord,
};
