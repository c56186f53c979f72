//! Config server: recoverable DDL coordinators and the command API
//!
//! - [`engine`]: phase-by-phase execution with durable state documents
//! - [`service`]: per-process registry, join/conflict rules, resume after restart
//! - [`refine`], [`create`]: the concrete coordinator kinds
//! - [`http`], [`server`]: HTTP surface

pub mod create;
pub mod document;
pub mod engine;
pub mod http;
pub mod refine;
pub mod server;
pub mod service;

pub use document::{CoordinatorId, CoordinatorKind, CoordinatorStatus, StateDocument};
pub use engine::{CoordinatorHandle, CurrentOpMode, CurrentOpReport, EngineSettings};
pub use server::ConfigServer;
pub use service::{DdlCoordinatorService, DdlRequest};
