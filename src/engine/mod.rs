//! Everything concerning the matching-engine subprocess: its wire protocol,
//! the line-protocol client that talks over its pipes, and the supervisor
//! that owns its lifecycle.

pub mod client;
pub mod protocol;
pub mod supervisor;

pub use client::{ClientError, EngineClient, EnginePipe};
pub use protocol::*;
pub use supervisor::{EngineSupervisor, SupervisorError};
