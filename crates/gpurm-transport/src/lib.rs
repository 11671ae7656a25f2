//! gpurm-transport: Remote job control transport
//!
//! This crate provides the client side of the node manager protocol:
//! - The `NodeManagerClient` trait the dispatcher drives
//! - JSON request payloads with the node manager's field names
//! - A gRPC implementation of the client

pub mod grpc;
pub mod traits;
pub mod wire;

pub use grpc::GrpcNodeClient;
pub use traits::NodeManagerClient;
pub use wire::{JobIdPayload, LaunchPayload};
