//! The ROS-facing transport layer: a minimal XML-RPC client for the master
//! API, TCPROS framing with the connection handshake, persistent and
//! ephemeral service clients, and long-lived topic subscribers.
//!
//! Only the subset of ROS that the robot firmware actually speaks is
//! implemented here; this is not a general-purpose ROS library.

mod framing;
mod master;
mod service;
mod topic;
mod xmlrpc;

pub use framing::*;
pub use master::*;
pub use service::*;
pub use topic::*;
pub use xmlrpc::*;
