//! Descriptor-level networking primitives for peer connections.
//!
//! This module provides the narrow capability a [crate::PeerSocket] borrows
//! for option setting and teardown, plus the address checks applied before an
//! outbound connection is attempted.

mod addr;
mod ops;
mod tos;

pub use addr::is_valid_for_peers;
pub use ops::{NetConfig, SocketOps, TCP_CA_NAME_MAX};
pub use tos::Tos;
