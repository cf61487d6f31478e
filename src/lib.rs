//! Peer socket for a BitTorrent-style client, unifying a plain TCP descriptor
//! and a uTP (Micro Transport Protocol) socket behind a single non-blocking
//! read/write/close contract.
//!
//! The uTP library itself lives outside this crate. Its surface is described
//! by the [`utp::UtpContext`] and [`utp::UtpSocket`] traits.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

#[cfg(not(target_os = "linux"))]
compile_error!("This crate is only compatible with Linux systems.");

pub mod buffer;
pub mod connect;
pub mod error;
pub mod event_loop;
pub mod net;
pub mod peer_socket;
pub mod utp;

pub use buffer::PeerBuffer;
pub use connect::open_utp_peer_socket;
pub use error::{ConfigError, Error, Result};
pub use event_loop::{Exit, PeerLoop};
pub use net::{NetConfig, SocketOps, Tos};
pub use peer_socket::{BAD_SOCKET, Kind, PeerSocket, Transfer};
