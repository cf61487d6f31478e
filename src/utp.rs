//! Boundary of the uTP (Micro Transport Protocol, [BEP 29]) library.
//!
//! uTP runs over UDP and implements its own retransmission and LEDBAT
//! congestion control. None of that lives here: these traits only describe
//! the handful of library calls a [crate::PeerSocket] and
//! [crate::open_utp_peer_socket] make.
//!
//! [BEP 29]: https://www.bittorrent.org/beps/bep_0029.html

use std::fmt;
use std::io::{self, IoSlice};
use std::net::SocketAddr;

/// A session-wide uTP context that new sockets are created under.
pub trait UtpContext {
    /// The socket reference type handed out by this context.
    type Socket: UtpSocket;

    /// Creates a new, unconnected socket. Returns `None` if the library could
    /// not allocate one.
    fn create_socket(&mut self) -> Option<Self::Socket>;
}

/// An opaque reference to a socket owned by the uTP library.
///
/// Received bytes are not pulled through this trait: the library delivers
/// them asynchronously to the owner identified by the socket's user data.
pub trait UtpSocket: fmt::Debug {
    /// Caller context attached to the socket and handed back with every
    /// library event (reads, writability, state changes).
    type UserData;

    /// Attaches (`Some`) or detaches (`None`) the caller context.
    fn set_userdata(&mut self, userdata: Option<Self::UserData>);

    /// Starts connecting to `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection attempt could not be started.
    fn connect(&mut self, addr: &SocketAddr) -> io::Result<()>;

    /// Queues the bytes in `bufs` for sending, returning how many were
    /// accepted.
    ///
    /// A return value `<= 0` means nothing was accepted. The library signals
    /// a genuine failure only through `errno`, which the caller clears before
    /// the call; an unchanged (zero) `errno` means the send window is full.
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> isize;

    /// Tells the library the receive buffer has been drained, so it may send
    /// an ACK sooner and reopen the remote's congestion window.
    fn read_drained(&mut self);

    /// Requests shutdown. The library frees the socket once it is done with
    /// it; the reference must not be used afterwards.
    fn close(self);
}

/// Socket type for peer sockets that never carry uTP.
///
/// Uninhabited, so a `PeerSocket<Disabled>` can only ever be a TCP or closed
/// socket.
#[derive(Debug)]
pub enum Disabled {}

impl UtpSocket for Disabled {
    type UserData = ();

    fn set_userdata(&mut self, _: Option<()>) {
        match *self {}
    }

    fn connect(&mut self, _: &SocketAddr) -> io::Result<()> {
        match *self {}
    }

    fn write_vectored(&mut self, _: &[IoSlice<'_>]) -> isize {
        match *self {}
    }

    fn read_drained(&mut self) {
        match *self {}
    }

    fn close(self) {
        match self {}
    }
}
