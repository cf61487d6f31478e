//! A peer connection's transport: either a TCP descriptor or a uTP socket.

use std::fmt;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;

use tracing::{Span, debug, trace};

use crate::error::{clear_errno, last_errno};
use crate::utp::{Disabled, UtpSocket};
use crate::{Error, PeerBuffer, Result, SocketOps};

/// Sentinel for "no descriptor".
pub const BAD_SOCKET: RawFd = -1;

/// Which transport, if any, backs a [PeerSocket].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// No transport. The socket is closed.
    None,
    /// A TCP stream descriptor.
    Tcp,
    /// A uTP socket.
    Utp,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::None => f.write_str("none"),
            Kind::Tcp => f.write_str("tcp"),
            Kind::Utp => f.write_str("µTP"),
        }
    }
}

/// Outcome of a [PeerSocket::try_write] or [PeerSocket::try_read] call that
/// did not fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transfer {
    /// This many bytes (always `> 0`) were moved.
    Bytes(usize),
    /// The transport cannot make progress right now. Retry once it signals
    /// readiness.
    WouldBlock,
    /// Nothing is pulled by this call: the uTP library delivers received bytes
    /// to the socket's owner on its own.
    Deferred,
    /// Nothing was attempted: zero bytes were requested, there was nothing to
    /// send, or the socket is closed.
    Idle,
}

impl Transfer {
    /// Returns the number of bytes moved, `0` unless this is
    /// [Transfer::Bytes].
    pub fn bytes(self) -> usize {
        match self {
            Transfer::Bytes(n) => n,
            Transfer::WouldBlock | Transfer::Deferred | Transfer::Idle => 0,
        }
    }

    fn from_io(result: io::Result<usize>) -> Result<Self> {
        match result {
            Ok(0) => Ok(Transfer::Idle),
            Ok(n) => Ok(Transfer::Bytes(n)),
            Err(err) if can_retry(&err) => Ok(Transfer::WouldBlock),
            Err(err) => Err(Error::Io(err)),
        }
    }
}

/// Returns `true` if a failed descriptor operation should simply be tried
/// again later.
fn can_retry(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Exactly one active transport, or none.
#[derive(Debug)]
enum Handle<S> {
    None,
    Tcp(RawFd),
    Utp(S),
}

/// The transport underneath a single peer connection.
///
/// A `PeerSocket` exclusively owns its TCP descriptor or uTP socket, and is
/// driven from a single network thread through non-blocking
/// [try_write](Self::try_write) / [try_read](Self::try_read) calls.
///
/// # Notes
///
/// Dropping a `PeerSocket` does NOT release the transport. The owner must call
/// [close](Self::close) while the session (and uTP context) it was created
/// under is still alive.
#[derive(Debug)]
pub struct PeerSocket<S = Disabled> {
    handle: Handle<S>,
    endpoint: SocketAddr,
    span: Span,
}

impl<S> PeerSocket<S> {
    /// Wraps an already connected, non-blocking TCP descriptor.
    ///
    /// The session's type-of-service and, if configured, congestion control
    /// algorithm are applied to `fd`. Failing to apply either is logged and
    /// otherwise ignored.
    ///
    /// # Panics
    ///
    /// Panics if `fd` is [BAD_SOCKET].
    pub fn from_tcp(ops: &impl SocketOps, endpoint: SocketAddr, fd: RawFd) -> Self {
        assert_ne!(fd, BAD_SOCKET, "peer socket requires a valid descriptor");

        let span = tracing::trace_span!("peer_socket", peer = %endpoint, kind = %Kind::Tcp);

        if let Err(err) = ops.set_tos(fd, &endpoint.ip()) {
            debug!(parent: &span, "{err}");
        }

        if let Some(algorithm) = ops.congestion_algorithm().filter(|a| !a.is_empty()) {
            if let Err(err) = ops.set_congestion_control(fd, algorithm) {
                debug!(parent: &span, "{err}");
            }
        }

        trace!(parent: &span, "socket (tcp) is {fd}");

        Self {
            handle: Handle::Tcp(fd),
            endpoint,
            span,
        }
    }

    /// Wraps a uTP socket, either accepted or created by
    /// [crate::open_utp_peer_socket].
    pub fn from_utp(endpoint: SocketAddr, socket: S) -> Self
    where
        S: UtpSocket,
    {
        let span = tracing::trace_span!("peer_socket", peer = %endpoint, kind = %Kind::Utp);

        trace!(parent: &span, "socket (µTP) is {socket:?}");

        Self {
            handle: Handle::Utp(socket),
            endpoint,
            span,
        }
    }

    /// Creates a socket with no transport, addressed to `endpoint`.
    pub fn closed(endpoint: SocketAddr) -> Self {
        Self {
            handle: Handle::None,
            endpoint,
            span: tracing::trace_span!("peer_socket", peer = %endpoint, kind = %Kind::None),
        }
    }

    /// Returns which transport backs this socket.
    pub fn kind(&self) -> Kind {
        match self.handle {
            Handle::None => Kind::None,
            Handle::Tcp(_) => Kind::Tcp,
            Handle::Utp(_) => Kind::Utp,
        }
    }

    /// Returns `true` if this socket is backed by a TCP descriptor.
    pub fn is_tcp(&self) -> bool {
        matches!(self.handle, Handle::Tcp(_))
    }

    /// Returns `true` if this socket is backed by a uTP socket.
    pub fn is_utp(&self) -> bool {
        matches!(self.handle, Handle::Utp(_))
    }

    /// Returns `true` if no transport backs this socket.
    pub fn is_closed(&self) -> bool {
        matches!(self.handle, Handle::None)
    }

    /// Returns the remote address and port.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Returns a short identifier for log messages.
    pub fn display_name(&self) -> impl fmt::Display + '_ {
        &self.endpoint
    }

    /// Returns the TCP descriptor, if this is a TCP socket.
    pub fn tcp_fd(&self) -> Option<RawFd> {
        match self.handle {
            Handle::Tcp(fd) => Some(fd),
            _ => None,
        }
    }
}

impl<S: UtpSocket> PeerSocket<S> {
    /// Releases the transport.
    ///
    /// For uTP the socket's user data is detached before shutdown is
    /// requested, so library callbacks that fire afterwards find no owner.
    /// Calling this on a closed socket does nothing.
    pub fn close(&mut self, ops: &impl SocketOps) {
        match mem::replace(&mut self.handle, Handle::None) {
            Handle::None => {}
            Handle::Tcp(fd) => {
                if fd != BAD_SOCKET {
                    trace!(parent: &self.span, "closing socket (tcp) {fd}");
                    ops.close_socket(fd);
                }
            }
            Handle::Utp(mut socket) => {
                trace!(parent: &self.span, "closing socket (µTP)");
                socket.set_userdata(None);
                socket.close();
            }
        }
    }

    /// Writes up to `max` bytes from the front of `buf`, draining whatever the
    /// transport accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport reported a failure. Nothing was
    /// written in that case.
    pub fn try_write(&mut self, buf: &mut PeerBuffer, max: usize) -> Result<Transfer> {
        if max == 0 || buf.is_empty() {
            return Ok(Transfer::Idle);
        }

        let transfer = match self.handle {
            Handle::None => return Ok(Transfer::Idle),
            Handle::Tcp(fd) => Transfer::from_io(buf.write_to_fd(fd, max))?,
            Handle::Utp(ref mut socket) => {
                let iov = buf.vecs(max);

                clear_errno();
                let n = socket.write_vectored(&iov);
                let code = last_errno();
                drop(iov);

                if n > 0 {
                    let n = n as usize;
                    buf.drain(n);
                    Transfer::Bytes(n)
                } else if code != 0 {
                    return Err(Error::Io(io::Error::from_raw_os_error(code)));
                } else {
                    Transfer::WouldBlock
                }
            }
        };

        trace!(parent: &self.span, "try_write {max}: {transfer:?}");

        Ok(transfer)
    }

    /// Reads up to `max` bytes into `buf`.
    ///
    /// For uTP this never moves bytes, the library appends them to the owner's
    /// buffer from its own callbacks. Instead, if `buf` is empty the library
    /// is told the read side has been drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP descriptor reported a failure, including an
    /// orderly shutdown by the peer.
    pub fn try_read(&mut self, buf: &mut PeerBuffer, max: usize) -> Result<Transfer> {
        if max == 0 {
            return Ok(Transfer::Idle);
        }

        let transfer = match self.handle {
            Handle::None => Transfer::Idle,
            Handle::Tcp(fd) => Transfer::from_io(buf.read_from_fd(fd, max))?,
            Handle::Utp(ref mut socket) => {
                if buf.is_empty() {
                    socket.read_drained();
                }

                Transfer::Deferred
            }
        };

        trace!(parent: &self.span, "try_read {max}: {transfer:?}");

        Ok(transfer)
    }
}
