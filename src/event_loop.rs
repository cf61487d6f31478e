//! Minimal `epoll` readiness loop for driving a TCP peer socket.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::{mem, ptr};

use tracing::{debug, info};

use crate::error::errno;
use crate::utp::UtpSocket;
use crate::{Error, PeerBuffer, PeerSocket, Result, Transfer};

/// Total number of events returned each tick (event loop cycle).
const EPOLL_MAX_EVENTS: i32 = 2;

/// Largest number of bytes moved by a single `try_read`/`try_write` call.
const IO_CHUNK: usize = 16 * 1024;

/// Why [PeerLoop::run] returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exit {
    /// The peer shut the connection down.
    PeerClosed,
    /// SIGINT or SIGTERM was caught.
    Signal,
}

/// Readiness loop driving a single TCP [PeerSocket] with `epoll`.
#[derive(Debug)]
pub struct PeerLoop {
    epoll: OwnedFd,
    signal: Option<OwnedFd>,
    timeout_ms: i32,
}

impl PeerLoop {
    /// Creates a loop that blocks until the peer socket is ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the `epoll` instance could not be created.
    pub fn new() -> Result<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epoll_fd == -1 {
            return Err(errno!("failed to create epoll instance"));
        }

        Ok(Self {
            // SAFETY: `epoll_fd` was just created and is owned by nothing else.
            epoll: unsafe { OwnedFd::from_raw_fd(epoll_fd) },
            signal: None,
            timeout_ms: -1,
        })
    }

    /// Makes [PeerLoop::run] return [Exit::Signal] on SIGINT or SIGTERM.
    ///
    /// # Notes
    ///
    /// Both signals are blocked for the calling thread so that they are only
    /// delivered through the loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the signals could not be blocked or the signal file
    /// descriptor could not be created.
    pub fn with_shutdown_signals(mut self) -> Result<Self> {
        let mut mask: libc::sigset_t = unsafe { mem::zeroed() };

        unsafe {
            if libc::sigemptyset(&raw mut mask) == -1
                || libc::sigaddset(&raw mut mask, libc::SIGINT) == -1
                || libc::sigaddset(&raw mut mask, libc::SIGTERM) == -1
            {
                return Err(errno!("failed to build signal set"));
            }

            // Blocks SIGINT and SIGTERM from being intercepted by default handlers.
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &raw const mask, ptr::null_mut());
            if rc != 0 {
                return Err(Error::Io(io::Error::from_raw_os_error(rc)));
            }
        }

        let signal_fd = unsafe { libc::signalfd(-1, &raw const mask, libc::SFD_CLOEXEC) };
        if signal_fd == -1 {
            return Err(errno!("failed to create signal file descriptor"));
        }

        // SAFETY: `signal_fd` was just created and is owned by nothing else.
        let signal = unsafe { OwnedFd::from_raw_fd(signal_fd) };
        self.register(signal.as_raw_fd(), libc::EPOLLIN as u32, libc::EPOLL_CTL_ADD)?;
        self.signal = Some(signal);

        Ok(self)
    }

    /// Makes each wait give up after `timeout_ms` milliseconds without an
    /// event, in which case [PeerLoop::run] fails with
    /// [io::ErrorKind::TimedOut].
    pub fn with_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sends `outbound` to the peer and collects everything it sends into
    /// `inbound`, until the peer closes the connection or a shutdown signal
    /// arrives.
    ///
    /// The socket is not closed by this function.
    ///
    /// # Errors
    ///
    /// Returns an error if `sock` is not a TCP socket, if the socket reported
    /// a transport failure, or if the loop itself failed.
    pub fn run<S: UtpSocket>(
        &mut self,
        sock: &mut PeerSocket<S>,
        outbound: &mut PeerBuffer,
        inbound: &mut PeerBuffer,
    ) -> Result<Exit> {
        let Some(fd) = sock.tcp_fd() else {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "only TCP peer sockets can be driven by epoll",
            )));
        };

        let interest = |outbound: &PeerBuffer| {
            let mut events = libc::EPOLLIN as u32 | libc::EPOLLRDHUP as u32;
            if !outbound.is_empty() {
                events |= libc::EPOLLOUT as u32;
            }
            events
        };

        let mut current = interest(outbound);
        self.register(fd, current, libc::EPOLL_CTL_ADD)?;

        let result = self.drive(sock, fd, outbound, inbound, &mut current, interest);

        // The descriptor stays open, so it must leave the interest list.
        unsafe { libc::epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, ptr::null_mut()) };

        result
    }

    fn drive<S: UtpSocket>(
        &mut self,
        sock: &mut PeerSocket<S>,
        fd: RawFd,
        outbound: &mut PeerBuffer,
        inbound: &mut PeerBuffer,
        current: &mut u32,
        interest: impl Fn(&PeerBuffer) -> u32,
    ) -> Result<Exit> {
        // Array of events for ready file descriptors.
        let mut events = [libc::epoll_event { events: 0, u64: 0 }; EPOLL_MAX_EVENTS as usize];

        loop {
            let ready = unsafe {
                libc::epoll_wait(
                    self.epoll.as_raw_fd(),
                    events.as_mut_ptr(),
                    EPOLL_MAX_EVENTS,
                    self.timeout_ms,
                )
            };

            if ready == -1 {
                if io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(errno!("failed to wait for events"));
            }

            if ready == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no events from {} within {} ms", sock.display_name(), self.timeout_ms),
                )));
            }

            for event in events.iter().take(ready as usize) {
                let token = event.u64;
                let flags = event.events;

                if let Some(ref signal) = self.signal {
                    if token == signal.as_raw_fd() as u64 {
                        debug!("signal caught");
                        return Ok(Exit::Signal);
                    }
                }

                if token != fd as u64 {
                    continue;
                }

                if flags & libc::EPOLLOUT as u32 != 0 {
                    loop {
                        match sock.try_write(outbound, IO_CHUNK)? {
                            Transfer::Bytes(n) => debug!("wrote {n} bytes to {}", sock.display_name()),
                            _ => break,
                        }
                    }
                }

                if flags & (libc::EPOLLIN | libc::EPOLLRDHUP | libc::EPOLLHUP) as u32 != 0 {
                    loop {
                        match sock.try_read(inbound, IO_CHUNK) {
                            Ok(Transfer::Bytes(n)) => {
                                debug!("read {n} bytes from {}", sock.display_name())
                            }
                            Ok(_) => break,
                            Err(Error::Io(ref err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                                info!("{} closed the connection", sock.display_name());
                                return Ok(Exit::PeerClosed);
                            }
                            Err(err) => return Err(err),
                        }
                    }
                }

                let wanted = interest(outbound);
                if wanted != *current {
                    self.register(fd, wanted, libc::EPOLL_CTL_MOD)?;
                    *current = wanted;
                }
            }
        }
    }

    fn register(&self, fd: RawFd, events: u32, op: libc::c_int) -> Result<()> {
        let mut ev = libc::epoll_event {
            events,
            u64: fd as u64,
        };

        if unsafe { libc::epoll_ctl(self.epoll.as_raw_fd(), op, fd, &raw mut ev) } == -1 {
            return Err(errno!("failed to register socket {fd} with epoll"));
        }

        Ok(())
    }
}
