//! Byte queue used for a peer connection's inbound and outbound data.

use std::collections::VecDeque;
use std::io::{self, IoSlice};
use std::mem;
use std::os::unix::io::RawFd;

/// Largest number of bytes pulled from a descriptor by a single
/// [PeerBuffer::read_from_fd] call.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// FIFO byte buffer which can be filled from, and drained into, a
/// non-blocking descriptor.
#[derive(Debug, Default, Clone)]
pub struct PeerBuffer {
    data: VecDeque<u8>,
}

impl PeerBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with space for at least `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
        }
    }

    /// Returns the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends `bytes` to the back of the buffer.
    ///
    /// This is how a uTP library callback hands received bytes to the owner of
    /// a peer socket.
    pub fn add(&mut self, bytes: &[u8]) {
        self.data.extend(bytes);
    }

    /// Removes up to `n` bytes from the front of the buffer.
    pub fn drain(&mut self, n: usize) {
        let n = n.min(self.data.len());
        self.data.drain(..n);
    }

    /// Returns the front of the buffer, at most `max` bytes, as a list of
    /// slices suitable for a vectored write.
    pub fn vecs(&self, max: usize) -> Vec<IoSlice<'_>> {
        let (front, back) = self.data.as_slices();
        let mut remaining = max;
        let mut iov = Vec::with_capacity(2);

        for slice in [front, back] {
            if remaining == 0 || slice.is_empty() {
                continue;
            }

            let len = slice.len().min(remaining);
            iov.push(IoSlice::new(&slice[..len]));
            remaining -= len;
        }

        iov
    }

    /// Copies the buffered bytes into a `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    /// Writes up to `max` bytes from the front of the buffer to `fd`,
    /// draining what the kernel accepted.
    ///
    /// `SIGPIPE` is suppressed, a peer that has gone away yields `EPIPE`.
    ///
    /// # Errors
    ///
    /// Returns the OS error from `sendmsg()`. A full send buffer is reported as
    /// [io::ErrorKind::WouldBlock].
    pub fn write_to_fd(&mut self, fd: RawFd, max: usize) -> io::Result<usize> {
        let iov = self.vecs(max);
        if iov.is_empty() {
            return Ok(0);
        }

        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        // SAFETY: `IoSlice` is ABI compatible with `iovec` on Unix.
        msg.msg_iov = iov.as_ptr() as *mut libc::iovec;
        msg.msg_iovlen = iov.len() as _;

        let nbytes = unsafe { libc::sendmsg(fd, &raw const msg, libc::MSG_NOSIGNAL) };
        if nbytes == -1 {
            return Err(io::Error::last_os_error());
        }

        let nbytes = nbytes as usize;
        drop(iov);
        self.drain(nbytes);

        Ok(nbytes)
    }

    /// Reads up to `max` bytes (bounded by [READ_CHUNK_SIZE]) from `fd` and
    /// appends them to the buffer.
    ///
    /// # Errors
    ///
    /// Returns the OS error from `recv()`, with an empty receive buffer
    /// reported as [io::ErrorKind::WouldBlock]. An orderly shutdown by the
    /// peer is reported as [io::ErrorKind::UnexpectedEof].
    pub fn read_from_fd(&mut self, fd: RawFd, max: usize) -> io::Result<usize> {
        let want = max.min(READ_CHUNK_SIZE);
        if want == 0 {
            return Ok(0);
        }

        let mut chunk = vec![0u8; want];

        let nbytes = unsafe { libc::recv(fd, chunk.as_mut_ptr() as *mut libc::c_void, want, 0) };
        if nbytes == -1 {
            return Err(io::Error::last_os_error());
        }

        if nbytes == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ));
        }

        let nbytes = nbytes as usize;
        self.data.extend(&chunk[..nbytes]);

        Ok(nbytes)
    }
}

impl From<&[u8]> for PeerBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self {
            data: bytes.iter().copied().collect(),
        }
    }
}
