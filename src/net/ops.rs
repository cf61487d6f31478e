use std::mem;
use std::net::IpAddr;
use std::os::unix::io::RawFd;

use crate::error::errno;
use crate::{ConfigError, Result, Tos};

/// Maximum length of a congestion control algorithm name, including the
/// trailing null byte (`TCP_CA_NAME_MAX` in `<linux/tcp.h>`).
pub const TCP_CA_NAME_MAX: usize = 16;

/// Descriptor operations a [crate::PeerSocket] borrows from its session for
/// the duration of a call.
pub trait SocketOps {
    /// Applies the session's type-of-service (IPv4) or traffic class (IPv6) to
    /// `fd`, choosing the option level from the peer's address family.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket option could not be set.
    fn set_tos(&self, fd: RawFd, peer: &IpAddr) -> Result<()>;

    /// Returns the congestion control algorithm to apply to new peer
    /// descriptors, if one is configured.
    fn congestion_algorithm(&self) -> Option<&str>;

    /// Applies the named congestion control algorithm to `fd`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejected the algorithm.
    fn set_congestion_control(&self, fd: RawFd, algorithm: &str) -> Result<()>;

    /// Releases `fd`.
    fn close_socket(&self, fd: RawFd);
}

/// Session-level socket configuration applied to every TCP peer descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetConfig {
    tos: Tos,
    congestion_algorithm: Option<String>,
}

impl NetConfig {
    /// Creates a configuration with the default type-of-service ([Tos::LE])
    /// and the kernel's default congestion control.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the type-of-service applied to peer descriptors.
    pub fn with_tos(mut self, tos: Tos) -> Self {
        self.tos = tos;
        self
    }

    /// Sets the congestion control algorithm applied to peer descriptors
    /// (e.g. `cubic`, `reno`, `bbr`).
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, contains a null (`\0`) byte, or
    /// does not fit [TCP_CA_NAME_MAX].
    pub fn with_congestion_algorithm(mut self, algorithm: &str) -> Result<Self> {
        if algorithm.is_empty() {
            return Err(ConfigError::EmptyCongestionAlgorithm.into());
        }

        if algorithm.contains('\0') {
            return Err(ConfigError::NulInCongestionAlgorithm.into());
        }

        if algorithm.len() >= TCP_CA_NAME_MAX {
            return Err(ConfigError::CongestionAlgorithmTooLong {
                provided: algorithm.len(),
                max: TCP_CA_NAME_MAX - 1,
            }
            .into());
        }

        self.congestion_algorithm = Some(algorithm.to_string());
        Ok(self)
    }

    /// Returns the configured type-of-service.
    pub fn tos(&self) -> Tos {
        self.tos
    }
}

impl SocketOps for NetConfig {
    fn set_tos(&self, fd: RawFd, peer: &IpAddr) -> Result<()> {
        let value = libc::c_int::from(self.tos.value());

        let (level, name) = match peer {
            IpAddr::V4(_) => (libc::IPPROTO_IP, libc::IP_TOS),
            IpAddr::V6(_) => (libc::IPPROTO_IPV6, libc::IPV6_TCLASS),
        };

        let rc = unsafe {
            libc::setsockopt(
                fd,
                level,
                name,
                &raw const value as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };

        if rc == -1 {
            return Err(errno!("failed to set type-of-service {} on socket {fd}", self.tos));
        }

        Ok(())
    }

    fn congestion_algorithm(&self) -> Option<&str> {
        self.congestion_algorithm.as_deref()
    }

    fn set_congestion_control(&self, fd: RawFd, algorithm: &str) -> Result<()> {
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::IPPROTO_TCP,
                libc::TCP_CONGESTION,
                algorithm.as_ptr() as *const libc::c_void,
                algorithm.len() as libc::socklen_t,
            )
        };

        if rc == -1 {
            return Err(errno!(
                "failed to set congestion control algorithm {algorithm:?} on socket {fd}"
            ));
        }

        Ok(())
    }

    fn close_socket(&self, fd: RawFd) {
        // The descriptor is released even when `close()` reports an error, so
        // there is nothing to retry.
        if unsafe { libc::close(fd) } == -1 {
            tracing::debug!("failed to close socket {fd}: {}", std::io::Error::last_os_error());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::io::{AsRawFd, IntoRawFd};

    fn getsockopt_int(fd: RawFd, level: libc::c_int, name: libc::c_int) -> libc::c_int {
        let mut value: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;

        let rc = unsafe {
            libc::getsockopt(
                fd,
                level,
                name,
                &raw mut value as *mut libc::c_void,
                &raw mut len,
            )
        };
        assert_eq!(rc, 0);

        value
    }

    #[test]
    fn default_config() {
        let config = NetConfig::new();

        assert_eq!(config.tos(), Tos::LE);
        assert_eq!(config.congestion_algorithm(), None);
    }

    #[test]
    fn congestion_algorithm_validation() {
        let config = NetConfig::new().with_congestion_algorithm("cubic").unwrap();
        assert_eq!(config.congestion_algorithm(), Some("cubic"));

        assert!(matches!(
            NetConfig::new().with_congestion_algorithm(""),
            Err(crate::Error::Config(ConfigError::EmptyCongestionAlgorithm))
        ));
        assert!(matches!(
            NetConfig::new().with_congestion_algorithm("cu\0bic"),
            Err(crate::Error::Config(ConfigError::NulInCongestionAlgorithm))
        ));
        assert!(matches!(
            NetConfig::new().with_congestion_algorithm("a-very-long-algorithm"),
            Err(crate::Error::Config(
                ConfigError::CongestionAlgorithmTooLong {
                    provided: 21,
                    max: 15
                }
            ))
        ));
    }

    #[test]
    fn set_tos_on_ipv4_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let config = NetConfig::new().with_tos(Tos::new(0x08));

        config
            .set_tos(stream.as_raw_fd(), &"127.0.0.1".parse().unwrap())
            .unwrap();

        assert_eq!(
            getsockopt_int(stream.as_raw_fd(), libc::IPPROTO_IP, libc::IP_TOS),
            0x08
        );
    }

    #[test]
    fn unknown_congestion_algorithm_is_rejected_by_kernel() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();

        let err = NetConfig::new()
            .set_congestion_control(stream.as_raw_fd(), "no-such-algo")
            .unwrap_err();

        assert!(err.to_string().contains("no-such-algo"));
    }

    #[test]
    fn close_socket_releases_descriptor() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fd = TcpStream::connect(listener.local_addr().unwrap())
            .unwrap()
            .into_raw_fd();
        let (mut server, _) = listener.accept().unwrap();

        NetConfig::new().close_socket(fd);

        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).unwrap(), 0);
    }
}
