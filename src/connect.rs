//! Outbound uTP connections.

use std::net::SocketAddr;

use tracing::{debug, trace};

use crate::PeerSocket;
use crate::net::is_valid_for_peers;
use crate::utp::{UtpContext, UtpSocket};

/// Opens an outbound uTP connection to `endpoint`.
///
/// `userdata` is attached to the new socket before the connection attempt
/// starts, so every library event for the socket already carries it.
///
/// Returns a closed [PeerSocket] (see [PeerSocket::is_closed]) if uTP is
/// disabled (`ctx` is `None`), `endpoint` is not a valid peer address, the
/// library could not create a socket, or the connection attempt could not be
/// started. A socket created for a failed attempt is closed before returning.
///
/// `client_is_seed` is informational only.
pub fn open_utp_peer_socket<C: UtpContext>(
    ctx: Option<&mut C>,
    endpoint: SocketAddr,
    client_is_seed: bool,
    userdata: <C::Socket as UtpSocket>::UserData,
) -> PeerSocket<C::Socket> {
    let Some(ctx) = ctx else {
        trace!(peer = %endpoint, "µTP is disabled");
        return PeerSocket::closed(endpoint);
    };

    if !is_valid_for_peers(&endpoint) {
        debug!(peer = %endpoint, "not a valid peer address");
        return PeerSocket::closed(endpoint);
    }

    let Some(mut socket) = ctx.create_socket() else {
        debug!(peer = %endpoint, "failed to create µTP socket");
        return PeerSocket::closed(endpoint);
    };

    socket.set_userdata(Some(userdata));

    if let Err(err) = socket.connect(&endpoint) {
        debug!(peer = %endpoint, "failed to connect µTP socket: {err}");
        socket.close();
        return PeerSocket::closed(endpoint);
    }

    trace!(peer = %endpoint, client_is_seed, "µTP connection started");

    PeerSocket::from_utp(endpoint, socket)
}
