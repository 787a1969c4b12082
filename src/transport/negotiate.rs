//! Offer/answer connection negotiation.
//!
//! Asymmetric exchange: the initiator binds a listener, gathers local path
//! candidates, and serializes {description, peerId} into an opaque base64
//! "offer" string. The responder decodes it, dials the candidates, and
//! returns an "answer" string the same way. Both blobs travel out-of-band
//! (copy/paste, share link, QR code of the link).
//!
//! Path discovery is bounded by [`PATH_DISCOVERY_TIMEOUT`]; if it does not
//! settle, negotiation proceeds with whatever paths were found.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use super::channel::{ChannelEvent, PeerChannel};
use crate::core::PeerId;
use crate::core::constants::{CONNECT_TIMEOUT, DIAL_TIMEOUT, PATH_DISCOVERY_TIMEOUT};

/// Blob kind for an offer string.
pub const OFFER_KIND: &str = "offer";

/// Blob kind for an answer string.
pub const ANSWER_KIND: &str = "answer";

/// Negotiation errors. All are terminal: the session moves to `error` and a
/// human retries manually.
#[derive(Debug, Error)]
pub enum NegotiateError {
    /// Offer/answer string is not valid base64.
    #[error("invalid blob encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Offer/answer string is not the expected JSON shape.
    #[error("malformed blob: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Received an answer where an offer was expected, or vice versa.
    #[error("expected {expected} blob, got {actual:?}")]
    WrongKind {
        /// The kind this side was waiting for.
        expected: &'static str,
        /// The kind actually received.
        actual: String,
    },

    /// No advertised path candidate accepted a connection.
    #[error("no reachable path candidate")]
    NoReachableCandidate,

    /// The connecting phase exceeded its bound.
    #[error("negotiation timed out")]
    Timeout,

    /// Socket-level failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The session description exchanged inside an offer or answer: the network
/// paths on which the sender can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    /// Dialable addresses, in preference order.
    pub candidates: Vec<SocketAddr>,
}

/// Wire shape of an offer/answer blob: base64 of this JSON object.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    #[serde(rename = "type")]
    kind: String,
    sdp: String,
    peer_id: PeerId,
}

/// A negotiated transport channel plus its context.
#[derive(Debug)]
pub struct NegotiatedChannel {
    /// The established channel.
    pub channel: PeerChannel,
    /// Connectivity/message events for the channel.
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
    /// Peer id carried in the remote blob. Authoritative identity still
    /// arrives in the in-band handshake message.
    pub remote_hint: PeerId,
}

fn encode_blob(
    kind: &str,
    description: &SessionDescription,
    peer_id: &PeerId,
) -> Result<String, NegotiateError> {
    let sdp = serde_json::to_string(description)?;
    let json = serde_json::to_vec(&Blob {
        kind: kind.to_string(),
        sdp,
        peer_id: peer_id.clone(),
    })?;
    Ok(BASE64.encode(json))
}

fn decode_blob(
    blob: &str,
    expected: &'static str,
) -> Result<(SessionDescription, PeerId), NegotiateError> {
    let json = BASE64.decode(blob.trim())?;
    let blob: Blob = serde_json::from_slice(&json)?;
    if blob.kind != expected {
        return Err(NegotiateError::WrongKind {
            expected,
            actual: blob.kind,
        });
    }
    let description: SessionDescription = serde_json::from_str(&blob.sdp)?;
    Ok((description, blob.peer_id))
}

/// Initiator half of a negotiation in progress.
///
/// Produced by [`Initiator::create_offer`]; consumed by
/// [`Initiator::complete`] once the answer comes back out-of-band.
#[derive(Debug)]
pub struct Initiator {
    listener: TcpListener,
}

impl Initiator {
    /// Bind a listener, discover local paths, and produce the shareable
    /// offer string.
    pub async fn create_offer(local_peer_id: &PeerId) -> Result<(Self, String), NegotiateError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        let port = listener.local_addr()?.port();

        let candidates = discover_local_paths()
            .await
            .into_iter()
            .map(|ip| SocketAddr::new(ip, port))
            .collect();

        let offer = encode_blob(OFFER_KIND, &SessionDescription { candidates }, local_peer_id)?;
        Ok((Self { listener }, offer))
    }

    /// Complete the handshake with the answer string returned by the
    /// responder, waiting for its inbound connection.
    pub async fn complete(self, answer: &str) -> Result<NegotiatedChannel, NegotiateError> {
        let (_description, remote_hint) = decode_blob(answer, ANSWER_KIND)?;

        let (stream, from) = timeout(CONNECT_TIMEOUT, self.listener.accept())
            .await
            .map_err(|_| NegotiateError::Timeout)??;
        debug!(%from, "responder connected");
        stream.set_nodelay(true).ok();

        let (channel, events) = PeerChannel::from_stream(stream);
        Ok(NegotiatedChannel {
            channel,
            events,
            remote_hint,
        })
    }
}

/// Responder side: decode an offer, dial its candidates, and produce the
/// answer string to return to the initiator. The whole dial phase is bounded
/// by [`CONNECT_TIMEOUT`] regardless of how many candidates the offer
/// carries.
pub async fn accept_offer(
    offer: &str,
    local_peer_id: &PeerId,
) -> Result<(NegotiatedChannel, String), NegotiateError> {
    let (description, remote_hint) = decode_blob(offer, OFFER_KIND)?;

    let stream = dial_candidates(&description.candidates, CONNECT_TIMEOUT).await?;
    let local_addr = stream.local_addr()?;

    let answer = encode_blob(
        ANSWER_KIND,
        &SessionDescription {
            candidates: vec![local_addr],
        },
        local_peer_id,
    )?;

    let (channel, events) = PeerChannel::from_stream(stream);
    Ok((
        NegotiatedChannel {
            channel,
            events,
            remote_hint,
        },
        answer,
    ))
}

/// Dial candidates in preference order, [`DIAL_TIMEOUT`] each, with an
/// overall bound on the whole attempt. A long candidate list must not
/// stretch the connecting phase past `overall`.
async fn dial_candidates(
    candidates: &[SocketAddr],
    overall: std::time::Duration,
) -> Result<TcpStream, NegotiateError> {
    timeout(overall, async {
        for addr in candidates {
            match timeout(DIAL_TIMEOUT, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    stream.set_nodelay(true).ok();
                    return Ok(stream);
                }
                Ok(Err(err)) => debug!(%addr, %err, "candidate refused"),
                Err(_) => debug!(%addr, "candidate dial timed out"),
            }
        }
        Err(NegotiateError::NoReachableCandidate)
    })
    .await
    .map_err(|_| NegotiateError::Timeout)?
}

/// Discover local network paths, bounded by [`PATH_DISCOVERY_TIMEOUT`].
///
/// The loopback address is always appended so two instances on one machine
/// can connect even with no external route.
async fn discover_local_paths() -> Vec<IpAddr> {
    let mut paths = Vec::new();

    match timeout(PATH_DISCOVERY_TIMEOUT, primary_route_ip()).await {
        Ok(Some(ip)) => paths.push(ip),
        Ok(None) => debug!("no primary route discovered"),
        Err(_) => debug!("path discovery timed out, proceeding with found paths"),
    }

    let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
    if !paths.contains(&loopback) {
        paths.push(loopback);
    }
    paths
}

/// The local address this host would route external traffic from.
/// Routing-table probe only; no packets are sent.
async fn primary_route_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    socket.connect(("8.8.8.8", 80)).await.ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() { None } else { Some(ip) }
}

// =============================================================================
// SHARE LINKS
// =============================================================================

/// Build the query-string form of an offer for link or QR sharing:
/// `?room=<peerId>&offer=<urlencoded offer>`.
pub fn share_link(peer_id: &PeerId, offer: &str) -> String {
    format!("?room={}&offer={}", peer_id, urlencoding::encode(offer))
}

/// Parse a share link query string back into (room peer id, offer string).
pub fn parse_share_link(query: &str) -> Option<(PeerId, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut room = None;
    let mut offer = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=')?;
        match key {
            "room" => room = Some(PeerId::from_string(value.to_string())),
            "offer" => offer = Some(urlencoding::decode(value).ok()?.into_owned()),
            _ => {}
        }
    }
    Some((room?, offer?))
}
