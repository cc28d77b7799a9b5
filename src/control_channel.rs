use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
#[cfg(test)] use mockall::automock;
use tokio::net::UdpSocket;
use tracing::{error, trace};

use crate::control_messages::{ControlMessageHandshakeAck, ControlMessageHandshakeRequest, ControlMessageRepairAck, ControlMessageRepairRequest};
use crate::packet_header::{ControlKind, PacketHeader, PacketKind};
use crate::peer_id::PeerId;
use crate::sequence_id::SequenceId;

/// This is an abstraction for sending a datagram towards the multicast group, introduced to
///  facilitate mocking the I/O part away for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatagramSocket: Send + Sync + 'static {
    async fn send_datagram(&self, to: SocketAddr, datagram: &[u8]);
}

#[async_trait]
impl DatagramSocket for Arc<UdpSocket> {
    async fn send_datagram(&self, to: SocketAddr, datagram: &[u8]) {
        trace!("UDP socket: sending datagram to {:?}", to);

        if let Err(e) = self.send_to(datagram, to).await {
            error!("error sending UDP datagram to {:?}: {}", to, e);
        }
    }
}

/// Builds and sends the four control message kinds of the reliability protocol. Control
///  datagrams get sequence numbers from a counter of their own here; send is fire-and-forget
///  into the underlying socket.
pub struct ControlChannel {
    socket: Arc<dyn DatagramSocket>,
    group_addr: SocketAddr,
    local_peer: PeerId,
    next_sequence: SequenceId,
}

impl ControlChannel {
    pub fn new(socket: Arc<dyn DatagramSocket>, group_addr: SocketAddr, local_peer: PeerId) -> ControlChannel {
        ControlChannel {
            socket,
            group_addr,
            local_peer,
            next_sequence: SequenceId::ZERO,
        }
    }

    fn put_header(&mut self, kind: ControlKind, buf: &mut BytesMut) {
        PacketHeader::new(self.local_peer, self.next_sequence, PacketKind::Control { submessage_id: kind.to_raw() })
            .ser(buf);
        self.next_sequence = self.next_sequence.next();
    }

    pub async fn send_handshake_request(&mut self, remote_peer: PeerId) {
        trace!("sending handshake-request to peer {}", remote_peer);

        let mut buf = BytesMut::with_capacity(64);
        self.put_header(ControlKind::HandshakeRequest, &mut buf);
        ControlMessageHandshakeRequest {
            local_peer: self.local_peer,
            remote_peer,
        }.ser(&mut buf);

        self.socket.send_datagram(self.group_addr, &buf).await;
    }

    pub async fn send_handshake_ack(&mut self, requester: PeerId) {
        trace!("sending handshake-ack to peer {}", requester);

        let mut buf = BytesMut::with_capacity(64);
        self.put_header(ControlKind::HandshakeAck, &mut buf);
        ControlMessageHandshakeAck {
            local_peer: self.local_peer,
            remote_peer: requester,
        }.ser(&mut buf);

        self.socket.send_datagram(self.group_addr, &buf).await;
    }

    pub async fn send_repair_request(&mut self, remote_peer: PeerId, low: SequenceId, high: SequenceId) {
        trace!("sending repair-request to peer {} for #{}..=#{}", remote_peer, low, high);

        let mut buf = BytesMut::with_capacity(64);
        self.put_header(ControlKind::RepairRequest, &mut buf);
        ControlMessageRepairRequest {
            local_peer: self.local_peer,
            remote_peer,
            low,
            high,
        }.ser(&mut buf);

        self.socket.send_datagram(self.group_addr, &buf).await;
    }

    pub async fn send_repair_ack(&mut self, remote_peer: PeerId, low: SequenceId, high: SequenceId) {
        trace!("sending repair-ack to peer {} for #{}..<#{}", remote_peer, low, high);

        let mut buf = BytesMut::with_capacity(64);
        self.put_header(ControlKind::RepairAck, &mut buf);
        ControlMessageRepairAck {
            local_peer: self.local_peer,
            remote_peer,
            low,
            high,
        }.ser(&mut buf);

        self.socket.send_datagram(self.group_addr, &buf).await;
    }

    /// Retransmits a retained datagram as originally sent - it already carries its own header
    ///  and original sequence number.
    pub async fn resend_retained(&self, datagram: &[u8]) {
        self.socket.send_datagram(self.group_addr, datagram).await;
    }
}
