use bytes::{Buf, BufMut, BytesMut};
use bytes_varint::try_get_fixed::TryGetFixedSupport;

use crate::peer_id::PeerId;
use crate::sequence_id::SequenceId;

/// Handshake request, sent periodically by the session's active side until acknowledged. The
///  peer fields are written from the sender's perspective; the receiver reads them crosswise
///  (the sender's `local_peer` is the receiver's remote peer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessageHandshakeRequest {
    pub local_peer: PeerId,
    pub remote_peer: PeerId,
}

impl ControlMessageHandshakeRequest {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u64(self.local_peer.to_raw());
        buf.put_u64(self.remote_peer.to_raw());
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<ControlMessageHandshakeRequest> {
        let local_peer = buf.try_get_u64()?;
        let remote_peer = buf.try_get_u64()?;
        Ok(ControlMessageHandshakeRequest {
            local_peer: PeerId::from_raw(local_peer),
            remote_peer: PeerId::from_raw(remote_peer),
        })
    }
}

/// Handshake acknowledgment: `local_peer` is the acking endpoint, `remote_peer` echoes the
///  original requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessageHandshakeAck {
    pub local_peer: PeerId,
    pub remote_peer: PeerId,
}

impl ControlMessageHandshakeAck {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u64(self.local_peer.to_raw());
        buf.put_u64(self.remote_peer.to_raw());
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<ControlMessageHandshakeAck> {
        let local_peer = buf.try_get_u64()?;
        let remote_peer = buf.try_get_u64()?;
        Ok(ControlMessageHandshakeAck {
            local_peer: PeerId::from_raw(local_peer),
            remote_peer: PeerId::from_raw(remote_peer),
        })
    }
}

/// Request to retransmit a range of datagrams. `low` and `high` are the closed bounds of the
///  missing range: a request for the single sequence number 3 has `low == high == 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessageRepairRequest {
    pub local_peer: PeerId,
    pub remote_peer: PeerId,
    pub low: SequenceId,
    pub high: SequenceId,
}

impl ControlMessageRepairRequest {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u64(self.local_peer.to_raw());
        buf.put_u64(self.remote_peer.to_raw());
        buf.put_u64(self.low.to_raw());
        buf.put_u64(self.high.to_raw());
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<ControlMessageRepairRequest> {
        let local_peer = buf.try_get_u64()?;
        let remote_peer = buf.try_get_u64()?;
        let low = buf.try_get_u64()?;
        let high = buf.try_get_u64()?;
        Ok(ControlMessageRepairRequest {
            local_peer: PeerId::from_raw(local_peer),
            remote_peer: PeerId::from_raw(remote_peer),
            low: SequenceId::from_raw(low),
            high: SequenceId::from_raw(high),
        })
    }
}

/// Notification that a requested range is permanently unavailable and will not be retransmitted.
///  `low` is the first unavailable sequence number; `high` is the id *after* the last one, i.e.
///  the first sequence number the receiver should still expect. The receiver reacts by skipping
///  its low-water mark ahead to `high`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessageRepairAck {
    pub local_peer: PeerId,
    pub remote_peer: PeerId,
    pub low: SequenceId,
    pub high: SequenceId,
}

impl ControlMessageRepairAck {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u64(self.local_peer.to_raw());
        buf.put_u64(self.remote_peer.to_raw());
        buf.put_u64(self.low.to_raw());
        buf.put_u64(self.high.to_raw());
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<ControlMessageRepairAck> {
        let local_peer = buf.try_get_u64()?;
        let remote_peer = buf.try_get_u64()?;
        let low = buf.try_get_u64()?;
        let high = buf.try_get_u64()?;
        Ok(ControlMessageRepairAck {
            local_peer: PeerId::from_raw(local_peer),
            remote_peer: PeerId::from_raw(remote_peer),
            low: SequenceId::from_raw(low),
            high: SequenceId::from_raw(high),
        })
    }
}
