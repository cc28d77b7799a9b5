use anyhow::bail;
use bytes::{Buf, BufMut, BytesMut};
use bytes_varint::try_get_fixed::TryGetFixedSupport;

use crate::peer_id::PeerId;
use crate::sequence_id::SequenceId;

/// The transport header of a datagram as this session core sees it - all numbers in network
///  byte order (BE):
/// ```ascii
/// 0:  source peer (u64): identity of the sending session endpoint
/// 8:  sequence number (u64): position of this datagram in the sender's stream. Control
///      datagrams are sequenced like everything else.
/// 16: packet kind (u8): 0 data, 1 sample-ack, 2 control
/// 17: control submessage id (u8): present only for packet kind 'control'
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub source: PeerId,
    pub sequence: SequenceId,
    pub kind: PacketKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Data,
    SampleAck,
    /// The raw submessage id is kept as received: routing by submessage kind (and rejecting
    ///  unknown ids) is the dispatcher's business, not the codec's.
    Control { submessage_id: u8 },
}

impl PacketHeader {
    const KIND_DATA: u8 = 0;
    const KIND_SAMPLE_ACK: u8 = 1;
    const KIND_CONTROL: u8 = 2;

    pub fn new(source: PeerId, sequence: SequenceId, kind: PacketKind) -> PacketHeader {
        PacketHeader { source, sequence, kind }
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u64(self.source.to_raw());
        buf.put_u64(self.sequence.to_raw());
        match self.kind {
            PacketKind::Data => buf.put_u8(Self::KIND_DATA),
            PacketKind::SampleAck => buf.put_u8(Self::KIND_SAMPLE_ACK),
            PacketKind::Control { submessage_id } => {
                buf.put_u8(Self::KIND_CONTROL);
                buf.put_u8(submessage_id);
            }
        }
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<PacketHeader> {
        let source = PeerId::from_raw(buf.try_get_u64()?);
        let sequence = SequenceId::from_raw(buf.try_get_u64()?);
        let kind = match buf.try_get_u8()? {
            Self::KIND_DATA => PacketKind::Data,
            Self::KIND_SAMPLE_ACK => PacketKind::SampleAck,
            Self::KIND_CONTROL => PacketKind::Control { submessage_id: buf.try_get_u8()? },
            other => bail!("unknown packet kind {:#x}", other),
        };
        Ok(PacketHeader { source, sequence, kind })
    }
}

/// The four control submessage kinds of the reliability protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    HandshakeRequest,
    HandshakeAck,
    RepairRequest,
    RepairAck,
}

impl ControlKind {
    pub fn to_raw(&self) -> u8 {
        match self {
            ControlKind::HandshakeRequest => 0,
            ControlKind::HandshakeAck => 1,
            ControlKind::RepairRequest => 2,
            ControlKind::RepairAck => 3,
        }
    }

    pub fn try_from_raw(raw: u8) -> Option<ControlKind> {
        match raw {
            0 => Some(ControlKind::HandshakeRequest),
            1 => Some(ControlKind::HandshakeAck),
            2 => Some(ControlKind::RepairRequest),
            3 => Some(ControlKind::RepairAck),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case::data(PacketKind::Data, vec![0,0,0,0,0,0,0,5, 0,0,0,0,0,0,0,9, 0])]
    #[case::sample_ack(PacketKind::SampleAck, vec![0,0,0,0,0,0,0,5, 0,0,0,0,0,0,0,9, 1])]
    #[case::control(PacketKind::Control { submessage_id: 3 }, vec![0,0,0,0,0,0,0,5, 0,0,0,0,0,0,0,9, 2, 3])]
    fn test_ser(#[case] kind: PacketKind, #[case] expected: Vec<u8>) {
        let header = PacketHeader::new(PeerId::from_raw(5), SequenceId::from_raw(9), kind);

        let mut buf = BytesMut::new();
        header.ser(&mut buf);
        assert_eq!(buf.to_vec(), expected);

        let mut b: &[u8] = &buf;
        assert_eq!(PacketHeader::deser(&mut b).unwrap(), header);
        assert!(b.is_empty());
    }

    #[rstest]
    fn test_deser_unknown_kind() {
        let mut buf = BytesMut::new();
        buf.put_u64(5);
        buf.put_u64(9);
        buf.put_u8(0x77);

        let mut b: &[u8] = &buf;
        assert!(PacketHeader::deser(&mut b).is_err());
    }

    #[rstest]
    fn test_deser_truncated() {
        let mut b: &[u8] = &[0, 0, 0];
        assert!(PacketHeader::deser(&mut b).is_err());
    }

    #[rstest]
    #[case(0, Some(ControlKind::HandshakeRequest))]
    #[case(1, Some(ControlKind::HandshakeAck))]
    #[case(2, Some(ControlKind::RepairRequest))]
    #[case(3, Some(ControlKind::RepairAck))]
    #[case(4, None)]
    #[case(0xff, None)]
    fn test_control_kind_raw(#[case] raw: u8, #[case] expected: Option<ControlKind>) {
        assert_eq!(ControlKind::try_from_raw(raw), expected);
        if let Some(kind) = expected {
            assert_eq!(kind.to_raw(), raw);
        }
    }
}
