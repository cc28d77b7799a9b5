use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)] use mockall::automock;

use crate::peer_id::PeerId;
use crate::sequence_id::SequenceId;

/// A previously sent datagram kept around for retransmission: its sequence number and the
///  complete encoded datagram as it originally went out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedSample {
    pub sequence: SequenceId,
    pub datagram: Bytes,
}

/// Lookup into the sender-side retention buffer, owned by the transport outside this core. A
///  repair request is answered from here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RetainedSampleStore: Send + Sync + 'static {
    /// All samples still retained in the closed range `[low, high]`, ascending by sequence
    ///  number. The result may be partial - anything already evicted is simply absent, and the
    ///  caller informs the requester that those datagrams are gone for good.
    async fn fetch_retained(&self, requester: PeerId, low: SequenceId, high: SequenceId) -> Vec<RetainedSample>;
}
