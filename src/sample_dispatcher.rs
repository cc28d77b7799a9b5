use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)] use mockall::automock;

use crate::packet_header::PacketHeader;

/// A sample as handed to this core by the framing layer: the parsed transport header plus the
///  undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedSample {
    pub header: PacketHeader,
    pub payload: Bytes,
}

/// Application-side delivery, outside this core. Only samples that passed duplicate filtering
///  get here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SampleDispatcher: Send + Sync + 'static {
    async fn on_sample(&self, sample: ReceivedSample);

    /// Sample-acks are application-level acknowledgments; the reliability core routes them
    ///  through untouched.
    async fn on_sample_ack(&self, sample: ReceivedSample);
}
