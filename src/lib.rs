//! Reliable delivery over an inherently unreliable multicast transport: this crate detects gaps
//!  in the sequence of datagrams received from each remote peer, requests retransmission of
//!  missing data, and verifies at session setup that a peer is actually capable of reliable
//!  exchange before the transport carries application traffic.
//!
//! ## Design goals
//!
//! * Reliability is negative-acknowledgment based: delivery is assumed unless a receiver asks
//!   for a repair. On a healthy network the protocol is silent apart from the one-time
//!   handshake.
//!   * Gaps are detected per sending peer from the sequence numbers of received datagrams
//!   * A periodic repair cycle requests retransmission of missing ranges and expires requests
//!     that stay unanswered
//!   * A peer that stops answering repairs is eventually *skipped*: the data is declared
//!     permanently lost and the receiver moves on, rather than generating NAK traffic without
//!     bound
//! * A two-way handshake gates the session: the initiating side periodically sends a handshake
//!   request until the remote peer acknowledges it or a timeout declares the session
//!   unreachable. Only an acknowledged session is reported viable to the session manager.
//! * The network model is adversarial: loss, duplication, reordering and unresponsive peers are
//!   all expected. Duplicates are filtered before delivery, everything else is handled by the
//!   repair machinery.
//! * The hosting transport stays in charge of everything that is not reliability: the datagram
//!   socket and group membership, session creation and teardown, peer identity assignment,
//!   retention of previously sent datagrams, and application-level sample delivery. These are
//!   injected as collaborator traits.
//! * All protocol state of a session is serialized behind a single lock; timer callbacks and
//!   inbound messages never interleave. Nothing in this core blocks: sends are fire-and-forget.
//!
//! ## Control messages
//!
//! Four control message kinds close the reliability loop, all with fixed-width big-endian
//!  fields (see [packet_header::PacketHeader] for the header every datagram carries):
//!
//! *handshake-request* `(local peer: u64, remote peer: u64)`
//!
//! Sent periodically by the session's active side, addressed to the remote peer assigned at
//!  session creation. Any endpoint receiving one addressed to it answers with a handshake-ack,
//!  registering the requester for gap tracking on the way.
//!
//! *handshake-ack* `(local peer: u64, remote peer: u64)`
//!
//! Confirms the two-way handshake; `remote peer` echoes the original requester. Receipt makes
//!  the session viable for reliable traffic, exactly once.
//!
//! *repair-request* `(local peer: u64, remote peer: u64, low: u64, high: u64)`
//!
//! Asks the remote peer to retransmit the closed sequence range `[low, high]`. The peer answers
//!  with a resend of whatever it still retains, plus repair-acks for the rest.
//!
//! *repair-ack* `(local peer: u64, remote peer: u64, low: u64, high: u64)`
//!
//! Tells the requester that `low..<high` is permanently unavailable - no resend will come, and
//!  the requester skips its low-water mark ahead to `high`.
//!
//! NB: Multicast delivers every control message to every group member; messages not addressed
//!      to the local peer are ignored at this layer, not at the socket.

pub mod config;
pub mod control_channel;
pub mod control_messages;
pub mod disjoint_sequence;
pub mod handshake;
pub mod packet_header;
pub mod peer_id;
pub mod repair_ledger;
pub mod sample_dispatcher;
pub mod sample_store;
pub mod sequence_id;
pub mod sequence_tracker;
pub mod session;
pub mod session_observer;
pub mod watchdog;

#[cfg(test)]
mod tests {
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(Level::TRACE)
            .try_init()
            .ok();
    }
}
