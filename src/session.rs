use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::control_channel::{ControlChannel, DatagramSocket};
use crate::control_messages::{ControlMessageHandshakeAck, ControlMessageHandshakeRequest, ControlMessageRepairAck, ControlMessageRepairRequest};
use crate::handshake::HandshakePhase;
use crate::packet_header::{ControlKind, PacketHeader, PacketKind};
use crate::peer_id::PeerId;
use crate::repair_ledger::RepairLedger;
use crate::sample_dispatcher::{ReceivedSample, SampleDispatcher};
use crate::sample_store::{RetainedSample, RetainedSampleStore};
use crate::sequence_id::SequenceId;
use crate::sequence_tracker::SequenceTracker;
use crate::session_observer::SessionObserver;
use crate::watchdog::{Watchdog, WatchdogCanceller, WatchdogHandler};

/// Whether this endpoint initiated the session (and therefore drives the handshake) or merely
///  answers one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Active,
    Passive,
}

struct SessionInner {
    config: Arc<SessionConfig>,

    local_peer: PeerId,
    remote_peer: PeerId,

    channel: ControlChannel,
    retained_store: Arc<dyn RetainedSampleStore>,
    sample_dispatcher: Arc<dyn SampleDispatcher>,
    observer: Arc<dyn SessionObserver>,

    phase: HandshakePhase,
    /// the transport header of the most recently received datagram; a handshake request from an
    ///  unknown peer seeds that peer's sequence baseline from the header that carried it
    recvd_header: Option<PacketHeader>,
    sequences: SequenceTracker,
    repair_ledger: RepairLedger,
    handshake_canceller: Option<WatchdogCanceller>,
}

impl SessionInner {
    async fn on_handshake_request(&mut self, msg: ControlMessageHandshakeRequest) {
        // the peer fields are crosswise: the sender's local peer is our remote
        let requester = msg.local_peer;
        if msg.remote_peer != self.local_peer {
            trace!("handshake-request for peer {} is not for us - ignoring", msg.remote_peer);
            return;
        }
        debug!("received handshake-request from peer {}", requester);

        if !self.sequences.is_known(requester) {
            // establish a baseline so that data from this peer is gap-checked from here onward
            match &self.recvd_header {
                Some(header) => self.sequences.register(requester, header.sequence),
                None => warn!("no transport header recorded for handshake-request from peer {} - not registering", requester),
            }
        }

        // handshake requests addressed to us are always positively acknowledged
        self.channel.send_handshake_ack(requester).await;
    }

    async fn on_handshake_ack(&mut self, msg: ControlMessageHandshakeAck) {
        let responder = msg.local_peer;
        if msg.remote_peer != self.local_peer {
            trace!("handshake-ack for peer {} is not for us - ignoring", msg.remote_peer);
            return;
        }

        if let Some(canceller) = self.handshake_canceller.take() {
            canceller.cancel();
        }

        // the 2-way handshake is complete: the remote peer demonstrably sends and receives
        //  reliably
        if self.phase.confirm() {
            info!("handshake with peer {} confirmed - association is viable", responder);
            self.observer.on_association_viable().await;
        }
    }

    async fn on_repair_request(&mut self, msg: ControlMessageRepairRequest) {
        let requester = msg.local_peer;
        if msg.remote_peer != self.local_peer {
            trace!("repair-request for peer {} is not for us - ignoring", msg.remote_peer);
            return;
        }
        if msg.low > msg.high {
            warn!("repair-request from peer {} with empty range #{}..=#{} - ignoring", requester, msg.low, msg.high);
            return;
        }
        debug!("received repair-request from peer {} for #{}..=#{}", requester, msg.low, msg.high);

        let retained = self.retained_store.fetch_retained(requester, msg.low, msg.high).await;

        for sample in &retained {
            self.channel.resend_retained(&sample.datagram).await;
        }

        // whatever the requested range contains beyond the retained samples is gone for good -
        //  tell the requester so it stops asking and skips ahead
        for (low, high) in missing_runs(msg.low, msg.high, &retained) {
            self.channel.send_repair_ack(requester, low, high).await;
        }
    }

    async fn on_repair_ack(&mut self, msg: ControlMessageRepairAck) {
        let responder = msg.local_peer;
        if msg.remote_peer != self.local_peer {
            trace!("repair-ack for peer {} is not for us - ignoring", msg.remote_peer);
            return;
        }

        debug!("peer {} declared #{}..<#{} permanently unavailable - skipping ahead", responder, msg.low, msg.high);
        self.sequences.skip(responder, msg.high);
    }

    /// First phase of the repair cycle: drain every ledger entry older than the repair timeout.
    ///  A peer that has not advanced past the high-water mark recorded with the entry is not
    ///  answering repairs, and the data below the mark is abandoned so the gap cannot grow
    ///  without bound.
    async fn expire_repairs(&mut self) {
        let deadline = match Instant::now().checked_sub(self.config.repair_timeout) {
            Some(deadline) => deadline,
            // the process is younger than the timeout - nothing can have expired yet
            None => return,
        };

        for expired in self.repair_ledger.expire(deadline) {
            match self.sequences.high_of(expired.peer) {
                None => {
                    error!("failed to find sequence state for remote peer {} while expiring repair requests", expired.peer);
                }
                Some(high) if high <= expired.marked_high => {
                    let depth_before = self.sequences.depth_of(expired.peer);
                    self.sequences.skip(expired.peer, expired.marked_high);
                    let abandoned = depth_before - self.sequences.depth_of(expired.peer);
                    if abandoned > 0 {
                        warn!("skipping {} datagrams from unresponsive remote peer {}", abandoned, expired.peer);
                    }
                }
                Some(_) => {
                    // the peer has moved on since the request was recorded - repairs are being
                    //  answered, leave it alone
                }
            }
        }
    }

    /// Second phase of the repair cycle: one ledger entry and one repair request per gap range
    ///  for every peer with reception gaps.
    async fn send_repair_requests(&mut self) {
        let now = Instant::now();

        let pending = self.sequences.iter()
            .filter(|(_, sequence)| sequence.disjoint())
            .map(|(&peer, sequence)| (peer, sequence.high(), sequence.gap_ranges().collect::<Vec<_>>()))
            .collect::<Vec<_>>();

        for (peer, high, gap_ranges) in pending {
            // remember the peer's high-water mark for this cycle; it becomes the skip floor if
            //  the peer never answers
            self.repair_ledger.record(now, peer, high);

            for (low, high) in gap_ranges {
                self.channel.send_repair_request(peer, low, high).await;
            }
        }
    }
}

/// The contiguous runs of `[low, high]` not covered by `retained`, each as a
///  `(start, end-exclusive)` pair - the shape a repair-ack carries.
fn missing_runs(low: SequenceId, high: SequenceId, retained: &[RetainedSample]) -> Vec<(SequenceId, SequenceId)> {
    let mut runs = Vec::new();
    let mut run_start = None;

    for seq in low.to_raw()..=high.to_raw() {
        if retained.iter().any(|sample| sample.sequence.to_raw() == seq) {
            if let Some(start) = run_start.take() {
                runs.push((SequenceId::from_raw(start), SequenceId::from_raw(seq)));
            }
        }
        else if run_start.is_none() {
            run_start = Some(seq);
        }
    }
    if let Some(start) = run_start {
        runs.push((SequenceId::from_raw(start), SequenceId::from_raw(high.to_raw() + 1)));
    }

    runs
}

struct RepairWatchdogHandler {
    inner: Arc<RwLock<SessionInner>>,
}

#[async_trait]
impl WatchdogHandler for RepairWatchdogHandler {
    async fn on_interval(&self) {
        let mut inner = self.inner.write().await;
        // expire before requesting, so a peer that never answers gets skipped instead of
        //  re-asked forever
        inner.expire_repairs().await;
        inner.send_repair_requests().await;
    }

    async fn on_timeout(&self) {
        // the repair watchdog is scheduled without a timeout
    }
}

struct HandshakeWatchdogHandler {
    inner: Arc<RwLock<SessionInner>>,
}

#[async_trait]
impl WatchdogHandler for HandshakeWatchdogHandler {
    async fn on_interval(&self) {
        let mut inner = self.inner.write().await;
        let remote_peer = inner.remote_peer;
        debug!("sending handshake-request to peer {}", remote_peer);
        inner.channel.send_handshake_request(remote_peer).await;
    }

    async fn on_timeout(&self) {
        let mut inner = self.inner.write().await;
        inner.handshake_canceller = None;
        if inner.phase.time_out() {
            // there is no recourse if a session cannot handshake; the session manager sees
            //  acked() == false and decides what to do with the session
            error!("timed out handshaking with remote peer: {}", inner.remote_peer);
        }
    }
}

/// One reliable multicast session with one assigned remote peer: duplicate filtering and gap
///  tracking for everything the group delivers to us, the repair cycle for missing data, and
///  the handshake that verifies the remote peer before the session carries traffic.
///
/// The framing layer calls [ReliableSession::header_received] for every inbound datagram and
///  drops the datagram if it reports a duplicate; samples of accepted datagrams are handed to
///  [ReliableSession::sample_received].
///
/// All state lives behind one lock and all mutation goes through it, so timer callbacks and
///  inbound messages are serialized no matter how the hosting runtime schedules them.
pub struct ReliableSession {
    config: Arc<SessionConfig>,
    inner: Arc<RwLock<SessionInner>>,
    repair_watchdog: Option<Watchdog>,
    handshake_watchdog: Option<Watchdog>,
}

impl ReliableSession {
    pub fn new(
        config: Arc<SessionConfig>,
        local_peer: PeerId,
        remote_peer: PeerId,
        group_addr: SocketAddr,
        socket: Arc<dyn DatagramSocket>,
        retained_store: Arc<dyn RetainedSampleStore>,
        sample_dispatcher: Arc<dyn SampleDispatcher>,
        observer: Arc<dyn SessionObserver>,
    ) -> anyhow::Result<ReliableSession> {
        config.validate()?;

        let inner = SessionInner {
            config: config.clone(),
            local_peer,
            remote_peer,
            channel: ControlChannel::new(socket, group_addr, local_peer),
            retained_store,
            sample_dispatcher,
            observer,
            phase: HandshakePhase::Init,
            recvd_header: None,
            sequences: SequenceTracker::new(),
            repair_ledger: RepairLedger::new(),
            handshake_canceller: None,
        };

        Ok(ReliableSession {
            config,
            inner: Arc::new(RwLock::new(inner)),
            repair_watchdog: None,
            handshake_watchdog: None,
        })
    }

    /// Starts the session's timer-driven loops: the repair cycle for both roles, and for the
    ///  active role the periodic handshake with its timeout. The watchdogs are released again
    ///  by [ReliableSession::leave] or on drop - on every exit path, including the error paths
    ///  in here.
    pub async fn join(&mut self, role: SessionRole) -> anyhow::Result<()> {
        if self.repair_watchdog.is_some() {
            bail!("session already joined");
        }

        let repair_watchdog = Watchdog::schedule(
            "repair",
            self.config.repair_interval,
            None,
            Arc::new(RepairWatchdogHandler { inner: self.inner.clone() }),
        );

        let mut inner = self.inner.write().await;
        let started = match role {
            SessionRole::Active => inner.phase.start_active(),
            SessionRole::Passive => inner.phase.start_passive(),
        };
        if !started {
            drop(inner);
            repair_watchdog.cancel();
            bail!("session handshake already started - refusing to join again");
        }

        if role == SessionRole::Active {
            // the active side keeps asking until the remote peer acknowledges, or the timeout
            //  declares the handshake failed
            let handshake_watchdog = Watchdog::schedule(
                "handshake",
                self.config.handshake_interval,
                Some(self.config.handshake_timeout),
                Arc::new(HandshakeWatchdogHandler { inner: self.inner.clone() }),
            );
            inner.handshake_canceller = Some(handshake_watchdog.canceller());
            self.handshake_watchdog = Some(handshake_watchdog);
        }

        self.repair_watchdog = Some(repair_watchdog);
        Ok(())
    }

    /// Cancels both watchdogs. No callback observes torn-down state afterwards.
    pub async fn leave(&mut self) {
        if let Some(watchdog) = self.handshake_watchdog.take() {
            watchdog.cancel();
        }
        if let Some(watchdog) = self.repair_watchdog.take() {
            watchdog.cancel();
        }
        self.inner.write().await.handshake_canceller = None;
    }

    /// Whether the remote peer has acknowledged the handshake. Stays false forever on the
    ///  passive side and after a handshake timeout; the session manager is expected to notice.
    pub async fn acked(&self) -> bool {
        self.inner.read().await.phase.is_confirmed()
    }

    /// Duplicate filter, called by the framing layer for every inbound datagram before its
    ///  samples are delivered. Returns whether the datagram is new; `false` means it was seen
    ///  before and must be discarded wholesale.
    pub async fn header_received(&self, header: &PacketHeader) -> bool {
        let mut inner = self.inner.write().await;
        inner.recvd_header = Some(header.clone());

        let newly_recorded = inner.sequences.update(header.source, header.sequence);
        if !newly_recorded {
            debug!("datagram #{} from peer {} was seen before - dropping", header.sequence, header.source);
        }
        newly_recorded
    }

    /// Routes a sample of an accepted datagram: control samples to the protocol handlers,
    ///  everything else through to the application dispatcher.
    pub async fn sample_received(&self, sample: ReceivedSample) {
        let correlation_id = Uuid::new_v4();
        let span = span!(Level::TRACE, "sample_received", ?correlation_id);
        self.dispatch(sample).instrument(span).await
    }

    async fn dispatch(&self, sample: ReceivedSample) {
        match sample.header.kind {
            PacketKind::Data => {
                trace!("data sample #{} from peer {}", sample.header.sequence, sample.header.source);
                let dispatcher = self.inner.read().await.sample_dispatcher.clone();
                dispatcher.on_sample(sample).await;
            }
            PacketKind::SampleAck => {
                trace!("sample-ack from peer {}", sample.header.source);
                let dispatcher = self.inner.read().await.sample_dispatcher.clone();
                dispatcher.on_sample_ack(sample).await;
            }
            PacketKind::Control { submessage_id } => match ControlKind::try_from_raw(submessage_id) {
                Some(ControlKind::HandshakeRequest) => {
                    let msg = match ControlMessageHandshakeRequest::deser(&mut sample.payload.as_ref()) {
                        Ok(msg) => msg,
                        Err(_) => {
                            warn!("unparseable handshake-request from peer {} - dropping", sample.header.source);
                            return;
                        }
                    };
                    self.inner.write().await.on_handshake_request(msg).await;
                }
                Some(ControlKind::HandshakeAck) => {
                    let msg = match ControlMessageHandshakeAck::deser(&mut sample.payload.as_ref()) {
                        Ok(msg) => msg,
                        Err(_) => {
                            warn!("unparseable handshake-ack from peer {} - dropping", sample.header.source);
                            return;
                        }
                    };
                    self.inner.write().await.on_handshake_ack(msg).await;
                }
                Some(ControlKind::RepairRequest) => {
                    let msg = match ControlMessageRepairRequest::deser(&mut sample.payload.as_ref()) {
                        Ok(msg) => msg,
                        Err(_) => {
                            warn!("unparseable repair-request from peer {} - dropping", sample.header.source);
                            return;
                        }
                    };
                    self.inner.write().await.on_repair_request(msg).await;
                }
                Some(ControlKind::RepairAck) => {
                    let msg = match ControlMessageRepairAck::deser(&mut sample.payload.as_ref()) {
                        Ok(msg) => msg,
                        Err(_) => {
                            warn!("unparseable repair-ack from peer {} - dropping", sample.header.source);
                            return;
                        }
                    };
                    self.inner.write().await.on_repair_ack(msg).await;
                }
                None => {
                    warn!("unknown control submessage {:#x} from peer {} - dropping", submessage_id, sample.header.source);
                }
            },
        }
    }
}
