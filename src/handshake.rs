use tracing::debug;

/// Where the session's handshake currently stands.
///
/// The active (initiating) side walks `Init -> AwaitingAck -> Confirmed`, or ends up in
///  `TimedOut` if no ack ever arrives. The passive side goes `Init -> PassiveEstablished` and
///  stays there: it acks incoming handshake requests but never expects an ack itself.
///
/// `Confirmed` and `TimedOut` are terminal. In particular a confirmed session never becomes
///  unconfirmed again - teardown and recreation are the session manager's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Init,
    AwaitingAck,
    Confirmed,
    PassiveEstablished,
    TimedOut,
}

impl HandshakePhase {
    /// The active side starts waiting for an ack. Returns whether the transition happened.
    pub fn start_active(&mut self) -> bool {
        match self {
            HandshakePhase::Init => {
                *self = HandshakePhase::AwaitingAck;
                true
            }
            _ => false,
        }
    }

    /// The passive side is established right away - there is no ack to wait for.
    pub fn start_passive(&mut self) -> bool {
        match self {
            HandshakePhase::Init => {
                *self = HandshakePhase::PassiveEstablished;
                true
            }
            _ => false,
        }
    }

    /// A valid handshake ack arrived. Returns true only for the transition
    ///  `AwaitingAck -> Confirmed`, so the caller fires its one-shot notification exactly once;
    ///  repeated acks and acks in any other phase are no-ops.
    pub fn confirm(&mut self) -> bool {
        match self {
            HandshakePhase::AwaitingAck => {
                *self = HandshakePhase::Confirmed;
                true
            }
            HandshakePhase::Confirmed => {
                debug!("handshake already confirmed - ignoring repeated ack");
                false
            }
            other => {
                debug!("handshake ack in phase {:?} - ignoring", other);
                false
            }
        }
    }

    /// The handshake timeout expired without an ack. Returns whether this actually timed the
    ///  handshake out (i.e. it was still awaiting the ack).
    pub fn time_out(&mut self) -> bool {
        match self {
            HandshakePhase::AwaitingAck => {
                *self = HandshakePhase::TimedOut;
                true
            }
            _ => false,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, HandshakePhase::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    fn test_active_flow() {
        let mut phase = HandshakePhase::Init;

        assert!(phase.start_active());
        assert_eq!(phase, HandshakePhase::AwaitingAck);
        assert!(!phase.is_confirmed());

        assert!(phase.confirm());
        assert!(phase.is_confirmed());

        // repeated acks stay no-ops
        assert!(!phase.confirm());
        assert!(phase.is_confirmed());

        // a late timeout does not undo the confirmation
        assert!(!phase.time_out());
        assert!(phase.is_confirmed());
    }

    #[rstest]
    fn test_passive_flow() {
        let mut phase = HandshakePhase::Init;

        assert!(phase.start_passive());
        assert_eq!(phase, HandshakePhase::PassiveEstablished);
        assert!(!phase.is_confirmed());

        // a stray ack means nothing to the passive side
        assert!(!phase.confirm());
        assert_eq!(phase, HandshakePhase::PassiveEstablished);
    }

    #[rstest]
    fn test_timeout_is_terminal() {
        let mut phase = HandshakePhase::Init;
        phase.start_active();

        assert!(phase.time_out());
        assert_eq!(phase, HandshakePhase::TimedOut);

        // an ack arriving after the timeout no longer confirms the session
        assert!(!phase.confirm());
        assert_eq!(phase, HandshakePhase::TimedOut);
        assert!(!phase.is_confirmed());
    }

    #[rstest]
    fn test_double_start_is_rejected() {
        let mut phase = HandshakePhase::Init;
        assert!(phase.start_active());
        assert!(!phase.start_active());
        assert!(!phase.start_passive());
    }
}
