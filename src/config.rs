use std::time::Duration;

use anyhow::bail;

/// The four durations the reliability protocol runs on. Everything else about the session
///  (peer identities, group address, socket) comes from the session manager.
pub struct SessionConfig {
    /// How often the repair cycle runs, i.e. how often gaps are checked and repair requests go
    ///  out. Configure to roughly 2x the RTT between group members: shorter intervals re-request
    ///  data that is already in flight, longer ones delay recovery.
    pub repair_interval: Duration,

    /// How long an unanswered repair request stays outstanding before the requested data is
    ///  declared unrecoverable and skipped. This caps gap growth from a peer that stopped
    ///  responding.
    pub repair_timeout: Duration,

    /// How often the active side re-sends its handshake request until acknowledged.
    pub handshake_interval: Duration,

    /// How long the active side waits for a handshake ack before giving up on the session.
    pub handshake_timeout: Duration,
}

impl SessionConfig {
    /// Defaults for a LAN-grade network; multicast over anything slower deserves explicit tuning.
    pub fn default_lan() -> SessionConfig {
        SessionConfig {
            repair_interval: Duration::from_millis(500),
            repair_timeout: Duration::from_secs(30),
            handshake_interval: Duration::from_millis(250),
            handshake_timeout: Duration::from_secs(10),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.repair_interval.is_zero() || self.handshake_interval.is_zero() {
            bail!("watchdog intervals must be non-zero");
        }
        if self.repair_timeout < self.repair_interval {
            bail!("repair timeout is shorter than the repair interval - requests would expire before a repair cycle can resolve them");
        }
        if self.handshake_timeout.is_zero() {
            bail!("handshake timeout must be non-zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    fn test_default_lan_is_valid() {
        assert!(SessionConfig::default_lan().validate().is_ok());
    }

    #[rstest]
    #[case::zero_repair_interval(Duration::ZERO, Duration::from_secs(30), Duration::from_millis(250), Duration::from_secs(10))]
    #[case::zero_handshake_interval(Duration::from_millis(500), Duration::from_secs(30), Duration::ZERO, Duration::from_secs(10))]
    #[case::repair_timeout_below_interval(Duration::from_millis(500), Duration::from_millis(100), Duration::from_millis(250), Duration::from_secs(10))]
    #[case::zero_handshake_timeout(Duration::from_millis(500), Duration::from_secs(30), Duration::from_millis(250), Duration::ZERO)]
    fn test_validate_rejects(
        #[case] repair_interval: Duration,
        #[case] repair_timeout: Duration,
        #[case] handshake_interval: Duration,
        #[case] handshake_timeout: Duration,
    ) {
        let config = SessionConfig {
            repair_interval,
            repair_timeout,
            handshake_interval,
            handshake_timeout,
        };
        assert!(config.validate().is_err());
    }
}
