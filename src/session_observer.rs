use async_trait::async_trait;
#[cfg(test)] use mockall::automock;

/// Hook for the session manager owning this session.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionObserver: Send + Sync + 'static {
    /// Fired exactly once, when the handshake confirms that the remote peer sends and receives
    ///  reliably. The session manager should re-evaluate any associations it has queued pending
    ///  this session.
    async fn on_association_viable(&self);
}
