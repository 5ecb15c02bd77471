// Ctrl-C raises a flag that the session races every step against
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Interrupt {
    raised: watch::Receiver<bool>,
}

impl Interrupt {
    /// Install the Ctrl-C listener. Must be called inside the runtime.
    pub fn listen() -> Self {
        let (tx, raised) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Interrupt received");
                    let _ = tx.send(true);
                }
                Err(e) => debug!("Ctrl-C listener unavailable: {}", e),
            }
        });
        Self { raised }
    }

    /// Flag driven by the returned sender instead of the signal.
    #[cfg(test)]
    pub fn manual() -> (watch::Sender<bool>, Self) {
        let (tx, raised) = watch::channel(false);
        (tx, Self { raised })
    }

    pub fn is_raised(&self) -> bool {
        *self.raised.borrow()
    }

    /// Resolves once the flag is raised; never resolves if it no longer can be.
    pub async fn wait(&self) {
        let mut raised = self.raised.clone();
        if raised.wait_for(|flag| *flag).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
