use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A recurring background job with a single teardown call.
///
/// Each tick asks `make_run` for a fresh future. A tick that arrives while the
/// previous run is still pending drops that run (cancelling its request) and
/// starts the new one, so runs never queue up behind a slow request.
/// `make_run` returning `None` ends the task.
pub struct RefreshTask {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Spawn on the current Tokio runtime. The first run happens one full
    /// `interval` after spawning; the initial load is the caller's job.
    pub fn spawn<F>(interval: Duration, mut make_run: F) -> Self
    where
        F: FnMut() -> Option<BoxFuture<'static, ()>> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Consume the first immediate tick so refresh fires after one full interval.
            tick.tick().await;

            let mut in_flight: Option<BoxFuture<'static, ()>> = None;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        tracing::debug!("refresh: shutting down");
                        break;
                    }
                    _ = tick.tick() => {
                        if in_flight.is_some() {
                            tracing::debug!("refresh: superseding in-flight run");
                        }
                        match make_run() {
                            Some(run) => in_flight = Some(run),
                            None => break,
                        }
                    }
                    () = async {
                        if let Some(run) = in_flight.as_mut() {
                            run.await;
                        }
                    }, if in_flight.is_some() => {
                        in_flight = None;
                    }
                }
            }
        });
        Self {
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Stop the task. Any in-flight run is dropped.
    pub fn cancel(mut self) {
        self.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.stop();
    }
}
