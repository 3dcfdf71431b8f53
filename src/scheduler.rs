//! Fixed-rate background jobs with explicit start and stop

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// A job running on its own fixed-rate timer.
///
/// The first run happens immediately. A run that overruns its period is
/// followed by the next one right away rather than shifting the schedule.
/// A run that panics is logged and the schedule carries on.
pub struct ScheduledTask {
    name: String,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn start<F, Fut>(name: &str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            info!("Scheduled task '{}' started (period: {:?})", task_name, period);

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = async {
                        ticker.tick().await;
                        debug!("Running scheduled task '{}'", task_name);
                        if let Err(panic) = AssertUnwindSafe(job()).catch_unwind().await {
                            error!(
                                "Scheduled task '{}' run panicked: {}",
                                task_name,
                                panic_message(panic.as_ref())
                            );
                        }
                    } => {}
                }
            }

            info!("Scheduled task '{}' stopped", task_name);
        });

        Self {
            name: name.to_string(),
            shutdown,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the task, interrupting an in-flight run at its next await point
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                error!("Scheduled task '{}' panicked: {}", self.name, e);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
