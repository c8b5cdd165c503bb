use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Rearmable one-shot timer driving interval flushes.
///
/// At most one timer is pending at a time. Every `arm` bumps a generation
/// number that is passed to the fire callback, so a callback that woke up
/// just as the timer was cancelled and rearmed can tell it is stale via
/// [`FlushTimer::is_current`].
#[derive(Debug)]
pub struct FlushTimer {
    runtime: Handle,
    generation: u64,
    pending: Option<CancellationToken>,
}

impl FlushTimer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            generation: 0,
            pending: None,
        }
    }

    /// Cancels any pending timer and schedules `on_fire` after `interval`.
    pub fn arm<F>(&mut self, interval: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let token = CancellationToken::new();
        let cancelled = token.clone();

        self.runtime.spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {}
                () = tokio::time::sleep(interval) => on_fire(generation),
            }
        });

        self.pending = Some(token);
        generation
    }

    /// Returns `true` if a pending timer was cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.is_armed() && self.generation == generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
