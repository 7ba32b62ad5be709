use std::future::Future;
use std::time::Duration;

/// Outcome of one poll request.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep<T> {
    Done(T),
    Failed(String),
    Pending,
}

/// Fixed-delay, fixed-budget polling. Every attempt that neither succeeds nor
/// fails terminally (including transport errors) costs one attempt and one
/// sleep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            delay: Duration::from_secs(2),
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub async fn run<T, F, Fut>(&self, step: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<PollStep<T>>>,
    {
        self.run_with_sleep(step, tokio::time::sleep).await
    }

    pub async fn run_with_sleep<T, F, Fut, S, SFut>(&self, mut step: F, mut sleep: S) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<PollStep<T>>>,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        for attempt in 0..self.max_attempts {
            match step(attempt).await {
                Ok(PollStep::Done(value)) => return Some(value),
                Ok(PollStep::Failed(message)) => {
                    tracing::warn!("[poll] terminal failure on attempt {}: {}", attempt + 1, message);
                    return None;
                }
                Ok(PollStep::Pending) => {
                    tracing::debug!("[poll] attempt {}/{} pending", attempt + 1, self.max_attempts);
                }
                Err(e) => {
                    tracing::debug!(
                        "[poll] attempt {}/{} failed: {}",
                        attempt + 1,
                        self.max_attempts,
                        e
                    );
                }
            }
            sleep(self.delay).await;
        }

        tracing::warn!("[poll] gave up after {} attempts", self.max_attempts);
        None
    }
}
