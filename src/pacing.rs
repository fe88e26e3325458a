//! Inter-request pacing. AppTweak rate-limits the public API, so the pipeline
//! pauses after every request it issues.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Pacer: Send {
    /// Called once after each upstream request, successful or not.
    async fn pause(&mut self);
}

/// Sleep a fixed duration after each request.
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn pause(&mut self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// No pause at all (tests, local mock endpoints).
pub struct NoDelay;

#[async_trait]
impl Pacer for NoDelay {
    async fn pause(&mut self) {}
}

#[async_trait]
impl<P: Pacer + ?Sized> Pacer for Box<P> {
    async fn pause(&mut self) {
        (**self).pause().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_fixed_delay_waits() {
        let mut pacer = FixedDelay::from_millis(30);
        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_boxed_pacer_delegates() {
        let mut pacer: Box<dyn Pacer> = Box::new(NoDelay);
        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
