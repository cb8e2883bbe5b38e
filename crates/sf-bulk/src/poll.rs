//! Bounded job-status polling.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorKind, Result};

/// Default polling interval for job status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default maximum wait time for job completion.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// How often and for how long to wait on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Call `check` every `config.interval` until it yields a value.
///
/// An error from `check` ends the loop. Reaching the deadline yields
/// [`ErrorKind::Timeout`], even while a check is in flight, and a cancelled
/// `token` yields [`ErrorKind::Cancelled`].
pub async fn poll_until<T, F, Fut>(
    config: &PollConfig,
    token: &CancellationToken,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + config.timeout;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::new(ErrorKind::Cancelled)),
            _ = sleep_until(deadline) => return Err(Error::new(ErrorKind::Timeout(config.timeout))),
            outcome = check() => {
                if let Some(value) = outcome? {
                    return Ok(value);
                }
            }
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::new(ErrorKind::Cancelled)),
            _ = sleep_until(deadline) => return Err(Error::new(ErrorKind::Timeout(config.timeout))),
            _ = sleep(config.interval) => {}
        }
    }
}
