//! Backoff schedule for throttled or failing responses

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Statuses that are worth re-issuing after a delay
pub const RETRYABLE_STATUSES: [u16; 3] = [500, 503, 429];

/// Default delays between attempts, in seconds. The first attempt is immediate.
pub const DEFAULT_BACKOFF_SECS: [u64; 7] = [0, 1, 2, 5, 8, 12, 21];

/// Fixed sequence of delays applied before each attempt
///
/// The schedule length is the total number of attempts. Only received
/// statuses in [`RETRYABLE_STATUSES`] advance it; transport failures never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl BackoffSchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::new(vec![Duration::ZERO])
    }

    /// `attempts` attempts with the same delay between each of them
    pub fn fixed(attempts: usize, delay: Duration) -> Self {
        let delays = (0..attempts)
            .map(|i| if i == 0 { Duration::ZERO } else { delay })
            .collect();
        Self::new(delays)
    }

    /// Delays, one per attempt
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Total number of attempts
    pub fn attempts(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(
            DEFAULT_BACKOFF_SECS
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
        )
    }
}

/// Whether a received status should be retried
pub fn is_retryable(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Run `attempt` once per scheduled delay, sleeping that delay first, until
/// `retryable` rejects a result.
///
/// Returns the last result, or `None` for an empty schedule. An error ends
/// the run immediately.
pub async fn run_with_backoff<T, F, Fut>(
    schedule: &BackoffSchedule,
    target: &str,
    retryable: impl Fn(&T) -> bool,
    mut attempt: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last = None;
    for delay in schedule.delays() {
        if !delay.is_zero() {
            tracing::info!("Sleeping for {:?} before retrying API call to {}", delay, target);
            tokio::time::sleep(*delay).await;
        }

        let result = attempt().await?;
        let retry = retryable(&result);
        last = Some(result);
        if !retry {
            break;
        }
    }
    Ok(last)
}
