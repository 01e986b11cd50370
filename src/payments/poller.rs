use std::{str::FromStr, time::Duration};

use tokio::sync::watch;

use super::{GatewayStatus, PaymentError, PaymentGateway};

/// What a failed status request means for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorPolicy {
    /// Stop polling and leave the booking as it is, so a network blip never
    /// marks a possibly-settled payment as failed.
    Abort,
    /// Count the failed request as an inconclusive attempt and keep polling.
    Retry,
}

impl FromStr for TransportErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(TransportErrorPolicy::Abort),
            "retry" => Ok(TransportErrorPolicy::Retry),
            other => Err(format!("expected abort or retry, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub on_transport_error: TransportErrorPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            interval: Duration::from_secs(3),
            max_attempts: 20,
            on_transport_error: TransportErrorPolicy::Abort,
        }
    }
}

impl RetryPolicy {
    /// Longest the loop can wait before giving up.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Confirmed,
    Declined,
    TimedOut,
    Cancelled,
}

/// Resolves once `cancel` turns true. A dropped sender means nobody can cancel any more.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Queries the gateway every `policy.interval`, at most `policy.max_attempts`
/// times, until the payment settles.
///
/// Cancellation only stops further polls from being scheduled; a status
/// request already in flight is allowed to finish.
pub async fn poll_until_settled(
    gateway: &dyn PaymentGateway,
    reference: &str,
    policy: &RetryPolicy,
    cancel: &mut watch::Receiver<bool>,
) -> Result<PollOutcome, PaymentError> {
    for attempt in 1..=policy.max_attempts {
        tokio::select! {
            _ = cancelled(cancel) => {
                tracing::info!(%reference, attempt, "payment polling cancelled");
                return Ok(PollOutcome::Cancelled);
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }

        match gateway.status(reference).await {
            Ok(GatewayStatus::Completed) => {
                tracing::info!(%reference, attempt, "payment confirmed");
                return Ok(PollOutcome::Confirmed);
            }
            Ok(GatewayStatus::Failed) => {
                tracing::info!(%reference, attempt, "payment declined");
                return Ok(PollOutcome::Declined);
            }
            Ok(GatewayStatus::Pending) => {
                tracing::debug!(%reference, attempt, max = policy.max_attempts, "payment still pending");
            }
            Err(e) => match policy.on_transport_error {
                TransportErrorPolicy::Abort => {
                    tracing::warn!(%reference, attempt, error = %e, "payment status check failed, giving up");
                    return Err(PaymentError::Transport(e.to_string()));
                }
                TransportErrorPolicy::Retry => {
                    tracing::warn!(%reference, attempt, error = %e, "payment status check failed, will retry");
                }
            },
        }
    }

    tracing::info!(%reference, attempts = policy.max_attempts, "payment not confirmed in time");
    Ok(PollOutcome::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_waits_one_minute() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.ceiling(), Duration::from_secs(60));
        assert_eq!(policy.max_attempts, 20);
    }

    #[test]
    fn transport_policy_parses() {
        assert_eq!("Retry".parse::<TransportErrorPolicy>(), Ok(TransportErrorPolicy::Retry));
        assert_eq!("abort".parse::<TransportErrorPolicy>(), Ok(TransportErrorPolicy::Abort));
        assert!("ignore".parse::<TransportErrorPolicy>().is_err());
    }
}
