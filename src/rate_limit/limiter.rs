use std::fmt::Display;
use std::sync::Arc;

use anyhow::Context;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use uuid::Uuid;

use super::SendLog;
use super::SendRecord;
use crate::domain::EmailType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hour,
    Day,
}

impl Window {
    fn duration(&self) -> Duration {
        match self {
            Window::Hour => Duration::hours(1),
            Window::Day => Duration::hours(24),
        }
    }
}

impl Display for Window {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Window::Hour => write!(f, "hour"),
            Window::Day => write!(f, "day"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Rate limit exceeded: Maximum {limit} {email_type} emails per {window}")]
pub struct RateLimitExceeded {
    pub email_type: EmailType,
    pub window: Window,
    pub limit: i64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Denied(RateLimitExceeded),
}

/// Sliding-window limiter over a `SendLog`. Windows always end at `now`;
/// nothing resets at a fixed clock boundary.
///
/// `check` and `record` are two separate round trips, so two concurrent
/// requests from the same user may both pass before either is recorded. The
/// ceilings are soft throttles, and this overshoot is accepted.
#[derive(Clone)]
pub struct RateLimiter {
    log: Arc<dyn SendLog>,
}

impl RateLimiter {
    pub fn new(log: Arc<dyn SendLog>) -> Self { Self { log } }

    /// Fails open: if the log cannot be queried, the send is allowed and the
    /// error is only logged.
    #[tracing::instrument(name = "Checking email rate limit", skip(self))]
    pub async fn check(
        &self,
        user_id: Uuid,
        email_type: EmailType,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        match self.try_check(user_id, email_type, now).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(
                    error.cause_chain=?e,
                    error.message=%e,
                    "rate limit check failed, allowing send"
                );
                RateLimitDecision::Allowed
            }
        }
    }

    async fn try_check(
        &self,
        user_id: Uuid,
        email_type: EmailType,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, anyhow::Error> {
        let policy = email_type.policy();
        // the daily count is only queried if the hourly one passes
        for (window, limit) in [
            (Window::Hour, policy.max_per_hour),
            (Window::Day, policy.max_per_day),
        ] {
            let count = self
                .log
                .count_since(user_id, email_type, now - window.duration())
                .await
                .with_context(|| format!("could not count {email_type} emails per {window}"))?;
            if count >= limit {
                tracing::warn!(count, limit, %window, "rate limit exceeded");
                return Ok(RateLimitDecision::Denied(RateLimitExceeded {
                    email_type,
                    window,
                    limit,
                }));
            }
        }
        Ok(RateLimitDecision::Allowed)
    }

    /// Best-effort: the email has already been sent by the time this is
    /// called, so a failed insert is logged and otherwise ignored.
    #[tracing::instrument(name = "Recording sent email", skip(self))]
    pub async fn record(
        &self,
        user_id: Uuid,
        email_type: EmailType,
        recipient: &str,
        now: DateTime<Utc>,
    ) {
        let record = SendRecord {
            user_id,
            email_type,
            recipient: recipient.to_string(),
            sent_at: now,
        };
        if let Err(e) = self.log.insert(&record).await {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "failed to record sent email"
            );
        }
    }

    /// `check`, then `record` if allowed
    pub async fn check_and_record(
        &self,
        user_id: Uuid,
        email_type: EmailType,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let decision = self.check(user_id, email_type, now).await;
        if decision == RateLimitDecision::Allowed {
            self.record(user_id, email_type, recipient, now).await;
        }
        decision
    }
}
