use crate::discord::DeleteApi;
use crate::model::Message;
use crate::rate_limit::Throttle;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The remote answered 204 No Content.
    Deleted,
    /// Any other status. The message may still exist.
    Rejected(StatusCode),
    /// The request never got an answer.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub message_id: String,
    pub status: Option<StatusCode>,
    pub reason: String,
}

/// `attempted` counts messages a delete was issued for (a 429 retry is not a
/// new attempt), `confirmed` only those answered with 204.
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    pub attempted: usize,
    pub confirmed: usize,
    pub failures: Vec<DeleteFailure>,
}

/// Rough bounds for deleting `count` messages at one call per `delay`:
/// from half the count to the full count of intervals.
pub fn estimate_duration(count: usize, delay: Duration) -> (Duration, Duration) {
    let scale = |n: usize| delay.saturating_mul(u32::try_from(n).unwrap_or(u32::MAX));
    (scale(count / 2), scale(count))
}

/// Issues best-effort deletes one at a time, never faster than one per `delay`.
pub struct DeleteExecutor<'a, D: DeleteApi + ?Sized> {
    api: &'a D,
    throttle: Throttle,
    report: DeleteReport,
}

impl<'a, D: DeleteApi + ?Sized> DeleteExecutor<'a, D> {
    pub fn new(api: &'a D, delay: Duration) -> Self {
        Self {
            api,
            throttle: Throttle::new(delay),
            report: DeleteReport::default(),
        }
    }

    /// Never fails the run; every outcome lands in the report. A 429 is
    /// retried once after the server's back-off and still counts as one attempt.
    pub async fn delete(&mut self, message: &Message) -> DeleteOutcome {
        self.report.attempted += 1;

        let mut retried = false;
        let result = loop {
            self.throttle.acquire().await;
            let result = self
                .api
                .delete_message(&message.channel_id, &message.id)
                .await;
            self.throttle.finish();

            match result {
                Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => {
                    if let Some(wait) = response.retry_after {
                        self.throttle.defer(wait);
                    }
                    if retried {
                        break Ok(response);
                    }
                    retried = true;
                    warn!(
                        "Rate limited deleting message {}, retrying in {:?}",
                        message.id, response.retry_after
                    );
                }
                other => break other,
            }
        };

        match result {
            Ok(response) if response.status == StatusCode::NO_CONTENT => {
                debug!("Deleted message {}", message.id);
                self.report.confirmed += 1;
                DeleteOutcome::Deleted
            }
            Ok(response) => {
                warn!(
                    "Error deleting message: {} ({})",
                    message.id,
                    response.status.as_u16()
                );
                self.report.failures.push(DeleteFailure {
                    message_id: message.id.clone(),
                    status: Some(response.status),
                    reason: response.status.to_string(),
                });
                DeleteOutcome::Rejected(response.status)
            }
            Err(e) => {
                warn!("Error deleting message: {} ({:#})", message.id, e);
                self.report.failures.push(DeleteFailure {
                    message_id: message.id.clone(),
                    status: None,
                    reason: format!("{:#}", e),
                });
                DeleteOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn report(&self) -> &DeleteReport {
        &self.report
    }

    pub fn into_report(self) -> DeleteReport {
        self.report
    }
}
