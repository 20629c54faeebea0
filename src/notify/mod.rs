pub mod threads;

use metrics::counter;
use thiserror::Error;

pub use threads::{GraphTransport, ReqwestTransport, ThreadsPublisher};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not build request URL: {0}")]
    InvalidUrl(String),
    #[error("container creation rejected with status {status}")]
    CreateRejected { status: u16 },
    #[error("container creation response has no usable id: {0}")]
    MissingContainerId(String),
    #[error("publish of container {container_id} rejected with status {status}")]
    ConfirmRejected { container_id: String, status: u16 },
    #[error("transport failure during {phase}: {message}")]
    Transport {
        phase: &'static str,
        message: String,
    },
}

impl PublishError {
    /// Status the remote service answered with, when it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            PublishError::CreateRejected { status }
            | PublishError::ConfirmRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishReceipt {
    Published { container_id: String },
    /// Credentials absent; nothing was sent.
    Disabled,
}

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug)]
pub struct ItemFailure {
    /// 0-based position in the batch.
    pub index: usize,
    pub error: PublishError,
}

/// What happened to one batch. Items after the first failure are never attempted.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: usize,
    pub attempted: usize,
    pub receipts: Vec<PublishReceipt>,
    pub failure: Option<ItemFailure>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failure.is_none() && self.receipts.len() == self.total
    }

    pub fn skipped(&self) -> usize {
        self.total - self.attempted
    }
}

/// Publish `notices` strictly in order, halting at the first failure.
pub async fn publish_batch(publisher: &dyn Publisher, notices: &[String]) -> BatchReport {
    let mut report = BatchReport {
        total: notices.len(),
        ..BatchReport::default()
    };

    for (index, text) in notices.iter().enumerate() {
        report.attempted += 1;
        match publisher.publish(text).await {
            Ok(receipt) => {
                counter!("publish_items_total", "result" => "ok").increment(1);
                report.receipts.push(receipt);
            }
            Err(error) => {
                counter!("publish_items_total", "result" => "failed").increment(1);
                tracing::error!(
                    target: "notify",
                    publisher = publisher.name(),
                    index,
                    status = ?error.status(),
                    error = %error,
                    "publish failed, dropping rest of batch"
                );
                report.failure = Some(ItemFailure { index, error });
                break;
            }
        }
    }

    let outcome = if report.all_succeeded() { "ok" } else { "halted" };
    counter!("publish_batches_total", "outcome" => outcome).increment(1);
    report
}

/// Boundary adapter: true only when every notice was created and confirmed.
pub async fn publish_all(publisher: &dyn Publisher, notices: &[String]) -> bool {
    publish_batch(publisher, notices).await.all_succeeded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fails on the given 0-based call number, records every call.
    struct FlakyPublisher {
        fail_on: Option<usize>,
        calls: Mutex<Vec<String>>,
    }

    impl FlakyPublisher {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                fail_on,
                calls: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait::async_trait]
    impl Publisher for FlakyPublisher {
        async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishError> {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.len();
            calls.push(text.to_string());
            if Some(n) == self.fail_on {
                return Err(PublishError::CreateRejected { status: 400 });
            }
            Ok(PublishReceipt::Published {
                container_id: format!("c{n}"),
            })
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn batch(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("notice {i}")).collect()
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let p = FlakyPublisher::new(Some(1));
        let report = publish_batch(&p, &batch(3)).await;

        assert!(!report.all_succeeded());
        assert_eq!(report.receipts.len(), 1);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.skipped(), 1);
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.error.status(), Some(400));
        assert_eq!(*p.calls.lock().unwrap(), vec!["notice 1", "notice 2"]);
    }

    #[tokio::test]
    async fn all_ok_and_empty_batches_succeed() {
        let p = FlakyPublisher::new(None);
        assert!(publish_all(&p, &batch(3)).await);
        assert!(publish_all(&p, &[]).await);
        assert_eq!(p.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn single_item_failure_is_false() {
        let p = FlakyPublisher::new(Some(0));
        assert!(!publish_all(&p, &batch(1)).await);
    }
}
