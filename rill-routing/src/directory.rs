//! Directory-service client interface.
//!
//! The directory service is the authority on a stream's partitioning. This
//! module defines the one operation the routing layer needs - a paginated
//! "list partitions" call - as a trait, so production adapters and the
//! in-memory simulated directory used by tests share a seam.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use rill_core::PartitionDescriptor;

/// Page-size cap sent with every list request.
pub const LIST_PARTITIONS_PAGE_LIMIT: u32 = 1_000;

// -----------------------------------------------------------------------------
// Request / response types
// -----------------------------------------------------------------------------

/// Parameters of one paginated list call.
///
/// The first page of a fetch names the stream and asks the directory to
/// filter out closed partitions server-side; follow-up pages carry only the
/// continuation token.
#[derive(Debug, Clone)]
pub struct ListPartitionsRequest {
    /// Stream to list; `None` on continuation pages.
    pub stream_name: Option<String>,
    /// Optional stream ARN qualifying the name.
    pub stream_arn: Option<String>,
    /// Continuation token from the previous page.
    pub next_token: Option<String>,
    /// Ask the directory to return only currently-open partitions.
    pub open_only: bool,
    /// Maximum descriptors per page.
    pub page_limit: u32,
}

impl ListPartitionsRequest {
    /// Builds the first-page request for a stream's open partitions.
    #[must_use]
    pub fn open_partitions(stream_name: &str, stream_arn: Option<&str>) -> Self {
        Self {
            stream_name: Some(stream_name.to_string()),
            stream_arn: stream_arn.map(ToString::to_string),
            next_token: None,
            open_only: true,
            page_limit: LIST_PARTITIONS_PAGE_LIMIT,
        }
    }

    /// Builds a continuation request from the previous page's token.
    #[must_use]
    pub fn next_page(token: &str) -> Self {
        Self {
            stream_name: None,
            stream_arn: None,
            next_token: Some(token.to_string()),
            open_only: true,
            page_limit: LIST_PARTITIONS_PAGE_LIMIT,
        }
    }
}

/// One page of a partition listing.
#[derive(Debug, Clone, Default)]
pub struct PartitionPage {
    /// Descriptors on this page.
    pub descriptors: Vec<PartitionDescriptor>,
    /// Token for the next page; `None` on the final page.
    pub next_token: Option<String>,
}

/// Failure of one list call.
///
/// Every variant is retriable by the routing layer; the kinds exist so logs
/// and metrics can distinguish throttling from outages.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// The directory rejected the call for rate limiting.
    #[error("directory throttled the request: {message}")]
    Throttled {
        /// The directory's message.
        message: String,
    },
    /// The directory returned a structured failure.
    #[error("directory error {code}: {message}")]
    Service {
        /// The directory's error code.
        code: String,
        /// The directory's message.
        message: String,
    },
    /// The call never reached the directory.
    #[error("directory transport failure: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },
}

impl DirectoryError {
    /// Returns the failure code for logs and metrics.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Throttled { .. } => "Throttled",
            Self::Service { code, .. } => code,
            Self::Transport { .. } => "Transport",
        }
    }
}

// -----------------------------------------------------------------------------
// DirectoryClient trait
// -----------------------------------------------------------------------------

/// Client for the partition directory service.
///
/// Implementations must be safe to call repeatedly without stream-state
/// preconditions; the directory itself rejects calls against streams in an
/// unusable state.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Lists one page of the stream's partitions.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] when the page could not be fetched; the
    /// caller retries with backoff.
    async fn list_partitions(
        &self,
        request: &ListPartitionsRequest,
    ) -> Result<PartitionPage, DirectoryError>;
}

// -----------------------------------------------------------------------------
// SimulatedDirectory
// -----------------------------------------------------------------------------

/// In-memory directory serving a scripted sequence of responses.
///
/// Each call pops the next scripted result; when the script runs dry the
/// most recent successful page is served again, modeling a directory whose
/// topology has stopped changing. An optional per-call latency exercises
/// reader behavior during slow fetches.
#[derive(Debug, Default)]
pub struct SimulatedDirectory {
    /// Scripted responses, served front to back.
    script: Mutex<VecDeque<Result<PartitionPage, DirectoryError>>>,
    /// Last successful page, re-served once the script is exhausted.
    steady_state: Mutex<Option<PartitionPage>>,
    /// Artificial latency applied to every call.
    latency: Option<Duration>,
    /// Number of list calls observed.
    calls: AtomicU64,
}

impl SimulatedDirectory {
    /// Creates a directory with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory that delays every call by `latency`.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Appends a successful page to the script.
    pub fn enqueue_page(&self, descriptors: Vec<PartitionDescriptor>, next_token: Option<&str>) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(PartitionPage {
                descriptors,
                next_token: next_token.map(ToString::to_string),
            }));
    }

    /// Appends a failure to the script.
    pub fn enqueue_failure(&self, error: DirectoryError) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Err(error));
    }

    /// Returns the number of list calls served so far.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DirectoryClient for SimulatedDirectory {
    async fn list_partitions(
        &self,
        _request: &ListPartitionsRequest,
    ) -> Result<PartitionPage, DirectoryError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front();

        match scripted {
            Some(Ok(page)) => {
                let mut steady = self.steady_state.lock().expect("steady lock poisoned");
                *steady = Some(page.clone());
                Ok(page)
            }
            Some(Err(error)) => Err(error),
            None => {
                let steady = self.steady_state.lock().expect("steady lock poisoned");
                steady.clone().ok_or_else(|| DirectoryError::Transport {
                    message: "no scripted response".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rill_core::{HashRange, PartitionId, SequenceNumberRange};

    use super::*;

    fn descriptor(id: u64) -> PartitionDescriptor {
        PartitionDescriptor::new(
            PartitionId::new(id),
            HashRange::new(0, u128::MAX),
            SequenceNumberRange::open("0"),
        )
    }

    #[test]
    fn test_first_page_request_names_the_stream() {
        let request = ListPartitionsRequest::open_partitions("events", Some("arn:events"));
        assert_eq!(request.stream_name.as_deref(), Some("events"));
        assert_eq!(request.stream_arn.as_deref(), Some("arn:events"));
        assert!(request.next_token.is_none());
        assert!(request.open_only);
        assert_eq!(request.page_limit, LIST_PARTITIONS_PAGE_LIMIT);
    }

    #[test]
    fn test_continuation_request_carries_only_the_token() {
        let request = ListPartitionsRequest::next_page("token-1");
        assert!(request.stream_name.is_none());
        assert_eq!(request.next_token.as_deref(), Some("token-1"));
    }

    #[test]
    fn test_error_codes() {
        let throttled = DirectoryError::Throttled {
            message: "slow down".to_string(),
        };
        assert_eq!(throttled.code(), "Throttled");

        let service = DirectoryError::Service {
            code: "ResourceNotFound".to_string(),
            message: "no such stream".to_string(),
        };
        assert_eq!(service.code(), "ResourceNotFound");
    }

    #[tokio::test]
    async fn test_script_serves_in_order_then_steady_state() {
        let directory = SimulatedDirectory::new();
        directory.enqueue_page(vec![descriptor(1)], None);
        directory.enqueue_failure(DirectoryError::Throttled {
            message: "busy".to_string(),
        });

        let request = ListPartitionsRequest::open_partitions("events", None);

        let first = directory.list_partitions(&request).await.unwrap();
        assert_eq!(first.descriptors.len(), 1);

        assert!(directory.list_partitions(&request).await.is_err());

        // Script exhausted: the last successful page is served again.
        let steady = directory.list_partitions(&request).await.unwrap();
        assert_eq!(steady.descriptors.len(), 1);
        assert_eq!(directory.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_is_a_transport_failure() {
        let directory = SimulatedDirectory::new();
        let request = ListPartitionsRequest::open_partitions("events", None);
        let error = directory.list_partitions(&request).await.unwrap_err();
        assert_eq!(error.code(), "Transport");
    }
}
