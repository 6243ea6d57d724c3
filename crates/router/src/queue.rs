//! Queue client on top of a pluggable transport.
//!
//! The transport performs exactly one network call per method and knows
//! nothing about batching. [`QueueClient`] adds the batching rules: chunks of
//! at most [`MAX_BATCH_SIZE`], stable entry ids, FIFO deduplication tokens and
//! message groups, and the asymmetric failure policy (sends fail loudly,
//! deletes only log).
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{RouterError, TransportError};

/// Largest number of entries a single send or delete call may carry.
pub const MAX_BATCH_SIZE: usize = 10;

/// Message group used for FIFO payloads without a readable `source`.
pub const DEFAULT_GROUP_ID: &str = "DefaultGroup";

/// Payload field whose value becomes the FIFO message group.
pub const GROUP_ID_FIELD: &str = "source";

/// A message as delivered by the source queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub receipt_handle: String,
    pub body: String,
}

impl RawMessage {
    pub fn new(
        id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            receipt_handle: receipt_handle.into(),
            body: body.into(),
        }
    }
}

/// Options for one receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub max_messages: usize,
    /// Long-poll wait; the call returns empty once it elapses.
    pub wait_time: Duration,
    /// How long received messages stay hidden from other consumers.
    pub visibility_timeout: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: MAX_BATCH_SIZE,
            wait_time: Duration::from_secs(2),
            visibility_timeout: Duration::from_secs(300),
        }
    }
}

/// One entry of a send chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEntry {
    pub id: String,
    pub body: String,
    pub deduplication_id: Option<String>,
    pub group_id: Option<String>,
}

/// One entry of a delete chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEntry {
    pub id: String,
    pub receipt_handle: String,
}

impl DeleteEntry {
    pub fn new(id: impl Into<String>, receipt_handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            receipt_handle: receipt_handle.into(),
        }
    }
}

impl From<&RawMessage> for DeleteEntry {
    fn from(message: &RawMessage) -> Self {
        DeleteEntry::new(message.id.clone(), message.receipt_handle.clone())
    }
}

/// An entry the queue service refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub id: String,
    pub code: String,
    pub message: String,
}

/// Per-entry outcome of a chunk call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryReport {
    pub successful: Vec<String>,
    pub failed: Vec<EntryFailure>,
}

/// Network access to a message queue service.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Receives up to `options.max_messages` messages; empty when none arrive in time.
    async fn receive(
        &self,
        queue: &str,
        options: &ReceiveOptions,
    ) -> Result<Vec<RawMessage>, TransportError>;

    /// Sends one chunk of at most [`MAX_BATCH_SIZE`] entries.
    async fn send_chunk(
        &self,
        queue: &str,
        entries: Vec<OutboundEntry>,
    ) -> Result<EntryReport, TransportError>;

    /// Deletes one chunk of at most [`MAX_BATCH_SIZE`] entries.
    async fn delete_chunk(
        &self,
        queue: &str,
        entries: Vec<DeleteEntry>,
    ) -> Result<EntryReport, TransportError>;
}

#[async_trait]
impl<T: QueueTransport + ?Sized> QueueTransport for Arc<T> {
    async fn receive(
        &self,
        queue: &str,
        options: &ReceiveOptions,
    ) -> Result<Vec<RawMessage>, TransportError> {
        (**self).receive(queue, options).await
    }

    async fn send_chunk(
        &self,
        queue: &str,
        entries: Vec<OutboundEntry>,
    ) -> Result<EntryReport, TransportError> {
        (**self).send_chunk(queue, entries).await
    }

    async fn delete_chunk(
        &self,
        queue: &str,
        entries: Vec<DeleteEntry>,
    ) -> Result<EntryReport, TransportError> {
        (**self).delete_chunk(queue, entries).await
    }
}

/// Outcome of a successful [`QueueClient::send_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub chunks: usize,
    pub sent: usize,
}

/// Outcome of [`QueueClient::delete_batch`]; deletes never fail the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub requested: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// FIFO queues are recognised by their `.fifo` suffix.
pub fn is_fifo_queue(queue: &str) -> bool {
    queue.ends_with(".fifo")
}

/// Message group for `body`: its non-blank string `source`, else [`DEFAULT_GROUP_ID`].
pub fn group_id_for(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|value| value.get(GROUP_ID_FIELD))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|source| !source.is_empty())
        .map_or_else(|| DEFAULT_GROUP_ID.to_string(), str::to_string)
}

/// Batching queue client.
#[derive(Debug, Clone)]
pub struct QueueClient<T> {
    transport: T,
}

impl<T: QueueTransport> QueueClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Receives one batch from `queue`.
    pub async fn receive_batch(
        &self,
        queue: &str,
        options: &ReceiveOptions,
    ) -> Result<Vec<RawMessage>, RouterError> {
        if queue.trim().is_empty() {
            return Err(RouterError::InvalidQueue("receive"));
        }
        let options = ReceiveOptions {
            max_messages: options.max_messages.clamp(1, MAX_BATCH_SIZE),
            ..*options
        };
        let messages = self.transport.receive(queue, &options).await?;
        debug!(queue, count = messages.len(), "received messages");
        Ok(messages)
    }

    /// Sends every payload to `queue`, ten per call, one call after another.
    ///
    /// Entry ids are `msg_<n>` where `n` is the payload's position in
    /// `payloads`. Any refused entry stops the batch with
    /// [`RouterError::SendRejected`]; chunks already sent stay sent.
    pub async fn send_batch(
        &self,
        queue: &str,
        payloads: &[String],
    ) -> Result<SendSummary, RouterError> {
        if queue.trim().is_empty() {
            return Err(RouterError::InvalidQueue("send"));
        }
        if payloads.is_empty() {
            debug!(queue, "no messages to send");
            return Ok(SendSummary::default());
        }

        info!(queue, count = payloads.len(), "starting batch send");
        let fifo = is_fifo_queue(queue);
        let mut summary = SendSummary::default();

        for (chunk_index, chunk) in payloads.chunks(MAX_BATCH_SIZE).enumerate() {
            let start = chunk_index * MAX_BATCH_SIZE;
            let entries: Vec<OutboundEntry> = chunk
                .iter()
                .enumerate()
                .map(|(offset, body)| OutboundEntry {
                    id: format!("msg_{}", start + offset),
                    body: body.clone(),
                    deduplication_id: fifo.then(|| Uuid::new_v4().to_string()),
                    group_id: fifo.then(|| group_id_for(body)),
                })
                .collect();
            let total = entries.len();

            let report = match self.transport.send_chunk(queue, entries).await {
                Ok(report) => report,
                Err(err) => {
                    error!(queue, error = %err, "exception while sending message batch");
                    return Err(err.into());
                }
            };

            if !report.failed.is_empty() {
                for failure in &report.failed {
                    error!(
                        queue,
                        id = %failure.id,
                        code = %failure.code,
                        reason = %failure.message,
                        "failed to send message"
                    );
                }
                return Err(RouterError::SendRejected {
                    queue: queue.to_string(),
                    failed: report.failed.len(),
                    total,
                });
            }

            summary.chunks += 1;
            summary.sent += total;
            info!(queue, count = total, "sent message batch");
        }

        Ok(summary)
    }

    /// Deletes `entries` from `queue`, ten per call.
    ///
    /// Refused entries and failed calls are logged and counted, never
    /// returned as errors: an undeleted message is simply redelivered later.
    pub async fn delete_batch(&self, queue: &str, entries: &[DeleteEntry]) -> DeleteSummary {
        let mut summary = DeleteSummary {
            requested: entries.len(),
            ..Default::default()
        };
        if entries.is_empty() {
            debug!(queue, "no messages to delete");
            return summary;
        }
        if queue.trim().is_empty() {
            error!("queue URL for delete is empty; messages will be redelivered");
            summary.failed = entries.len();
            return summary;
        }

        info!(queue, count = entries.len(), "starting batch delete");
        for chunk in entries.chunks(MAX_BATCH_SIZE) {
            match self.transport.delete_chunk(queue, chunk.to_vec()).await {
                Ok(report) => {
                    for failure in &report.failed {
                        warn!(
                            queue,
                            id = %failure.id,
                            code = %failure.code,
                            reason = %failure.message,
                            "failed to delete message"
                        );
                    }
                    summary.failed += report.failed.len();
                    summary.deleted += chunk.len().saturating_sub(report.failed.len());
                }
                Err(err) => {
                    error!(
                        queue,
                        error = %err,
                        "exception while deleting message batch; messages may be reprocessed"
                    );
                    summary.failed += chunk.len();
                }
            }
        }
        summary
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    /// Transport that records every call and can refuse chosen entries.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub inbox: Mutex<Vec<Vec<RawMessage>>>,
        pub sent: Mutex<Vec<(String, Vec<OutboundEntry>)>>,
        pub deleted: Mutex<Vec<(String, Vec<DeleteEntry>)>>,
        pub refuse_send_to: Mutex<HashSet<String>>,
        pub refuse_delete_ids: Mutex<HashSet<String>>,
        pub fail_delete_calls: Mutex<bool>,
    }

    impl RecordingTransport {
        pub fn sent_to(&self, queue: &str) -> Vec<Vec<OutboundEntry>> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(q, _)| q == queue)
                .map(|(_, entries)| entries.clone())
                .collect()
        }

        pub fn deleted_ids(&self) -> Vec<String> {
            self.deleted
                .lock()
                .unwrap()
                .iter()
                .flat_map(|(_, entries)| entries.iter().map(|e| e.id.clone()))
                .collect()
        }
    }

    #[async_trait]
    impl QueueTransport for RecordingTransport {
        async fn receive(
            &self,
            _queue: &str,
            _options: &ReceiveOptions,
        ) -> Result<Vec<RawMessage>, TransportError> {
            let mut inbox = self.inbox.lock().unwrap();
            if inbox.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(inbox.remove(0))
            }
        }

        async fn send_chunk(
            &self,
            queue: &str,
            entries: Vec<OutboundEntry>,
        ) -> Result<EntryReport, TransportError> {
            let refuse = self.refuse_send_to.lock().unwrap().contains(queue);
            let report = if refuse {
                EntryReport {
                    successful: Vec::new(),
                    failed: entries
                        .iter()
                        .map(|e| EntryFailure {
                            id: e.id.clone(),
                            code: "InvalidMessageContents".into(),
                            message: "refused".into(),
                        })
                        .collect(),
                }
            } else {
                EntryReport {
                    successful: entries.iter().map(|e| e.id.clone()).collect(),
                    failed: Vec::new(),
                }
            };
            self.sent.lock().unwrap().push((queue.to_string(), entries));
            Ok(report)
        }

        async fn delete_chunk(
            &self,
            queue: &str,
            entries: Vec<DeleteEntry>,
        ) -> Result<EntryReport, TransportError> {
            if *self.fail_delete_calls.lock().unwrap() {
                return Err(TransportError::request("DeleteMessageBatch", queue, "boom"));
            }
            let refused = self.refuse_delete_ids.lock().unwrap().clone();
            let (failed, successful): (Vec<_>, Vec<_>) =
                entries.iter().partition(|e| refused.contains(&e.id));
            let report = EntryReport {
                successful: successful.iter().map(|e| e.id.clone()).collect(),
                failed: failed
                    .iter()
                    .map(|e| EntryFailure {
                        id: e.id.clone(),
                        code: "ReceiptHandleIsInvalid".into(),
                        message: "stale handle".into(),
                    })
                    .collect(),
            };
            self.deleted
                .lock()
                .unwrap()
                .push((queue.to_string(), entries));
            Ok(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;

    fn payloads(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!(r#"{{"source":"SARS","tenderNumber":"RFQ-{i}"}}"#))
            .collect()
    }

    #[tokio::test]
    async fn twenty_three_payloads_go_out_as_ten_ten_three() {
        let transport = Arc::new(RecordingTransport::default());
        let client = QueueClient::new(Arc::clone(&transport));

        let summary = client
            .send_batch("https://sqs.local/accepted", &payloads(23))
            .await
            .expect("send succeeds");
        assert_eq!(summary, SendSummary { chunks: 3, sent: 23 });

        let chunks = transport.sent_to("https://sqs.local/accepted");
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(chunks[1][0].id, "msg_10");
        assert_eq!(chunks[2][2].id, "msg_22");
        assert!(chunks[0][0].deduplication_id.is_none());
        assert!(chunks[0][0].group_id.is_none());
    }

    #[tokio::test]
    async fn fifo_entries_get_unique_tokens_and_groups() {
        let transport = Arc::new(RecordingTransport::default());
        let client = QueueClient::new(Arc::clone(&transport));
        let bodies = vec![
            r#"{"source":"Eskom","tenderNumber":"E1"}"#.to_string(),
            r#"{"source":"Eskom","tenderNumber":"E2"}"#.to_string(),
            "not json".to_string(),
            r#"{"tenderNumber":"X"}"#.to_string(),
        ];

        client
            .send_batch("https://sqs.local/accepted.fifo", &bodies)
            .await
            .expect("send succeeds");

        let chunks = transport.sent_to("https://sqs.local/accepted.fifo");
        let entries = &chunks[0];
        let groups: Vec<_> = entries.iter().map(|e| e.group_id.clone()).collect();
        assert_eq!(
            groups,
            vec![
                Some("Eskom".to_string()),
                Some("Eskom".to_string()),
                Some(DEFAULT_GROUP_ID.to_string()),
                Some(DEFAULT_GROUP_ID.to_string()),
            ]
        );
        let tokens: std::collections::HashSet<_> = entries
            .iter()
            .filter_map(|e| e.deduplication_id.clone())
            .collect();
        assert_eq!(tokens.len(), 4);
    }

    #[tokio::test]
    async fn refused_entry_fails_the_send() {
        let transport = Arc::new(RecordingTransport::default());
        transport
            .refuse_send_to
            .lock()
            .unwrap()
            .insert("q".to_string());
        let client = QueueClient::new(Arc::clone(&transport));

        let err = client.send_batch("q", &payloads(12)).await;
        assert_eq!(
            err,
            Err(RouterError::SendRejected {
                queue: "q".into(),
                failed: 10,
                total: 10
            })
        );
        // The second chunk is never attempted.
        assert_eq!(transport.sent_to("q").len(), 1);
    }

    #[tokio::test]
    async fn empty_send_makes_no_calls() {
        let transport = Arc::new(RecordingTransport::default());
        let client = QueueClient::new(Arc::clone(&transport));
        let summary = client.send_batch("q", &[]).await.expect("no-op");
        assert_eq!(summary, SendSummary::default());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_failures_are_counted_not_raised() {
        let transport = Arc::new(RecordingTransport::default());
        transport
            .refuse_delete_ids
            .lock()
            .unwrap()
            .insert("m3".to_string());
        let client = QueueClient::new(Arc::clone(&transport));
        let entries: Vec<DeleteEntry> = (0..13)
            .map(|i| DeleteEntry::new(format!("m{i}"), format!("h{i}")))
            .collect();

        let summary = client.delete_batch("src", &entries).await;
        assert_eq!(
            summary,
            DeleteSummary {
                requested: 13,
                deleted: 12,
                failed: 1
            }
        );
        assert_eq!(transport.deleted.lock().unwrap().len(), 2);

        *transport.fail_delete_calls.lock().unwrap() = true;
        let summary = client.delete_batch("src", &entries).await;
        assert_eq!(summary.failed, 13);
        assert_eq!(summary.deleted, 0);
    }

    #[test]
    fn group_id_falls_back_for_blank_or_non_string_sources() {
        assert_eq!(group_id_for(r#"{"source":"SANRAL"}"#), "SANRAL");
        assert_eq!(group_id_for(r#"{"source":"  "}"#), DEFAULT_GROUP_ID);
        assert_eq!(group_id_for(r#"{"source":7}"#), DEFAULT_GROUP_ID);
        assert_eq!(group_id_for("[1,2]"), DEFAULT_GROUP_ID);
        assert!(is_fifo_queue("https://sqs/q.fifo"));
        assert!(!is_fifo_queue("https://sqs/q"));
    }
}
