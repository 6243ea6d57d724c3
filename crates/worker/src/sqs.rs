//! Amazon SQS transport.
use async_trait::async_trait;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, SendMessageBatchRequestEntry};
use router::{
    DeleteEntry, EntryFailure, EntryReport, OutboundEntry, QueueTransport, RawMessage,
    ReceiveOptions, TransportError,
};
use tracing::warn;

/// [`QueueTransport`] backed by `aws_sdk_sqs`.
#[derive(Debug, Clone)]
pub struct SqsTransport {
    client: aws_sdk_sqs::Client,
}

impl SqsTransport {
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    /// Builds a client from the default AWS credential and region chain.
    pub async fn from_env() -> Self {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_sqs::Client::new(&shared))
    }
}

fn request_error<E, R>(operation: &'static str, queue: &str, err: &SdkError<E, R>) -> TransportError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = match err {
        SdkError::ServiceError(ctx) => format!(
            "{}: {}",
            ctx.err().code().unwrap_or("unknown"),
            ctx.err().message().unwrap_or("n/a")
        ),
        other => DisplayErrorContext(other).to_string(),
    };
    TransportError::request(operation, queue, message)
}

fn secs_i32(duration: std::time::Duration) -> i32 {
    i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn receive(
        &self,
        queue: &str,
        options: &ReceiveOptions,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue)
            .max_number_of_messages(i32::try_from(options.max_messages).unwrap_or(10))
            .wait_time_seconds(secs_i32(options.wait_time))
            .visibility_timeout(secs_i32(options.visibility_timeout))
            .send()
            .await
            .map_err(|err| request_error("ReceiveMessage", queue, &err))?;

        let mut messages = Vec::new();
        for message in output.messages.unwrap_or_default() {
            let (Some(id), Some(handle)) = (message.message_id(), message.receipt_handle()) else {
                warn!(queue, "received message without id or receipt handle; skipping");
                continue;
            };
            messages.push(RawMessage::new(
                id,
                handle,
                message.body().unwrap_or_default(),
            ));
        }
        Ok(messages)
    }

    async fn send_chunk(
        &self,
        queue: &str,
        entries: Vec<OutboundEntry>,
    ) -> Result<EntryReport, TransportError> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                SendMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .message_body(entry.body)
                    .set_message_deduplication_id(entry.deduplication_id)
                    .set_message_group_id(entry.group_id)
                    .build()
                    .map_err(|err| TransportError::request("SendMessageBatch", queue, err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .send_message_batch()
            .queue_url(queue)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|err| request_error("SendMessageBatch", queue, &err))?;

        Ok(EntryReport {
            successful: output.successful().iter().map(|s| s.id().to_string()).collect(),
            failed: output
                .failed()
                .iter()
                .map(|f| EntryFailure {
                    id: f.id().to_string(),
                    code: f.code().to_string(),
                    message: f.message().unwrap_or("unknown").to_string(),
                })
                .collect(),
        })
    }

    async fn delete_chunk(
        &self,
        queue: &str,
        entries: Vec<DeleteEntry>,
    ) -> Result<EntryReport, TransportError> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .receipt_handle(entry.receipt_handle)
                    .build()
                    .map_err(|err| {
                        TransportError::request("DeleteMessageBatch", queue, err.to_string())
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .delete_message_batch()
            .queue_url(queue)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|err| request_error("DeleteMessageBatch", queue, &err))?;

        Ok(EntryReport {
            successful: output.successful().iter().map(|s| s.id().to_string()).collect(),
            failed: output
                .failed()
                .iter()
                .map(|f| EntryFailure {
                    id: f.id().to_string(),
                    code: f.code().to_string(),
                    message: f.message().unwrap_or("unknown").to_string(),
                })
                .collect(),
        })
    }
}
