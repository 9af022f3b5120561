use crate::config::{EventConfig, SqsConfig};
use crate::error::MetadataError;
use crate::pipeline::MetadataPipeline;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::Builder as SqsConfigBuilder;
use aws_sdk_sqs::Client as SqsClient;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// S3 blob-creation event notification, as delivered on the queue.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3BucketEntity,
    pub object: S3ObjectEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3ObjectEntity {
    pub key: String,
}

/// Fixed acknowledgment returned for a processed event batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventAck {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl EventAck {
    fn success() -> Self {
        Self {
            status_code: 200,
            body: "Successfully processed JSON metadata and stored in DynamoDB".to_string(),
        }
    }

    fn failure(err: &MetadataError) -> Self {
        Self {
            status_code: 500,
            body: format!("Error processing S3 event: {err}"),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Processes blob-creation events against the pipeline.
///
/// Only keys under the inbound prefix with the inbound suffix are ingested;
/// anything else in the batch is skipped with a warning. Records are handled
/// sequentially and the first failure aborts the rest of the batch, leaving
/// retry/redrive to the messaging layer.
pub struct EventHandler {
    pipeline: Arc<MetadataPipeline>,
    config: EventConfig,
}

impl EventHandler {
    pub fn new(pipeline: Arc<MetadataPipeline>, config: EventConfig) -> Self {
        Self { pipeline, config }
    }

    /// Ingest every matching record in the event, fail-fast. Returns the
    /// number of records ingested.
    pub async fn handle_event(&self, event: &S3Event) -> Result<usize, MetadataError> {
        let mut processed = 0;

        for record in &event.records {
            let key = &record.s3.object.key;

            if !key.starts_with(&self.config.inbound_prefix)
                || !key.ends_with(&self.config.inbound_suffix)
            {
                warn!(key = %key, "skipping object outside the inbound JSON convention");
                continue;
            }

            let path = format!("s3://{}/{}", record.s3.bucket.name, key);
            info!(path = %path, "processing blob-creation event");

            // The document body is pre-extracted JSON, so this ingestion
            // shape bypasses the tag extractor and goes straight to the
            // index write.
            self.pipeline.reconcile(&path).await?;
            processed += 1;
        }

        counter!("events.records_processed").increment(processed as u64);

        Ok(processed)
    }

    /// Handle an event and fold the outcome into the fixed acknowledgment.
    pub async fn acknowledge(&self, event: &S3Event) -> EventAck {
        match self.handle_event(event).await {
            Ok(processed) => {
                info!(processed, "event batch processed");
                EventAck::success()
            }
            Err(err) => {
                counter!("events.batches_failed").increment(1);
                error!(error = %err, "event batch aborted");
                EventAck::failure(&err)
            }
        }
    }
}

/// Long-polling SQS consumer feeding S3 event notifications to the handler.
///
/// Messages are deleted only after a successful batch; failed batches stay
/// on the queue for redrive per its policy.
pub struct SqsEventConsumer {
    client: SqsClient,
    queue_url: String,
    handler: EventHandler,
    wait_time_secs: i32,
    max_messages: i32,
}

impl SqsEventConsumer {
    pub async fn new(
        config: &SqsConfig,
        queue_url: String,
        handler: EventHandler,
    ) -> anyhow::Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut sqs_config_builder = SqsConfigBuilder::from(&aws_config);

        if let Some(ref endpoint_url) = config.endpoint_url {
            sqs_config_builder = sqs_config_builder.endpoint_url(endpoint_url);
        }

        let client = SqsClient::from_conf(sqs_config_builder.build());

        info!(queue_url = %queue_url, "SQS event consumer initialized");

        Ok(Self {
            client,
            queue_url,
            handler,
            wait_time_secs: config.wait_time_secs,
            max_messages: config.max_messages,
        })
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!(queue_url = %self.queue_url, "starting event consumer loop");

        loop {
            let output = match self
                .client
                .receive_message()
                .queue_url(&self.queue_url)
                .wait_time_seconds(self.wait_time_secs)
                .max_number_of_messages(self.max_messages)
                .send()
                .await
            {
                Ok(output) => output,
                Err(err) => {
                    error!(error = %err, "failed to receive messages");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for message in output.messages.unwrap_or_default() {
                let Some(body) = message.body() else {
                    continue;
                };

                let event: S3Event = match serde_json::from_str(body) {
                    Ok(event) => event,
                    Err(err) => {
                        // Not an S3 notification; leave it for the queue's
                        // redrive policy to dead-letter.
                        warn!(error = %err, "ignoring undecodable message body");
                        continue;
                    }
                };

                let ack = self.handler.acknowledge(&event).await;

                if ack.is_success() {
                    self.delete_message(message.receipt_handle()).await;
                } else {
                    warn!("leaving failed batch on the queue for redrive");
                }
            }
        }
    }

    #[instrument(skip(self, receipt_handle))]
    async fn delete_message(&self, receipt_handle: Option<&str>) {
        let Some(receipt_handle) = receipt_handle else {
            return;
        };

        if let Err(err) = self
            .client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
        {
            error!(error = %err, "failed to delete processed message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::MockTagReader;
    use crate::metadata::DicomMetadata;
    use crate::testing::{InMemoryBlobStore, InMemoryIndexStore};

    fn event_config() -> EventConfig {
        EventConfig {
            inbound_prefix: "json/".to_string(),
            inbound_suffix: ".json".to_string(),
        }
    }

    fn event_with_keys(keys: &[&str]) -> S3Event {
        S3Event {
            records: keys
                .iter()
                .map(|key| S3EventRecord {
                    s3: S3Entity {
                        bucket: S3BucketEntity {
                            name: "metadata-out".to_string(),
                        },
                        object: S3ObjectEntity {
                            key: key.to_string(),
                        },
                    },
                })
                .collect(),
        }
    }

    fn document_for(id: &str) -> Vec<u8> {
        let record = DicomMetadata {
            patient_id: Some(format!("PID-{id}")),
            s3_path: Some(format!("s3://inbound/scans/{id}.dcm")),
            ..Default::default()
        };
        serde_json::to_vec(&record).unwrap()
    }

    fn handler_with(
        blob_store: Arc<InMemoryBlobStore>,
        index_store: Arc<InMemoryIndexStore>,
    ) -> EventHandler {
        let pipeline = Arc::new(MetadataPipeline::new(
            blob_store,
            index_store,
            Arc::new(MockTagReader::new()),
            "metadata-out".to_string(),
            "json/".to_string(),
        ));
        EventHandler::new(pipeline, event_config())
    }

    #[test]
    fn test_event_deserializes_from_notification_shape() {
        let event: S3Event = serde_json::from_str(
            r#"{"Records": [{"s3": {"bucket": {"name": "b"}, "object": {"key": "json/anon-1.json"}}}]}"#,
        )
        .unwrap();

        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].s3.object.key, "json/anon-1.json");
    }

    #[tokio::test]
    async fn test_matching_records_are_indexed() {
        let blob_store = Arc::new(
            InMemoryBlobStore::default()
                .with_object("s3://metadata-out/json/anon-1.json", document_for("anon-1")),
        );
        let index_store = Arc::new(InMemoryIndexStore::default());
        let handler = handler_with(blob_store, index_store.clone());

        let ack = handler.acknowledge(&event_with_keys(&["json/anon-1.json"])).await;

        assert!(ack.is_success());
        assert_eq!(
            index_store
                .entry("anon-1")
                .unwrap()
                .get("PatientID")
                .map(String::as_str),
            Some("PID-anon-1")
        );
    }

    #[tokio::test]
    async fn test_non_matching_keys_are_skipped_not_failed() {
        let blob_store = Arc::new(
            InMemoryBlobStore::default()
                .with_object("s3://metadata-out/json/anon-1.json", document_for("anon-1")),
        );
        let index_store = Arc::new(InMemoryIndexStore::default());
        let handler = handler_with(blob_store, index_store.clone());

        let processed = handler
            .handle_event(&event_with_keys(&[
                "scans/raw.dcm",
                "json/notes.txt",
                "json/anon-1.json",
            ]))
            .await
            .unwrap();

        assert_eq!(processed, 1);
        assert_eq!(index_store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_batch_aborts_at_first_failure() {
        // Three matching records; the second one's index write fails.
        let blob_store = Arc::new(
            InMemoryBlobStore::default()
                .with_object("s3://metadata-out/json/anon-1.json", document_for("anon-1"))
                .with_object("s3://metadata-out/json/anon-2.json", document_for("anon-2"))
                .with_object("s3://metadata-out/json/anon-3.json", document_for("anon-3")),
        );
        let index_store = Arc::new(InMemoryIndexStore::failing_put_for("anon-2"));
        let handler = handler_with(blob_store, index_store.clone());

        let ack = handler
            .acknowledge(&event_with_keys(&[
                "json/anon-1.json",
                "json/anon-2.json",
                "json/anon-3.json",
            ]))
            .await;

        assert!(!ack.is_success());
        assert!(ack.body.starts_with("Error processing S3 event:"));

        // Record 1 was committed before the failure; record 3 was never
        // attempted.
        assert!(index_store.entry("anon-1").is_some());
        assert!(index_store.entry("anon-2").is_none());
        assert!(index_store.entry("anon-3").is_none());
        assert_eq!(index_store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_success_ack_is_fixed() {
        let handler = handler_with(
            Arc::new(InMemoryBlobStore::default()),
            Arc::new(InMemoryIndexStore::default()),
        );

        let ack = handler.acknowledge(&event_with_keys(&[])).await;

        assert_eq!(
            ack,
            EventAck {
                status_code: 200,
                body: "Successfully processed JSON metadata and stored in DynamoDB".to_string(),
            }
        );
    }
}
