//! Batch handling
//!
//! The dispatcher is the serverless entry point: it walks a notification batch
//! in order, hands every `.csv` object to the pipeline, and folds the results
//! into one [`BatchResponse`].

use crate::event::S3Event;
use crate::pipeline::{IngestPipeline, ProcessingResult};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

pub const STATUS_OK: u16 = 200;
pub const STATUS_MULTI_STATUS: u16 = 207;
pub const STATUS_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Batch {
        processed: usize,
        succeeded: usize,
        results: Vec<ProcessingResult>,
    },
    Error {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

impl BatchResponse {
    /// 200 when every result succeeded (an empty batch included), 207 otherwise.
    pub fn from_results(results: Vec<ProcessingResult>) -> Self {
        let processed = results.len();
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let status_code = if succeeded == processed {
            STATUS_OK
        } else {
            STATUS_MULTI_STATUS
        };

        Self {
            status_code,
            body: ResponseBody::Batch {
                processed,
                succeeded,
                results,
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status_code: STATUS_ERROR,
            body: ResponseBody::Error {
                error: message.into(),
            },
        }
    }

    pub fn results(&self) -> &[ProcessingResult] {
        match &self.body {
            ResponseBody::Batch { results, .. } => results,
            ResponseBody::Error { .. } => &[],
        }
    }

    /// `{"statusCode": .., "body": "<json>"}`, the shape a serverless runtime
    /// expects back from the handler.
    pub fn to_lambda_json(&self) -> serde_json::Result<Value> {
        Ok(json!({
            "statusCode": self.status_code,
            "body": serde_json::to_string(&self.body)?,
        }))
    }
}

pub struct Dispatcher {
    pipeline: IngestPipeline,
}

impl Dispatcher {
    pub fn new(pipeline: IngestPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Process every `.csv` record of the batch, one after the other.
    pub async fn handle(&self, event: &S3Event) -> BatchResponse {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("batch", %invocation_id, records = event.records.len());

        async {
            let mut results = Vec::new();
            for record in &event.records {
                let bucket = record.bucket();
                let key = record.key();

                if !key.to_lowercase().ends_with(".csv") {
                    info!("Skipping non-CSV object: {}", key);
                    continue;
                }

                results.push(self.pipeline.process(bucket, &key).await);
            }

            let response = BatchResponse::from_results(results);
            info!(status = response.status_code, "Batch complete");
            response
        }
        .instrument(span)
        .await
    }

    /// Decode a raw notification batch and handle it. A batch that does not
    /// decode yields a 500 response.
    pub async fn handle_json(&self, raw: Value) -> BatchResponse {
        debug!(event = %raw, "Received event");

        match serde_json::from_value::<S3Event>(raw) {
            Ok(event) => self.handle(&event).await,
            Err(e) => {
                error!(error = %e, "Undecodable event batch");
                BatchResponse::error(format!("invalid event batch: {}", e))
            },
        }
    }
}
