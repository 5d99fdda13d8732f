//! S3 notification batch model
//!
//! Only the parts the dispatcher needs are modelled: bucket name and object
//! key are required, everything else is optional.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Event {
    /// Absent `Records` decodes as an empty batch
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3EventRecord {
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// URL-encoded, as delivered by S3
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl S3EventRecord {
    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    /// Object key with notification encoding undone.
    pub fn key(&self) -> String {
        decode_key(&self.s3.object.key)
    }
}

impl S3Event {
    /// Build a batch of `ObjectCreated:Put` records, mostly for local runs.
    pub fn for_objects<'a>(objects: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let records = objects
            .into_iter()
            .map(|(bucket, key)| S3EventRecord {
                event_name: Some("ObjectCreated:Put".to_string()),
                s3: S3Entity {
                    bucket: S3Bucket {
                        name: bucket.to_string(),
                    },
                    object: S3Object {
                        key: urlencoding::encode(key).into_owned(),
                        size: None,
                    },
                },
            })
            .collect();
        Self { records }
    }
}

/// S3 notification keys use form encoding: `+` is a space, the rest is
/// percent-encoded. Keys that do not decode to UTF-8 are kept as received.
pub fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
