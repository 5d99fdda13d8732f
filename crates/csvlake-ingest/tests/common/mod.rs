//! Shared fixtures for csvlake-ingest integration tests
//!
//! Everything runs against [`MemoryStorage`] with a [`FixedClock`], so tests
//! need no network and produce stable destination keys.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use csvlake_ingest::storage::MemoryStorage;
use csvlake_ingest::{Dispatcher, FixedClock, IngestPipeline, Settings};
use std::sync::Arc;

pub const RAW_BUCKET: &str = "raw";
pub const LAKE_BUCKET: &str = "lake";

pub const SALES_CSV: &[u8] = b"id,product,amount,paid
1,Widget,9.99,true
2,Gadget,24.50,false
3,Gizmo,NA,true
2,Gadget,24.50,false
,,,
";

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,csvlake_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// 2024-03-07 12:30:00 UTC
pub fn processing_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 7, 12, 30, 0)
        .single()
        .unwrap_or_default()
}

pub struct TestEnvironment {
    pub storage: MemoryStorage,
    pub settings: Settings,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_settings(Settings::for_buckets(RAW_BUCKET, LAKE_BUCKET))
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            storage: MemoryStorage::new(),
            settings,
        }
    }

    pub fn upload(&self, key: &str, data: &[u8]) {
        self.storage.put(RAW_BUCKET, key, data.to_vec());
    }

    pub fn pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(
            Arc::new(self.settings.clone()),
            Arc::new(self.storage.clone()),
            Arc::new(FixedClock(processing_instant())),
        )
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.pipeline())
    }
}
