pub mod app;
pub mod backoff;
pub mod batch;
pub mod config;
pub mod controller;
pub mod messaging;
pub mod metrics;
pub mod model;
pub mod schedule;
pub mod storage;
pub mod transcription;
