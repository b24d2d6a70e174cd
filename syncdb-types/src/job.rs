use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Add, Get, Save, Select};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{SelectBy, Selector};
use uuid::Uuid;

pub const PRODUCT_SYNC_QUEUE: &str = "ipc_product_sync";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum JobType {
    #[display("syncdb_product_sync")]
    ProductSync,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductSync => "syncdb_product_sync",
        }
    }
}

impl FromStr for JobType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "syncdb_product_sync" => Ok(Self::ProductSync),
            _ => Err(anyhow::anyhow!("Unknown job type {s}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum JobState {
    #[display("queued")]
    Queued,
    #[display("processing")]
    Processing,
    #[display("success")]
    Success,
    #[display("failure")]
    Failure,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl FromStr for JobState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            _ => Err(anyhow::anyhow!("Unknown job state {s}")),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProductSyncPayload {
    pub product_id: String,
}

#[derive(Id, Clone, Debug, PartialEq)]
pub struct Job {
    #[id]
    pub id: Uuid,
    pub queue: String,
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub state: JobState,
    /// Number of times the job has been claimed
    pub attempts: u32,
    pub available_at: OffsetDateTime,
    pub message: Option<String>,
}

impl Job {
    pub fn product_sync(product_id: impl Into<String>, available_at: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue: PRODUCT_SYNC_QUEUE.to_string(),
            job_type: JobType::ProductSync,
            payload: serde_json::json!({ "product_id": product_id.into() }),
            state: JobState::Queued,
            attempts: 0,
            available_at,
            message: None,
        }
    }

    pub fn product_sync_payload(&self) -> Result<ProductSyncPayload, anyhow::Error> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Earliest queued job that is available at the given time
pub struct NextDue(pub OffsetDateTime);
pub struct ByState(pub JobState);

impl Selector for NextDue {}
impl SelectBy<NextDue> for Job {}

impl Selector for ByState {}
impl SelectBy<ByState> for Job {}

#[async_trait]
pub trait JobQueue:
    Repository<Job, Error = anyhow::Error>
    + Add<Job>
    + Get<Job>
    + Save<Job>
    + Select<Job, NextDue>
    + Select<Job, ByState>
    + Send
    + Sync
{
    /// Returns jobs left in processing state by an interrupted worker to the queue
    async fn requeue_interrupted(&self) -> Result<usize, Self::Error>;
}
