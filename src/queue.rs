use crate::engine::{SyncEngine, SyncOutcome};
use async_trait::async_trait;
use rusqlite::params;
use rusqlite::types::Type;
use std::str::FromStr;
use syncdb_types::job::{ByState, Job, JobQueue, JobState, JobType, NextDue};
use time::{Duration, OffsetDateTime};
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Add, Get, Save, Select};
use typesafe_repository::prelude::*;

const COLUMNS: &str = "id, queue, job_type, payload, state, attempts, available_at, message";

pub const DEFAULT_MAX_RETRIES: u32 = 31;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::DAY;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: std::time::Duration::from_secs(DEFAULT_RETRY_DELAY.whole_seconds() as u64),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobResult {
    Success(Option<String>),
    Failure { message: String, retry: bool },
}

impl JobResult {
    fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            retry: true,
        }
    }
}

/// Applies the outcome of one attempt, rescheduling failed jobs while retries remain
pub fn finish(job: &mut Job, result: JobResult, policy: RetryPolicy, now: OffsetDateTime) {
    match result {
        JobResult::Success(message) => {
            job.state = JobState::Success;
            job.message = message;
        }
        JobResult::Failure { message, retry } if retry && job.attempts <= policy.max_retries => {
            job.state = JobState::Queued;
            job.available_at = now + policy.delay;
            job.message = Some(message);
        }
        JobResult::Failure { message, .. } => {
            job.state = JobState::Failure;
            job.message = Some(message);
        }
    }
}

async fn run_job(engine: &SyncEngine, job: &Job) -> JobResult {
    match job.job_type {
        JobType::ProductSync => {
            let payload = match job.product_sync_payload() {
                Ok(p) => p,
                Err(err) => {
                    return JobResult::Failure {
                        message: format!("Invalid job payload: {err}"),
                        retry: false,
                    }
                }
            };
            match engine.sync_one(&payload.product_id).await {
                Ok(SyncOutcome::Saved) => JobResult::Success(None),
                Ok(SyncOutcome::Skipped(reason)) => JobResult::Success(Some(format!(
                    "Unable to import product with SyncDB ID {}: {reason}",
                    payload.product_id
                ))),
                Err(err) => JobResult::failure(err.to_string()),
            }
        }
    }
}

/// Claims and runs the next due job, returning its final state
pub async fn process_next(
    queue: &dyn JobQueue,
    engine: &SyncEngine,
    policy: RetryPolicy,
    now: OffsetDateTime,
) -> Result<Option<JobState>, anyhow::Error> {
    let Some(mut job) = queue.select(&NextDue(now)).await?.into_iter().next() else {
        return Ok(None);
    };
    job.state = JobState::Processing;
    job.attempts += 1;
    queue.save(job.clone()).await?;

    let result = run_job(engine, &job).await;
    if let JobResult::Failure { message, .. } = &result {
        log::error!("Job {} ({}) failed on attempt {}: {message}", job.id, job.job_type, job.attempts);
    }
    finish(&mut job, result, policy, now);
    queue.save(job.clone()).await?;
    Ok(Some(job.state))
}

/// Runs due jobs until none is left
pub async fn drain(
    queue: &dyn JobQueue,
    engine: &SyncEngine,
    policy: RetryPolicy,
) -> Result<usize, anyhow::Error> {
    let mut processed = 0;
    while process_next(queue, engine, policy, OffsetDateTime::now_utc())
        .await?
        .is_some()
    {
        processed += 1;
    }
    Ok(processed)
}

pub struct SqliteJobQueue {
    conn: Connection,
}

impl SqliteJobQueue {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS job (
                    id BLOB PRIMARY KEY,
                    queue TEXT NOT NULL,
                    job_type TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    state TEXT NOT NULL,
                    attempts INTEGER NOT NULL,
                    available_at INTEGER NOT NULL,
                    message TEXT
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS job_due ON job (state, available_at)",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    async fn insert(&self, job: Job, upsert: bool) -> Result<(), anyhow::Error> {
        let payload = serde_json::to_string(&job.payload)?;
        let conflict = match upsert {
            true => "ON CONFLICT(id) DO UPDATE SET queue=?2, job_type=?3, payload=?4, state=?5, attempts=?6, available_at=?7, message=?8",
            false => "",
        };
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO job ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) {conflict}"
                    ),
                    params![
                        job.id,
                        job.queue,
                        job.job_type.as_str(),
                        payload,
                        job.state.as_str(),
                        job.attempts,
                        job.available_at.unix_timestamp(),
                        job.message,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        queue: row.get(1)?,
        job_type: JobType::from_str(&row.get::<_, String>(2)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, err.into())
        })?,
        payload: serde_json::from_str(&row.get::<_, String>(3)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err))
        })?,
        state: JobState::from_str(&row.get::<_, String>(4)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, err.into())
        })?,
        attempts: row.get(5)?,
        available_at: OffsetDateTime::from_unix_timestamp(row.get(6)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(6, Type::Integer, Box::new(err))
        })?,
        message: row.get(7)?,
    })
}

impl Repository<Job> for SqliteJobQueue {
    type Error = anyhow::Error;
}

#[async_trait]
impl Add<Job> for SqliteJobQueue {
    async fn add(&self, job: Job) -> Result<(), Self::Error> {
        self.insert(job, false).await
    }
}

#[async_trait]
impl Save<Job> for SqliteJobQueue {
    async fn save(&self, job: Job) -> Result<(), Self::Error> {
        self.insert(job, true).await
    }
}

#[async_trait]
impl Get<Job> for SqliteJobQueue {
    async fn get_one(&self, id: &IdentityOf<Job>) -> Result<Option<Job>, Self::Error> {
        let id = *id;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM job WHERE id = ?1"))?;
                let mut j = stmt
                    .query_map(params![id], job_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(j.pop())
            })
            .await?)
    }
}

#[async_trait]
impl Select<Job, NextDue> for SqliteJobQueue {
    async fn select(&self, NextDue(now): &NextDue) -> Result<Vec<Job>, Self::Error> {
        let now = now.unix_timestamp();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM job WHERE state = ?1 AND available_at <= ?2
                    ORDER BY available_at, rowid LIMIT 1"
                ))?;
                let j = stmt
                    .query_map(params![JobState::Queued.as_str(), now], job_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(j)
            })
            .await?)
    }
}

#[async_trait]
impl Select<Job, ByState> for SqliteJobQueue {
    async fn select(&self, ByState(state): &ByState) -> Result<Vec<Job>, Self::Error> {
        let state = *state;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM job WHERE state = ?1 ORDER BY rowid"
                ))?;
                let j = stmt
                    .query_map(params![state.as_str()], job_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(j)
            })
            .await?)
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn requeue_interrupted(&self) -> Result<usize, Self::Error> {
        Ok(self
            .conn
            .call(|conn| {
                Ok(conn.execute(
                    "UPDATE job SET state = ?1 WHERE state = ?2",
                    params![JobState::Queued.as_str(), JobState::Processing.as_str()],
                )?)
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyncOptions;
    use crate::storage::Storage;
    use crate::testing::{record, storage, FakeCatalogClient};
    use std::sync::Arc;
    use time::macros::datetime;
    use typesafe_repository::async_ops::List;

    const NOW: OffsetDateTime = datetime!(2024-05-01 10:00 UTC);

    async fn setup() -> (Storage, SyncEngine, Arc<FakeCatalogClient>) {
        let storage = storage().await;
        let client = Arc::new(FakeCatalogClient::default());
        let engine = SyncEngine::new(client.clone(), &storage, SyncOptions::default());
        (storage, engine, client)
    }

    #[tokio::test]
    async fn empty_queue_has_nothing_to_do() {
        let (storage, engine, _) = setup().await;
        assert_eq!(
            process_next(storage.jobs.as_ref(), &engine, RetryPolicy::default(), NOW)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn successful_job_syncs_product() {
        let (storage, engine, client) = setup().await;
        client.put(record("100", "CD"));
        let job = Job::product_sync("100", NOW);
        storage.jobs.add(job.clone()).await.unwrap();

        let state = process_next(storage.jobs.as_ref(), &engine, RetryPolicy::default(), NOW)
            .await
            .unwrap();
        assert_eq!(state, Some(JobState::Success));
        let job = storage.jobs.get_one(&job.id).await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.message, None);
        assert_eq!(storage.products.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn skipped_record_finishes_with_reason() {
        let (storage, engine, client) = setup().await;
        client.put(record("100", "Poster"));
        let job = Job::product_sync("100", NOW);
        storage.jobs.add(job.clone()).await.unwrap();

        process_next(storage.jobs.as_ref(), &engine, RetryPolicy::default(), NOW)
            .await
            .unwrap();
        let job = storage.jobs.get_one(&job.id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Success);
        assert_eq!(
            job.message.as_deref(),
            Some("Unable to import product with SyncDB ID 100: unable to map productFormat value \"Poster\" to a product type")
        );
    }

    #[tokio::test]
    async fn failed_job_is_retried_until_exhausted() {
        let (storage, engine, client) = setup().await;
        client.fail("100");
        let job = Job::product_sync("100", NOW);
        storage.jobs.add(job.clone()).await.unwrap();
        let policy = RetryPolicy {
            max_retries: 1,
            delay: std::time::Duration::from_secs(3600),
        };

        let state = process_next(storage.jobs.as_ref(), &engine, policy, NOW).await.unwrap();
        assert_eq!(state, Some(JobState::Queued));
        let stored = storage.jobs.get_one(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.available_at, datetime!(2024-05-01 11:00 UTC));
        assert!(stored.message.unwrap().starts_with("Unable to fetch SyncDB product 100"));

        assert_eq!(
            process_next(storage.jobs.as_ref(), &engine, policy, NOW).await.unwrap(),
            None
        );
        let later = datetime!(2024-05-01 11:00 UTC);
        let state = process_next(storage.jobs.as_ref(), &engine, policy, later).await.unwrap();
        assert_eq!(state, Some(JobState::Failure));
        assert_eq!(storage.jobs.get_one(&job.id).await.unwrap().unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn invalid_payload_is_not_retried() {
        let (storage, engine, _) = setup().await;
        let mut job = Job::product_sync("100", NOW);
        job.payload = serde_json::json!({ "sku": "100" });
        storage.jobs.add(job.clone()).await.unwrap();

        let state = process_next(storage.jobs.as_ref(), &engine, RetryPolicy::default(), NOW)
            .await
            .unwrap();
        assert_eq!(state, Some(JobState::Failure));
    }

    #[tokio::test]
    async fn jobs_run_in_due_order() {
        let (storage, engine, client) = setup().await;
        for id in ["1", "2", "3"] {
            client.put(record(id, "CD"));
        }
        storage.jobs.add(Job::product_sync("1", NOW)).await.unwrap();
        storage
            .jobs
            .add(Job::product_sync("2", NOW - Duration::minutes(5)))
            .await
            .unwrap();
        storage
            .jobs
            .add(Job::product_sync("3", NOW + Duration::minutes(5)))
            .await
            .unwrap();

        assert_eq!(
            drain(storage.jobs.as_ref(), &engine, RetryPolicy::default())
                .await
                .unwrap(),
            3
        );
        assert_eq!(*client.product_calls.lock().unwrap(), vec!["2", "1", "3"]);
    }

    #[tokio::test]
    async fn interrupted_jobs_are_requeued() {
        let (storage, _, _) = setup().await;
        let mut job = Job::product_sync("100", NOW);
        job.state = JobState::Processing;
        storage.jobs.add(job.clone()).await.unwrap();

        assert_eq!(storage.jobs.requeue_interrupted().await.unwrap(), 1);
        assert_eq!(
            storage.jobs.select(&ByState(JobState::Queued)).await.unwrap().len(),
            1
        );
    }

    #[test]
    fn retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 31);
        assert_eq!(policy.delay, std::time::Duration::from_secs(86_400));
    }
}
