use crate::admin;
use crate::engine::SyncEngine;
use crate::poller::ChangePoller;
use crate::queue::{process_next, RetryPolicy};
use actix::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use syncdb_types::job::JobQueue;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Processes queued sync jobs one at a time until cancelled
pub struct QueueWorker {
    jobs: Arc<dyn JobQueue>,
    engine: Arc<SyncEngine>,
    policy: RetryPolicy,
    idle_delay: Duration,
    token: CancellationToken,
    wake: Arc<Notify>,
}

impl QueueWorker {
    pub fn new(
        jobs: Arc<dyn JobQueue>,
        engine: Arc<SyncEngine>,
        policy: RetryPolicy,
        idle_delay: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            jobs,
            engine,
            policy,
            idle_delay,
            token,
            wake: Arc::new(Notify::new()),
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct WakeUp;

pub async fn work_loop(
    jobs: Arc<dyn JobQueue>,
    engine: Arc<SyncEngine>,
    policy: RetryPolicy,
    idle_delay: Duration,
    token: CancellationToken,
    wake: Arc<Notify>,
) {
    match jobs.requeue_interrupted().await {
        Ok(0) => (),
        Ok(n) => log::info!("Requeued {n} interrupted jobs"),
        Err(err) => log::error!("Unable to requeue interrupted jobs: {err}"),
    }
    while !token.is_cancelled() {
        match process_next(jobs.as_ref(), &engine, policy, OffsetDateTime::now_utc()).await {
            Ok(Some(_)) => continue,
            Ok(None) => (),
            Err(err) => log::error!("Unable to process job: {err:?}"),
        }
        tokio::select! {
            _ = token.cancelled() => break,
            _ = wake.notified() => (),
            _ = tokio::time::sleep(idle_delay) => (),
        }
    }
}

impl Actor for QueueWorker {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        tokio::task::spawn_local(work_loop(
            self.jobs.clone(),
            self.engine.clone(),
            self.policy,
            self.idle_delay,
            self.token.clone(),
            self.wake.clone(),
        ));
        log::info!("Queue worker started");
    }

    fn stopped(&mut self, _ctx: &mut Context<Self>) {
        log::info!("Queue worker stopped");
    }
}

impl Handler<WakeUp> for QueueWorker {
    type Result = ();

    fn handle(&mut self, _: WakeUp, _ctx: &mut Self::Context) {
        self.wake.notify_one();
    }
}

/// Polls SyncDB for modified products at a fixed interval and queues them
pub struct PollScheduler {
    poller: ChangePoller,
    jobs: Arc<dyn JobQueue>,
    interval: Duration,
    token: CancellationToken,
    worker: Option<Addr<QueueWorker>>,
}

impl PollScheduler {
    pub fn new(
        poller: ChangePoller,
        jobs: Arc<dyn JobQueue>,
        interval: Duration,
        token: CancellationToken,
        worker: Option<Addr<QueueWorker>>,
    ) -> Self {
        Self {
            poller,
            jobs,
            interval,
            token,
            worker,
        }
    }
}

pub async fn poll_loop(
    poller: ChangePoller,
    jobs: Arc<dyn JobQueue>,
    interval: Duration,
    token: CancellationToken,
    on_enqueued: impl Fn(usize),
) {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => (),
        }
        match admin::poll_and_enqueue(&poller, jobs.as_ref()).await {
            Ok(0) => (),
            Ok(count) => {
                log::info!("Queued {count} modified SyncDB products");
                on_enqueued(count);
            }
            Err(err) => log::error!("{err:?}"),
        }
    }
}

impl Actor for PollScheduler {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        let worker = self.worker.clone();
        tokio::task::spawn_local(poll_loop(
            self.poller.clone(),
            self.jobs.clone(),
            self.interval,
            self.token.clone(),
            move |_| {
                if let Some(worker) = &worker {
                    worker.do_send(WakeUp);
                }
            },
        ));
        log::info!("Poll scheduler started, polling every {:?}", self.interval);
    }

    fn stopped(&mut self, _ctx: &mut Context<Self>) {
        log::info!("Poll scheduler stopped");
    }
}
