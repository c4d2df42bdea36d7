use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::audit::AuditLog;
use crate::clock::Clock;
use crate::error::LikeError;
use crate::metrics::{LIKES_ACCEPTED, TRACKED_APPS};
use crate::models::AppId;
use crate::rate_limit::{Decision, RateLimiter};
use crate::store::CounterStore;

// A validated like waiting for the rate limit check and commit
pub struct LikeJob {
    pub app_id: AppId,
    pub ip: String,
    pub client_hash: String,
    pub response_tx: oneshot::Sender<Result<u64, LikeError>>, // new count, or why it was refused
}

/// Single writer for the counter store.
///
/// Jobs are handled one at a time, so the rate limit check, the mutation and
/// the write of one like never interleave with another like's.
pub async fn like_worker(
    mut rx: mpsc::Receiver<LikeJob>,
    store: Arc<dyn CounterStore>,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    audit: AuditLog,
) {
    tracing::info!("like worker started - committing likes sequentially");

    while let Some(job) = rx.recv().await {
        let result = commit(&job, store.as_ref(), &limiter, clock.as_ref(), &audit).await;
        // the requester may have gone away; nothing to do then
        let _ = job.response_tx.send(result);
    }

    tracing::info!("like worker stopped");
}

async fn commit(
    job: &LikeJob,
    store: &dyn CounterStore,
    limiter: &RateLimiter,
    clock: &dyn Clock,
    audit: &AuditLog,
) -> Result<u64, LikeError> {
    let now = clock.now();
    let mut data = store.read().await?;

    if let Decision::Denied(denial) = limiter.check(&data, &job.ip, now) {
        audit.record(format!(
            "like rejected: app_id={}, ip={}, reason={}",
            job.app_id, job.ip, denial
        ));
        return Err(LikeError::Throttled(denial));
    }

    let count = data.record_like(&job.app_id, &job.ip, now);
    store.write(&mut data).await?;

    LIKES_ACCEPTED.inc();
    TRACKED_APPS.set(data.apps.len() as f64);
    tracing::info!(app_id = %job.app_id, ip = %job.ip, likes = count, "like accepted");
    audit.record(format!(
        "like accepted: app_id={}, ip={}, likes={}, hash={}",
        job.app_id, job.ip, count, job.client_hash
    ));
    Ok(count)
}
