use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::audit::AuditLog;
use crate::catalog::CatalogProvider;
use crate::clock::Clock;
use crate::error::LikeError;
use crate::metrics::LIKES_REJECTED;
use crate::models::{AppId, LikeResponse, LikeSubmission};
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::store::CounterStore;
use crate::validate::{AppValidator, HashAlgorithm, HashValidator};
use crate::worker::{LikeJob, like_worker};

const LIKE_QUEUE_DEPTH: usize = 100;

// Collaborators and settings a LikeService is built from
pub struct ServiceParts {
    pub store: Arc<dyn CounterStore>,
    pub catalog: Arc<dyn CatalogProvider>,
    pub clock: Arc<dyn Clock>,
    pub audit: AuditLog,
    pub policy: RateLimitPolicy,
    pub hash_algorithm: HashAlgorithm,
}

/// Serves "get count" and "submit like".
///
/// A submission is validated in a fixed order (app id, hash presence, hash,
/// catalog membership) and the first failure ends it. Survivors are queued to
/// the like worker, which applies the rate limit and commits.
pub struct LikeService {
    store: Arc<dyn CounterStore>,
    hash_validator: HashValidator,
    app_validator: AppValidator,
    audit: AuditLog,
    jobs: mpsc::Sender<LikeJob>,
}

impl LikeService {
    // Spawns the like worker, so must be called inside a tokio runtime
    pub fn new(parts: ServiceParts) -> Self {
        let (jobs, rx) = mpsc::channel(LIKE_QUEUE_DEPTH);

        tokio::spawn(like_worker(
            rx,
            parts.store.clone(),
            RateLimiter::new(parts.policy),
            parts.clock,
            parts.audit.clone(),
        ));

        Self {
            store: parts.store,
            hash_validator: HashValidator::new(
                parts.catalog.clone(),
                parts.hash_algorithm,
                parts.audit.clone(),
            ),
            app_validator: AppValidator::new(parts.catalog, parts.audit.clone()),
            audit: parts.audit,
            jobs,
        }
    }

    pub async fn get_likes(&self, app_id: Option<&str>) -> Result<LikeResponse, LikeError> {
        let result = self.read_likes(app_id).await;
        self.observe(&result);
        result
    }

    pub async fn submit_like(&self, submission: LikeSubmission) -> Result<LikeResponse, LikeError> {
        let result = self.commit_like(submission).await;
        self.observe(&result);
        result
    }

    async fn read_likes(&self, app_id: Option<&str>) -> Result<LikeResponse, LikeError> {
        let app_id = AppId::parse(app_id)?;
        let data = self.store.read().await?;
        Ok(LikeResponse::new(&app_id, data.likes_for(&app_id), "fetched"))
    }

    async fn commit_like(&self, submission: LikeSubmission) -> Result<LikeResponse, LikeError> {
        let app_id = AppId::parse(submission.app_id.as_deref())?;

        let client_hash = match submission.client_hash {
            Some(hash) if !hash.is_empty() => hash,
            _ => return Err(LikeError::MissingHash),
        };

        if !self.hash_validator.validate(&client_hash).await {
            return Err(LikeError::HashMismatch);
        }

        if !self.app_validator.exists(&app_id).await {
            return Err(LikeError::UnknownApp);
        }

        if let Some(timestamp) = &submission.client_timestamp {
            tracing::debug!(%app_id, client_timestamp = %timestamp, "like submitted");
        }

        let (response_tx, response_rx) = oneshot::channel();
        let job = LikeJob {
            app_id: app_id.clone(),
            ip: submission.ip,
            client_hash,
            response_tx,
        };

        self.jobs
            .send(job)
            .await
            .map_err(|_| LikeError::Internal("failed to queue like".to_string()))?;

        let likes = response_rx
            .await
            .map_err(|_| LikeError::Internal("like worker failed to respond".to_string()))??;

        Ok(LikeResponse::new(&app_id, likes, "liked, thanks for your support!"))
    }

    fn observe(&self, result: &Result<LikeResponse, LikeError>) {
        let Err(e) = result else { return };

        LIKES_REJECTED.with_label_values(&[e.reason()]).inc();
        if e.is_internal() {
            tracing::error!(error = %e, "like api request failed");
            self.audit.record(format!("error: {}", e));
        }
    }
}
