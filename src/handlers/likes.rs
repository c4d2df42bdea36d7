use axum::{
    Form, Json,
    extract::{
        ConnectInfo, FromRequest, Multipart, Query, Request, State, rejection::QueryRejection,
    },
    http::{HeaderMap, StatusCode, header},
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::client_ip;
use crate::error::LikeError;
use crate::metrics::{LIKE_REQUESTS, REQUEST_LATENCY};
use crate::models::{LikeForm, LikeQuery, LikeResponse, LikeSubmission};
use crate::state::AppState;

type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

// An undecodable query string reads as empty, so validation answers in JSON
fn like_query(query: QueryPairs) -> LikeQuery {
    query
        .map(|Query(pairs)| LikeQuery::from_pairs(pairs))
        .unwrap_or_default()
}

/// Like form read from either a urlencoded or a multipart body.
///
/// A body that cannot be decoded is treated as an empty form.
pub struct LikeBody(pub LikeForm);

impl<S> FromRequest<S> for LikeBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

        let form = if is_multipart {
            match Multipart::from_request(req, state).await {
                Ok(multipart) => read_multipart(multipart).await,
                Err(e) => {
                    tracing::debug!(error = %e, "unreadable multipart body");
                    LikeForm::default()
                }
            }
        } else {
            match Form::<Vec<(String, String)>>::from_request(req, state).await {
                Ok(Form(pairs)) => LikeForm::from_pairs(pairs),
                Err(e) => {
                    tracing::debug!(error = %e, "unreadable form body");
                    LikeForm::default()
                }
            }
        };

        Ok(LikeBody(form))
    }
}

// Text fields only; file parts and unnamed parts are skipped
async fn read_multipart(mut multipart: Multipart) -> LikeForm {
    let mut pairs = Vec::new();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.file_name().is_some() {
                    continue;
                }
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                match field.text().await {
                    Ok(value) => pairs.push((name, value)),
                    Err(e) => tracing::debug!(error = %e, field = %name, "unreadable multipart field"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "malformed multipart body");
                break;
            }
        }
    }
    LikeForm::from_pairs(pairs)
}

// GET ?action=get&app_id=N
pub async fn get_likes(
    State(state): State<Arc<AppState>>,
    query: QueryPairs,
) -> Result<Json<LikeResponse>, LikeError> {
    LIKE_REQUESTS.inc();
    let start_time = Instant::now();
    let query = like_query(query);

    let result = if query.action.as_deref() != Some("get") {
        Err(LikeError::InvalidAction("GET"))
    } else {
        state.service.get_likes(query.app_id.as_deref()).await
    };
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map(Json)
}

// POST with a form body; action must be "like" or absent
pub async fn submit_like(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    query: QueryPairs,
    LikeBody(form): LikeBody,
) -> Result<Json<LikeResponse>, LikeError> {
    LIKE_REQUESTS.inc();
    let start_time = Instant::now();
    let query = like_query(query);

    let result = if !matches!(query.action.as_deref(), None | Some("") | Some("like")) {
        Err(LikeError::InvalidAction("POST"))
    } else {
        let submission = LikeSubmission {
            app_id: query.app_id.or(form.app_id),
            client_hash: form.client_hash,
            client_timestamp: form.timestamp,
            ip: client_ip::resolve(&headers, addr.ip(), state.trust_proxy_headers),
        };
        state.service.submit_like(submission).await
    };
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map(Json)
}

// CORS preflight without the CORS request headers
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> LikeError {
    LikeError::MethodNotAllowed
}
