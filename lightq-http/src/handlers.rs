//! Route handlers: thin translation between the `/queue/*` wire shapes and
//! [`lightq_engine::Engine`] calls. No business logic lives here — every
//! decision (FIFO order, DLQ triage, self-healing) is the engine's.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use lightq_core::{Message, MessageId};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::registry::GroupRegistry;

const CONSUMER_GROUP_HEADER: &str = "consumerGroup";

/// Shared state every handler receives: the engine and the push-populated
/// group registry the scheduled-promoter loop sweeps.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<lightq_engine::Engine>,
    pub groups: GroupRegistry,
}

fn require_group(headers: &HeaderMap, ctx: &RequestContext) -> Result<String, ApiError> {
    headers
        .get(CONSUMER_GROUP_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| ctx.bad_request("missing required consumerGroup header"))
}

/// Wire shape for `/push`, `/batch/push`, and `/pop`: trims the response
/// to three fields rather than the full message record.
#[derive(Debug, Serialize)]
struct MessageView {
    id: MessageId,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<Message> for MessageView {
    fn from(msg: Message) -> Self {
        Self {
            id: msg.id,
            content: String::from_utf8_lossy(&msg.content).into_owned(),
            created_at: msg.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PushQuery {
    #[serde(rename = "scheduledAt")]
    scheduled_at: Option<DateTime<Utc>>,
}

pub async fn push(
    ctx: RequestContext,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<PushQuery>,
    body: axum::body::Bytes,
) -> Result<Json<MessageView>, ApiError> {
    let group = require_group(&headers, &ctx)?;
    let msg = state
        .engine
        .push(&group, body.to_vec(), q.scheduled_at)
        .await
        .map_err(|e| ctx.error(e))?;
    state.groups.record(&msg.consumer_group);
    Ok(Json(msg.into()))
}

pub async fn batch_push(
    ctx: RequestContext,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(contents): Json<Vec<String>>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let group = require_group(&headers, &ctx)?;
    let contents = contents.into_iter().map(String::into_bytes).collect();
    let msgs = state
        .engine
        .batch_push(&group, contents)
        .await
        .map_err(|e| ctx.error(e))?;
    if let Some(first) = msgs.first() {
        state.groups.record(&first.consumer_group);
    }
    Ok(Json(msgs.into_iter().map(MessageView::from).collect()))
}

pub async fn pop(
    ctx: RequestContext,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageView>, ApiError> {
    let group = require_group(&headers, &ctx)?;
    match state.engine.pop(&group).await.map_err(|e| ctx.error(e))? {
        Some(msg) => Ok(Json(msg.into())),
        None => Err(ctx.not_found("no reservable message")),
    }
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    id: MessageId,
}

pub async fn ack(
    ctx: RequestContext,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<IdQuery>,
) -> Result<(), ApiError> {
    let group = require_group(&headers, &ctx)?;
    state.engine.ack(&group, q.id).await.map_err(|e| ctx.error(e))
}

#[derive(Debug, Deserialize)]
pub struct NackQuery {
    id: MessageId,
    reason: Option<String>,
}

pub async fn nack(
    ctx: RequestContext,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<NackQuery>,
) -> Result<(), ApiError> {
    let group = require_group(&headers, &ctx)?;
    state.engine.nack(&group, q.id, q.reason).await.map_err(|e| ctx.error(e))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ExtendVisibilityQuery {
    id: MessageId,
    seconds: i64,
}

pub async fn extend_visibility(
    ctx: RequestContext,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ExtendVisibilityQuery>,
) -> Result<(), ApiError> {
    let group = require_group(&headers, &ctx)?;
    let extended = state
        .engine
        .extend_visibility(&group, q.id, q.seconds)
        .await
        .map_err(|e| ctx.error(e))?;
    if extended {
        Ok(())
    } else {
        Err(ctx.bad_request("message is not currently reserved"))
    }
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    #[serde(rename = "messageCount")]
    message_count: Option<usize>,
    consumed: Option<String>,
}

pub async fn view(
    ctx: RequestContext,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ViewQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let group = require_group(&headers, &ctx)?;
    let filter = match q.consumed.as_deref() {
        Some("yes") => lightq_engine::ConsumedFilter::Yes,
        Some("no") => lightq_engine::ConsumedFilter::No,
        Some(other) => return Err(ctx.bad_request(format!("consumed must be \"yes\" or \"no\", got {other:?}"))),
        None => lightq_engine::ConsumedFilter::Any,
    };
    let limit = q.message_count.unwrap_or(50);
    let msgs = state.engine.view(&group, limit, filter).await.map_err(|e| ctx.error(e))?;
    Ok(Json(msgs))
}

#[derive(Debug, Deserialize)]
pub struct DlqViewQuery {
    limit: Option<usize>,
}

pub async fn dlq_view(
    ctx: RequestContext,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<DlqViewQuery>,
) -> Result<Json<Vec<lightq_core::DlqEntry>>, ApiError> {
    let group = require_group(&headers, &ctx)?;
    let entries = state
        .engine
        .dlq_view(&group, q.limit.unwrap_or(50))
        .await
        .map_err(|e| ctx.error(e))?;
    Ok(Json(entries))
}

pub async fn dlq_replay(
    ctx: RequestContext,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(ids): Json<Vec<MessageId>>,
) -> Result<Json<u64>, ApiError> {
    let group = require_group(&headers, &ctx)?;
    let count = state.engine.dlq_replay(&group, ids).await.map_err(|e| ctx.error(e))?;
    Ok(Json(count))
}
