//! Review and publication surface, restricted to editors. Each transition
//! re-reads the row under FOR UPDATE so two reviewers acting at once see
//! exactly one of them win; the loser gets a 409.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry, RequestMeta},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    lifecycle::ContentStatus,
    models::Content,
    schema::content,
    state::AppState,
    validate,
};

use super::{PageQuery, Paginated, DEFAULT_PER_PAGE};

#[derive(Deserialize)]
pub struct RejectRequest {
    pub comment: String,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub status: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

/// Pending submissions, oldest first so nothing starves at the back.
pub async fn list_queue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<Content>>> {
    user.require_editor()?;

    let mut conn = state.db()?;
    let (page, per_page) = query.resolve(DEFAULT_PER_PAGE);

    let total: i64 = content::table
        .filter(content::status.eq(ContentStatus::PendingReview.as_str()))
        .count()
        .get_result(&mut conn)?;

    let items: Vec<Content> = content::table
        .filter(content::status.eq(ContentStatus::PendingReview.as_str()))
        .order(content::updated_at.asc())
        .offset((page - 1) * per_page)
        .limit(per_page)
        .load(&mut conn)?;

    Ok(Json(Paginated::new(items, page, per_page, total)))
}

/// Records this reviewer has already decided on, newest first.
pub async fn list_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Paginated<Content>>> {
    user.require_editor()?;

    if let Some(status) = query.status.as_deref() {
        if ContentStatus::parse(status).is_none() {
            return Err(AppError::bad_request(format!(
                "status tidak dikenal: {status}"
            )));
        }
    }

    let mut conn = state.db()?;
    let (page, per_page) = query.page.resolve(DEFAULT_PER_PAGE);

    let mut count_query = content::table
        .filter(content::reviewer_id.eq(user.user_id))
        .into_boxed();
    let mut list_query = content::table
        .filter(content::reviewer_id.eq(user.user_id))
        .into_boxed();
    if let Some(status) = query.status.as_deref() {
        count_query = count_query.filter(content::status.eq(status.to_owned()));
        list_query = list_query.filter(content::status.eq(status.to_owned()));
    }

    let total: i64 = count_query.count().get_result(&mut conn)?;
    let items: Vec<Content> = list_query
        .order(content::updated_at.desc())
        .offset((page - 1) * per_page)
        .limit(per_page)
        .load(&mut conn)?;

    Ok(Json(Paginated::new(items, page, per_page, total)))
}

pub async fn approve_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Content>> {
    user.require_editor()?;
    transition(
        &state,
        &user,
        meta,
        id,
        "approve",
        "tidak dapat disetujui",
        |record| record.approve(user.user_id),
    )
    .await
}

pub async fn reject_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> AppResult<Json<Content>> {
    user.require_editor()?;

    let fields = validate::validate_review_comment(&payload.comment);
    if !fields.is_empty() {
        return Err(AppError::validation(fields));
    }

    let comment = payload.comment.trim().to_owned();
    transition(
        &state,
        &user,
        meta,
        id,
        "reject",
        "tidak dapat ditolak",
        |record| record.reject(user.user_id, &comment),
    )
    .await
}

/// Skips the review queue entirely, available only to editors.
pub async fn publish_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Content>> {
    user.require_editor()?;
    transition(
        &state,
        &user,
        meta,
        id,
        "publish",
        "tidak dapat diterbitkan",
        |record| record.publish_direct(user.user_id),
    )
    .await
}

pub async fn unpublish_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Content>> {
    user.require_editor()?;
    transition(
        &state,
        &user,
        meta,
        id,
        "unpublish",
        "tidak dapat ditarik",
        |record| record.unpublish(),
    )
    .await
}

/// Shared transition body: lock, apply, persist, then audit after commit.
/// `apply` returning false means the row was not in an eligible state.
async fn transition<F>(
    state: &AppState,
    user: &AuthenticatedUser,
    meta: RequestMeta,
    id: Uuid,
    action: &'static str,
    conflict_hint: &str,
    mut apply: F,
) -> AppResult<Json<Content>>
where
    F: FnMut(&mut Content) -> bool,
{
    let mut conn = state.db()?;

    let (before_status, record) = conn.transaction::<(String, Content), AppError, _>(|conn| {
        let mut record: Content = content::table
            .find(id)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;

        let before_status = record.status.clone();
        if !apply(&mut record) {
            return Err(AppError::conflict(format!(
                "konten berstatus {before_status} {conflict_hint}"
            )));
        }

        let now = Utc::now().naive_utc();
        record.updated_at = now;
        diesel::update(content::table.find(record.id))
            .set((
                content::status.eq(&record.status),
                content::reviewer_id.eq(record.reviewer_id),
                content::review_comment.eq(record.review_comment.clone()),
                content::published_at.eq(record.published_at),
                content::updated_at.eq(now),
            ))
            .execute(conn)?;

        Ok((before_status, record))
    })?;

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, action, "content", record.id)
            .old(&json!({ "status": before_status }))
            .new_state(&json!({
                "status": record.status,
                "reviewer_id": record.reviewer_id,
                "review_comment": record.review_comment,
            }))
            .meta(meta),
    );
    info!(content_id = %record.id, action, from = %before_status, to = %record.status, "content transition");

    Ok(Json(record))
}
