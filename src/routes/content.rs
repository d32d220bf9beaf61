//! Authoring surface. Writers manage their own records here; every state
//! transition re-reads the row under a row lock so concurrent reviewers
//! and authors cannot race each other past a precondition.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry, RequestMeta},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    lifecycle::{self, ContentStatus},
    models::{Category, Content, ContentRevision, NewContent, NewContentRevision},
    permissions::{can_delete_content, can_edit_content},
    schema::{categories, content, content_revisions},
    state::AppState,
    storage, validate,
};

use super::{PageQuery, Paginated, DEFAULT_PER_PAGE};

#[derive(Deserialize)]
pub struct AuthoredListQuery {
    pub status: Option<String>,
    pub category_id: Option<Uuid>,
    pub q: Option<String>,
    /// Editors may widen the listing beyond their own records.
    #[serde(default)]
    pub all: bool,
    #[serde(flatten)]
    pub page: PageQuery,
}

#[derive(Deserialize)]
pub struct CreateContentRequest {
    pub title: String,
    pub body: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category_id: Uuid,
    #[serde(default)]
    pub submit: bool,
    #[serde(default)]
    pub publish: bool,
}

#[derive(Deserialize)]
pub struct UpdateContentRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub cover_image: Option<Option<String>>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub submit: bool,
}

#[derive(Serialize)]
pub struct ContentResponse {
    #[serde(flatten)]
    pub record: Content,
    pub category_name: String,
}

pub async fn list_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AuthoredListQuery>,
) -> AppResult<Json<Paginated<Content>>> {
    if let Some(status) = query.status.as_deref() {
        if ContentStatus::parse(status).is_none() {
            return Err(AppError::bad_request(format!(
                "status tidak dikenal: {status}"
            )));
        }
    }

    let mut conn = state.db()?;
    let (page, per_page) = query.page.resolve(DEFAULT_PER_PAGE);
    let scope_all = query.all && user.role.is_editor();

    let mut count_query = content::table.into_boxed();
    let mut list_query = content::table.into_boxed();
    if !scope_all {
        count_query = count_query.filter(content::author_id.eq(user.user_id));
        list_query = list_query.filter(content::author_id.eq(user.user_id));
    }
    if let Some(status) = query.status.as_deref() {
        count_query = count_query.filter(content::status.eq(status.to_owned()));
        list_query = list_query.filter(content::status.eq(status.to_owned()));
    }
    if let Some(category_id) = query.category_id {
        count_query = count_query.filter(content::category_id.eq(category_id));
        list_query = list_query.filter(content::category_id.eq(category_id));
    }
    if let Some(term) = query.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{term}%");
        count_query = count_query.filter(content::title.ilike(pattern.clone()));
        list_query = list_query.filter(content::title.ilike(pattern));
    }

    let total: i64 = count_query.count().get_result(&mut conn)?;
    let items: Vec<Content> = list_query
        .order(content::updated_at.desc())
        .offset((page - 1) * per_page)
        .limit(per_page)
        .load(&mut conn)?;

    Ok(Json(Paginated::new(items, page, per_page, total)))
}

pub async fn create_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Json(payload): Json<CreateContentRequest>,
) -> AppResult<(StatusCode, Json<Content>)> {
    let fields = validate::validate_content_input(&payload.title, &payload.body);
    if !fields.is_empty() {
        return Err(AppError::validation(fields));
    }
    if payload.publish && !user.role.is_editor() {
        return Err(AppError::forbidden("penerbitan langsung khusus editor"));
    }

    let mut conn = state.db()?;

    let category: Category = categories::table
        .find(payload.category_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request("kategori tidak ditemukan"))?;
    if !category.is_active {
        return Err(AppError::bad_request("kategori tidak aktif"));
    }

    let title = payload.title.trim().to_owned();
    let slug = lifecycle::unique_slug(&mut conn, &title, None)?;

    let (status, reviewer_id, published_at) = if payload.publish {
        (
            ContentStatus::Published,
            Some(user.user_id),
            Some(Utc::now().naive_utc()),
        )
    } else if payload.submit {
        (ContentStatus::PendingReview, None, None)
    } else {
        (ContentStatus::Draft, None, None)
    };

    let new_record = NewContent {
        id: Uuid::new_v4(),
        title,
        slug,
        body: payload.body,
        excerpt: payload.excerpt.filter(|value| !value.trim().is_empty()),
        cover_image: payload.cover_image,
        status: status.as_str().to_owned(),
        author_id: user.user_id,
        reviewer_id,
        category_id: payload.category_id,
        published_at,
    };

    diesel::insert_into(content::table)
        .values(&new_record)
        .execute(&mut conn)?;
    let record: Content = content::table.find(new_record.id).first(&mut conn)?;

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "create", "content", record.id)
            .new_state(&record)
            .meta(meta),
    );
    info!(content_id = %record.id, status = %record.status, "content created");

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ContentResponse>> {
    let mut conn = state.db()?;
    let record: Content = content::table.find(id).first(&mut conn)?;

    if record.author_id != user.user_id && !user.role.is_editor() {
        return Err(AppError::forbidden("bukan penulis konten ini"));
    }

    let category: Category = categories::table.find(record.category_id).first(&mut conn)?;
    Ok(Json(ContentResponse {
        record,
        category_name: category.name,
    }))
}

pub async fn update_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateContentRequest>,
) -> AppResult<Json<Content>> {
    let mut conn = state.db()?;

    let (before, after) = conn.transaction::<(Content, Content), AppError, _>(|conn| {
        let mut record: Content = content::table
            .find(id)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;
        let before = record.clone();

        if !can_edit_content(user.role, user.user_id, &record) {
            return Err(AppError::forbidden("konten tidak dapat diubah"));
        }

        if let Some(category_id) = payload.category_id {
            let category: Category = categories::table
                .find(category_id)
                .first(conn)
                .optional()?
                .ok_or_else(|| AppError::bad_request("kategori tidak ditemukan"))?;
            if !category.is_active {
                return Err(AppError::bad_request("kategori tidak aktif"));
            }
            record.category_id = category_id;
        }

        if let Some(title) = payload.title.as_deref() {
            let fields = validate::validate_content_input(title, &record.body);
            if !fields.is_empty() {
                return Err(AppError::validation(fields));
            }
            let trimmed = title.trim();
            if trimmed != record.title {
                record.slug = lifecycle::unique_slug(conn, trimmed, Some(record.id))?;
                record.title = trimmed.to_owned();
            }
        }
        if let Some(body) = payload.body {
            let fields = validate::validate_content_input(&record.title, &body);
            if !fields.is_empty() {
                return Err(AppError::validation(fields));
            }
            record.body = body;
        }
        if let Some(excerpt) = payload.excerpt {
            record.excerpt = excerpt.filter(|value| !value.trim().is_empty());
        }
        if let Some(cover_image) = payload.cover_image {
            record.cover_image = cover_image;
        }

        if payload.submit && !record.resubmit() {
            return Err(AppError::conflict(format!(
                "konten berstatus {} tidak dapat diajukan",
                before.status
            )));
        }

        // Previous title and body are preserved before they are replaced.
        let revision = NewContentRevision {
            id: Uuid::new_v4(),
            content_id: record.id,
            title_snapshot: before.title.clone(),
            body_snapshot: before.body.clone(),
            revised_by: user.user_id,
            notes: None,
        };
        diesel::insert_into(content_revisions::table)
            .values(&revision)
            .execute(conn)?;

        let now = Utc::now().naive_utc();
        record.updated_at = now;
        diesel::update(content::table.find(record.id))
            .set((
                content::title.eq(&record.title),
                content::slug.eq(&record.slug),
                content::body.eq(&record.body),
                content::excerpt.eq(record.excerpt.clone()),
                content::cover_image.eq(record.cover_image.clone()),
                content::status.eq(&record.status),
                content::reviewer_id.eq(record.reviewer_id),
                content::review_comment.eq(record.review_comment.clone()),
                content::category_id.eq(record.category_id),
                content::updated_at.eq(now),
            ))
            .execute(conn)?;

        Ok((before, record))
    })?;

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "update", "content", after.id)
            .old(&before)
            .new_state(&after)
            .meta(meta),
    );

    // The replaced cover is orphaned on disk once the row points elsewhere.
    if before.cover_image != after.cover_image {
        if let Some(reference) = before.cover_image.as_deref() {
            storage::delete_best_effort(state.files.as_ref(), reference).await;
        }
    }

    Ok(Json(after))
}

pub async fn delete_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let removed = conn.transaction::<Content, AppError, _>(|conn| {
        let record: Content = content::table
            .find(id)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;

        if !can_delete_content(user.role, user.user_id, &record) {
            return Err(AppError::forbidden("konten tidak dapat dihapus"));
        }

        // Revisions go with their parent through the cascade.
        diesel::delete(content::table.find(record.id)).execute(conn)?;
        Ok(record)
    })?;

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "delete", "content", removed.id)
            .old(&removed)
            .meta(meta),
    );
    info!(content_id = %removed.id, "content deleted");

    if let Some(reference) = removed.cover_image.as_deref() {
        storage::delete_best_effort(state.files.as_ref(), reference).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_for_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Content>> {
    let mut conn = state.db()?;

    let (before_status, record) = conn.transaction::<(String, Content), AppError, _>(|conn| {
        let mut record: Content = content::table
            .find(id)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;

        if record.author_id != user.user_id && !user.role.is_editor() {
            return Err(AppError::forbidden("bukan penulis konten ini"));
        }

        let before_status = record.status.clone();
        if !record.resubmit() {
            return Err(AppError::conflict(format!(
                "konten berstatus {before_status} tidak dapat diajukan"
            )));
        }

        let now = Utc::now().naive_utc();
        record.updated_at = now;
        diesel::update(content::table.find(record.id))
            .set((
                content::status.eq(&record.status),
                content::review_comment.eq(record.review_comment.clone()),
                content::updated_at.eq(now),
            ))
            .execute(conn)?;

        Ok((before_status, record))
    })?;

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "submit_review", "content", record.id)
            .old(&json!({ "status": before_status }))
            .new_state(&json!({ "status": record.status }))
            .meta(meta),
    );

    Ok(Json(record))
}

pub async fn list_revisions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<ContentRevision>>> {
    let mut conn = state.db()?;
    let record: Content = content::table.find(id).first(&mut conn)?;

    if record.author_id != user.user_id && !user.role.is_editor() {
        return Err(AppError::forbidden("bukan penulis konten ini"));
    }

    let revisions: Vec<ContentRevision> = content_revisions::table
        .filter(content_revisions::content_id.eq(record.id))
        .order(content_revisions::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(revisions))
}
