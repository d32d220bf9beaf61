//! Unauthenticated read surface. Only published records are visible here,
//! and detail reads bump the view counter without holding a transaction.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    lifecycle::ContentStatus,
    mail::ContactMessage,
    models::{Category, Content},
    schema::{categories, content},
    settings::SettingsSnapshot,
    state::AppState,
    validate,
};

use super::{PageQuery, Paginated, DEFAULT_PER_PAGE};

#[derive(Deserialize)]
pub struct PublicListQuery {
    pub category: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub category: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

#[derive(Serialize)]
pub struct PublicContentItem {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category: CategorySummary,
    pub view_count: i32,
    pub published_at: Option<NaiveDateTime>,
}

#[derive(Serialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: String,
}

impl From<Category> for CategorySummary {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            slug: category.slug,
            color: category.color,
        }
    }
}

#[derive(Serialize)]
pub struct PublicContentDetail {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category: CategorySummary,
    pub view_count: i32,
    pub published_at: Option<NaiveDateTime>,
}

#[derive(Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

fn item_from_row((record, category): (Content, Category)) -> PublicContentItem {
    PublicContentItem {
        id: record.id,
        title: record.title,
        slug: record.slug,
        excerpt: record.excerpt,
        cover_image: record.cover_image,
        category: category.into(),
        view_count: record.view_count,
        published_at: record.published_at,
    }
}

pub async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<PublicListQuery>,
) -> AppResult<Json<Paginated<PublicContentItem>>> {
    let mut conn = state.db()?;
    let default_per_page = SettingsSnapshot::load(&mut conn)
        .map(|snap| snap.get_i64("posts_per_page", DEFAULT_PER_PAGE))
        .unwrap_or(DEFAULT_PER_PAGE);
    let (page, per_page) = query.page.resolve(default_per_page);

    let mut count_query = content::table
        .inner_join(categories::table)
        .filter(content::status.eq(ContentStatus::Published.as_str()))
        .into_boxed();
    let mut list_query = content::table
        .inner_join(categories::table)
        .filter(content::status.eq(ContentStatus::Published.as_str()))
        .into_boxed();

    if let Some(slug) = query.category.as_deref() {
        count_query = count_query.filter(categories::slug.eq(slug));
        list_query = list_query.filter(categories::slug.eq(slug));
    }

    let total: i64 = count_query.count().get_result(&mut conn)?;
    let rows: Vec<(Content, Category)> = list_query
        .order(content::published_at.desc())
        .offset((page - 1) * per_page)
        .limit(per_page)
        .load(&mut conn)?;

    let items = rows.into_iter().map(item_from_row).collect();
    Ok(Json(Paginated::new(items, page, per_page, total)))
}

pub async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<PublicContentDetail>> {
    let mut conn = state.db()?;

    let (record, category): (Content, Category) = content::table
        .inner_join(categories::table)
        .filter(content::slug.eq(&slug))
        .filter(content::status.eq(ContentStatus::Published.as_str()))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    // Best-effort counter: a failed bump never blocks the read.
    if let Err(err) = diesel::update(content::table.find(record.id))
        .set(content::view_count.eq(content::view_count + 1))
        .execute(&mut conn)
    {
        warn!(content_id = %record.id, error = %err, "failed to increment view count");
    }

    Ok(Json(PublicContentDetail {
        id: record.id,
        title: record.title,
        slug: record.slug,
        body: record.body,
        excerpt: record.excerpt,
        cover_image: record.cover_image,
        category: category.into(),
        view_count: record.view_count + 1,
        published_at: record.published_at,
    }))
}

pub async fn search_published(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Paginated<PublicContentItem>>> {
    let term = query.q.trim();
    if term.is_empty() {
        return Err(AppError::bad_request("kata kunci pencarian wajib diisi"));
    }

    let mut conn = state.db()?;
    let (page, per_page) = query.page.resolve(DEFAULT_PER_PAGE);
    let pattern = format!("%{}%", term);

    let matcher = content::title
        .ilike(pattern.clone())
        .or(content::body.ilike(pattern.clone()))
        .or(content::excerpt.ilike(pattern));

    let mut count_query = content::table
        .inner_join(categories::table)
        .filter(content::status.eq(ContentStatus::Published.as_str()))
        .filter(matcher.clone())
        .into_boxed();
    let mut list_query = content::table
        .inner_join(categories::table)
        .filter(content::status.eq(ContentStatus::Published.as_str()))
        .filter(matcher)
        .into_boxed();

    if let Some(slug) = query.category.as_deref() {
        count_query = count_query.filter(categories::slug.eq(slug.to_owned()));
        list_query = list_query.filter(categories::slug.eq(slug.to_owned()));
    }

    let total: i64 = count_query.count().get_result(&mut conn)?;
    let rows: Vec<(Content, Category)> = list_query
        .order(content::published_at.desc())
        .offset((page - 1) * per_page)
        .limit(per_page)
        .load(&mut conn)?;

    let items = rows.into_iter().map(item_from_row).collect();
    Ok(Json(Paginated::new(items, page, per_page, total)))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CategorySummary>>> {
    let mut conn = state.db()?;
    let rows: Vec<Category> = categories::table
        .filter(categories::is_active.eq(true))
        .order((categories::sort_order.asc(), categories::name.asc()))
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(CategorySummary::from).collect()))
}

pub async fn public_settings(
    State(state): State<AppState>,
) -> AppResult<Json<BTreeMap<String, String>>> {
    let mut conn = state.db()?;
    let snapshot = SettingsSnapshot::load(&mut conn)?;
    Ok(Json(snapshot.public_values()))
}

pub async fn submit_contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> AppResult<StatusCode> {
    let fields = validate::validate_contact_message(
        &payload.name,
        &payload.email,
        &payload.subject,
        &payload.message,
    );
    if !fields.is_empty() {
        return Err(AppError::validation(fields));
    }

    let mut conn = state.db()?;
    let snapshot = SettingsSnapshot::load(&mut conn)?;

    let message = ContactMessage {
        recipient: snapshot.get_str("contact_email", "info@desa.go.id").to_owned(),
        name: payload.name.trim().to_owned(),
        email: payload.email.trim().to_owned(),
        subject: payload.subject.trim().to_owned(),
        message: payload.message.trim().to_owned(),
    };

    // Delivery is fire-and-forget; the sender gets an acceptance either way.
    let mailer = state.mailer.clone();
    tokio::spawn(async move {
        if let Err(err) = mailer.send_contact_message(message).await {
            warn!(error = %err, "failed to forward contact message");
        }
    });

    Ok(StatusCode::ACCEPTED)
}
