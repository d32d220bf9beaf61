//! Category administration, admin only. The public listing lives in the
//! unauthenticated surface; this one includes inactive rows.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::{prelude::*, PgConnection};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry, RequestMeta},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    lifecycle,
    models::{Category, NewCategory},
    schema::{categories, content},
    state::AppState,
    validate,
};

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

const DEFAULT_COLOR: &str = "#6c757d";

fn unique_category_slug(
    conn: &mut PgConnection,
    name: &str,
    exclude: Option<Uuid>,
) -> QueryResult<String> {
    let base = lifecycle::make_slug(name);
    lifecycle::resolve_collision(&base, |candidate| {
        let mut query = categories::table
            .filter(categories::slug.eq(candidate))
            .into_boxed();
        if let Some(id) = exclude {
            query = query.filter(categories::id.ne(id));
        }
        diesel::select(diesel::dsl::exists(query)).get_result(conn)
    })
}

pub async fn list_categories(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Category>>> {
    user.require_admin()?;
    let mut conn = state.db()?;
    let rows: Vec<Category> = categories::table
        .order((categories::sort_order.asc(), categories::name.asc()))
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    user.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("nama kategori wajib diisi"));
    }
    let color = payload.color.unwrap_or_else(|| DEFAULT_COLOR.to_owned());
    let fields = validate::validate_hex_color(&color);
    if !fields.is_empty() {
        return Err(AppError::validation(fields));
    }

    let mut conn = state.db()?;
    let slug = unique_category_slug(&mut conn, name, None)?;

    let new_category = NewCategory {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        slug,
        description: payload
            .description
            .filter(|value| !value.trim().is_empty()),
        color,
        is_active: true,
        sort_order: payload.sort_order.unwrap_or(0),
    };

    diesel::insert_into(categories::table)
        .values(&new_category)
        .execute(&mut conn)?;
    let record: Category = categories::table.find(new_category.id).first(&mut conn)?;

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "create", "categories", record.id)
            .new_state(&record)
            .meta(meta),
    );

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> AppResult<Json<Category>> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let before: Category = categories::table.find(id).first(&mut conn)?;

    let mut name = None;
    let mut slug = None;
    if let Some(value) = payload.name.as_deref() {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("nama kategori wajib diisi"));
        }
        if trimmed != before.name {
            slug = Some(unique_category_slug(&mut conn, trimmed, Some(id))?);
            name = Some(trimmed.to_owned());
        }
    }

    if let Some(color) = payload.color.as_deref() {
        let fields = validate::validate_hex_color(color);
        if !fields.is_empty() {
            return Err(AppError::validation(fields));
        }
    }

    diesel::update(categories::table.find(id))
        .set((
            name.map(|value| categories::name.eq(value)),
            slug.map(|value| categories::slug.eq(value)),
            payload
                .description
                .map(|value| categories::description.eq(value)),
            payload
                .color
                .map(|value| categories::color.eq(value)),
            payload
                .is_active
                .map(|value| categories::is_active.eq(value)),
            payload
                .sort_order
                .map(|value| categories::sort_order.eq(value)),
        ))
        .execute(&mut conn)?;

    let after: Category = categories::table.find(id).first(&mut conn)?;

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "update", "categories", after.id)
            .old(&before)
            .new_state(&after)
            .meta(meta),
    );

    Ok(Json(after))
}

pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let before: Category = categories::table.find(id).first(&mut conn)?;

    let in_use: i64 = content::table
        .filter(content::category_id.eq(id))
        .count()
        .get_result(&mut conn)?;
    if in_use > 0 {
        return Err(AppError::conflict(
            "kategori masih dipakai konten, nonaktifkan saja",
        ));
    }

    let deleted = diesel::delete(categories::table.find(id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "delete", "categories", before.id)
            .old(&before)
            .meta(meta),
    );

    Ok(StatusCode::NO_CONTENT)
}
