//! Account administration, admin only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry, RequestMeta},
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewUser, RoleRow, User},
    permissions::Role,
    schema::{content, roles, users},
    state::AppState,
    validate,
};

use super::{PageQuery, Paginated, DEFAULT_PER_PAGE};

use crate::routes::auth::USER_STATUS_ACTIVE;

const USER_STATUS_INACTIVE: &str = "inactive";

#[derive(Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub password: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Paginated<User>>> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let (page, per_page) = query.page.resolve(DEFAULT_PER_PAGE);

    let mut count_query = users::table.into_boxed();
    let mut list_query = users::table.into_boxed();
    if let Some(role) = query.role.as_deref() {
        count_query = count_query.filter(users::role.eq(role.to_owned()));
        list_query = list_query.filter(users::role.eq(role.to_owned()));
    }
    if let Some(status) = query.status.as_deref() {
        count_query = count_query.filter(users::status.eq(status.to_owned()));
        list_query = list_query.filter(users::status.eq(status.to_owned()));
    }

    let total: i64 = count_query.count().get_result(&mut conn)?;
    let items: Vec<User> = list_query
        .order(users::username.asc())
        .offset((page - 1) * per_page)
        .limit(per_page)
        .load(&mut conn)?;

    Ok(Json(Paginated::new(items, page, per_page, total)))
}

pub async fn get_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    user.require_admin()?;
    let mut conn = state.db()?;
    let record: User = users::table.find(id).first(&mut conn)?;
    Ok(Json(record))
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    user.require_admin()?;

    let mut fields = validate::validate_username(&payload.username);
    fields.extend(validate::validate_email(&payload.email));
    fields.extend(validate::validate_password_strength(&payload.password));
    if payload.full_name.trim().is_empty() {
        fields.push(crate::validate::FieldError::new(
            "full_name",
            "nama lengkap wajib diisi",
        ));
    }
    if !fields.is_empty() {
        return Err(AppError::validation(fields));
    }

    let role = Role::parse(&payload.role)
        .ok_or_else(|| AppError::bad_request(format!("peran tidak dikenal: {}", payload.role)))?;

    let mut conn = state.db()?;

    let username = payload.username.trim().to_lowercase();
    let email = payload.email.trim().to_lowercase();

    let duplicate = users::table
        .filter(
            users::username
                .eq(&username)
                .or(users::email.eq(&email)),
        )
        .first::<User>(&mut conn)
        .optional()?;
    if duplicate.is_some() {
        return Err(AppError::bad_request(
            "nama pengguna atau email sudah terdaftar",
        ));
    }

    let password_hash = password::hash_password(&payload.password)
        .map_err(|err| AppError::internal(format!("password hashing failed: {err}")))?;

    let new_user = NewUser {
        id: Uuid::new_v4(),
        username,
        email,
        password_hash,
        full_name: payload.full_name.trim().to_owned(),
        role: role.as_str().to_owned(),
        status: USER_STATUS_ACTIVE.to_owned(),
    };

    diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)?;
    let record: User = users::table.find(new_user.id).first(&mut conn)?;

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "create", "users", record.id)
            .new_state(&record)
            .meta(meta),
    );

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let before: User = users::table.find(id).first(&mut conn)?;

    let mut email = None;
    if let Some(value) = payload.email.as_deref() {
        let fields = validate::validate_email(value);
        if !fields.is_empty() {
            return Err(AppError::validation(fields));
        }
        let normalized = value.trim().to_lowercase();
        if normalized != before.email {
            let duplicate = users::table
                .filter(users::email.eq(&normalized))
                .filter(users::id.ne(id))
                .first::<User>(&mut conn)
                .optional()?;
            if duplicate.is_some() {
                return Err(AppError::bad_request("email sudah terdaftar"));
            }
            email = Some(normalized);
        }
    }

    let role = match payload.role.as_deref() {
        Some(value) => Some(
            Role::parse(value)
                .ok_or_else(|| AppError::bad_request(format!("peran tidak dikenal: {value}")))?,
        ),
        None => None,
    };

    if let Some(status) = payload.status.as_deref() {
        if status != USER_STATUS_ACTIVE && status != USER_STATUS_INACTIVE {
            return Err(AppError::bad_request(format!(
                "status tidak dikenal: {status}"
            )));
        }
        // The last admin cannot lock everyone out.
        if id == user.user_id && status == USER_STATUS_INACTIVE {
            return Err(AppError::bad_request(
                "tidak dapat menonaktifkan akun sendiri",
            ));
        }
    }
    if let Some(new_role) = role {
        if id == user.user_id && !new_role.is_admin() {
            return Err(AppError::bad_request(
                "tidak dapat menurunkan peran akun sendiri",
            ));
        }
    }

    let password_hash = match payload.password.as_deref() {
        Some(value) => {
            let fields = validate::validate_password_strength(value);
            if !fields.is_empty() {
                return Err(AppError::validation(fields));
            }
            Some(
                password::hash_password(value)
                    .map_err(|err| AppError::internal(format!("password hashing failed: {err}")))?,
            )
        }
        None => None,
    };

    let now = Utc::now().naive_utc();
    diesel::update(users::table.find(id))
        .set((
            email.map(|value| users::email.eq(value)),
            payload
                .full_name
                .as_deref()
                .map(|value| users::full_name.eq(value.trim().to_owned())),
            role.map(|value| users::role.eq(value.as_str().to_owned())),
            payload
                .status
                .as_deref()
                .map(|value| users::status.eq(value.to_owned())),
            password_hash.map(|value| users::password_hash.eq(value)),
            users::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let after: User = users::table.find(id).first(&mut conn)?;

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "update", "users", after.id)
            .old(&before)
            .new_state(&after)
            .meta(meta),
    );

    Ok(Json(after))
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_admin()?;

    if id == user.user_id {
        return Err(AppError::bad_request("tidak dapat menghapus akun sendiri"));
    }

    let mut conn = state.db()?;
    let before: User = users::table.find(id).first(&mut conn)?;

    let authored: i64 = content::table
        .filter(content::author_id.eq(id))
        .count()
        .get_result(&mut conn)?;
    if authored > 0 {
        return Err(AppError::conflict(
            "pengguna masih memiliki konten, nonaktifkan akunnya",
        ));
    }

    let deleted = diesel::delete(users::table.find(id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    audit::record_best_effort(
        &mut conn,
        AuditEntry::new(user.user_id, "delete", "users", before.id)
            .old(&before)
            .meta(meta),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_roles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<serde_json::Value>> {
    user.require_admin()?;
    let mut conn = state.db()?;
    let rows: Vec<RoleRow> = roles::table.order(roles::name.asc()).load(&mut conn)?;
    Ok(Json(json!({ "roles": rows })))
}
