//! Site settings administration, admin only.

use axum::{
    extract::{Path, State},
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::{
    audit::{self, AuditEntry, RequestMeta},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::Setting,
    schema::settings,
    settings as site_settings,
    state::AppState,
};

#[derive(Deserialize)]
pub struct UpdateSettingRequest {
    pub value: String,
    pub value_type: Option<String>,
    pub is_public: Option<bool>,
}

pub async fn list_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Setting>>> {
    user.require_admin()?;
    let mut conn = state.db()?;
    let rows: Vec<Setting> = settings::table.order(settings::key.asc()).load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn update_setting(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(key): Path<String>,
    Json(payload): Json<UpdateSettingRequest>,
) -> AppResult<Json<Setting>> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let existing: Option<Setting> = settings::table
        .filter(settings::key.eq(&key))
        .first(&mut conn)
        .optional()?;

    let value_type = payload
        .value_type
        .as_deref()
        .or(existing.as_ref().map(|row| row.value_type.as_str()))
        .unwrap_or(site_settings::TYPE_STRING)
        .to_owned();
    if !matches!(
        value_type.as_str(),
        site_settings::TYPE_STRING | site_settings::TYPE_INTEGER | site_settings::TYPE_BOOLEAN
    ) {
        return Err(AppError::bad_request(format!(
            "tipe nilai tidak dikenal: {value_type}"
        )));
    }

    // Typed values are rejected up front instead of failing on read later.
    match value_type.as_str() {
        site_settings::TYPE_INTEGER => {
            if payload.value.parse::<i64>().is_err() {
                return Err(AppError::bad_request("nilai harus berupa angka"));
            }
        }
        site_settings::TYPE_BOOLEAN => {
            if payload.value.parse::<bool>().is_err() {
                return Err(AppError::bad_request("nilai harus true atau false"));
            }
        }
        _ => {}
    }

    let is_public = payload
        .is_public
        .or(existing.as_ref().map(|row| row.is_public))
        .unwrap_or(false);

    site_settings::set_value(
        &mut conn,
        &key,
        &payload.value,
        &value_type,
        existing
            .as_ref()
            .and_then(|row| row.description.as_deref()),
        is_public,
    )?;

    let after: Setting = settings::table
        .filter(settings::key.eq(&key))
        .first(&mut conn)?;

    let mut entry = AuditEntry::new(user.user_id, "update", "settings", after.id)
        .new_state(&json!({ "key": after.key, "value": after.value }))
        .meta(meta);
    if let Some(before) = existing {
        entry = entry.old(&json!({ "key": before.key, "value": before.value }));
    }
    audit::record_best_effort(&mut conn, entry);

    Ok(Json(after))
}
