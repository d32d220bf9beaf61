//! Read-only audit trail listing, admin only. Entries are append-only;
//! nothing here mutates.

use axum::{
    extract::{Query, State},
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::AppResult,
    models::AuditLog,
    schema::audit_logs,
    state::AppState,
};

use super::{PageQuery, Paginated};

const AUDIT_PER_PAGE: i64 = 50;

#[derive(Deserialize)]
pub struct AuditListQuery {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub table: Option<String>,
    pub record_id: Option<Uuid>,
    #[serde(flatten)]
    pub page: PageQuery,
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AuditListQuery>,
) -> AppResult<Json<Paginated<AuditLog>>> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let (page, per_page) = query.page.resolve(AUDIT_PER_PAGE);

    let mut count_query = audit_logs::table.into_boxed();
    let mut list_query = audit_logs::table.into_boxed();
    if let Some(user_id) = query.user_id {
        count_query = count_query.filter(audit_logs::user_id.eq(user_id));
        list_query = list_query.filter(audit_logs::user_id.eq(user_id));
    }
    if let Some(action) = query.action.as_deref() {
        count_query = count_query.filter(audit_logs::action.eq(action.to_owned()));
        list_query = list_query.filter(audit_logs::action.eq(action.to_owned()));
    }
    if let Some(table) = query.table.as_deref() {
        count_query = count_query.filter(audit_logs::table_name.eq(table.to_owned()));
        list_query = list_query.filter(audit_logs::table_name.eq(table.to_owned()));
    }
    if let Some(record_id) = query.record_id {
        count_query = count_query.filter(audit_logs::record_id.eq(record_id));
        list_query = list_query.filter(audit_logs::record_id.eq(record_id));
    }

    let total: i64 = count_query.count().get_result(&mut conn)?;
    let items: Vec<AuditLog> = list_query
        .order(audit_logs::created_at.desc())
        .offset((page - 1) * per_page)
        .limit(per_page)
        .load(&mut conn)?;

    Ok(Json(Paginated::new(items, page, per_page, total)))
}
