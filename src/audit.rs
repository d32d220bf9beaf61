//! Append-only audit trail for privileged mutations.
//!
//! Recording is best-effort and isolated from the mutation it describes:
//! entries are written with their own statement after the business
//! transaction commits, and a failed write is logged, never propagated.
//! Snapshots are flattened to plain strings before storage so one field
//! that refuses to serialize cannot lose the whole entry.

use diesel::{prelude::*, PgConnection};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::NewAuditLog;
use crate::schema::audit_logs;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

#[derive(Debug, Default, Clone)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug)]
pub struct AuditEntry {
    pub actor: Option<Uuid>,
    pub action: &'static str,
    pub table: &'static str,
    pub record_id: Option<Uuid>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub meta: RequestMeta,
}

impl AuditEntry {
    pub fn new(actor: Uuid, action: &'static str, table: &'static str, record_id: Uuid) -> Self {
        Self {
            actor: Some(actor),
            action,
            table,
            record_id: Some(record_id),
            old_values: None,
            new_values: None,
            meta: RequestMeta::default(),
        }
    }

    pub fn old<T: Serialize>(mut self, value: &T) -> Self {
        self.old_values = Some(snapshot(value));
        self
    }

    pub fn new_state<T: Serialize>(mut self, value: &T) -> Self {
        self.new_values = Some(snapshot(value));
        self
    }

    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Converts a record into a flat object of stringified fields. A value that
/// fails to serialize degrades to a diagnostic object instead of an error,
/// per the audit durability contract.
pub fn snapshot<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => {
            let flattened: serde_json::Map<String, Value> = fields
                .into_iter()
                .map(|(key, value)| (key, Value::String(stringify(&value))))
                .collect();
            Value::Object(flattened)
        }
        Ok(other) => json!({ "value": stringify(&other) }),
        Err(err) => json!({ "serialization_error": err.to_string() }),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

/// Appends one immutable entry. Callers that must not fail on audit errors
/// go through [`record_best_effort`].
pub fn record(conn: &mut PgConnection, entry: AuditEntry) -> Result<(), AuditError> {
    let row = NewAuditLog {
        id: Uuid::new_v4(),
        user_id: entry.actor,
        action: entry.action.to_owned(),
        table_name: entry.table.to_owned(),
        record_id: entry.record_id,
        old_values: entry.old_values,
        new_values: entry.new_values,
        ip_address: entry.meta.ip_address,
        user_agent: entry.meta.user_agent,
    };
    diesel::insert_into(audit_logs::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

/// Records the entry, downgrading failure to a warning. The primary
/// mutation has already committed by the time this runs.
pub fn record_best_effort(conn: &mut PgConnection, entry: AuditEntry) {
    let action = entry.action;
    let table = entry.table;
    if let Err(err) = record(conn, entry) {
        warn!(action, table, error = %err, "failed to write audit log entry");
    }
}
