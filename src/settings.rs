//! Site settings as an explicit per-request snapshot.
//!
//! Handlers load a [`SettingsSnapshot`] from the database instead of going
//! through a mutable global; getters coerce by the declared value type and
//! fall back to the supplied default on malformed values.

use std::collections::BTreeMap;

use chrono::Utc;
use diesel::{prelude::*, PgConnection};
use uuid::Uuid;

use crate::models::{NewSetting, Setting};
use crate::schema::settings;

pub const TYPE_STRING: &str = "string";
pub const TYPE_INTEGER: &str = "integer";
pub const TYPE_BOOLEAN: &str = "boolean";

struct SeedSetting {
    key: &'static str,
    value: &'static str,
    value_type: &'static str,
    description: &'static str,
    is_public: bool,
}

const DEFAULTS: &[SeedSetting] = &[
    SeedSetting {
        key: "site_name",
        value: "Portal Desa Digital",
        value_type: TYPE_STRING,
        description: "Nama website desa",
        is_public: true,
    },
    SeedSetting {
        key: "site_description",
        value: "Sistem Informasi dan Layanan Desa",
        value_type: TYPE_STRING,
        description: "Deskripsi website desa",
        is_public: true,
    },
    SeedSetting {
        key: "contact_email",
        value: "info@desa.go.id",
        value_type: TYPE_STRING,
        description: "Email kontak desa",
        is_public: true,
    },
    SeedSetting {
        key: "contact_phone",
        value: "021-12345678",
        value_type: TYPE_STRING,
        description: "Nomor telepon desa",
        is_public: true,
    },
    SeedSetting {
        key: "address",
        value: "Jl. Raya Desa No. 123",
        value_type: TYPE_STRING,
        description: "Alamat kantor desa",
        is_public: true,
    },
    SeedSetting {
        key: "posts_per_page",
        value: "10",
        value_type: TYPE_INTEGER,
        description: "Jumlah post per halaman",
        is_public: false,
    },
    SeedSetting {
        key: "allow_registration",
        value: "false",
        value_type: TYPE_BOOLEAN,
        description: "Izinkan registrasi publik",
        is_public: false,
    },
];

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    value_type: String,
    is_public: bool,
}

#[derive(Debug, Default, Clone)]
pub struct SettingsSnapshot {
    entries: BTreeMap<String, Entry>,
}

impl SettingsSnapshot {
    pub fn load(conn: &mut PgConnection) -> QueryResult<Self> {
        let rows: Vec<Setting> = settings::table.load(conn)?;
        let mut entries = BTreeMap::new();
        for row in rows {
            entries.insert(
                row.key,
                Entry {
                    value: row.value,
                    value_type: row.value_type,
                    is_public: row.is_public,
                },
            );
        }
        Ok(Self { entries })
    }

    #[cfg(test)]
    fn insert(&mut self, key: &str, value: &str, value_type: &str, is_public: bool) {
        self.entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                value_type: value_type.to_owned(),
                is_public,
            },
        );
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.entries.get(key).map_or(default, |e| e.value.as_str())
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.entries.get(key) {
            Some(entry) if entry.value_type == TYPE_INTEGER => {
                entry.value.trim().parse().unwrap_or(default)
            }
            _ => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.value_type == TYPE_BOOLEAN => {
                matches!(entry.value.trim(), "true" | "1" | "yes" | "on")
            }
            _ => default,
        }
    }

    /// Projection exposed to unauthenticated pages.
    pub fn public_values(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_public)
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }
}

/// Upserts one setting by key.
pub fn set_value(
    conn: &mut PgConnection,
    key: &str,
    value: &str,
    value_type: &str,
    description: Option<&str>,
    is_public: bool,
) -> QueryResult<()> {
    let now = Utc::now().naive_utc();
    let updated = diesel::update(settings::table.filter(settings::key.eq(key)))
        .set((
            settings::value.eq(value),
            settings::value_type.eq(value_type),
            settings::is_public.eq(is_public),
            settings::updated_at.eq(now),
        ))
        .execute(conn)?;
    if updated == 0 {
        diesel::insert_into(settings::table)
            .values(NewSetting {
                id: Uuid::new_v4(),
                key: key.to_owned(),
                value: value.to_owned(),
                value_type: value_type.to_owned(),
                description: description.map(str::to_owned),
                is_public,
            })
            .execute(conn)?;
    }
    Ok(())
}

/// Inserts the default settings, leaving keys that already exist untouched.
pub fn seed_defaults(conn: &mut PgConnection) -> QueryResult<usize> {
    let mut inserted = 0;
    for seed in DEFAULTS {
        let exists: i64 = settings::table
            .filter(settings::key.eq(seed.key))
            .count()
            .get_result(conn)?;
        if exists == 0 {
            diesel::insert_into(settings::table)
                .values(NewSetting {
                    id: Uuid::new_v4(),
                    key: seed.key.to_owned(),
                    value: seed.value.to_owned(),
                    value_type: seed.value_type.to_owned(),
                    description: Some(seed.description.to_owned()),
                    is_public: seed.is_public,
                })
                .execute(conn)?;
            inserted += 1;
        }
    }
    Ok(inserted)
}
