//! Role capability table and content ownership guards.
//!
//! Roles are a closed set seeded at startup. Capabilities are hierarchical:
//! every admin capability implies editor, every editor capability implies
//! publisher. Route groups gate coarsely on role, but the ownership/status
//! checks here are evaluated again at the point of mutation so a record that
//! changed state between render and submit is still rejected.

use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::lifecycle::ContentStatus;
use crate::models::{Content, NewRoleRow};
use crate::schema::roles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Publisher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Users,
    Content,
    Categories,
    Settings,
    Audit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Publish,
    Review,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Editor, Role::Publisher];

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Publisher => "publisher",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "editor" => Some(Role::Editor),
            "publisher" => Some(Role::Publisher),
            _ => None,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    pub fn is_editor(self) -> bool {
        matches!(self, Role::Admin | Role::Editor)
    }

    pub fn is_publisher(self) -> bool {
        matches!(self, Role::Admin | Role::Editor | Role::Publisher)
    }

    /// Static capability lookup. Pure set membership, no per-user overrides.
    pub fn has_permission(self, resource: Resource, action: Action) -> bool {
        self.grants()
            .iter()
            .any(|(granted, actions)| *granted == resource && actions.contains(&action))
    }

    const fn grants(self) -> &'static [(Resource, &'static [Action])] {
        use Action::*;
        match self {
            Role::Admin => &[
                (Resource::Users, &[Create, Read, Update, Delete]),
                (
                    Resource::Content,
                    &[Create, Read, Update, Delete, Publish, Review],
                ),
                (Resource::Categories, &[Create, Read, Update, Delete]),
                (Resource::Settings, &[Read, Update]),
                (Resource::Audit, &[Read]),
            ],
            Role::Editor => &[
                (
                    Resource::Content,
                    &[Create, Read, Update, Delete, Publish, Review],
                ),
                (Resource::Categories, &[Read]),
            ],
            Role::Publisher => &[
                (Resource::Content, &[Create, Read, Update]),
                (Resource::Categories, &[Read]),
            ],
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Role::Admin => "Administrator dengan akses penuh",
            Role::Editor => "Editor yang dapat mengelola dan mereview konten",
            Role::Publisher => "Publisher yang dapat membuat konten",
        }
    }

    fn grants_json(self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (resource, actions) in self.grants() {
            let name = match resource {
                Resource::Users => "users",
                Resource::Content => "content",
                Resource::Categories => "categories",
                Resource::Settings => "settings",
                Resource::Audit => "audit",
            };
            let actions: Vec<&str> = actions
                .iter()
                .map(|action| match action {
                    Action::Create => "create",
                    Action::Read => "read",
                    Action::Update => "update",
                    Action::Delete => "delete",
                    Action::Publish => "publish",
                    Action::Review => "review",
                })
                .collect();
            map.insert(name.to_owned(), json!(actions));
        }
        serde_json::Value::Object(map)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-privileged author may edit their own content while it sits in
/// draft or rejected; editors and admins may edit anything.
pub fn can_edit_content(role: Role, user_id: Uuid, item: &Content) -> bool {
    if role.is_editor() {
        return true;
    }
    item.author_id == user_id
        && matches!(
            item.current_status(),
            Some(ContentStatus::Draft) | Some(ContentStatus::Rejected)
        )
}

/// Deleting is stricter than editing: authors may only remove drafts.
pub fn can_delete_content(role: Role, user_id: Uuid, item: &Content) -> bool {
    if role.is_editor() {
        return true;
    }
    item.author_id == user_id && item.current_status() == Some(ContentStatus::Draft)
}

/// Mirrors the in-process capability table into the `roles` table so the
/// data set is self-describing. Existing rows are refreshed, missing rows
/// inserted.
pub fn seed_roles(conn: &mut PgConnection) -> QueryResult<()> {
    for role in Role::ALL {
        let grants = role.grants_json();
        let updated = diesel::update(roles::table.filter(roles::name.eq(role.as_str())))
            .set((
                roles::description.eq(Some(role.description().to_owned())),
                roles::permissions.eq(&grants),
            ))
            .execute(conn)?;
        if updated == 0 {
            diesel::insert_into(roles::table)
                .values(NewRoleRow {
                    id: Uuid::new_v4(),
                    name: role.as_str().to_owned(),
                    description: Some(role.description().to_owned()),
                    permissions: grants,
                })
                .execute(conn)?;
        }
    }
    Ok(())
}
