//! Content lifecycle state machine.
//!
//! Articles move through `draft -> pending_review -> published | rejected`.
//! Every transition checks its source state first and returns `false` without
//! touching the record when the check fails, so callers can branch on the
//! result instead of catching errors. Editors and admins may also bypass the
//! review gate entirely via [`Content::publish_direct`].

use chrono::Utc;
use diesel::dsl::{exists, select};
use diesel::{prelude::*, PgConnection};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::models::Content;
use crate::schema::content;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStatus {
    Draft,
    PendingReview,
    Published,
    Rejected,
}

impl ContentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::PendingReview => "pending_review",
            ContentStatus::Published => "published",
            ContentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(ContentStatus::Draft),
            "pending_review" => Some(ContentStatus::PendingReview),
            "published" => Some(ContentStatus::Published),
            "rejected" => Some(ContentStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Content {
    pub fn current_status(&self) -> Option<ContentStatus> {
        ContentStatus::parse(&self.status)
    }

    fn set_status(&mut self, status: ContentStatus) {
        self.status = status.as_str().to_owned();
    }

    /// draft -> pending_review.
    pub fn submit_for_review(&mut self) -> bool {
        if self.current_status() != Some(ContentStatus::Draft) {
            return false;
        }
        self.set_status(ContentStatus::PendingReview);
        true
    }

    /// draft | rejected -> pending_review, clearing any previous review
    /// comment so the reviewer starts from a clean slate. A first submission
    /// goes through [`Content::submit_for_review`].
    pub fn resubmit(&mut self) -> bool {
        match self.current_status() {
            Some(ContentStatus::Rejected) => {
                self.set_status(ContentStatus::PendingReview);
                self.review_comment = None;
                true
            }
            _ => {
                if !self.submit_for_review() {
                    return false;
                }
                self.review_comment = None;
                true
            }
        }
    }

    /// pending_review -> published. Records the reviewer and stamps
    /// `published_at`.
    pub fn approve(&mut self, reviewer_id: Uuid) -> bool {
        if self.current_status() != Some(ContentStatus::PendingReview) {
            return false;
        }
        self.set_status(ContentStatus::Published);
        self.reviewer_id = Some(reviewer_id);
        self.published_at = Some(Utc::now().naive_utc());
        true
    }

    /// pending_review -> rejected. Records the reviewer and their comment.
    pub fn reject(&mut self, reviewer_id: Uuid, comment: &str) -> bool {
        if self.current_status() != Some(ContentStatus::PendingReview) {
            return false;
        }
        self.set_status(ContentStatus::Rejected);
        self.reviewer_id = Some(reviewer_id);
        self.review_comment = Some(comment.to_owned());
        true
    }

    /// draft | rejected -> published, skipping review. The acting editor is
    /// recorded as the reviewer.
    pub fn publish_direct(&mut self, actor_id: Uuid) -> bool {
        match self.current_status() {
            Some(ContentStatus::Draft) | Some(ContentStatus::Rejected) => {
                self.set_status(ContentStatus::Published);
                self.reviewer_id = Some(actor_id);
                self.published_at = Some(Utc::now().naive_utc());
                true
            }
            _ => false,
        }
    }

    /// published -> draft. `published_at` is cleared so the invariant
    /// "published_at is set iff status == published" holds.
    pub fn unpublish(&mut self) -> bool {
        if self.current_status() != Some(ContentStatus::Published) {
            return false;
        }
        self.set_status(ContentStatus::Draft);
        self.published_at = None;
        true
    }
}

/// Normalizes a title into a URL slug: NFKD-decompose so diacritics split
/// from their base letters, drop everything non-ASCII, lowercase, map runs
/// of non-alphanumerics to single hyphens, and trim.
pub fn make_slug(title: &str) -> String {
    let folded: String = title.nfkd().filter(char::is_ascii).collect();
    let mut slug = String::with_capacity(folded.len());
    let mut pending_hyphen = false;
    for ch in folded.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        "untitled".to_owned()
    } else {
        slug
    }
}

/// Appends `-1`, `-2`, ... to `base` until `taken` reports the candidate as
/// free. Extracted from the database query so the suffix logic is testable
/// on its own.
pub fn resolve_collision<F>(base: &str, mut taken: F) -> QueryResult<String>
where
    F: FnMut(&str) -> QueryResult<bool>,
{
    if !taken(base)? {
        return Ok(base.to_owned());
    }
    let mut counter: u32 = 1;
    loop {
        let candidate = format!("{base}-{counter}");
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

/// Unique slug for a content title, re-checked against the whole table.
/// `exclude` skips the record itself when regenerating on update.
pub fn unique_slug(
    conn: &mut PgConnection,
    title: &str,
    exclude: Option<Uuid>,
) -> QueryResult<String> {
    let base = make_slug(title);
    resolve_collision(&base, |candidate| {
        let mut query = content::table
            .filter(content::slug.eq(candidate))
            .into_boxed();
        if let Some(id) = exclude {
            query = query.filter(content::id.ne(id));
        }
        select(exists(query)).get_result(conn)
    })
}
