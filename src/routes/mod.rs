use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod audit;
pub mod auth;
pub mod categories;
pub mod content;
pub mod health;
pub mod public;
pub mod review;
pub mod settings;
pub mod uploads;
pub mod users;

pub const MAX_PER_PAGE: i64 = 100;
pub const DEFAULT_PER_PAGE: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    /// Page number and page size clamped to sane bounds.
    pub fn resolve(&self, default_per_page: i64) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(default_per_page)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/change-password", post(auth::change_password));

    let public_routes = Router::new()
        .route("/content", get(public::list_published))
        .route("/content/:slug", get(public::get_published))
        .route("/search", get(public::search_published))
        .route("/categories", get(public::list_categories))
        .route("/settings", get(public::public_settings))
        .route("/contact", post(public::submit_contact));

    let content_routes = Router::new()
        .route("/", get(content::list_mine).post(content::create_content))
        .route(
            "/:id",
            get(content::get_content)
                .patch(content::update_content)
                .delete(content::delete_content),
        )
        .route("/:id/submit", post(content::submit_for_review))
        .route("/:id/revisions", get(content::list_revisions));

    let review_routes = Router::new()
        .route("/queue", get(review::list_queue))
        .route("/history", get(review::list_history))
        .route("/:id/approve", post(review::approve_content))
        .route("/:id/reject", post(review::reject_content))
        .route("/:id/publish", post(review::publish_content))
        .route("/:id/unpublish", post(review::unpublish_content));

    let admin_routes = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            axum::routing::patch(categories::update_category).delete(categories::delete_category),
        )
        .route("/settings", get(settings::list_settings))
        .route("/settings/:key", put(settings::update_setting))
        .route("/audit", get(audit::list_audit_logs))
        .route("/roles", get(users::list_roles));

    let uploads_routes = Router::new().route("/", post(uploads::upload_file));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/content", content_routes)
        .nest("/api/review", review_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/uploads", uploads_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .nest("/api/public", public_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 16))
}
