mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, try_test_app};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct AuthenticatedUser {
    username: String,
    role: String,
}

#[tokio::test]
async fn login_and_me_roundtrip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let password = "S3cret-kata";
    app.insert_user("alice", password, "admin").await?;

    let token = app.login_token("alice", password).await?;

    let response = app.get("/api/auth/me", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let user: AuthenticatedUser = serde_json::from_slice(&body)?;

    assert_eq!(user.username, "alice");
    assert_eq!(user.role, "admin");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn login_rejects_wrong_password() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    app.insert_user("bob", "Benar123", "publisher").await?;

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "username": "bob", "password": "Salah123" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn inactive_account_cannot_login() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let password = "Rahasia1";
    let admin = app.insert_user("admin", password, "admin").await?;
    let target = app.insert_user("citra", password, "publisher").await?;
    let _ = admin;

    let admin_token = app.login_token("admin", password).await?;
    let response = app
        .patch_json(
            &format!("/api/admin/users/{target}"),
            &json!({ "status": "inactive" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "username": "citra", "password": password }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn change_password_revokes_old_credentials() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let old_password = "LamaSekali1";
    let new_password = "BaruSekali2";
    app.insert_user("dewi", old_password, "publisher").await?;

    let token = app.login_token("dewi", old_password).await?;

    // Weak replacement is rejected with the offending fields listed.
    let response = app
        .post_json(
            "/api/auth/change-password",
            &json!({ "current_password": old_password, "new_password": "pendek" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .post_json(
            "/api/auth/change-password",
            &json!({ "current_password": old_password, "new_password": new_password }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "username": "dewi", "password": old_password }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let _token = app.login_token("dewi", new_password).await?;

    app.cleanup().await?;
    Ok(())
}

fn refresh_cookie_of(response: &hyper::Response<axum::body::Body>) -> Option<String> {
    response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

#[tokio::test]
async fn change_password_revokes_refresh_sessions() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let old_password = "LamaSekali1";
    let new_password = "BaruSekali2";
    app.insert_user("eka", old_password, "publisher").await?;

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "username": "eka", "password": old_password }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = refresh_cookie_of(&response).expect("login sets a refresh cookie");
    let body = body_to_vec(response.into_body()).await?;
    let parsed: serde_json::Value = serde_json::from_slice(&body)?;
    let access_token = parsed["access_token"].as_str().expect("access token").to_string();

    // The cookie refreshes and rotates before the password change.
    let response = app.post_with_cookie("/api/auth/refresh", &cookie, None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = refresh_cookie_of(&response).expect("refresh rotates the cookie");

    let response = app
        .post_json(
            "/api/auth/change-password",
            &json!({ "current_password": old_password, "new_password": new_password }),
            Some(&access_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The rotated session was revoked alongside the password.
    let response = app
        .post_with_cookie("/api/auth/refresh", &rotated, None)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn logout_without_cookie_revokes_all_sessions() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let password = "Rahasia1";
    app.insert_user("fajar", password, "publisher").await?;

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "username": "fajar", "password": password }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = refresh_cookie_of(&response).expect("login sets a refresh cookie");
    let body = body_to_vec(response.into_body()).await?;
    let parsed: serde_json::Value = serde_json::from_slice(&body)?;
    let access_token = parsed["access_token"].as_str().expect("access token").to_string();

    // Logging out without presenting the cookie still ends every session.
    let response = app
        .post_json("/api/auth/logout", &json!({}), Some(&access_token))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.post_with_cookie("/api/auth/refresh", &cookie, None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_token() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let response = app.get("/api/content", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/api/content", Some("not-a-token")).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}
