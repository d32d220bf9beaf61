mod common;

use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, try_test_app, TestApp};
use serde_json::json;
use uuid::Uuid;

async fn publish(app: &TestApp, token: &str, title: &str, category_id: Uuid) -> Result<String> {
    let response = app
        .post_json(
            "/api/content",
            &json!({
                "title": title,
                "body": format!("Isi lengkap untuk {title}."),
                "category_id": category_id,
                "publish": true,
            }),
            Some(token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_vec(response.into_body()).await?;
    let created: serde_json::Value = serde_json::from_slice(&body)?;
    Ok(created["slug"].as_str().expect("slug").to_string())
}

#[tokio::test]
async fn public_listing_shows_only_published() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let password = "Rahasia1";
    app.insert_user("editor", password, "editor").await?;
    let category_id = app.insert_category("Berita").await?;
    let token = app.login_token("editor", password).await?;

    publish(&app, &token, "Sudah Terbit", category_id).await?;
    let response = app
        .post_json(
            "/api/content",
            &json!({
                "title": "Masih Draf",
                "body": "Isi.",
                "category_id": category_id,
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.get("/api/public/content", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let listing: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["items"][0]["title"], "Sudah Terbit");
    // The listing projection carries no article body.
    assert!(listing["items"][0].get("body").is_none());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn detail_read_bumps_view_count() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let password = "Rahasia1";
    app.insert_user("editor", password, "editor").await?;
    let category_id = app.insert_category("Berita").await?;
    let token = app.login_token("editor", password).await?;

    let slug = publish(&app, &token, "Banyak Dibaca", category_id).await?;

    for expected in 1..=3 {
        let response = app.get(&format!("/api/public/content/{slug}"), None).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_vec(response.into_body()).await?;
        let detail: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(detail["view_count"], expected);
    }

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn search_matches_title_and_body() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let password = "Rahasia1";
    app.insert_user("editor", password, "editor").await?;
    let category_id = app.insert_category("Berita").await?;
    let token = app.login_token("editor", password).await?;

    publish(&app, &token, "Jadwal Posyandu", category_id).await?;
    publish(&app, &token, "Agenda Lain", category_id).await?;

    let response = app.get("/api/public/search?q=posyandu", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let results: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(results["total"], 1);
    assert_eq!(results["items"][0]["title"], "Jadwal Posyandu");

    let response = app.get("/api/public/search?q=", None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn inactive_categories_are_hidden() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let password = "Rahasia1";
    app.insert_user("admin", password, "admin").await?;
    let shown = app.insert_category("Tampil").await?;
    let hidden = app.insert_category("Sembunyi").await?;
    let admin_token = app.login_token("admin", password).await?;

    let response = app
        .patch_json(
            &format!("/api/admin/categories/{hidden}"),
            &json!({ "is_active": false }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/api/public/categories", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let listing: Vec<serde_json::Value> = serde_json::from_slice(&body)?;
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["id"], shown.to_string());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn contact_form_reaches_the_mailer() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let response = app
        .post_json(
            "/api/public/contact",
            &json!({
                "name": "Warga",
                "email": "warga@desa.go.id",
                "subject": "Perbaikan jalan",
                "message": "Mohon perbaikan jalan RT 03.",
            }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Delivery runs on a spawned task; give it a moment.
    let mut delivered = Vec::new();
    for _ in 0..20 {
        delivered = app.mailer().messages().await;
        if !delivered.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].subject, "Perbaikan jalan");
    assert_eq!(delivered[0].recipient, "info@desa.go.id");

    let response = app
        .post_json(
            "/api/public/contact",
            &json!({ "name": "", "email": "bukan-email", "subject": "", "message": "" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn cover_upload_round_trip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = try_test_app().await? else {
        return Ok(());
    };

    let password = "Rahasia1";
    app.insert_user("penulis", password, "publisher").await?;
    let token = app.login_token("penulis", password).await?;

    let response = app
        .upload_file(
            "/api/uploads",
            "sampul.png",
            "image/png",
            b"fake-png-bytes",
            &token,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_vec(response.into_body()).await?;
    let uploaded: serde_json::Value = serde_json::from_slice(&body)?;
    assert!(uploaded["reference"].as_str().expect("reference").contains("sampul.png"));
    assert_eq!(app.files().file_count().await, 1);

    let response = app
        .upload_file(
            "/api/uploads",
            "arsip.zip",
            "application/zip",
            b"not-an-image",
            &token,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}
