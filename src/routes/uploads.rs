//! Cover image uploads. The stored reference is opaque to callers; they
//! hand it back verbatim as a content `cover_image`.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::{
    error::{AppError, AppResult},
    auth::AuthenticatedUser,
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Serialize)]
pub struct UploadResponse {
    pub reference: String,
}

fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            let lowered = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.iter().any(|allowed| *allowed == lowered)
        })
        .unwrap_or(false)
}

pub async fn upload_file(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        let msg = format!("invalid multipart data: {err}");
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(msg)
    })? {
        if field.name() == Some("file") {
            original_name = field.file_name().map(|name| name.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|err| AppError::bad_request(format!("failed to read upload: {err}")))?;
            file_bytes = Some(data.to_vec());
        }
    }

    let bytes = file_bytes.ok_or_else(|| AppError::bad_request("bagian 'file' wajib ada"))?;
    let name = original_name.ok_or_else(|| AppError::bad_request("nama berkas wajib ada"))?;

    if bytes.is_empty() {
        return Err(AppError::bad_request("berkas kosong"));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::bad_request("berkas melebihi 5 MB"));
    }
    if !has_allowed_extension(&name) {
        return Err(AppError::bad_request(
            "hanya berkas gambar (jpg, jpeg, png, gif, webp) yang diizinkan",
        ));
    }

    let reference = state
        .files
        .save(bytes, "covers", &name)
        .await
        .map_err(|err| AppError::internal(format!("upload failed: {err}")))?;

    Ok((StatusCode::CREATED, Json(UploadResponse { reference })))
}
