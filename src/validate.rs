//! Pure input validation returning field-level errors.
//!
//! No exceptions for control flow: validators collect every problem into a
//! `Vec<FieldError>` and the boundary layer turns a non-empty list into a
//! 422 before anything is mutated.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

pub fn validate_content_input(title: &str, body: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if title.trim().is_empty() {
        errors.push(FieldError::new("title", "judul wajib diisi"));
    } else if title.chars().count() > 255 {
        errors.push(FieldError::new("title", "judul maksimal 255 karakter"));
    }
    if body.trim().is_empty() {
        errors.push(FieldError::new("body", "isi konten wajib diisi"));
    }
    errors
}

pub fn validate_review_comment(comment: &str) -> Vec<FieldError> {
    if comment.trim().is_empty() {
        vec![FieldError::new(
            "comment",
            "alasan penolakan wajib diisi",
        )]
    } else {
        Vec::new()
    }
}

pub fn validate_username(username: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let trimmed = username.trim();
    if trimmed.is_empty() {
        errors.push(FieldError::new("username", "username wajib diisi"));
    } else if trimmed.chars().count() < 3 || trimmed.chars().count() > 50 {
        errors.push(FieldError::new("username", "username harus 3-50 karakter"));
    } else if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        errors.push(FieldError::new(
            "username",
            "username hanya boleh huruf, angka, titik, dan garis bawah",
        ));
    }
    errors
}

pub fn validate_email(email: &str) -> Vec<FieldError> {
    if is_email(email) {
        Vec::new()
    } else {
        vec![FieldError::new("email", "format email tidak valid")]
    }
}

fn is_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// Minimum eight characters with upper, lower, and a digit.
pub fn validate_password_strength(password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if password.chars().count() < 8 {
        errors.push(FieldError::new("password", "password minimal 8 karakter"));
        return errors;
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(FieldError::new(
            "password",
            "password harus mengandung huruf besar",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push(FieldError::new(
            "password",
            "password harus mengandung huruf kecil",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(FieldError::new(
            "password",
            "password harus mengandung angka",
        ));
    }
    errors
}

/// `#rrggbb` only.
pub fn validate_hex_color(color: &str) -> Vec<FieldError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Vec::new()
    } else {
        vec![FieldError::new("color", "warna harus berformat #rrggbb")]
    }
}

pub fn validate_contact_message(
    name: &str,
    email: &str,
    subject: &str,
    message: &str,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push(FieldError::new("name", "nama wajib diisi"));
    }
    errors.extend(validate_email(email));
    if subject.trim().is_empty() {
        errors.push(FieldError::new("subject", "subjek wajib diisi"));
    }
    if message.trim().is_empty() {
        errors.push(FieldError::new("message", "pesan wajib diisi"));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_input_requires_title_and_body() {
        assert!(validate_content_input("Judul", "Isi").is_empty());

        let errors = validate_content_input("  ", "");
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["title", "body"]);
    }

    #[test]
    fn email_format() {
        assert!(validate_email("info@desa.go.id").is_empty());
        assert!(!validate_email("bukan-email").is_empty());
        assert!(!validate_email("a@b").is_empty());
        assert!(!validate_email("@desa.go.id").is_empty());
    }

    #[test]
    fn password_strength_rules() {
        assert!(validate_password_strength("Sandi123").is_empty());
        assert!(!validate_password_strength("pendek").is_empty());
        assert!(!validate_password_strength("tanpaangka").is_empty());
        assert!(!validate_password_strength("TANPAKECIL1").is_empty());
    }

    #[test]
    fn hex_color_format() {
        assert!(validate_hex_color("#28a745").is_empty());
        assert!(!validate_hex_color("28a745").is_empty());
        assert!(!validate_hex_color("#28a74").is_empty());
        assert!(!validate_hex_color("#28a74z").is_empty());
    }

    #[test]
    fn username_charset() {
        assert!(validate_username("kades.desa_01").is_empty());
        assert!(!validate_username("ab").is_empty());
        assert!(!validate_username("nama lengkap").is_empty());
    }
}
