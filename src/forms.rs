//! Form input and validation.
//!
//! Each form has a raw input struct (what the browser sent) and a validation
//! function returning either the cleaned values or [`FieldErrors`].

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::db::models::Group;

pub const TEXT_REQUIRED: &str = "This field is required.";
pub const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

const USERNAME_MAX: usize = 150;
const PASSWORD_MIN: usize = 8;
const TITLE_MAX: usize = 200;

/// Validation messages keyed by field name, plus errors that belong to the
/// form as a whole.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors {
    fields: BTreeMap<String, Vec<String>>,
    non_field: Vec<String>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Messages for one field; empty when the field is valid.
    pub fn get(&self, field: &str) -> Vec<String> {
        self.fields.get(field).cloned().unwrap_or_default()
    }

    pub fn non_field(&self) -> Vec<String> {
        self.non_field.clone()
    }

    fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

fn required(errors: &mut FieldErrors, field: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, TEXT_REQUIRED);
    }
    value.to_string()
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

// --- Posts ---

/// A file part from a multipart post form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedImage {
    /// Lower-cased extension to store the file under, when it names an image type.
    pub fn extension(&self) -> Option<String> {
        let ext = std::path::Path::new(&self.file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        let mime = mime_guess::from_ext(&ext).first()?;
        (mime.type_() == mime_guess::mime::IMAGE).then_some(ext)
    }

    /// The name and declared type must say image, and the bytes must decode as one.
    fn is_image(&self) -> bool {
        let declared_ok = self
            .content_type
            .as_deref()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(true);
        if !declared_ok || self.data.is_empty() || self.extension().is_none() {
            return false;
        }
        match image::load_from_memory(&self.data) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Rejected upload {}: {}", self.file_name, e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<UploadedImage>,
    pub clear_image: bool,
}

#[derive(Debug, Clone)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<UploadedImage>,
    pub clear_image: bool,
}

/// `groups` are the choices offered by the form; any other id is rejected.
pub fn validate_post(input: PostInput, groups: &[Group]) -> Result<ValidPost, FieldErrors> {
    let mut errors = FieldErrors::default();

    let text = required(&mut errors, "text", &input.text);

    let group_id = match optional(input.group.as_deref()) {
        None => None,
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
            _ => {
                errors.add("group", INVALID_GROUP);
                None
            }
        },
    };

    if let Some(image) = &input.image {
        if !image.is_image() {
            errors.add("image", INVALID_IMAGE);
        } else if input.clear_image {
            errors.add(
                "image",
                "Please either submit a file or check the clear checkbox, not both.",
            );
        }
    }

    errors.finish(ValidPost {
        text,
        group_id,
        image: input.image,
        clear_image: input.clear_image,
    })
}

// --- Comments ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub text: String,
}

pub fn validate_comment(input: &CommentInput) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::default();
    let text = required(&mut errors, "text", &input.text);
    errors.finish(text)
}

// --- Accounts ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupInput {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

fn valid_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

pub fn validate_signup(input: &SignupInput) -> Result<ValidSignup, FieldErrors> {
    let mut errors = FieldErrors::default();

    let username = required(&mut errors, "username", &input.username);
    if !username.is_empty() {
        if username.chars().count() > USERNAME_MAX {
            errors.add(
                "username",
                format!("Ensure this value has at most {} characters.", USERNAME_MAX),
            );
        }
        if !username.chars().all(valid_username_char) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
    }

    let email = optional(Some(&input.email));
    if let Some(email) = &email {
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            errors.add("email", "Enter a valid email address.");
        }
    }

    if input.password1.is_empty() {
        errors.add("password1", TEXT_REQUIRED);
    } else if input.password1.chars().count() < PASSWORD_MIN {
        errors.add(
            "password1",
            format!(
                "This password is too short. It must contain at least {} characters.",
                PASSWORD_MIN
            ),
        );
    }
    if input.password2.is_empty() {
        errors.add("password2", TEXT_REQUIRED);
    } else if input.password1 != input.password2 {
        errors.add("password2", "The two password fields didn't match.");
    }

    errors.finish(ValidSignup {
        username,
        full_name: optional(Some(&input.full_name)),
        email,
        password: input.password1.clone(),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
    pub next: String,
}

pub fn validate_login(input: &LoginInput) -> Result<(String, String), FieldErrors> {
    let mut errors = FieldErrors::default();
    let username = required(&mut errors, "username", &input.username);
    if input.password.is_empty() {
        errors.add("password", TEXT_REQUIRED);
    }
    errors.finish((username, input.password.clone()))
}

// --- Groups ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupInput {
    pub title: String,
    pub slug: String,
    pub description: String,
}

pub fn validate_group(input: &GroupInput) -> Result<crate::db::models::NewGroup, FieldErrors> {
    let mut errors = FieldErrors::default();

    let title = required(&mut errors, "title", &input.title);
    if title.chars().count() > TITLE_MAX {
        errors.add(
            "title",
            format!("Ensure this value has at most {} characters.", TITLE_MAX),
        );
    }

    let slug = required(&mut errors, "slug", &input.slug);
    if !slug.is_empty()
        && !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        errors.add(
            "slug",
            "Enter a valid \u{201c}slug\u{201d} consisting of letters, numbers, underscores or hyphens.",
        );
    }

    errors.finish(crate::db::models::NewGroup {
        title,
        slug,
        description: input.description.trim().to_string(),
    })
}
