use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{password, session};
use crate::db::models::NewUser;
use crate::error::{AppError, AppResult};
use crate::extractors::{extract_session_token, MaybeUser};
use crate::forms::{self, FieldErrors, LoginInput, SignupInput};
use crate::repository::RepositoryError;
use crate::routes::Html;
use crate::state::AppState;

const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";

// -- Templates --

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub viewer: Option<crate::extractors::CurrentUser>,
    pub form: SignupInput,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<crate::extractors::CurrentUser>,
    pub username: String,
    pub next: String,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "auth/logged_out.html")]
pub struct LoggedOutTemplate {
    pub viewer: Option<crate::extractors::CurrentUser>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct NextQuery {
    pub next: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

/// Only same-site paths are followed after login; anything else goes home.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

fn redirect_with_session(state: &AppState, token: &str, location: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location.to_string()),
            (
                header::SET_COOKIE,
                session_cookie(
                    &state.config.auth.cookie_name,
                    token,
                    state.config.auth.session_hours,
                ),
            ),
        ],
    )
        .into_response()
}

// -- Signup --

/// GET /auth/signup/
pub async fn signup_page(MaybeUser(viewer): MaybeUser) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        viewer,
        form: SignupInput::default(),
        errors: FieldErrors::default(),
    })
}

/// POST /auth/signup/ - create the account and sign it in. The very first
/// account becomes the site admin.
pub async fn signup(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Form(input): Form<SignupInput>,
) -> AppResult<Response> {
    let valid = match forms::validate_signup(&input) {
        Ok(valid) => valid,
        Err(errors) => return Ok(signup_errors(viewer, input, errors)),
    };

    if state.repos.users.find_by_username(&valid.username).await?.is_some() {
        let mut errors = FieldErrors::default();
        errors.add("username", USERNAME_TAKEN);
        return Ok(signup_errors(viewer, input, errors));
    }

    let is_admin = state.repos.users.count().await? == 0;
    let cost = state.config.auth.bcrypt_cost;
    let plain = valid.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&plain, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    let created = state
        .repos
        .users
        .create(&NewUser {
            username: valid.username,
            full_name: valid.full_name,
            email: valid.email,
            password_hash,
            is_admin,
        })
        .await;

    let user = match created {
        Ok(user) => user,
        // Lost a race with another signup for the same name.
        Err(RepositoryError::Conflict(_)) => {
            let mut errors = FieldErrors::default();
            errors.add("username", USERNAME_TAKEN);
            return Ok(signup_errors(viewer, input, errors));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        "New account {}{}",
        user.username,
        if user.is_admin { " (admin)" } else { "" }
    );

    let token = session::create_session(&state.db, user.id, state.config.auth.session_hours)?;
    Ok(redirect_with_session(&state, &token, "/"))
}

fn signup_errors(
    viewer: Option<crate::extractors::CurrentUser>,
    mut form: SignupInput,
    errors: FieldErrors,
) -> Response {
    form.password1.clear();
    form.password2.clear();
    Html(SignupTemplate {
        viewer,
        form,
        errors,
    })
    .into_response()
}

// -- Login --

/// GET /auth/login/
pub async fn login_page(
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<NextQuery>,
) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        viewer,
        username: String::new(),
        next: query.next,
        errors: FieldErrors::default(),
    })
}

/// POST /auth/login/ - check credentials, start a session and follow `next`.
pub async fn login(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Form(input): Form<LoginInput>,
) -> AppResult<Response> {
    let (username, plain) = match forms::validate_login(&input) {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(login_errors(viewer, input, errors)),
    };

    let user = state.repos.users.find_by_username(&username).await?;
    let hash = user.as_ref().map(|u| u.password_hash.clone());
    let cost = state.config.auth.bcrypt_cost;
    let verified = tokio::task::spawn_blocking(move || match hash {
        Some(hash) => password::verify_password(&plain, &hash),
        None => password::verify_against_dummy(&plain, cost),
    })
    .await
    .map_err(|e| AppError::Internal(format!("Password check task failed: {}", e)))?;

    let Some(user) = user.filter(|_| verified) else {
        tracing::info!("Failed login for {}", username);
        let mut errors = FieldErrors::default();
        errors.add_non_field(BAD_CREDENTIALS);
        return Ok(login_errors(viewer, input, errors));
    };

    let token = session::create_session(&state.db, user.id, state.config.auth.session_hours)?;
    tracing::info!("{} logged in", user.username);

    Ok(redirect_with_session(&state, &token, safe_next(&input.next)))
}

fn login_errors(
    viewer: Option<crate::extractors::CurrentUser>,
    input: LoginInput,
    errors: FieldErrors,
) -> Response {
    Html(LoginTemplate {
        viewer,
        username: input.username,
        next: input.next,
        errors,
    })
    .into_response()
}

// -- Logout --

/// GET|POST /auth/logout/ - drop the session and show the goodbye page.
pub async fn logout(
    State(state): State<AppState>,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = extract_session_token(&parts, cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    let body = LoggedOutTemplate { viewer: None }.render()?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::SET_COOKIE, clear_session_cookie(cookie_name)),
        ],
        body,
    )
        .into_response())
}
