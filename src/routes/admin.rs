use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};

use crate::error::AppResult;
use crate::extractors::{AdminUser, CurrentUser};
use crate::forms::{self, FieldErrors, GroupInput};
use crate::repository::RepositoryError;
use crate::routes::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "admin/group_form.html")]
pub struct GroupFormTemplate {
    pub viewer: Option<CurrentUser>,
    pub form: GroupInput,
    pub errors: FieldErrors,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/groups/new/", get(new_group_form).post(create_group))
        .route("/admin/cache/clear/", post(clear_cache))
}

async fn new_group_form(AdminUser(user): AdminUser) -> Html<GroupFormTemplate> {
    Html(GroupFormTemplate {
        viewer: Some(user),
        form: GroupInput::default(),
        errors: FieldErrors::default(),
    })
}

async fn create_group(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Form(input): Form<GroupInput>,
) -> AppResult<Response> {
    let new_group = match forms::validate_group(&input) {
        Ok(group) => group,
        Err(errors) => return Ok(group_errors(user, input, errors)),
    };

    match state.repos.groups.create(&new_group).await {
        Ok(group) => {
            tracing::info!("{} created group {}", user.username, group.slug);
            Ok(Redirect::to(&format!("/group/{}/", group.slug)).into_response())
        }
        Err(RepositoryError::Conflict(_)) => {
            let mut errors = FieldErrors::default();
            errors.add("slug", "Group with this Slug already exists.");
            Ok(group_errors(user, input, errors))
        }
        Err(e) => Err(e.into()),
    }
}

fn group_errors(user: CurrentUser, form: GroupInput, errors: FieldErrors) -> Response {
    Html(GroupFormTemplate {
        viewer: Some(user),
        form,
        errors,
    })
    .into_response()
}

/// POST /admin/cache/clear/ - drop every cached page.
async fn clear_cache(State(state): State<AppState>, AdminUser(user): AdminUser) -> Redirect {
    state.page_cache.lock().await.clear();
    tracing::info!("{} cleared the page cache", user.username);
    Redirect::to("/")
}
