use askama::Template;
use axum::routing::get;
use axum::Router;

use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AuthorTemplate {
    pub viewer: Option<CurrentUser>,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct TechTemplate {
    pub viewer: Option<CurrentUser>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/about/author/", get(author))
        .route("/about/tech/", get(tech))
}

async fn author(MaybeUser(viewer): MaybeUser) -> Html<AuthorTemplate> {
    Html(AuthorTemplate { viewer })
}

async fn tech(MaybeUser(viewer): MaybeUser) -> Html<TechTemplate> {
    Html(TechTemplate { viewer })
}
