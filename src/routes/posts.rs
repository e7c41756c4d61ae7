use askama::Template;
use axum::extract::rejection::FormRejection;
use axum::extract::{Multipart, OriginalUri, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use chrono::{NaiveDateTime, Utc};

use crate::db::models::{
    Comment, Group, GroupRef, ImageChange, NewComment, NewPost, Post, PostChanges, User,
};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forms::{self, CommentInput, FieldErrors, PostInput, UploadedImage};
use crate::media;
use crate::pagination::{Page, PageQuery, Paginator};
use crate::repository::PostFilter;
use crate::routes::{html_response, Html};
use crate::state::AppState;

// --- View structs ---

pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author_username: String,
    pub author_name: String,
    pub group: Option<GroupRef>,
    pub image_url: Option<String>,
    pub pub_date: String,
}

impl From<Post> for PostCard {
    fn from(post: Post) -> Self {
        PostCard {
            author_name: post.author_display().to_string(),
            id: post.id,
            text: post.text,
            author_username: post.author_username,
            group: post.group,
            image_url: post.image.map(|path| format!("/media/{}", path)),
            pub_date: parse_and_format_time(&post.created_at),
        }
    }
}

pub struct CommentView {
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        CommentView {
            author_username: comment.author_username,
            text: comment.text,
            created_at: parse_and_format_time(&comment.created_at),
        }
    }
}

pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub viewer: Option<CurrentUser>,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub viewer: Option<CurrentUser>,
    pub group: Group,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub viewer: Option<CurrentUser>,
    pub author: User,
    pub author_name: String,
    pub post_count: i64,
    pub following: bool,
    pub can_follow: bool,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: Option<CurrentUser>,
    pub post: PostCard,
    pub post_count: i64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub comment_text: String,
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub viewer: Option<CurrentUser>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub viewer: Option<CurrentUser>,
    pub page: Page<PostCard>,
}

// --- Router ---

pub fn router() -> axum::Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
        .route("/posts/{post_id}/", get(post_detail))
        .route("/posts/{post_id}/edit/", get(edit_form).post(edit_post))
        .route(
            "/posts/{post_id}/comment/",
            get(comment_redirect).post(add_comment),
        )
        .route("/create/", get(create_form).post(create_post))
        .route("/follow/", get(follow_index))
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

pub fn post_url(id: i64) -> String {
    format!("/posts/{}/", id)
}

// --- Listing handlers ---

/// Home page. The rendered HTML is kept in the page cache per URL and viewer.
async fn index(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let cache_key = format!(
        "index:{}:{}",
        viewer.as_ref().map(|u| u.username.as_str()).unwrap_or(""),
        uri
    );

    if let Some(body) = state.page_cache.lock().await.get(&cache_key) {
        return Ok(html_response(body));
    }

    let page = load_page(&state, PostFilter::All, query.page.as_deref()).await?;
    let body = IndexTemplate { viewer, page }.render()?;

    state.page_cache.lock().await.set(cache_key, body.clone());
    Ok(html_response(body))
}

async fn group_posts(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupListTemplate>> {
    let group = state
        .repos
        .groups
        .find_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;

    let page = load_page(&state, PostFilter::Group(group.id), query.page.as_deref()).await?;

    Ok(Html(GroupListTemplate {
        viewer,
        group,
        page,
    }))
}

async fn profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let author = find_author(&state, &username).await?;

    let filter = PostFilter::Author(author.id);
    let post_count = state.repos.posts.count(filter).await?;
    let page = load_page(&state, filter, query.page.as_deref()).await?;

    let following = match &viewer {
        Some(user) => state.repos.follows.exists(user.id, author.id).await?,
        None => false,
    };
    let can_follow = viewer.as_ref().is_some_and(|user| user.id != author.id);

    Ok(Html(ProfileTemplate {
        viewer,
        author_name: author.display_name().to_string(),
        author,
        post_count,
        following,
        can_follow,
        page,
    }))
}

async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FollowTemplate>> {
    let page = load_page(&state, PostFilter::FollowedBy(user.id), query.page.as_deref()).await?;

    Ok(Html(FollowTemplate {
        viewer: Some(user),
        page,
    }))
}

// --- Post detail ---

async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(post_id): Path<String>,
) -> AppResult<Html<PostDetailTemplate>> {
    let post = find_post(&state, &post_id).await?;

    let post_count = state
        .repos
        .posts
        .count(PostFilter::Author(post.author_id))
        .await?;
    let comments = state
        .repos
        .comments
        .list_for_post(post.id)
        .await?
        .into_iter()
        .map(CommentView::from)
        .collect();
    let can_edit = viewer.as_ref().is_some_and(|user| user.id == post.author_id);

    Ok(Html(PostDetailTemplate {
        viewer,
        post: PostCard::from(post),
        post_count,
        comments,
        can_edit,
        comment_text: String::new(),
    }))
}

// --- Create / edit ---

async fn create_form(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostFormTemplate>> {
    let groups = state.repos.groups.list().await?;

    Ok(Html(PostFormTemplate {
        viewer: Some(user),
        is_edit: false,
        action: "/create/".to_string(),
        text: String::new(),
        groups: group_options(&groups, None),
        current_image: None,
        errors: FieldErrors::default(),
    }))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let input = read_post_form(multipart).await?;
    let groups = state.repos.groups.list().await?;

    let valid = match forms::validate_post(input.clone(), &groups) {
        Ok(valid) => valid,
        Err(errors) => {
            let selected = selected_group(&input);
            return Ok(Html(PostFormTemplate {
                viewer: Some(user),
                is_edit: false,
                action: "/create/".to_string(),
                text: input.text,
                groups: group_options(&groups, selected),
                current_image: None,
                errors,
            })
            .into_response());
        }
    };

    let media_root = state.config.media_path();
    let image = match &valid.image {
        Some(upload) => Some(media::save_post_image(&media_root, upload).await?),
        None => None,
    };

    let created = state
        .repos
        .posts
        .create(&NewPost {
            author_id: user.id,
            group_id: valid.group_id,
            text: valid.text,
            image: image.clone(),
        })
        .await;

    let post = match created {
        Ok(post) => post,
        Err(e) => {
            if let Some(path) = &image {
                media::remove(&media_root, path).await;
            }
            return Err(e.into());
        }
    };

    tracing::info!("{} published post {}", user.username, post.id);
    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}

async fn edit_form(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let post = find_post(&state, &post_id).await?;
    if post.author_id != user.id {
        return Ok(Redirect::to("/").into_response());
    }

    let groups = state.repos.groups.list().await?;
    let selected = post.group.as_ref().map(|g| g.id);

    Ok(Html(PostFormTemplate {
        viewer: Some(user),
        is_edit: true,
        action: format!("/posts/{}/edit/", post.id),
        text: post.text,
        groups: group_options(&groups, selected),
        current_image: post.image.map(|path| format!("/media/{}", path)),
        errors: FieldErrors::default(),
    })
    .into_response())
}

async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let post = find_post(&state, &post_id).await?;
    if post.author_id != user.id {
        tracing::warn!(
            "{} tried to edit post {} owned by {}",
            user.username,
            post.id,
            post.author_username
        );
        return Ok(Redirect::to("/").into_response());
    }

    let input = read_post_form(multipart).await?;
    let groups = state.repos.groups.list().await?;

    let valid = match forms::validate_post(input.clone(), &groups) {
        Ok(valid) => valid,
        Err(errors) => {
            let selected = selected_group(&input);
            return Ok(Html(PostFormTemplate {
                viewer: Some(user),
                is_edit: true,
                action: format!("/posts/{}/edit/", post.id),
                text: input.text,
                groups: group_options(&groups, selected),
                current_image: post.image.map(|path| format!("/media/{}", path)),
                errors,
            })
            .into_response());
        }
    };

    let media_root = state.config.media_path();
    let image = match (&valid.image, valid.clear_image) {
        (Some(upload), _) => {
            ImageChange::Replace(media::save_post_image(&media_root, upload).await?)
        }
        (None, true) => ImageChange::Clear,
        (None, false) => ImageChange::Keep,
    };

    let changes = PostChanges {
        group_id: valid.group_id,
        text: valid.text,
        image,
    };
    let updated = state.repos.posts.update(post.id, &changes).await;

    if !matches!(updated, Ok(true)) {
        if let ImageChange::Replace(path) = &changes.image {
            media::remove(&media_root, path).await;
        }
        return match updated {
            Err(e) => Err(e.into()),
            Ok(_) => Err(AppError::NotFound),
        };
    }

    if changes.image != ImageChange::Keep {
        if let Some(old) = &post.image {
            media::remove(&media_root, old).await;
        }
    }

    tracing::info!("{} edited post {}", user.username, post.id);
    Ok(Redirect::to(&post_url(post.id)).into_response())
}

// --- Comments ---

/// Invalid comments are dropped without feedback; the reader lands back on
/// the post either way.
async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    form: Result<Form<CommentInput>, FormRejection>,
) -> AppResult<Redirect> {
    let post = find_post(&state, &post_id).await?;

    let input = form.map(|Form(input)| input).unwrap_or_default();
    if let Ok(text) = forms::validate_comment(&input) {
        state
            .repos
            .comments
            .create(&NewComment {
                post_id: post.id,
                author_id: user.id,
                text,
            })
            .await?;
        tracing::info!("{} commented on post {}", user.username, post.id);
    }

    Ok(Redirect::to(&post_url(post.id)))
}

/// GET on the comment URL, typically the `next` target after logging in.
async fn comment_redirect(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Redirect> {
    let post = find_post(&state, &post_id).await?;
    Ok(Redirect::to(&post_url(post.id)))
}

// --- Follows ---

async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let author = find_author(&state, &username).await?;

    if author.id != user.id && !state.repos.follows.exists(user.id, author.id).await? {
        state.repos.follows.follow(user.id, author.id).await?;
        tracing::info!("{} now follows {}", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)))
}

async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let author = find_author(&state, &username).await?;

    if state.repos.follows.exists(user.id, author.id).await? {
        state.repos.follows.unfollow(user.id, author.id).await?;
        tracing::info!("{} unfollowed {}", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)))
}

// --- Helpers ---

async fn load_page(
    state: &AppState,
    filter: PostFilter,
    raw_page: Option<&str>,
) -> AppResult<Page<PostCard>> {
    let total = state.repos.posts.count(filter).await?;
    let paginator = Paginator::new(total, state.config.posts.page_size);
    let number = paginator.page_number(raw_page);
    let (limit, offset) = paginator.bounds(number);

    let posts = state.repos.posts.list(filter, limit, offset).await?;
    Ok(paginator.page(number, posts).map(PostCard::from))
}

async fn find_author(state: &AppState, username: &str) -> AppResult<User> {
    state
        .repos
        .users
        .find_by_username(username)
        .await?
        .ok_or(AppError::NotFound)
}

/// Post ids that are not numbers cannot exist, so they are a 404 too.
async fn find_post(state: &AppState, raw_id: &str) -> AppResult<Post> {
    let id: i64 = raw_id.parse().map_err(|_| AppError::NotFound)?;
    state.repos.posts.find(id).await?.ok_or(AppError::NotFound)
}

fn group_options(groups: &[Group], selected: Option<i64>) -> Vec<GroupOption> {
    groups
        .iter()
        .map(|g| GroupOption {
            id: g.id,
            title: g.title.clone(),
            selected: Some(g.id) == selected,
        })
        .collect()
}

fn selected_group(input: &PostInput) -> Option<i64> {
    input.group.as_deref().and_then(|raw| raw.trim().parse().ok())
}

async fn read_post_form(mut multipart: Multipart) -> AppResult<PostInput> {
    let mut input = PostInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => {
                input.text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
            }
            "group" => {
                input.group = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?,
                );
            }
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                // Browsers send an empty part when no file was chosen.
                if !file_name.is_empty() || !data.is_empty() {
                    input.image = Some(UploadedImage {
                        file_name,
                        content_type,
                        data: data.to_vec(),
                    });
                }
            }
            "image-clear" => input.clear_image = true,
            _ => {}
        }
    }

    Ok(input)
}

// --- Time formatting ---

fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%-d %b %Y").to_string()
}

// --- Tests ---
