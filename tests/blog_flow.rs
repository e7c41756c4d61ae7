mod common;

use axum::http::StatusCode;
use common::{body_text, location, Multipart, TestApp, SMALL_GIF};

fn card_count(body: &str) -> usize {
    body.matches("class=\"post-card\"").count()
}

// --- Auth gates ---

#[tokio::test]
async fn anonymous_create_redirects_to_login() {
    let app = TestApp::new();

    let response = app.get("/create/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=/create/");
}

#[tokio::test]
async fn anonymous_edit_and_comment_redirect_to_login() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let post = app.post(leo, None, "hello").await;

    let response = app.get(&format!("/posts/{}/edit/", post), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/auth/login/?next=/posts/{}/edit/", post)
    );

    let response = app
        .post_form(&format!("/posts/{}/comment/", post), None, "text=hi")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/auth/login/?next=/posts/{}/comment/", post)
    );
    assert_eq!(app.count("comments"), 0);

    // After logging in the browser follows `next` with a GET.
    let cookie = app.login(leo);
    let response = app
        .get(&format!("/posts/{}/comment/", post), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post));
    assert_eq!(app.count("comments"), 0);

    let response = app.get("/posts/999/comment/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_follow_feed_redirects_to_login() {
    let app = TestApp::new();

    let response = app.get("/follow/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=/follow/");
}

// --- Create ---

#[tokio::test]
async fn create_post_without_group() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let cookie = app.login(leo);

    let body = Multipart::new().text("text", "First post").text("group", "").finish();
    let response = app.post_multipart("/create/", Some(&cookie), body).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo/");
    assert_eq!(app.count("posts"), 1);

    let conn = app.state.db.get().unwrap();
    let (text, group): (String, Option<i64>) = conn
        .query_row("SELECT text, group_id FROM posts", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(text, "First post");
    assert_eq!(group, None);
}

#[tokio::test]
async fn create_post_in_group_with_image() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let cats = app.group("cats").await;
    let cookie = app.login(leo);

    let body = Multipart::new()
        .text("text", "Look at this cat")
        .text("group", &cats.to_string())
        .file("image", "small.gif", "image/gif", SMALL_GIF)
        .finish();
    let response = app.post_multipart("/create/", Some(&cookie), body).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let conn = app.state.db.get().unwrap();
    let (group, image): (Option<i64>, Option<String>) = conn
        .query_row("SELECT group_id, image FROM posts", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(group, Some(cats));

    let image = image.expect("image path stored");
    assert!(image.starts_with("posts/"));
    assert!(image.ends_with(".gif"));
    assert!(app.state.config.media_path().join(&image).exists());

    let response = app.get(&format!("/media/{}", image), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/gif");

    let file_name = image.rsplit('/').next().unwrap();
    let page = body_text(app.get("/group/cats/", None).await).await;
    assert!(page.contains(file_name));
}

#[tokio::test]
async fn create_post_with_empty_text_shows_errors() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let cookie = app.login(leo);

    let body = Multipart::new().text("text", "   ").finish();
    let response = app.post_multipart("/create/", Some(&cookie), body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("This field is required."));
    assert_eq!(app.count("posts"), 0);
}

#[tokio::test]
async fn create_post_rejects_unknown_group_and_non_image() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let cookie = app.login(leo);

    let body = Multipart::new()
        .text("text", "hello")
        .text("group", "9999")
        .file("image", "notes.txt", "text/plain", b"plain text")
        .finish();
    let response = app.post_multipart("/create/", Some(&cookie), body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Select a valid choice."));
    assert!(page.contains("Upload a valid image."));
    assert_eq!(app.count("posts"), 0);
}

#[tokio::test]
async fn create_post_rejects_script_named_png() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let cookie = app.login(leo);

    let body = Multipart::new()
        .text("text", "hello")
        .file("image", "evil.png", "image/png", b"#!/bin/sh\nrm -rf /\n")
        .finish();
    let response = app.post_multipart("/create/", Some(&cookie), body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Upload a valid image."));
    assert_eq!(app.count("posts"), 0);
    assert!(!app.state.config.media_path().join("posts").exists());
}

// --- Edit ---

#[tokio::test]
async fn author_can_edit_post() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let cats = app.group("cats").await;
    let post = app.post(leo, Some(cats), "original").await;
    let cookie = app.login(leo);

    let response = app
        .get(&format!("/posts/{}/edit/", post), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("original"));

    let body = Multipart::new().text("text", "edited").text("group", "").finish();
    let response = app
        .post_multipart(&format!("/posts/{}/edit/", post), Some(&cookie), body)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post));

    let stored = app.state.repos.posts.find(post).await.unwrap().unwrap();
    assert_eq!(stored.text, "edited");
    assert!(stored.group.is_none());
    assert_eq!(app.count("posts"), 1);
}

#[tokio::test]
async fn non_author_edit_leaves_post_unchanged() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let anna = app.user("anna", false).await;
    let post = app.post(leo, None, "original").await;
    let cookie = app.login(anna);

    let response = app
        .get(&format!("/posts/{}/edit/", post), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let body = Multipart::new().text("text", "hijacked").finish();
    let response = app
        .post_multipart(&format!("/posts/{}/edit/", post), Some(&cookie), body)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let stored = app.state.repos.posts.find(post).await.unwrap().unwrap();
    assert_eq!(stored.text, "original");
}

#[tokio::test]
async fn edit_replaces_then_clears_image() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let post = app.post(leo, None, "with picture").await;
    let cookie = app.login(leo);
    let uri = format!("/posts/{}/edit/", post);

    let body = Multipart::new()
        .text("text", "with picture")
        .file("image", "small.gif", "image/gif", SMALL_GIF)
        .finish();
    app.post_multipart(&uri, Some(&cookie), body).await;
    let image = app
        .state
        .repos
        .posts
        .find(post)
        .await
        .unwrap()
        .unwrap()
        .image
        .expect("image stored");
    let file = app.state.config.media_path().join(&image);
    assert!(file.exists());

    // No upload and no clear keeps the image.
    let body = Multipart::new().text("text", "still here").finish();
    app.post_multipart(&uri, Some(&cookie), body).await;
    let stored = app.state.repos.posts.find(post).await.unwrap().unwrap();
    assert_eq!(stored.image.as_deref(), Some(image.as_str()));

    let body = Multipart::new()
        .text("text", "no picture")
        .text("image-clear", "on")
        .finish();
    app.post_multipart(&uri, Some(&cookie), body).await;
    let stored = app.state.repos.posts.find(post).await.unwrap().unwrap();
    assert_eq!(stored.image, None);
    assert!(!file.exists());
}

// --- Comments ---

#[tokio::test]
async fn comment_adds_one_and_empty_comment_is_dropped() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let anna = app.user("anna", false).await;
    let post = app.post(leo, None, "discuss").await;
    let cookie = app.login(anna);
    let uri = format!("/posts/{}/comment/", post);

    let response = app.post_form(&uri, Some(&cookie), "text=Nice+post").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post));
    assert_eq!(app.count("comments"), 1);

    let response = app.post_form(&uri, Some(&cookie), "text=").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post));
    assert_eq!(app.count("comments"), 1);

    let page = body_text(app.get(&format!("/posts/{}/", post), None).await).await;
    assert!(page.contains("Nice post"));
}

#[tokio::test]
async fn comment_on_missing_post_is_404() {
    let app = TestApp::new();
    let anna = app.user("anna", false).await;
    let cookie = app.login(anna);

    let response = app
        .post_form("/posts/999/comment/", Some(&cookie), "text=hi")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Follows ---

#[tokio::test]
async fn follow_is_idempotent_and_unfollow_removes_edge() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let anna = app.user("anna", false).await;
    let cookie = app.login(anna);

    for _ in 0..2 {
        let response = app.get("/profile/leo/follow/", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/leo/");
    }
    assert_eq!(app.count("follows"), 1);
    assert!(app.state.repos.follows.exists(anna, leo).await.unwrap());

    let response = app.get("/profile/leo/unfollow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.count("follows"), 0);

    // Unfollowing again is a no-op.
    app.get("/profile/leo/unfollow/", Some(&cookie)).await;
    assert_eq!(app.count("follows"), 0);
}

#[tokio::test]
async fn cannot_follow_yourself() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let cookie = app.login(leo);

    let response = app.get("/profile/leo/follow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.count("follows"), 0);
}

#[tokio::test]
async fn follow_feed_shows_only_followed_authors() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let fyodor = app.user("fyodor", false).await;
    let anna = app.user("anna", false).await;
    app.post(leo, None, "from-leo").await;
    app.post(fyodor, None, "from-fyodor").await;
    let cookie = app.login(anna);

    app.get("/profile/leo/follow/", Some(&cookie)).await;

    let page = body_text(app.get("/follow/", Some(&cookie)).await).await;
    assert!(page.contains("from-leo"));
    assert!(!page.contains("from-fyodor"));

    // Someone who follows nobody sees an empty feed.
    let fyodor_cookie = app.login(fyodor);
    let page = body_text(app.get("/follow/", Some(&fyodor_cookie)).await).await;
    assert_eq!(card_count(&page), 0);
}

#[tokio::test]
async fn profile_shows_follow_state() {
    let app = TestApp::new();
    app.user("leo", false).await;
    let anna = app.user("anna", false).await;
    let cookie = app.login(anna);

    let page = body_text(app.get("/profile/leo/", Some(&cookie)).await).await;
    assert!(page.contains("/profile/leo/follow/"));

    app.get("/profile/leo/follow/", Some(&cookie)).await;
    let page = body_text(app.get("/profile/leo/", Some(&cookie)).await).await;
    assert!(page.contains("/profile/leo/unfollow/"));

    // Anonymous visitors and the author get no button.
    let page = body_text(app.get("/profile/leo/", None).await).await;
    assert!(!page.contains("/profile/leo/follow/"));
}

// --- Pagination ---

#[tokio::test]
async fn thirteen_posts_split_into_ten_and_three() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let cats = app.group("cats").await;
    for i in 0..13 {
        app.post(leo, Some(cats), &format!("post {}", i)).await;
    }

    for base in ["/", "/group/cats/", "/profile/leo/"] {
        let first = body_text(app.get(base, None).await).await;
        assert_eq!(card_count(&first), 10, "first page of {}", base);
        assert!(first.contains("post 12"), "newest first on {}", base);

        let second = body_text(app.get(&format!("{}?page=2", base), None).await).await;
        assert_eq!(card_count(&second), 3, "second page of {}", base);
        assert!(second.contains("post 0"));
    }
}

#[tokio::test]
async fn bad_page_numbers_are_lenient() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    for i in 0..13 {
        app.post(leo, None, &format!("post {}", i)).await;
    }

    let page = body_text(app.get("/profile/leo/?page=abc", None).await).await;
    assert_eq!(card_count(&page), 10);

    let page = body_text(app.get("/profile/leo/?page=99", None).await).await;
    assert_eq!(card_count(&page), 3);
}

// --- Index cache ---

#[tokio::test]
async fn index_is_cached_until_cleared() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    let post = app.post(leo, None, "cached-post").await;

    let page = body_text(app.get("/", None).await).await;
    assert!(page.contains("cached-post"));

    assert!(app.state.repos.posts.delete(post).await.unwrap());

    let page = body_text(app.get("/", None).await).await;
    assert!(page.contains("cached-post"), "served from cache");

    app.state.page_cache.lock().await.clear();

    let page = body_text(app.get("/", None).await).await;
    assert!(!page.contains("cached-post"));
}

#[tokio::test]
async fn admin_can_clear_cache_over_http() {
    let app = TestApp::new();
    let admin = app.user("admin", true).await;
    let leo = app.user("leo", false).await;
    let post = app.post(leo, None, "cached-post").await;

    app.get("/", None).await;
    app.state.repos.posts.delete(post).await.unwrap();

    // Non-admins cannot see the endpoint.
    let leo_cookie = app.login(leo);
    let response = app.post_form("/admin/cache/clear/", Some(&leo_cookie), "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let page = body_text(app.get("/", None).await).await;
    assert!(page.contains("cached-post"), "cache survives a refused clear");

    let cookie = app.login(admin);
    let response = app.post_form("/admin/cache/clear/", Some(&cookie), "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let page = body_text(app.get("/", None).await).await;
    assert!(!page.contains("cached-post"));
}

// --- Groups ---

#[tokio::test]
async fn admin_creates_group() {
    let app = TestApp::new();
    let admin = app.user("admin", true).await;
    let cookie = app.login(admin);

    let response = app
        .post_form(
            "/admin/groups/new/",
            Some(&cookie),
            "title=Cats&slug=cats&description=All+about+cats",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/group/cats/");

    let page = body_text(app.get("/group/cats/", None).await).await;
    assert!(page.contains("All about cats"));

    // Same slug again is a form error.
    let response = app
        .post_form("/admin/groups/new/", Some(&cookie), "title=Cats&slug=cats")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.count("groups"), 1);
}

// --- 404s ---

#[tokio::test]
async fn unknown_pages_are_404() {
    let app = TestApp::new();

    for uri in [
        "/group/nope/",
        "/profile/nobody/",
        "/posts/999/",
        "/posts/not-a-number/",
        "/unexisting_page/",
        "/media/posts/missing.gif",
        "/media/../yatube.db",
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }

    let page = body_text(app.get("/unexisting_page/", None).await).await;
    assert!(page.contains("Page not found"));
}

#[tokio::test]
async fn static_pages_render() {
    let app = TestApp::new();

    for uri in ["/about/author/", "/about/tech/", "/auth/login/", "/auth/signup/"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn post_detail_shows_author_post_count() {
    let app = TestApp::new();
    let leo = app.user("leo", false).await;
    app.post(leo, None, "one").await;
    let post = app.post(leo, None, "two").await;

    let page = body_text(app.get(&format!("/posts/{}/", post), None).await).await;
    assert!(page.contains("Posts by this author: 2"));
    assert!(!page.contains("Edit post"));

    let cookie = app.login(leo);
    let page = body_text(app.get(&format!("/posts/{}/", post), Some(&cookie)).await).await;
    assert!(page.contains("Edit post"));
}
