use crate::server::{
    PageCache, Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Json, JsonBytes},
    routes::{PageParams, PostsPage, Query, profiles::ProfilePath},
};
use axum::{
    extract::State,
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use yatube_common::model::{
    Id,
    comment::{Comment, CommentForm},
    form::{FormErrors, INVALID_CHOICE},
    group::Group,
    post::{Post, PostContent, PostFilter, PostForm, PostMarker},
};
use yatube_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(get_post)
        .typed_get(new_post_form)
        .typed_post(create_post)
        .typed_get(edit_post_form)
        .typed_post(edit_post)
        .typed_get(comment_redirect)
        .typed_post(add_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct IndexPath();

/// The home page, newest posts of everyone. Served from the page cache while
/// a copy is fresh, so new posts show up with a delay.
async fn index(
    IndexPath(): IndexPath,
    State(db): State<Arc<DbClient>>,
    State(page_cache): State<PageCache>,
    uri: Uri,
    Query(params): Query<PageParams>,
) -> Result<JsonBytes> {
    if let Some(cached) = page_cache.get(&uri).await {
        return Ok(JsonBytes(cached));
    }

    let page = db
        .fetch_posts_page(PostFilter::All, params.requested())
        .await?;
    let body = Json(PostsPage { page }).to_bytes()?;
    page_cache.insert(&uri, body.0.clone()).await;

    Ok(body)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

fn post_redirect(id: Id<PostMarker>) -> Redirect {
    Redirect::to(&PostPath { id }.to_string())
}

async fn fetch_post(db: &DbClient, id: Id<PostMarker>) -> Result<Post> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(post)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<PostDetail>> {
    let post = fetch_post(&db, id).await?;
    let comments = db.fetch_post_comments(id).await?;

    Ok(Json(PostDetail { post, comments }))
}

/// What the post form needs, for writing a new post or editing one.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct PostFormPage {
    pub form: PostForm,
    pub groups: Vec<Group>,
    pub is_edit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Post>,
}

/// Validates the form, including that the chosen group exists.
async fn validate_post_form(db: &DbClient, form: PostForm) -> Result<PostContent> {
    let content = form.validate().map_err(ServerError::InvalidForm)?;

    if let Some(group_id) = content.group {
        if db.fetch_group(group_id).await?.is_none() {
            return Err(ServerError::InvalidForm(FormErrors::single(
                "group",
                INVALID_CHOICE,
            )));
        }
    }

    Ok(content)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create/", rejection(ServerError))]
struct CreatePostPath();

async fn new_post_form(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
) -> Result<Json<PostFormPage>> {
    let groups = db.fetch_groups().await?;

    Ok(Json(PostFormPage {
        form: PostForm::default(),
        groups,
        is_edit: false,
        post: None,
    }))
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Redirect> {
    let content = validate_post_form(&db, form).await?;
    let post_id = db.create_post(&content, user.user_id()).await?;
    info!(%post_id, author = %user.user().handle, "Created post");

    let profile = ProfilePath {
        username: user.user().handle.clone(),
    };
    Ok(Redirect::to(&profile.to_string()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/edit/", rejection(ServerError))]
struct EditPostPath {
    id: Id<PostMarker>,
}

async fn edit_post_form(
    EditPostPath { id }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Response> {
    let post = fetch_post(&db, id).await?;
    if post.author.id != user.user_id() {
        debug!(%id, user = %user.user_id(), "Refusing to edit someone else's post");
        return Ok(post_redirect(id).into_response());
    }
    let groups = db.fetch_groups().await?;

    let page = PostFormPage {
        form: PostForm::from(&post),
        groups,
        is_edit: true,
        post: Some(post),
    };
    Ok(Json(page).into_response())
}

/// Only the author may change a post. Everyone else is sent back to it,
/// whatever they submitted.
async fn edit_post(
    EditPostPath { id }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    form: Result<Json<PostForm>, ServerError>,
) -> Result<Redirect> {
    let post = fetch_post(&db, id).await?;
    if post.author.id != user.user_id() {
        debug!(%id, user = %user.user_id(), "Refusing to edit someone else's post");
        return Ok(post_redirect(id));
    }

    let Json(form) = form?;
    let content = validate_post_form(&db, form).await?;
    db.update_post(id, &content).await?;
    info!(%id, "Edited post");

    Ok(post_redirect(id))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment/", rejection(ServerError))]
struct CommentPath {
    id: Id<PostMarker>,
}

async fn comment_redirect(
    CommentPath { id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
) -> Result<Redirect> {
    fetch_post(&db, id).await?;

    Ok(post_redirect(id))
}

/// Blank or unreadable comments are dropped without complaint, the reader
/// lands on the post either way.
async fn add_comment(
    CommentPath { id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    form: Result<Json<CommentForm>, ServerError>,
) -> Result<Redirect> {
    fetch_post(&db, id).await?;

    match form.map(|Json(form)| form.validate()) {
        Ok(Ok(text)) => {
            let comment_id = db.create_comment(id, user.user_id(), &text).await?;
            debug!(%comment_id, post = %id, "Created comment");
        }
        Ok(Err(errors)) => debug!(?errors, post = %id, "Ignoring invalid comment"),
        Err(err) => debug!(%err, post = %id, "Ignoring unreadable comment"),
    }

    Ok(post_redirect(id))
}
