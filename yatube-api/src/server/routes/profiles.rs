use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::Json,
    routes::{PageParams, PostsPage, Query},
};
use axum::{extract::State, response::Redirect};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use yatube_common::{
    model::{
        post::{Post, PostFilter},
        user::{User, UserHandle},
    },
    paginator::Page,
};
use yatube_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(profile)
        .typed_get(follow_author)
        .typed_get(unfollow_author)
        .typed_get(feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(ServerError))]
pub struct ProfilePath {
    pub username: UserHandle,
}

fn profile_redirect(author: User) -> Redirect {
    let profile = ProfilePath {
        username: author.handle,
    };
    Redirect::to(&profile.to_string())
}

async fn fetch_author(db: &DbClient, username: UserHandle) -> Result<User> {
    match db.fetch_user_by_handle(&username).await? {
        Some(author) => Ok(author),
        None => Err(ServerError::UserByHandleNotFound(username)),
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct ProfilePage {
    pub author: User,
    pub page: Page<Post>,
    pub posts_count: u64,
    /// Always false for anonymous visitors and on one's own profile.
    pub following: bool,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    Query(params): Query<PageParams>,
) -> Result<Json<ProfilePage>> {
    let author = fetch_author(&db, username).await?;
    let page = db
        .fetch_posts_page(PostFilter::Author(author.id), params.requested())
        .await?;

    let following = match viewer {
        Some(viewer) if viewer.user_id() != author.id => {
            db.is_following(viewer.user_id(), author.id).await?
        }
        _ => false,
    };

    Ok(Json(ProfilePage {
        posts_count: page.count,
        author,
        page,
        following,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow", rejection(ServerError))]
struct FollowPath {
    username: UserHandle,
}

async fn follow_author(
    FollowPath { username }: FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let author = fetch_author(&db, username).await?;
    db.follow(user.user_id(), author.id).await?;

    Ok(profile_redirect(author))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow", rejection(ServerError))]
struct UnfollowPath {
    username: UserHandle,
}

async fn unfollow_author(
    UnfollowPath { username }: UnfollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let author = fetch_author(&db, username).await?;
    let removed = db.unfollow(user.user_id(), author.id).await?;
    debug!(user = %user.user_id(), author = %author.id, removed, "Processed unfollow");

    Ok(profile_redirect(author))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(ServerError))]
struct FeedPath();

/// Posts of every author the user follows.
async fn feed(
    FeedPath(): FeedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(params): Query<PageParams>,
) -> Result<Json<PostsPage>> {
    let page = db
        .fetch_posts_page(PostFilter::FollowedBy(user.user_id()), params.requested())
        .await?;

    Ok(Json(PostsPage { page }))
}
