use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::Json,
    routes::{PageParams, Query},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use yatube_common::{
    model::{
        form::FormErrors,
        group::{Group, GroupForm, GroupSlug},
        post::{Post, PostFilter},
    },
    paginator::Page,
};
use yatube_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(group_posts)
        .typed_post(create_group)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPath {
    slug: GroupSlug,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct GroupPage {
    pub group: Group,
    pub page: Page<Post>,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    State(db): State<Arc<DbClient>>,
    Query(params): Query<PageParams>,
) -> Result<Json<GroupPage>> {
    let group = db
        .fetch_group_by_slug(&slug)
        .await?
        .ok_or(ServerError::GroupBySlugNotFound(slug))?;
    let page = db
        .fetch_posts_page(PostFilter::Group(group.id), params.requested())
        .await?;

    Ok(Json(GroupPage { group, page }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/groups/", rejection(ServerError))]
struct GroupsPath();

async fn create_group(
    GroupsPath(): GroupsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(form): Json<GroupForm>,
) -> Result<(StatusCode, Json<Group>)> {
    if !user.is_admin() {
        return Err(ServerError::AdminRequired);
    }

    let group = form.validate().map_err(ServerError::InvalidForm)?;
    let group = match db.create_group(&group).await {
        Ok(group) => group,
        Err(err) if err.is_unique_violation() => {
            return Err(ServerError::InvalidForm(FormErrors::single(
                "slug",
                "Group with this slug already exists.",
            )));
        }
        Err(err) => return Err(err.into()),
    };
    info!(slug = %group.slug, "Created group");

    Ok((StatusCode::CREATED, Json(group)))
}
