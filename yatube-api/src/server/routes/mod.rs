use crate::server::{ServerError, ServerRouter};
use axum::extract::FromRequestParts;
use axum_extra::extract::Query as RepeatableQuery;
use serde::{Deserialize, Serialize};
use yatube_common::{model::post::Post, paginator::Page};

mod auth;
mod groups;
mod posts;
mod profiles;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(groups::routes())
        .merge(profiles::routes())
        .merge(auth::routes())
}

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(RepeatableQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

/// `?page=` of listings. Kept as text, the paginator settles on a page
/// whatever it says. A repeated key counts with its last value.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Vec<String>,
}

impl PageParams {
    #[must_use]
    pub fn requested(&self) -> Option<&str> {
        self.page.last().map(String::as_str)
    }
}

/// A listing that shows nothing but posts.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct PostsPage {
    pub page: Page<Post>,
}
