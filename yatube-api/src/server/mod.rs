use crate::config::Settings;
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{extract::QueryRejection, typed_header::TypedHeaderRejection};
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use yatube_common::model::{
    Id,
    auth::{AuthTokenDecodeError, AuthTokenHashError},
    form::FormErrors,
    group::GroupSlug,
    post::PostMarker,
    user::UserHandle,
};
use yatube_db::client::{DbClient, DbError};

pub mod auth;
pub mod cache;
mod json;
mod routes;
#[cfg(test)]
mod testing;

pub use cache::PageCache;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub page_cache: PageCache,
    pub settings: Arc<Settings>,
}

impl ServerState {
    #[must_use]
    pub fn new(db_client: DbClient, settings: Settings) -> Self {
        let page_cache = PageCache::new(settings.cache_ttl, settings.cache_key_prefix.clone());

        Self {
            db_client: Arc::new(db_client),
            page_cache,
            settings: Arc::new(settings),
        }
    }
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete application, ready to be served.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Login required, redirecting to {0}")]
    LoginRequired(String),
    #[error("Only administrators may do this")]
    AdminRequired,
    #[error("Submitted form was invalid")]
    InvalidForm(FormErrors),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with handle {0} was not found.")]
    UserByHandleNotFound(UserHandle),
    #[error("Group with slug {0} was not found.")]
    GroupBySlugNotFound(GroupSlug),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByHandleNotFound(_)
            | ServerError::GroupBySlugNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::LoginRequired(_) => StatusCode::SEE_OTHER,
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::AdminRequired => StatusCode::FORBIDDEN,
            ServerError::InvalidForm(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::JsonRejection(_)
            | ServerError::QueryRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FormErrors>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (path, errors) = match self {
            ServerError::LoginRequired(target) => {
                debug!(%target, "Redirecting anonymous request to login");
                return Redirect::to(&target).into_response();
            }
            ServerError::InvalidForm(errors) => {
                debug!(?errors, "Rejecting invalid form");
                (None, Some(errors))
            }
            ServerError::UnknownRoute(uri) => {
                debug!(%uri, "Unknown route");
                (Some(uri.path().to_owned()), None)
            }
            error => {
                error!(%error, %status, "Replying with error");
                (None, None)
            }
        };

        let error_response = ErrorResponse {
            status: status.as_u16(),
            path,
            errors,
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::{
        ErrorResponse,
        testing::{TestApp, body_json},
    };
    use axum::http::StatusCode;

    #[tokio::test]
    async fn unknown_route() {
        let app = TestApp::new().await;

        let response = app.get("/unexisting_page/", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.status, 404);
        assert_eq!(body.path.as_deref(), Some("/unexisting_page/"));
    }

    #[tokio::test]
    async fn malformed_ids_are_not_found() {
        let app = TestApp::new().await;

        let response = app.get("/posts/abc/", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
