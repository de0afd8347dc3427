use crate::{
    config::Settings,
    server::{Result, ServerError, ServerRouter, json::Json},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::info;
use yatube_common::model::{
    auth::{AuthToken, Authentication},
    form::FormErrors,
    user::{CreateUser, User, UserHandle},
};
use yatube_db::client::DbClient;

pub const HANDLE_TAKEN: &str = "A user with that username already exists.";

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(signup)
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub handle: String,
}

/// A fresh account and the bearer token to act as it.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Signup {
    pub user: User,
    pub token: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup/", rejection(ServerError))]
struct SignupPath();

async fn signup(
    SignupPath(): SignupPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    Json(form): Json<SignupForm>,
) -> Result<(StatusCode, Json<Signup>)> {
    let handle = UserHandle::new(form.handle)
        .map_err(|err| ServerError::InvalidForm(FormErrors::single("handle", err.to_string())))?;

    let taken = || ServerError::InvalidForm(FormErrors::single("handle", HANDLE_TAKEN));
    if db.fetch_user_by_handle(&handle).await?.is_some() {
        return Err(taken());
    }

    let is_admin = settings.is_admin_handle(&handle);
    let user = match db.create_user(&CreateUser { handle, is_admin }).await {
        Ok(user) => user,
        Err(err) if err.is_unique_violation() => return Err(taken()),
        Err(err) => return Err(err.into()),
    };

    let token = AuthToken::generate_random(user.id);
    let authentication = Authentication {
        user: user.id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: settings.token_lifetime,
    };
    db.create_auth(&authentication).await?;
    info!(user_id = %user.id, handle = %user.handle, is_admin, "Signed up user");

    Ok((
        StatusCode::CREATED,
        Json(Signup {
            user,
            token: token.as_token_str(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use crate::server::{
        routes::auth::HANDLE_TAKEN,
        testing::{TestApp, body_json},
    };
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use yatube_common::model::{Id, auth::AuthToken};

    #[tokio::test]
    async fn signup_hands_out_a_working_token() {
        let app = TestApp::new().await;
        let user = app.signup("auth").await;

        assert_eq!(user.user.handle.get(), "auth");
        assert!(!user.user.is_admin);

        let response = app.get("/create/", Some(&user.token)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn configured_handles_become_admins() {
        let app = TestApp::new().await;

        assert!(app.signup("admin").await.user.is_admin);
    }

    #[tokio::test]
    async fn handles_are_validated() {
        let app = TestApp::new().await;
        app.signup("auth").await;

        let response = app
            .post("/auth/signup/", None, &json!({ "handle": "auth" }))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = body_json(response).await;
        assert_eq!(body["errors"]["handle"], json!([HANDLE_TAKEN]));

        let response = app
            .post("/auth/signup/", None, &json!({ "handle": "no spaces" }))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_tokens_are_refused() {
        let app = TestApp::new().await;
        app.signup("auth").await;

        let forged = AuthToken::generate_random(Id::new(1)).as_token_str();
        let response = app.get("/create/", Some(&forged)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.get("/create/", Some("garbage")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn public_pages_ignore_unusable_tokens() {
        let app = TestApp::new().await;
        let author = app.signup("auth").await;
        let follower = app.signup("follower").await;
        app.get("/profile/auth/follow", Some(&follower.token)).await;

        let forged = AuthToken::generate_random(follower.user.id).as_token_str();
        for token in [forged.as_str(), "garbage"] {
            let response = app.get("/profile/auth/", Some(token)).await;
            assert_eq!(response.status(), StatusCode::OK);

            let profile: Value = body_json(response).await;
            assert_eq!(profile["author"]["id"], author.user.id.get());
            assert_eq!(profile["following"], false);

            let response = app.get("/", Some(token)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
