//! Drives the full router in-process against a private in-memory database.

use crate::{
    config::Settings,
    server::{ServerState, app},
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower::ServiceExt;
use yatube_common::model::user::User;
use yatube_db::client::DbClient;

pub const ADMIN: &str = "admin";

pub struct TestApp {
    pub state: ServerState,
    router: Router,
}

/// A signed up account.
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let settings = Settings {
            admin_handles: vec![ADMIN.to_owned()],
            ..Settings::default()
        };
        let db_client = DbClient::in_memory().await.unwrap();
        let state = ServerState::new(db_client, settings);
        let router = app(state.clone());

        Self { state, router }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut request = Request::get(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: &Value) -> Response {
        self.post_raw(uri, token, "application/json", body.to_string())
            .await
    }

    pub async fn post_raw(
        &self,
        uri: &str,
        token: Option<&str>,
        content_type: &str,
        body: impl Into<Body>,
    ) -> Response {
        let mut request = Request::post(uri).header(header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(request.body(body.into()).unwrap()).await
    }

    pub async fn signup(&self, handle: &str) -> TestUser {
        let response = self
            .post("/auth/signup/", None, &json!({ "handle": handle }))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let signup: Value = body_json(response).await;
        TestUser {
            user: serde_json::from_value(signup["user"].clone()).unwrap(),
            token: signup["token"].as_str().unwrap().to_owned(),
        }
    }

    /// Creates a group as `admin` and returns its id.
    pub async fn create_group(&self, admin: &TestUser, slug: &str) -> i64 {
        let response = self
            .post(
                "/groups/",
                Some(&admin.token),
                &json!({
                    "title": format!("Группа {slug}"),
                    "slug": slug,
                    "description": "Тестовое описание",
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let group: Value = body_json(response).await;
        group["id"].as_i64().unwrap()
    }

    /// Publishes a post as `author`.
    pub async fn create_post(&self, author: &TestUser, text: &str, group: Option<i64>) {
        let response = self
            .post(
                "/create/",
                Some(&author.token),
                &json!({ "text": text, "group": group }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    /// Texts of the posts a listing shows, in order.
    pub async fn listed_texts(&self, uri: &str, token: Option<&str>) -> Vec<String> {
        let response = self.get(uri, token).await;
        assert_eq!(response.status(), StatusCode::OK);

        let listing: Value = body_json(response).await;
        listing["page"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|post| post["text"].as_str().unwrap().to_owned())
            .collect()
    }
}

pub async fn body_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}
