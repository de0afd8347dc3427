use crate::{config::Settings, server::ServerError};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{Uri, request::Parts},
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::debug;
use yatube_common::model::{
    Id,
    auth::AuthToken,
    user::{User, UserMarker},
};
use yatube_db::client::DbClient;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Characters escaped in the `next` parameter of the login redirect:
/// everything but unreserved characters and `/`.
const NEXT_PARAM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The user behind the bearer token of a request.
///
/// Requests without a token are sent to the login page. Use
/// `Option<AuthenticatedUser>` where anonymous visitors are welcome; there a
/// token that does not check out makes the visitor anonymous.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    user: User,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }
}

/// Where an anonymous request for `uri` is sent to log in first.
#[must_use]
pub fn login_redirect_target(login_url: &str, uri: &Uri) -> String {
    let next = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |path_and_query| path_and_query.as_str());

    format!("{login_url}?next={}", utf8_percent_encode(next, NEXT_PARAM))
}

async fn authenticate<S>(
    parts: &mut Parts,
    state: &S,
) -> Result<Option<AuthenticatedUser>, ServerError>
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    let header = match <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
        .await
    {
        Ok(header) => header,
        Err(rejection) if rejection.is_missing() => return Ok(None),
        Err(rejection) => return Err(ServerError::InvalidAuthorizationHeader(rejection)),
    };

    let request_token: AuthToken = header.token().parse()?;
    let token_hash = request_token.hash()?;

    let db = Arc::<DbClient>::from_ref(state);
    let authentication = db
        .fetch_auth(&token_hash)
        .await?
        .ok_or(ServerError::InvalidToken)?;

    if authentication.user != request_token.user_id
        || authentication.is_expired_at(UtcDateTime::now())
    {
        return Err(ServerError::InvalidToken);
    }

    let user = db
        .fetch_user(authentication.user)
        .await?
        .ok_or(ServerError::InvalidToken)?;

    Ok(Some(AuthenticatedUser { user }))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    Arc<Settings>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await? {
            Some(user) => Ok(user),
            None => {
                let settings = Arc::<Settings>::from_ref(state);
                debug!(uri = %parts.uri, "Anonymous request needs a login");
                Err(ServerError::LoginRequired(login_redirect_target(
                    &settings.login_url,
                    &parts.uri,
                )))
            }
        }
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match authenticate(parts, state).await {
            Err(
                err @ (ServerError::InvalidToken
                | ServerError::InvalidAuthToken(_)
                | ServerError::InvalidAuthorizationHeader(_)),
            ) => {
                debug!(%err, uri = %parts.uri, "Treating unusable credentials as anonymous");
                Ok(None)
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::auth::login_redirect_target;
    use axum::http::Uri;

    #[test]
    fn next_keeps_the_path() {
        let uri: Uri = "/posts/1/edit/".parse().unwrap();
        assert_eq!(
            login_redirect_target("/auth/login/", &uri),
            "/auth/login/?next=/posts/1/edit/"
        );
    }

    #[test]
    fn next_escapes_the_query() {
        let uri: Uri = "/follow/?page=2&x=y".parse().unwrap();
        assert_eq!(
            login_redirect_target("/auth/login/", &uri),
            "/auth/login/?next=/follow/%3Fpage%3D2%26x%3Dy"
        );
    }

    #[test]
    fn next_escapes_reserved_handle_characters() {
        let uri: Uri = "/profile/a@b+c/follow".parse().unwrap();
        assert_eq!(
            login_redirect_target("/auth/login/", &uri),
            "/auth/login/?next=/profile/a%40b%2Bc/follow"
        );
    }

    #[test]
    fn next_keeps_non_ascii_paths_decodable() {
        // Clients send `/profile/Автор/follow` percent-encoded already.
        let uri: Uri = "/profile/%D0%90%D0%B2%D1%82%D0%BE%D1%80/follow"
            .parse()
            .unwrap();
        assert_eq!(
            login_redirect_target("/auth/login/", &uri),
            "/auth/login/?next=/profile/%25D0%2590%25D0%25B2%25D1%2582%25D0%25BE%25D1%2580/follow"
        );
    }
}
