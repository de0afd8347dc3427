use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    body::Bytes,
    extract::FromRequest,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> Json<T> {
    /// Serializes ahead of responding, for bodies that get cached.
    pub fn to_bytes(&self) -> Result<JsonBytes, serde_json::Error> {
        serde_json::to_vec(&self.0).map(|json| JsonBytes(Bytes::from(json)))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match self.to_bytes() {
            Ok(json) => json.into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// An already serialized JSON body.
#[derive(Debug, Clone, Default)]
pub struct JsonBytes(pub Bytes);

impl IntoResponse for JsonBytes {
    fn into_response(self) -> Response {
        (TypedHeader(ContentType::json()), self.0).into_response()
    }
}
