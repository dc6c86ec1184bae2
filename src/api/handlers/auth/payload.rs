//! Request bodies for the auth endpoints.
//!
//! Scripts post JSON; the server-rendered pages post urlencoded forms. Form
//! submissions are answered with `303` redirects instead of JSON bodies.

use async_trait::async_trait;
use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::{HeaderMap, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Whether the request carries an urlencoded form body.
pub(crate) fn is_form_post(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        })
}

/// A decoded auth body and how it was sent.
#[derive(Debug)]
pub(crate) enum Payload<T> {
    Json(T),
    Form(T),
}

impl<T> Payload<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Self::Json(value) | Self::Form(value) => value,
        }
    }

    pub(crate) const fn is_form(&self) -> bool {
        matches!(self, Self::Form(_))
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form_post(req.headers()) {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self::Form(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self::Json(value))
        }
    }
}
