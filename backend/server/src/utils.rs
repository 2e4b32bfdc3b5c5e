use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use courses::DomainError;
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub data: T,
}

pub fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    let envelope = Envelope {
        success: true,
        count: None,
        data,
    };

    (status, Json(envelope)).into_response()
}

pub fn respond_list<T: Serialize>(data: Vec<T>) -> Response {
    let envelope = Envelope {
        success: true,
        count: Some(data.len()),
        data,
    };

    (StatusCode::OK, Json(envelope)).into_response()
}

/// JSON body whose rejections come back as `InvalidInput` in the shared error envelope.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| DomainError::invalid(rejection.body_text()))?;

        Ok(Self(value))
    }
}
