use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use courses::{Caller, DomainError};
use tracing::debug;

use crate::{error::AppError, state::State, store::Store};

/// Bearer-token identity. Tokens are issued by the auth service and resolved through the store.
pub struct Authenticated(pub Caller);

impl FromRequestParts<Arc<State>> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized)?;

        authenticate(state.store.as_ref(), token)
            .await
            .map(Authenticated)
    }
}

pub async fn authenticate(store: &dyn Store, token: &str) -> Result<Caller, AppError> {
    let Some(user_id) = store.session_user(token).await? else {
        debug!("Unknown session token");
        return Err(AppError::Unauthorized);
    };
    let user = store
        .get_user(user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if user.banned {
        return Err(DomainError::forbidden("account is banned").into());
    }

    Ok(Caller {
        id: user.id,
        role: user.role,
    })
}
