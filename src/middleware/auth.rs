use axum::{
    body::Body,
    extract::{Query, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use serde::Deserialize;

use crate::{AppState, error::AppError, utils::verify_token};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Requires a valid token and exposes its claims to the handler as an
/// `Extension<Claims>`. The `Authorization: Bearer` header wins over the
/// `?token=` query parameter.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = match bearer {
        Ok(TypedHeader(Authorization(bearer))) => Some(bearer.token().to_string()),
        // Missing or non-Bearer header, try the query string.
        Err(_) => Query::<TokenQuery>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(query)| query.token),
    };

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        tracing::debug!("Rejected request to {}: no token", req.uri().path());
        return Err(AppError::NotAuthenticated);
    };

    let claims = verify_token(&token, &state.config).map_err(|e| {
        tracing::debug!("Rejected request to {}: {}", req.uri().path(), e);
        AppError::InvalidToken
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
