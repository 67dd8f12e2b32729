use axum::extract::{Extension, Json, State};

use crate::{
    AppState,
    error::AppError,
    utils::{Claims, generate_token},
};

use super::model::{CreateUserError, LoginRequest, LoginResponse, MessageResponse, RegisterRequest, User};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Username and password must not be empty".to_string(),
        ));
    }

    match User::create(&state.pool, &req).await {
        Ok(_) => Ok(Json(MessageResponse {
            message: "User registered successfully".to_string(),
        })),
        Err(CreateUserError::Duplicate) => {
            tracing::debug!("Registration refused for {}: already exists", req.username);
            Err(AppError::UserExists)
        }
        Err(CreateUserError::Hash(e)) => Err(e.into()),
        Err(CreateUserError::Database(e)) => Err(e.into()),
    }
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = User::authenticate(&state.pool, &req.username, &req.password)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let access_token = generate_token(&user.username, &state.config)?;
    tracing::info!("User logged in: {}", user.username);

    Ok(Json(LoginResponse {
        message: "Login successful!".to_string(),
        access_token,
        token_type: "bearer".to_string(),
    }))
}

#[axum::debug_handler]
pub async fn protected_endpoint(Extension(claims): Extension<Claims>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: format!("Hello, {}", claims.sub),
    })
}
