// src/handlers/auth.rs

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    common::{error::AppError, response::ApiResponse},
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::auth::{ChangePasswordPayload, LoginPayload, LoginResponse, RegisterPayload, Usuario},
    services::auth::require_super_admin,
};

// Handler de login
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    payload.validate()?;

    let resposta = app_state.auth_service.login(&payload.email, &payload.senha).await?;
    Ok(ApiResponse::ok(resposta))
}

// Handler da rota protegida /me
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> ApiResponse<Usuario> {
    ApiResponse::ok(user)
}

// Só super admin cadastra usuários avulsos
pub async fn register(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<RegisterPayload>,
) -> Result<ApiResponse<Usuario>, AppError> {
    require_super_admin(&user)?;
    payload.validate()?;

    let novo = app_state.auth_service.register(payload).await?;
    Ok(ApiResponse::created(novo))
}

pub async fn change_password(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<ApiResponse<()>, AppError> {
    payload.validate()?;

    app_state
        .auth_service
        .change_password(user.id, &payload.senha_atual, &payload.nova_senha)
        .await?;
    Ok(ApiResponse::message("Senha alterada com sucesso."))
}
