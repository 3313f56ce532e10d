// src/handlers/empresas.rs

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, response::ApiResponse},
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::empresa::{CreateEmpresaPayload, Empresa, UpdateEmpresaPayload},
    services::auth::{ensure_empresa_access, require_super_admin},
};

// Público: usado pela página de captura e pelo widget
pub async fn list_empresas(
    State(app_state): State<AppState>,
) -> Result<ApiResponse<Vec<Empresa>>, AppError> {
    Ok(ApiResponse::ok(app_state.empresa_service.list().await?))
}

pub async fn get_empresa(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Empresa>, AppError> {
    Ok(ApiResponse::ok(app_state.empresa_service.get(id).await?))
}

pub async fn create_empresa(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateEmpresaPayload>,
) -> Result<ApiResponse<Empresa>, AppError> {
    require_super_admin(&user)?;
    payload.validate()?;

    let empresa = app_state.empresa_service.create(payload).await?;
    Ok(ApiResponse::created(empresa))
}

pub async fn update_empresa(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmpresaPayload>,
) -> Result<ApiResponse<Empresa>, AppError> {
    ensure_empresa_access(&user, id)?;
    // Ativar/desativar empresa é tarefa do super admin
    if payload.ativo.is_some() {
        require_super_admin(&user)?;
    }
    payload.validate()?;

    let empresa = app_state.empresa_service.update(id, payload).await?;
    Ok(ApiResponse::ok(empresa))
}

pub async fn delete_empresa(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    require_super_admin(&user)?;

    app_state.empresa_service.delete(id).await?;
    Ok(ApiResponse::message("Empresa removida com sucesso."))
}
