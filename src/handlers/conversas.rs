// src/handlers/conversas.rs

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    common::{error::AppError, response::ApiResponse},
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::Usuario,
        conversa::{
            Conversa, ConversaDetalhe, ConversaFiltro, ConversaResumo, ConversaStats,
            ConversaStatus, UpdateStatusPayload,
        },
    },
    services::{auth::ensure_empresa_access, conversation_service::limite_listagem},
};

// Filtros da query string: ?empresa_id=...&status=...&limite=...
#[derive(Debug, Default, Deserialize)]
pub struct ListarConversasQuery {
    pub empresa_id: Option<Uuid>,
    pub status: Option<String>,
    pub limite: Option<i64>,
}

fn status_do_filtro(status: Option<&str>) -> Result<Option<ConversaStatus>, AppError> {
    match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => ConversaStatus::parse(s).map(Some).ok_or(AppError::StatusInvalido),
        None => Ok(None),
    }
}

/// Cliente só enxerga a própria empresa; super admin escolhe (ou não) pelo filtro.
fn empresa_do_filtro(user: &Usuario, pedida: Option<Uuid>) -> Result<Option<Uuid>, AppError> {
    if user.is_super_admin() {
        return Ok(pedida);
    }
    let propria = user.empresa_id.ok_or(AppError::Forbidden)?;
    match pedida {
        Some(id) if id != propria => Err(AppError::Forbidden),
        _ => Ok(Some(propria)),
    }
}

pub async fn list_conversas(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ListarConversasQuery>,
) -> Result<ApiResponse<Vec<Conversa>>, AppError> {
    let filtro = ConversaFiltro {
        empresa_id: empresa_do_filtro(&user, query.empresa_id)?,
        status: status_do_filtro(query.status.as_deref())?,
        limite: limite_listagem(query.limite),
    };

    Ok(ApiResponse::ok(app_state.conversation_service.list(filtro).await?))
}

pub async fn list_by_empresa(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(empresa_id): Path<Uuid>,
    Query(query): Query<ListarConversasQuery>,
) -> Result<ApiResponse<Vec<ConversaResumo>>, AppError> {
    ensure_empresa_access(&user, empresa_id)?;
    let status = status_do_filtro(query.status.as_deref())?;

    let conversas = app_state
        .conversation_service
        .list_by_empresa(empresa_id, status, limite_listagem(query.limite))
        .await?;
    Ok(ApiResponse::ok(conversas))
}

pub async fn stats(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(empresa_id): Path<Uuid>,
) -> Result<ApiResponse<ConversaStats>, AppError> {
    ensure_empresa_access(&user, empresa_id)?;
    Ok(ApiResponse::ok(app_state.conversation_service.stats(empresa_id).await?))
}

pub async fn get_conversa(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<ConversaDetalhe>, AppError> {
    let detalhe = app_state.conversation_service.detail(id).await?;
    ensure_empresa_access(&user, detalhe.conversa.empresa_id)?;
    Ok(ApiResponse::ok(detalhe))
}

pub async fn update_status(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<ApiResponse<Conversa>, AppError> {
    let conversa = app_state.conversation_service.get(id).await?;
    ensure_empresa_access(&user, conversa.empresa_id)?;

    let atualizada = app_state
        .conversation_service
        .update_status(id, &payload.status)
        .await?;
    Ok(ApiResponse::ok(atualizada))
}
