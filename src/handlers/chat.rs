// src/handlers/chat.rs
//
// Rotas do widget de chat (públicas) e a análise de sentimento.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, response::ApiResponse},
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::conversa::{
        ChatMensagemPayload, Mensagem, MensagemEntrada, ResultadoAtendimento, SentimentoPayload,
    },
};

pub async fn enviar_mensagem(
    State(app_state): State<AppState>,
    Json(payload): Json<ChatMensagemPayload>,
) -> Result<ApiResponse<ResultadoAtendimento>, AppError> {
    payload.validate()?;
    let empresa_id = payload
        .empresa_id
        .ok_or_else(|| AppError::BadRequest("empresa_id é obrigatório.".to_string()))?;

    let resultado = app_state
        .conversation_service
        .handle_inbound_message(MensagemEntrada {
            empresa_id,
            cliente_nome: payload.cliente_nome,
            cliente_telefone: payload.cliente_telefone,
            cliente_email: payload.cliente_email,
            canal: payload.canal.unwrap_or_default(),
            texto: payload.mensagem.trim().to_string(),
            instancia: None,
        })
        .await?;

    Ok(ApiResponse::ok(resultado))
}

pub async fn historico(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Vec<Mensagem>>, AppError> {
    Ok(ApiResponse::ok(app_state.conversation_service.history(id).await?))
}

pub async fn sentimento(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<SentimentoPayload>,
) -> Result<ApiResponse<Value>, AppError> {
    payload.validate()?;

    let sentimento = app_state.llm.classify_sentiment(&payload.mensagem).await;
    Ok(ApiResponse::ok(json!({ "sentimento": sentimento })))
}
