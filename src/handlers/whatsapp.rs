// src/handlers/whatsapp.rs

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    common::{error::AppError, response::ApiResponse},
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::Usuario,
        whatsapp::{instancia_valida, EnviarPayload, QrCodePayload, QrCodeResultado, WebhookEvent},
    },
    services::conversation_service::WebhookOutcome,
};

/// Cliente só opera a instância vinculada à própria empresa.
async fn ensure_instance_access(
    app_state: &AppState,
    user: &Usuario,
    instance: &str,
) -> Result<(), AppError> {
    if !instancia_valida(instance) {
        return Err(AppError::BadRequest("Nome de instância inválido.".to_string()));
    }
    if user.is_super_admin() {
        return Ok(());
    }
    let empresa_id = user.empresa_id.ok_or(AppError::Forbidden)?;
    let empresa = app_state.empresa_service.get(empresa_id).await?;
    if empresa.whatsapp_instance.as_deref() == Some(instance) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

// Chamado pela Evolution API; eventos sem interesse respondem sucesso sem efeito
pub async fn webhook(
    State(app_state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let evento: WebhookEvent = serde_json::from_value(body).unwrap_or_default();

    let resposta = match app_state.conversation_service.process_webhook_event(evento).await? {
        WebhookOutcome::Ignorado(motivo) => ApiResponse::message(motivo).into_response(),
        WebhookOutcome::Processado(resultado) => ApiResponse::ok(resultado).into_response(),
        WebhookOutcome::EmpresaNaoEncontrada => {
            ApiResponse::business_error("Empresa não encontrada").into_response()
        }
    };
    Ok(resposta)
}

pub async fn enviar(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<EnviarPayload>,
) -> Result<ApiResponse<Value>, AppError> {
    payload.validate()?;
    ensure_instance_access(&app_state, &user, &payload.instance).await?;

    let resultado = app_state
        .whatsapp
        .send_text(&payload.instance, payload.telefone.trim(), &payload.mensagem)
        .await?;
    Ok(ApiResponse::ok(resultado))
}

pub async fn qrcode(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<QrCodePayload>,
) -> Result<Response, AppError> {
    payload.validate()?;
    ensure_instance_access(&app_state, &user, &payload.instance_name).await?;

    let resposta = match app_state.whatsapp.request_qr_code(&payload.instance_name).await? {
        QrCodeResultado::QrCode(qrcode) => {
            ApiResponse::ok(json!({ "qrcode": qrcode })).into_response()
        }
        QrCodeResultado::JaConectado => {
            ApiResponse::ok(json!({ "status": "connected" })).into_response()
        }
        QrCodeResultado::Indisponivel => ApiResponse::business_error(
            "Não foi possível obter o QR Code. Consulte os logs do backend.",
        )
        .into_response(),
    };
    Ok(resposta)
}

// Polling do painel: sempre responde, na dúvida "disconnected"
pub async fn status(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(instance_name): Path<String>,
) -> Result<Json<Value>, AppError> {
    ensure_instance_access(&app_state, &user, &instance_name).await?;

    let estado = app_state.whatsapp.connection_state(&instance_name).await;
    Ok(Json(json!({ "status": estado })))
}
