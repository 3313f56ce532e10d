use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::empresa::ConfiguracoesInvalidas;

/// Falhas do gateway de WhatsApp (Evolution API).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Evolution API não configurada")]
    NaoConfigurado,

    #[error("Falha de rede com a Evolution API: {0}")]
    Rede(#[from] reqwest::Error),

    #[error("Evolution API respondeu {status}: {corpo}")]
    Resposta { status: u16, corpo: String },

    #[error("Nome de instância inválido: {0}")]
    InstanciaInvalida(String),

    #[error("URL da Evolution API inválida: {0}")]
    UrlInvalida(String),
}

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("Configurações inválidas: {0}")]
    ConfiguracoesInvalidas(#[from] ConfiguracoesInvalidas),

    #[error("Status inválido")]
    StatusInvalido,

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Instância de WhatsApp já vinculada a outra empresa")]
    InstanciaEmUso,

    #[error("O cliente já possui uma conversa ativa")]
    ConversaAtivaExistente,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Senha atual incorreta")]
    SenhaAtualIncorreta,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Empresa não encontrada")]
    EmpresaNotFound,

    #[error("Conversa não encontrada")]
    ConversaNotFound,

    #[error("Erro do gateway: {0}")]
    Gateway(#[from] GatewayError),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::BadRequest(_)
            | AppError::ConfiguracoesInvalidas(_)
            | AppError::StatusInvalido => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::SenhaAtualIncorreta
            | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UserNotFound | AppError::EmpresaNotFound | AppError::ConversaNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::EmailAlreadyExists
            | AppError::InstanciaEmUso
            | AppError::ConversaAtivaExistente => StatusCode::CONFLICT,
            AppError::Gateway(GatewayError::NaoConfigurado) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Gateway(GatewayError::InstanciaInvalida(_)) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "success": false,
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (status, body).into_response();
            }
            AppError::BadRequest(msg) => msg,
            AppError::ConfiguracoesInvalidas(e) => format!("Configurações inválidas. {}", e),
            AppError::StatusInvalido => {
                "Status inválido. Use: ativa, finalizada ou aguardando.".to_string()
            }
            AppError::EmailAlreadyExists => "Este e-mail já está cadastrado.".to_string(),
            AppError::InstanciaEmUso => {
                "Esta instância de WhatsApp já está vinculada a outra empresa.".to_string()
            }
            AppError::ConversaAtivaExistente => {
                "Este cliente já possui uma conversa ativa.".to_string()
            }
            // Nunca diz se foi o e-mail ou a senha que falhou
            AppError::InvalidCredentials => "E-mail ou senha inválidos.".to_string(),
            AppError::SenhaAtualIncorreta => "Senha atual incorreta.".to_string(),
            AppError::InvalidToken => "Token de autenticação inválido ou ausente.".to_string(),
            AppError::Forbidden => "Você não tem permissão para esta ação.".to_string(),
            AppError::UserNotFound => "Usuário não encontrado.".to_string(),
            AppError::EmpresaNotFound => "Empresa não encontrada.".to_string(),
            AppError::ConversaNotFound => "Conversa não encontrada.".to_string(),
            AppError::Gateway(e) => {
                tracing::warn!("📵 Falha no gateway de WhatsApp: {}", e);
                e.to_string()
            }

            // Todos os outros erros viram 500.
            // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("🔥 Erro Interno do Servidor: {}", e);
                "Ocorreu um erro inesperado.".to_string()
            }
        };

        let body = Json(json!({ "success": false, "error": error_message }));
        (status, body).into_response()
    }
}

/// Converte violações de unicidade do Postgres nos erros de domínio.
pub(crate) fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("usuarios_email_key") | Some("empresas_email_key") => {
                    AppError::EmailAlreadyExists
                }
                Some("empresas_whatsapp_instance_key") => AppError::InstanciaEmUso,
                Some("conversas_ativa_por_cliente") => AppError::ConversaAtivaExistente,
                _ => AppError::DatabaseError(e),
            };
        }
    }
    e.into()
}
