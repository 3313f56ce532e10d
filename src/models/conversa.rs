// src/models/conversa.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// --- ENUMS ---

// Mapeia o CREATE TYPE conversa_canal do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "conversa_canal", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Canal {
    #[default]
    Web,
    Whatsapp,
    Landing,
    Manual,
}

// Mapeia o CREATE TYPE conversa_status do banco (as colunas do Kanban).
// "encerrada" e "humano" são grafias antigas aceitas só na entrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "conversa_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversaStatus {
    Ativa,
    #[serde(alias = "encerrada")]
    Finalizada,
    #[serde(alias = "humano")]
    Aguardando,
}

// Movimentos permitidos entre colunas do Kanban
const TRANSICOES: &[(ConversaStatus, ConversaStatus)] = &[
    (ConversaStatus::Ativa, ConversaStatus::Aguardando),
    (ConversaStatus::Ativa, ConversaStatus::Finalizada),
    (ConversaStatus::Aguardando, ConversaStatus::Ativa),
    (ConversaStatus::Aguardando, ConversaStatus::Finalizada),
    (ConversaStatus::Finalizada, ConversaStatus::Ativa),
    (ConversaStatus::Finalizada, ConversaStatus::Aguardando),
];

impl ConversaStatus {
    /// Lê o status vindo da API, normalizando as grafias antigas.
    pub fn parse(valor: &str) -> Option<Self> {
        match valor.trim().to_lowercase().as_str() {
            "ativa" => Some(Self::Ativa),
            "finalizada" | "encerrada" => Some(Self::Finalizada),
            "aguardando" | "humano" => Some(Self::Aguardando),
            _ => None,
        }
    }

    pub fn pode_transitar_para(self, destino: Self) -> bool {
        self == destino || TRANSICOES.contains(&(self, destino))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "mensagem_tipo", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MensagemTipo {
    Cliente,
    Bot,
}

// --- ENTIDADES ---

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversa {
    pub id: Uuid,
    pub empresa_id: Uuid,
    pub cliente_nome: String,
    pub cliente_telefone: Option<String>,
    pub cliente_email: Option<String>,
    pub canal: Canal,
    pub status: ConversaStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Mensagens são só-inserção: nunca editadas nem removidas
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Mensagem {
    pub id: Uuid,
    pub conversa_id: Uuid,
    pub tipo: MensagemTipo,
    pub conteudo: String,
    pub created_at: DateTime<Utc>,
}

/// Conversa com a contagem de mensagens (listagem por empresa).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversaResumo {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub conversa: Conversa,
    pub total_mensagens: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversaDetalhe {
    #[serde(flatten)]
    pub conversa: Conversa,
    pub mensagens: Vec<Mensagem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
pub struct ConversaStats {
    pub total: i64,
    pub ativas: i64,
    pub finalizadas: i64,
    pub aguardando: i64,
    pub hoje: i64,
}

#[derive(Debug, Clone)]
pub struct ConversaFiltro {
    pub empresa_id: Option<Uuid>,
    pub status: Option<ConversaStatus>,
    pub limite: i64,
}

/// Dados do cliente para abrir uma conversa.
#[derive(Debug, Clone)]
pub struct NovaConversa {
    pub empresa_id: Uuid,
    pub cliente_nome: String,
    pub cliente_telefone: Option<String>,
    pub cliente_email: Option<String>,
    pub canal: Canal,
}

// --- ATENDIMENTO ---

/// Uma mensagem de entrada, de qualquer canal.
#[derive(Debug, Clone)]
pub struct MensagemEntrada {
    pub empresa_id: Uuid,
    pub cliente_nome: Option<String>,
    pub cliente_telefone: Option<String>,
    pub cliente_email: Option<String>,
    pub canal: Canal,
    pub texto: String,
    // Instância do gateway de onde a mensagem veio (webhook)
    pub instancia: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultadoAtendimento {
    pub conversa_id: Uuid,
    pub resposta: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Papel {
    Cliente,
    Assistente,
}

impl Papel {
    pub fn rotulo(self) -> &'static str {
        match self {
            Papel::Cliente => "Cliente",
            Papel::Assistente => "Assistente",
        }
    }
}

impl From<MensagemTipo> for Papel {
    fn from(tipo: MensagemTipo) -> Self {
        match tipo {
            MensagemTipo::Cliente => Papel::Cliente,
            MensagemTipo::Bot => Papel::Assistente,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinhaHistorico {
    pub papel: Papel,
    pub texto: String,
}

// --- PAYLOADS ---

fn texto_nao_vazio(texto: &str) -> Result<(), ValidationError> {
    if texto.trim().is_empty() {
        let mut err = ValidationError::new("length");
        err.message = Some("A mensagem é obrigatória.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatMensagemPayload {
    #[validate(required(message = "empresa_id é obrigatório."))]
    pub empresa_id: Option<Uuid>,

    pub cliente_nome: Option<String>,
    pub cliente_telefone: Option<String>,
    pub cliente_email: Option<String>,

    #[serde(default)]
    #[validate(custom(function = "texto_nao_vazio"))]
    pub mensagem: String,

    pub canal: Option<Canal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SentimentoPayload {
    #[validate(custom(function = "texto_nao_vazio"))]
    pub mensagem: String,
}
