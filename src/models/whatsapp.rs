// src/models/whatsapp.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

pub const EVENTO_MENSAGEM_RECEBIDA: &str = "messages.upsert";
const SUFIXO_CONTATO: &str = "@s.whatsapp.net";

// O nome vira segmento de URL da Evolution API
pub static INSTANCIA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("regex de instância inválida")
});

pub fn instancia_valida(nome: &str) -> bool {
    INSTANCIA_REGEX.is_match(nome)
}

/// Aceita vazio (remove o vínculo) ou um nome de instância válido.
pub fn validar_instancia_opcional(nome: &str) -> Result<(), ValidationError> {
    if nome.is_empty() || instancia_valida(nome) {
        Ok(())
    } else {
        let mut err = ValidationError::new("whatsapp_instance");
        err.message = Some("A instância deve ter até 64 letras, números, '-' ou '_'.".into());
        Err(err)
    }
}

// ---
// Envelope do webhook da Evolution API
// ---
// `data` fica cru: só é interpretado para o evento de mensagem recebida,
// os outros eventos têm formatos variados (inclusive arrays).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MensagemRecebida {
    #[serde(default)]
    pub key: ChaveMensagem,
    pub message: Option<ConteudoMensagem>,
    pub push_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaveMensagem {
    #[serde(default)]
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConteudoMensagem {
    pub conversation: Option<String>,
    pub extended_text_message: Option<TextoEstendido>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextoEstendido {
    pub text: Option<String>,
}

impl MensagemRecebida {
    /// Texto da mensagem, vazio quando é mídia ou figurinha.
    pub fn texto(&self) -> Option<&str> {
        let message = self.message.as_ref()?;
        message
            .conversation
            .as_deref()
            .or_else(|| message.extended_text_message.as_ref()?.text.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// "5511999990000@s.whatsapp.net" -> "5511999990000". Grupos e listas não têm telefone.
    pub fn telefone(&self) -> Option<&str> {
        self.key
            .remote_jid
            .trim()
            .strip_suffix(SUFIXO_CONTATO)
            .filter(|numero| !numero.is_empty())
    }
}

// ---
// Resultados do gateway
// ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrCodeResultado {
    QrCode(String),
    JaConectado,
    Indisponivel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EstadoConexao {
    #[serde(rename = "connected")]
    Conectado,
    #[serde(rename = "disconnected")]
    Desconectado,
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate)]
pub struct EnviarPayload {
    #[validate(regex(path = *INSTANCIA_REGEX, message = "instance inválida."))]
    #[serde(default)]
    pub instance: String,
    #[validate(length(min = 1, message = "telefone é obrigatório."))]
    #[serde(default)]
    pub telefone: String,
    #[validate(length(min = 1, message = "mensagem é obrigatória."))]
    #[serde(default)]
    pub mensagem: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QrCodePayload {
    #[validate(regex(path = *INSTANCIA_REGEX, message = "instanceName inválido."))]
    #[serde(default)]
    pub instance_name: String,
}
