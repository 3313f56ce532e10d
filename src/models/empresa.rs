// src/models/empresa.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use uuid::Uuid;
use validator::Validate;

use crate::models::whatsapp::validar_instancia_opcional;

pub const CONFIGURACOES_VERSAO_ATUAL: u32 = 1;
pub const CONTEXTO_IA_PADRAO: &str = "Seja cordial e prestativo.";

fn historico_limite_padrao() -> u32 {
    10
}

fn verdadeiro() -> bool {
    true
}

// ---
// Configurações da empresa (versionadas)
// ---
// Guardadas como JSONB. Chaves desconhecidas são rejeitadas na escrita.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ConfiguracoesEmpresa {
    #[validate(range(min = 1, max = 1, message = "Versão de configuração não suportada."))]
    pub versao: u32,

    // Quantas mensagens recentes entram no histórico enviado à IA
    #[serde(default = "historico_limite_padrao")]
    #[validate(range(min = 1, max = 50, message = "O histórico deve ter entre 1 e 50 mensagens."))]
    pub historico_limite: u32,

    #[serde(default = "verdadeiro")]
    pub encaminhar_whatsapp: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 120, message = "O horário de atendimento deve ter no máximo 120 caracteres."))]
    pub horario_atendimento: Option<String>,
}

impl Default for ConfiguracoesEmpresa {
    fn default() -> Self {
        Self {
            versao: CONFIGURACOES_VERSAO_ATUAL,
            historico_limite: historico_limite_padrao(),
            encaminhar_whatsapp: true,
            horario_atendimento: None,
        }
    }
}

/// Erro de leitura das configurações enviadas pelo cliente da API.
#[derive(Debug, thiserror::Error)]
pub enum ConfiguracoesInvalidas {
    #[error("Formato inválido: {0}")]
    Formato(#[from] serde_json::Error),
    #[error("Valores inválidos: {0}")]
    Valores(#[from] validator::ValidationErrors),
}

impl ConfiguracoesEmpresa {
    pub fn from_value(value: Value) -> Result<Self, ConfiguracoesInvalidas> {
        let configuracoes: Self = serde_json::from_value(value)?;
        configuracoes.validate()?;
        Ok(configuracoes)
    }
}

// ---
// Empresa (o "tenant")
// ---
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Empresa {
    pub id: Uuid,
    pub nome: String,
    pub email: String,
    pub telefone: Option<String>,
    pub contexto_ia: String,
    pub mensagem_captura: Option<String>,
    pub whatsapp_instance: Option<String>,
    pub ativo: bool,
    pub configuracoes: Json<ConfiguracoesEmpresa>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEmpresaPayload {
    #[validate(length(min = 1, message = "O nome da empresa é obrigatório."))]
    pub nome: String,

    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,

    pub telefone: Option<String>,
    pub contexto_ia: Option<String>,
    pub mensagem_captura: Option<String>,
    #[validate(custom(function = "validar_instancia_opcional"))]
    pub whatsapp_instance: Option<String>,
    pub configuracoes: Option<Value>,

    // Senha do usuário de acesso criado junto com a empresa
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub senha: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateEmpresaPayload {
    #[validate(length(min = 1, message = "O nome da empresa não pode ser vazio."))]
    pub nome: Option<String>,

    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: Option<String>,

    pub telefone: Option<String>,
    pub contexto_ia: Option<String>,
    pub mensagem_captura: Option<String>,
    // "" remove o vínculo com a instância
    #[validate(custom(function = "validar_instancia_opcional"))]
    pub whatsapp_instance: Option<String>,
    pub ativo: Option<bool>,
    pub configuracoes: Option<Value>,
}

/// Empresa pronta para inserção (já validada).
#[derive(Debug, Clone)]
pub struct NovaEmpresa {
    pub nome: String,
    pub email: String,
    pub telefone: Option<String>,
    pub contexto_ia: String,
    pub mensagem_captura: Option<String>,
    pub whatsapp_instance: Option<String>,
    pub configuracoes: ConfiguracoesEmpresa,
}

/// Alteração parcial: `None` mantém o valor atual.
#[derive(Debug, Clone, Default)]
pub struct AtualizacaoEmpresa {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub contexto_ia: Option<String>,
    pub mensagem_captura: Option<String>,
    // `Some(None)` desvincula a instância
    pub whatsapp_instance: Option<Option<String>>,
    pub ativo: Option<bool>,
    pub configuracoes: Option<ConfiguracoesEmpresa>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn configuracoes_aplicam_padroes() {
        let cfg = ConfiguracoesEmpresa::from_value(json!({ "versao": 1 })).unwrap();
        assert_eq!(cfg, ConfiguracoesEmpresa::default());
    }

    #[test]
    fn configuracoes_rejeitam_chave_desconhecida() {
        let err = ConfiguracoesEmpresa::from_value(json!({ "versao": 1, "tema": "escuro" }));
        assert!(matches!(err, Err(ConfiguracoesInvalidas::Formato(_))));
    }

    #[test]
    fn configuracoes_rejeitam_versao_futura() {
        let err = ConfiguracoesEmpresa::from_value(json!({ "versao": 2 }));
        assert!(matches!(err, Err(ConfiguracoesInvalidas::Valores(_))));
    }

    #[test]
    fn instancia_da_empresa_e_validada() {
        let invalida = UpdateEmpresaPayload {
            whatsapp_instance: Some("../sendText/loja-vitima".into()),
            ..Default::default()
        };
        assert!(invalida.validate().is_err());

        let vazia = UpdateEmpresaPayload { whatsapp_instance: Some(String::new()), ..Default::default() };
        assert!(vazia.validate().is_ok());
    }

    #[test]
    fn configuracoes_rejeitam_historico_fora_do_intervalo() {
        let err = ConfiguracoesEmpresa::from_value(json!({ "versao": 1, "historico_limite": 0 }));
        assert!(err.is_err());
    }
}
