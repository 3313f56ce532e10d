// src/services/conversation_service.rs
//
// Fluxo de atendimento: mensagem do cliente -> conversa -> resposta da IA.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::{best_effort::best_effort, error::AppError},
    db::{ConversaRepository, EmpresaRepository},
    models::{
        conversa::{
            Canal, Conversa, ConversaDetalhe, ConversaFiltro, ConversaResumo, ConversaStats,
            ConversaStatus, LinhaHistorico, Mensagem, MensagemEntrada, MensagemTipo, NovaConversa,
            ResultadoAtendimento,
        },
        whatsapp::{MensagemRecebida, WebhookEvent, EVENTO_MENSAGEM_RECEBIDA},
    },
    services::{llm::ReplyGenerator, whatsapp::WhatsAppGateway},
};

pub const NOME_CLIENTE_PADRAO: &str = "Cliente";
pub const NOME_CLIENTE_WHATSAPP: &str = "Cliente WhatsApp";
pub const LIMITE_PADRAO: i64 = 50;
pub const LIMITE_MAXIMO: i64 = 200;

/// Resultado do processamento de um evento do webhook.
#[derive(Debug)]
pub enum WebhookOutcome {
    Ignorado(&'static str),
    Processado(ResultadoAtendimento),
    EmpresaNaoEncontrada,
}

pub fn limite_listagem(limite: Option<i64>) -> i64 {
    limite.unwrap_or(LIMITE_PADRAO).clamp(1, LIMITE_MAXIMO)
}

fn texto_opcional(valor: Option<String>) -> Option<String> {
    valor.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct ConversationService {
    empresa_repo: Arc<dyn EmpresaRepository>,
    conversa_repo: Arc<dyn ConversaRepository>,
    llm: Arc<dyn ReplyGenerator>,
    whatsapp: Arc<dyn WhatsAppGateway>,
}

impl ConversationService {
    pub fn new(
        empresa_repo: Arc<dyn EmpresaRepository>,
        conversa_repo: Arc<dyn ConversaRepository>,
        llm: Arc<dyn ReplyGenerator>,
        whatsapp: Arc<dyn WhatsAppGateway>,
    ) -> Self {
        Self { empresa_repo, conversa_repo, llm, whatsapp }
    }

    pub async fn handle_inbound_message(
        &self,
        entrada: MensagemEntrada,
    ) -> Result<ResultadoAtendimento, AppError> {
        // 1. Empresa e o contexto da IA
        let empresa = self
            .empresa_repo
            .find_by_id(entrada.empresa_id)
            .await?
            .ok_or(AppError::EmpresaNotFound)?;

        // 2. Conversa ativa do cliente (ou uma nova)
        let telefone = texto_opcional(entrada.cliente_telefone);
        let conversa = self
            .conversa_repo
            .find_or_create_active(NovaConversa {
                empresa_id: empresa.id,
                cliente_nome: texto_opcional(entrada.cliente_nome)
                    .unwrap_or_else(|| NOME_CLIENTE_PADRAO.to_string()),
                cliente_telefone: telefone.clone(),
                cliente_email: texto_opcional(entrada.cliente_email),
                canal: entrada.canal,
            })
            .await?;

        // 3. Mensagem do cliente
        self.conversa_repo
            .insert_message(conversa.id, MensagemTipo::Cliente, &entrada.texto)
            .await?;

        // 4. Histórico recente, em ordem cronológica
        let limite = i64::from(empresa.configuracoes.historico_limite);
        let historico: Vec<LinhaHistorico> = self
            .conversa_repo
            .recent_messages(conversa.id, limite)
            .await?
            .into_iter()
            .rev()
            .map(|m| LinhaHistorico { papel: m.tipo.into(), texto: m.conteudo })
            .collect();

        // 5. Resposta da IA (nunca falha)
        let resposta = self
            .llm
            .generate_reply(&entrada.texto, &empresa.contexto_ia, &historico)
            .await;

        // 6. Resposta do bot
        self.conversa_repo
            .insert_message(conversa.id, MensagemTipo::Bot, &resposta)
            .await?;

        // 7. Encaminha pelo WhatsApp, só para mensagens que chegaram pela instância
        let encaminhar = entrada.canal == Canal::Whatsapp
            && self.whatsapp.is_configured()
            && empresa.configuracoes.encaminhar_whatsapp;
        match (entrada.instancia.as_deref(), telefone.as_deref()) {
            (Some(instancia), Some(telefone)) if encaminhar => {
                best_effort(
                    "encaminhar resposta ao WhatsApp",
                    self.whatsapp.send_text(instancia, telefone, &resposta),
                )
                .await;
            }
            (Some(_), None) if encaminhar => tracing::warn!(
                "⚠️ Conversa {} sem telefone; resposta não encaminhada",
                conversa.id
            ),
            _ => {}
        }

        Ok(ResultadoAtendimento { conversa_id: conversa.id, resposta })
    }

    pub async fn process_webhook_event(&self, evento: WebhookEvent) -> Result<WebhookOutcome, AppError> {
        if evento.event != EVENTO_MENSAGEM_RECEBIDA {
            return Ok(WebhookOutcome::Ignorado("Evento ignorado"));
        }

        // Algumas versões do gateway mandam `data` como lista
        let data = match evento.data {
            serde_json::Value::Array(mut itens) if !itens.is_empty() => itens.swap_remove(0),
            outro => outro,
        };
        let Ok(recebida) = serde_json::from_value::<MensagemRecebida>(data) else {
            return Ok(WebhookOutcome::Ignorado("Payload não reconhecido"));
        };

        // Eco das nossas próprias respostas
        if recebida.key.from_me {
            return Ok(WebhookOutcome::Ignorado("Mensagem enviada pela própria instância"));
        }
        let Some(texto) = recebida.texto() else {
            return Ok(WebhookOutcome::Ignorado("Mensagem sem texto"));
        };
        // Grupos e listas de transmissão não são atendidos
        let Some(telefone) = recebida.telefone() else {
            return Ok(WebhookOutcome::Ignorado("Mensagem fora de conversa individual"));
        };

        let Some(empresa) = self.empresa_repo.find_by_instance(&evento.instance).await? else {
            tracing::warn!("📵 Nenhuma empresa vinculada à instância '{}'", evento.instance);
            return Ok(WebhookOutcome::EmpresaNaoEncontrada);
        };

        tracing::info!("📩 [{}] Mensagem de {}", evento.instance, telefone);

        let resultado = self
            .handle_inbound_message(MensagemEntrada {
                empresa_id: empresa.id,
                cliente_nome: Some(
                    recebida
                        .push_name
                        .clone()
                        .unwrap_or_else(|| NOME_CLIENTE_WHATSAPP.to_string()),
                ),
                cliente_telefone: Some(telefone.to_string()),
                cliente_email: None,
                canal: Canal::Whatsapp,
                texto: texto.to_string(),
                instancia: Some(evento.instance),
            })
            .await?;

        Ok(WebhookOutcome::Processado(resultado))
    }

    pub async fn get(&self, id: Uuid) -> Result<Conversa, AppError> {
        self.conversa_repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::ConversaNotFound)
    }

    /// Todas as mensagens da conversa, da mais antiga para a mais nova.
    pub async fn history(&self, conversa_id: Uuid) -> Result<Vec<Mensagem>, AppError> {
        let conversa = self.get(conversa_id).await?;
        self.conversa_repo.messages(conversa.id).await
    }

    pub async fn list(&self, filtro: ConversaFiltro) -> Result<Vec<Conversa>, AppError> {
        self.conversa_repo.list(filtro).await
    }

    pub async fn list_by_empresa(
        &self,
        empresa_id: Uuid,
        status: Option<ConversaStatus>,
        limite: i64,
    ) -> Result<Vec<ConversaResumo>, AppError> {
        self.conversa_repo
            .list_with_counts(ConversaFiltro { empresa_id: Some(empresa_id), status, limite })
            .await
    }

    pub async fn detail(&self, id: Uuid) -> Result<ConversaDetalhe, AppError> {
        let conversa = self.get(id).await?;
        let mensagens = self.conversa_repo.messages(id).await?;
        Ok(ConversaDetalhe { conversa, mensagens })
    }

    pub async fn stats(&self, empresa_id: Uuid) -> Result<ConversaStats, AppError> {
        self.conversa_repo.stats(empresa_id).await
    }

    pub async fn update_status(&self, id: Uuid, status: &str) -> Result<Conversa, AppError> {
        let destino = ConversaStatus::parse(status).ok_or(AppError::StatusInvalido)?;
        let atual = self.get(id).await?;

        if !atual.status.pode_transitar_para(destino) {
            return Err(AppError::StatusInvalido);
        }
        if atual.status == destino {
            return Ok(atual);
        }

        let conversa = self
            .conversa_repo
            .update_status(id, destino)
            .await?
            .ok_or(AppError::ConversaNotFound)?;

        tracing::info!("📋 Conversa {} movida para {:?}", id, destino);
        Ok(conversa)
    }
}
