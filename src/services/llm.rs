// src/services/llm.rs
//
// Adaptador do Gemini: monta o prompt do atendimento e esconde a
// instabilidade de modelos atrás de um fallback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::{config::GeminiConfig, models::conversa::LinhaHistorico};

pub const RESPOSTA_NAO_CONFIGURADA: &str =
    "Desculpe, o serviço de IA não está configurado no momento.";
pub const RESPOSTA_FALHA: &str =
    "Desculpe, estou com dificuldades técnicas momentâneas. Por favor, aguarde um instante.";
const INSTRUCOES_PADRAO: &str = "Seja cordial, prestativo e profissional.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentimento {
    Positivo,
    Negativo,
    Neutro,
}

impl Sentimento {
    /// Interpreta a resposta do modelo; qualquer coisa fora do esperado vira neutro.
    pub fn from_resposta(resposta: &str) -> Self {
        let palavra = resposta
            .trim()
            .to_lowercase()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_string();
        match palavra.as_str() {
            "positivo" => Sentimento::Positivo,
            "negativo" => Sentimento::Negativo,
            _ => Sentimento::Neutro,
        }
    }
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Sempre devolve um texto não vazio; falhas viram mensagens de desculpas.
    async fn generate_reply(
        &self,
        mensagem: &str,
        contexto_empresa: &str,
        historico: &[LinhaHistorico],
    ) -> String;

    async fn classify_sentiment(&self, mensagem: &str) -> Sentimento;
}

pub fn montar_prompt(mensagem: &str, contexto_empresa: &str, historico: &[LinhaHistorico]) -> String {
    let instrucoes = match contexto_empresa.trim() {
        "" => INSTRUCOES_PADRAO,
        contexto => contexto,
    };
    let historico = historico
        .iter()
        .map(|linha| format!("{}: {}", linha.papel.rotulo(), linha.texto))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Você é um assistente virtual de atendimento ao cliente.\n\n\
         INSTRUÇÕES DA EMPRESA:\n{instrucoes}\n\n\
         HISTÓRICO DA CONVERSA:\n{historico}\n\n\
         MENSAGEM DO CLIENTE:\n{mensagem}\n\n\
         Responda de forma natural, útil e amigável:\n"
    )
}

fn prompt_sentimento(mensagem: &str) -> String {
    format!(
        "Analise o sentimento desta mensagem e responda APENAS com uma palavra: \
         positivo, negativo ou neutro.\n\nMensagem: \"{mensagem}\"\n\nSentimento:"
    )
}

#[derive(Debug, Error)]
enum LlmError {
    #[error("falha de rede: {0}")]
    Rede(#[from] reqwest::Error),
    #[error("modelo {modelo} respondeu {status}: {corpo}")]
    Resposta { modelo: String, status: u16, corpo: String },
    #[error("resposta sem texto")]
    SemTexto,
}

// --- Formato da API generateContent ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn texto(self) -> Option<String> {
        let texto: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        let texto = texto.trim();
        (!texto.is_empty()).then(|| texto.to_string())
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        if config.api_key.is_none() {
            tracing::warn!("⚠️ GEMINI_API_KEY não configurada. A IA responderá com mensagem padrão.");
        }
        Ok(Self { client, config })
    }

    async fn generate(&self, api_key: &str, modelo: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            modelo
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&json!({
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let corpo = response.text().await.unwrap_or_default();
            return Err(LlmError::Resposta { modelo: modelo.to_string(), status: status.as_u16(), corpo });
        }

        response
            .json::<GenerateContentResponse>()
            .await?
            .texto()
            .ok_or(LlmError::SemTexto)
    }
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    async fn generate_reply(
        &self,
        mensagem: &str,
        contexto_empresa: &str,
        historico: &[LinhaHistorico],
    ) -> String {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return RESPOSTA_NAO_CONFIGURADA.to_string();
        };
        let prompt = montar_prompt(mensagem, contexto_empresa, historico);

        // Tenta o modelo mais novo primeiro
        match self.generate(api_key, &self.config.modelo, &prompt).await {
            Ok(resposta) => return resposta,
            Err(e) => tracing::warn!(
                "⚠️ Falha no {}, tentando fallback para {}: {}",
                self.config.modelo,
                self.config.modelo_fallback,
                e
            ),
        }

        match self.generate(api_key, &self.config.modelo_fallback, &prompt).await {
            Ok(resposta) => resposta,
            Err(e) => {
                tracing::error!("❌ Erro na IA (ambos os modelos): {}", e);
                RESPOSTA_FALHA.to_string()
            }
        }
    }

    async fn classify_sentiment(&self, mensagem: &str) -> Sentimento {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Sentimento::Neutro;
        };
        // Modelo mais estável para tarefa simples
        match self.generate(api_key, &self.config.modelo_fallback, &prompt_sentimento(mensagem)).await {
            Ok(resposta) => Sentimento::from_resposta(&resposta),
            Err(e) => {
                tracing::warn!("⚠️ Erro ao analisar sentimento: {}", e);
                Sentimento::Neutro
            }
        }
    }
}
