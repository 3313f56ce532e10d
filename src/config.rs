// src/config.rs

use std::{sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::{
    db::{
        ConversaRepository, EmpresaRepository, PgConversaRepository, PgEmpresaRepository,
        PgUserRepository, UserRepository,
    },
    services::{
        auth::AuthService,
        conversation_service::ConversationService,
        empresa_service::EmpresaService,
        llm::{GeminiClient, ReplyGenerator},
        whatsapp::{EvolutionClient, WhatsAppGateway},
    },
};

const GEMINI_API_URL_PADRAO: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODELO_PADRAO: &str = "gemini-2.5-flash";
const GEMINI_MODELO_FALLBACK_PADRAO: &str = "gemini-1.5-flash";
const PORTA_PADRAO: u16 = 3001;
const MAX_CONEXOES_PADRAO: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} deve ser definida")]
    Ausente(&'static str),

    #[error("{nome} inválida: {valor}")]
    Invalida { nome: &'static str, valor: String },
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub modelo: String,
    pub modelo_fallback: String,
}

#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub senha: String,
}

/// Configuração do processo, lida uma única vez na inicialização.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub port: u16,
    pub gemini: GeminiConfig,
    pub evolution: Option<EvolutionConfig>,
    pub admin: Option<AdminBootstrap>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|nome| std::env::var(nome).ok())
    }

    /// Monta a configuração a partir de uma função de busca. Valores vazios contam como ausentes.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |nome: &str| {
            lookup(nome)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |nome: &'static str| get(nome).ok_or(ConfigError::Ausente(nome));

        let database_url = required("DATABASE_URL")?;
        // Sem segredo não há como assinar tokens com segurança
        let jwt_secret = required("JWT_SECRET")?;

        let port = match get("PORT") {
            Some(valor) => valor
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalida { nome: "PORT", valor })?,
            None => PORTA_PADRAO,
        };
        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(valor) => valor
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalida { nome: "DATABASE_MAX_CONNECTIONS", valor })?,
            None => MAX_CONEXOES_PADRAO,
        };

        let gemini = GeminiConfig {
            api_key: get("GEMINI_API_KEY"),
            api_url: get("GEMINI_API_URL").unwrap_or_else(|| GEMINI_API_URL_PADRAO.to_string()),
            modelo: get("GEMINI_MODEL").unwrap_or_else(|| GEMINI_MODELO_PADRAO.to_string()),
            modelo_fallback: get("GEMINI_FALLBACK_MODEL")
                .unwrap_or_else(|| GEMINI_MODELO_FALLBACK_PADRAO.to_string()),
        };

        let evolution = match (get("EVOLUTION_API_URL"), get("EVOLUTION_API_KEY")) {
            (Some(url), Some(api_key)) => Some(EvolutionConfig { url, api_key }),
            _ => None,
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(senha)) => Some(AdminBootstrap { email, senha }),
            _ => None,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            jwt_secret,
            port,
            gemini,
            evolution,
            admin,
        })
    }
}

pub async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await?;

    tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
    Ok(pool)
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub empresa_service: EmpresaService,
    pub conversation_service: ConversationService,
    pub llm: Arc<dyn ReplyGenerator>,
    pub whatsapp: Arc<dyn WhatsAppGateway>,
}

impl AppState {
    /// Monta o gráfico de dependências de produção.
    pub fn from_pool(pool: PgPool, config: &Config) -> anyhow::Result<Self> {
        let llm: Arc<dyn ReplyGenerator> = Arc::new(GeminiClient::new(config.gemini.clone())?);
        let whatsapp: Arc<dyn WhatsAppGateway> =
            Arc::new(EvolutionClient::new(config.evolution.clone())?);

        Ok(Self::with_repositories(
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgEmpresaRepository::new(pool.clone())),
            Arc::new(PgConversaRepository::new(pool)),
            llm,
            whatsapp,
            config.jwt_secret.clone(),
        ))
    }

    pub fn with_repositories(
        usuarios: Arc<dyn UserRepository>,
        empresas: Arc<dyn EmpresaRepository>,
        conversas: Arc<dyn ConversaRepository>,
        llm: Arc<dyn ReplyGenerator>,
        whatsapp: Arc<dyn WhatsAppGateway>,
        jwt_secret: String,
    ) -> Self {
        let auth_service = AuthService::new(usuarios, empresas.clone(), jwt_secret);
        let empresa_service = EmpresaService::new(empresas.clone());
        let conversation_service =
            ConversationService::new(empresas, conversas, llm.clone(), whatsapp.clone());

        Self {
            auth_service,
            empresa_service,
            conversation_service,
            llm,
            whatsapp,
        }
    }
}
