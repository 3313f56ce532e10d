// src/services/whatsapp.rs
//
// Adaptador da Evolution API (envio, pareamento por QR Code e status).

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::Luma;
use qrcode::QrCode;
use reqwest::{Client, Url};
use serde_json::{json, Value};

use crate::{
    common::error::GatewayError,
    config::EvolutionConfig,
    models::whatsapp::{instancia_valida, EstadoConexao, QrCodeResultado},
};

#[async_trait]
pub trait WhatsAppGateway: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send_text(&self, instance: &str, telefone: &str, texto: &str) -> Result<Value, GatewayError>;

    /// Só falha sem configuração ou com nome de instância inválido; o resto vira `Indisponivel`.
    async fn request_qr_code(&self, instance: &str) -> Result<QrCodeResultado, GatewayError>;

    /// Nunca falha: qualquer erro é `Desconectado`.
    async fn connection_state(&self, instance: &str) -> EstadoConexao;
}

#[derive(Clone)]
pub struct EvolutionClient {
    client: Client,
    config: Option<EvolutionConfig>,
}

impl EvolutionClient {
    pub fn new(config: Option<EvolutionConfig>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        if config.is_none() {
            tracing::warn!("⚠️ Evolution API não configurada. Envio e QR Code do WhatsApp desativados.");
        }
        Ok(Self { client, config })
    }

    fn config(&self) -> Result<&EvolutionConfig, GatewayError> {
        self.config.as_ref().ok_or(GatewayError::NaoConfigurado)
    }

    /// Cada segmento é codificado; nunca vira `/` ou `..` no caminho final.
    fn url(config: &EvolutionConfig, segmentos: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&config.url)
            .map_err(|e| GatewayError::UrlInvalida(format!("{}: {}", config.url, e)))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::UrlInvalida(config.url.clone()))?
            .pop_if_empty()
            .extend(segmentos);
        Ok(url)
    }

    fn instancia(nome: &str) -> Result<&str, GatewayError> {
        if instancia_valida(nome) {
            Ok(nome)
        } else {
            Err(GatewayError::InstanciaInvalida(nome.to_string()))
        }
    }

    async fn criar_instancia(&self, config: &EvolutionConfig, instance: &str) -> Result<Option<String>, GatewayError> {
        tracing::info!("👉 [{}] Tentando criar instância", instance);
        let response = self
            .client
            .post(Self::url(config, &["instance", "create"])?)
            .header("apikey", &config.api_key)
            .json(&json!({
                "instanceName": instance,
                "qrcode": true,
                "integration": "WHATSAPP-BAILEYS"
            }))
            .send()
            .await?;

        let status = response.status();
        tracing::info!("📥 [{}] Create status: {}", instance, status);
        if !status.is_success() {
            return Ok(None);
        }

        let corpo: Value = response.json().await.unwrap_or_default();
        Ok(corpo
            .pointer("/qrcode/base64")
            .and_then(Value::as_str)
            .filter(|qr| !qr.is_empty())
            .map(str::to_string))
    }

    async fn conectar_instancia(&self, config: &EvolutionConfig, instance: &str) -> Result<Option<QrCodeResultado>, GatewayError> {
        tracing::info!("🔌 [{}] Tentando endpoint connect", instance);
        let response = self
            .client
            .get(Self::url(config, &["instance", "connect", instance])?)
            .header("apikey", &config.api_key)
            .send()
            .await?;

        tracing::info!("📥 [{}] Connect status: {}", instance, response.status());
        let corpo: Value = response.json().await.unwrap_or_default();
        Ok(interpretar_connect(&corpo))
    }
}

/// Extrai o QR (ou o estado "já conectado") da resposta do endpoint connect.
fn interpretar_connect(corpo: &Value) -> Option<QrCodeResultado> {
    let texto = |ponteiro: &str| {
        corpo
            .pointer(ponteiro)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    if let Some(qr) = texto("/base64")
        .or_else(|| texto("/qrcode"))
        .or_else(|| texto("/qrcode/base64"))
    {
        return Some(QrCodeResultado::QrCode(qr.to_string()));
    }

    // Só o código de pareamento cru: renderiza a imagem aqui
    if let Some(codigo) = texto("/code") {
        match renderizar_qr(codigo) {
            Ok(imagem) => return Some(QrCodeResultado::QrCode(imagem)),
            Err(e) => tracing::error!("❌ Falha ao renderizar QR Code: {}", e),
        }
    }

    if texto("/instance/state") == Some("open") {
        return Some(QrCodeResultado::JaConectado);
    }
    None
}

/// Gera um PNG do QR Code como data URL em base64.
pub fn renderizar_qr(codigo: &str) -> anyhow::Result<String> {
    let code = QrCode::new(codigo.as_bytes()).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let imagem = code.render::<Luma<u8>>().build();

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(imagem).write_to(&mut png, image::ImageOutputFormat::Png)?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

#[async_trait]
impl WhatsAppGateway for EvolutionClient {
    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn send_text(&self, instance: &str, telefone: &str, texto: &str) -> Result<Value, GatewayError> {
        let config = self.config()?;
        let url = Self::url(config, &["message", "sendText", Self::instancia(instance)?])?;

        let response = self
            .client
            .post(url)
            .header("apikey", &config.api_key)
            .json(&json!({
                "number": format!("{}@s.whatsapp.net", telefone),
                "text": texto
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let corpo = response.text().await.unwrap_or_default();
            return Err(GatewayError::Resposta { status: status.as_u16(), corpo });
        }

        Ok(response.json().await.unwrap_or_default())
    }

    async fn request_qr_code(&self, instance: &str) -> Result<QrCodeResultado, GatewayError> {
        let config = self.config()?;
        let instance = Self::instancia(instance)?;
        tracing::info!("🔄 [{}] Iniciando geração de QR Code...", instance);

        // 1. Tenta criar a instância (a resposta já traz o QR)
        match self.criar_instancia(config, instance).await {
            Ok(Some(qr)) => {
                tracing::info!("✅ [{}] Instância criada e QR Code recebido!", instance);
                return Ok(QrCodeResultado::QrCode(qr));
            }
            Ok(None) => {}
            Err(e) => tracing::error!("❌ [{}] Erro de rede ao criar: {}", instance, e),
        }

        // 2. Se falhou, tenta conectar a instância existente
        match self.conectar_instancia(config, instance).await {
            Ok(Some(resultado)) => {
                tracing::info!("✅ [{}] Resultado obtido via connect", instance);
                return Ok(resultado);
            }
            Ok(None) => {}
            Err(e) => tracing::error!("❌ [{}] Erro de rede ao conectar: {}", instance, e),
        }

        Ok(QrCodeResultado::Indisponivel)
    }

    async fn connection_state(&self, instance: &str) -> EstadoConexao {
        let Ok(config) = self.config() else {
            return EstadoConexao::Desconectado;
        };
        let url = match Self::instancia(instance)
            .and_then(|instance| Self::url(config, &["instance", "connectionState", instance]))
        {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("⚠️ Status não consultado: {}", e);
                return EstadoConexao::Desconectado;
            }
        };

        let response = self
            .client
            .get(url)
            .header("apikey", &config.api_key)
            .send()
            .await;

        let corpo: Value = match response {
            Ok(r) => r.json().await.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("⚠️ [{}] Falha ao consultar status: {}", instance, e);
                return EstadoConexao::Desconectado;
            }
        };

        match corpo.pointer("/instance/state").and_then(Value::as_str) {
            Some("open") => EstadoConexao::Conectado,
            _ => EstadoConexao::Desconectado,
        }
    }
}


#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn client(url: String) -> EvolutionClient {
        EvolutionClient::new(Some(EvolutionConfig { url, api_key: "chave".into() })).unwrap()
    }

    #[tokio::test]
    async fn envia_texto_com_numero_no_formato_jid() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/message/sendText/loja-1")
                    .header("apikey", "chave")
                    .json_body(json!({ "number": "5511999990000@s.whatsapp.net", "text": "Olá" }));
                then.status(201).json_body(json!({ "key": { "id": "abc" } }));
            })
            .await;

        let resposta = client(server.base_url()).send_text("loja-1", "5511999990000", "Olá").await.unwrap();

        assert_eq!(resposta["key"]["id"], "abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn instancia_com_caminho_nao_chega_ao_gateway() {
        let server = MockServer::start_async().await;
        let alvo = server
            .mock_async(|when, then| {
                when.path_contains("loja-vitima");
                then.status(201).json_body(json!({ "key": { "id": "abc" } }));
            })
            .await;
        let gateway = client(server.base_url());

        let err = gateway.send_text("../sendText/loja-vitima", "5511", "spam").await.unwrap_err();
        assert!(matches!(err, GatewayError::InstanciaInvalida(_)));
        assert!(matches!(
            gateway.request_qr_code("../../instance/logout/loja-vitima").await,
            Err(GatewayError::InstanciaInvalida(_))
        ));
        assert_eq!(gateway.connection_state("..%2Floja-vitima").await, EstadoConexao::Desconectado);

        alvo.assert_hits_async(0).await;
    }

    #[test]
    fn url_codifica_cada_segmento_e_respeita_o_prefixo() {
        let config = EvolutionConfig { url: "http://evo.local/api/".into(), api_key: "k".into() };

        let url = EvolutionClient::url(&config, &["message", "sendText", "../x y"]).unwrap();
        assert_eq!(url.as_str(), "http://evo.local/api/message/sendText/..%2Fx%20y");

        let sem_barra = EvolutionConfig { url: "http://evo.local".into(), api_key: "k".into() };
        let url = EvolutionClient::url(&sem_barra, &["instance", "create"]).unwrap();
        assert_eq!(url.as_str(), "http://evo.local/instance/create");
    }

    #[tokio::test]
    async fn envio_com_status_de_erro_falha() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(400).body("instance not found");
            })
            .await;

        let err = client(server.base_url()).send_text("x", "1", "Oi").await.unwrap_err();
        assert!(matches!(err, GatewayError::Resposta { status: 400, .. }));
    }

    #[tokio::test]
    async fn sem_configuracao_envio_e_qr_falham_e_status_e_desconectado() {
        let gateway = EvolutionClient::new(None).unwrap();
        assert!(!gateway.is_configured());
        assert!(matches!(gateway.send_text("x", "1", "Oi").await, Err(GatewayError::NaoConfigurado)));
        assert!(matches!(gateway.request_qr_code("x").await, Err(GatewayError::NaoConfigurado)));
        assert_eq!(gateway.connection_state("x").await, EstadoConexao::Desconectado);
    }

    #[tokio::test]
    async fn qr_vem_da_criacao_da_instancia() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/instance/create").body_contains("WHATSAPP-BAILEYS");
                then.status(201).json_body(json!({ "qrcode": { "base64": "data:image/png;base64,QR" } }));
            })
            .await;
        let connect = server
            .mock_async(|when, then| {
                when.method(GET).path("/instance/connect/loja-1");
                then.status(200).json_body(json!({}));
            })
            .await;

        let resultado = client(server.base_url()).request_qr_code("loja-1").await.unwrap();

        assert_eq!(resultado, QrCodeResultado::QrCode("data:image/png;base64,QR".into()));
        connect.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn instancia_existente_usa_o_connect() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/instance/create");
                then.status(403).json_body(json!({ "error": "already in use" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/instance/connect/loja-1");
                then.status(200).json_body(json!({ "base64": "data:image/png;base64,CONNECT" }));
            })
            .await;

        let resultado = client(server.base_url()).request_qr_code("loja-1").await.unwrap();
        assert_eq!(resultado, QrCodeResultado::QrCode("data:image/png;base64,CONNECT".into()));
    }

    #[tokio::test]
    async fn instancia_ja_conectada() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/instance/create");
                then.status(403);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/instance/connect/loja-1");
                then.status(200).json_body(json!({ "instance": { "state": "open" } }));
            })
            .await;

        let resultado = client(server.base_url()).request_qr_code("loja-1").await.unwrap();
        assert_eq!(resultado, QrCodeResultado::JaConectado);
    }

    #[tokio::test]
    async fn codigo_cru_e_renderizado_localmente() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/instance/create");
                then.status(500);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/instance/connect/loja-1");
                then.status(200).json_body(json!({ "code": "2@abcdef,ghijk,lmnop" }));
            })
            .await;

        let resultado = client(server.base_url()).request_qr_code("loja-1").await.unwrap();
        match resultado {
            QrCodeResultado::QrCode(qr) => assert!(qr.starts_with("data:image/png;base64,")),
            outro => panic!("esperava QR Code, veio {:?}", outro),
        }
    }

    #[tokio::test]
    async fn gateway_fora_do_ar_fica_indisponivel() {
        // Porta sem servidor: as duas tentativas falham na rede
        let resultado = client("http://127.0.0.1:9".into()).request_qr_code("loja-1").await.unwrap();
        assert_eq!(resultado, QrCodeResultado::Indisponivel);
    }

    #[tokio::test]
    async fn status_aberto_e_conectado_e_repetivel() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/instance/connectionState/loja-1");
                then.status(200).json_body(json!({ "instance": { "instanceName": "loja-1", "state": "open" } }));
            })
            .await;

        let gateway = client(server.base_url());
        let primeiro = gateway.connection_state("loja-1").await;
        let segundo = gateway.connection_state("loja-1").await;

        assert_eq!(primeiro, EstadoConexao::Conectado);
        assert_eq!(primeiro, segundo);
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn status_com_erro_e_desconectado() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/instance/connectionState/loja-1");
                then.status(500).body("boom");
            })
            .await;

        assert_eq!(client(server.base_url()).connection_state("loja-1").await, EstadoConexao::Desconectado);
        assert_eq!(client("http://127.0.0.1:9".into()).connection_state("loja-1").await, EstadoConexao::Desconectado);
    }
}
