// src/services/empresa_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::EmpresaRepository,
    models::{
        auth::{NovoUsuario, Role},
        empresa::{
            AtualizacaoEmpresa, ConfiguracoesEmpresa, CreateEmpresaPayload, Empresa, NovaEmpresa,
            UpdateEmpresaPayload, CONTEXTO_IA_PADRAO,
        },
    },
    services::auth::hash_password,
};

#[derive(Clone)]
pub struct EmpresaService {
    empresa_repo: Arc<dyn EmpresaRepository>,
    bcrypt_cost: u32,
}

fn texto_opcional(valor: Option<String>) -> Option<String> {
    valor.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl EmpresaService {
    pub fn new(empresa_repo: Arc<dyn EmpresaRepository>) -> Self {
        Self { empresa_repo, bcrypt_cost: bcrypt::DEFAULT_COST }
    }

    #[cfg(test)]
    pub fn with_bcrypt_cost(mut self, custo: u32) -> Self {
        self.bcrypt_cost = custo;
        self
    }

    pub async fn list(&self) -> Result<Vec<Empresa>, AppError> {
        self.empresa_repo.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Empresa, AppError> {
        self.empresa_repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::EmpresaNotFound)
    }

    /// Cria a empresa e o usuário de acesso dela na mesma transação.
    pub async fn create(&self, payload: CreateEmpresaPayload) -> Result<Empresa, AppError> {
        let configuracoes = match payload.configuracoes {
            Some(valor) => ConfiguracoesEmpresa::from_value(valor)?,
            None => ConfiguracoesEmpresa::default(),
        };

        let nome = payload.nome.trim().to_string();
        let email = payload.email.trim().to_lowercase();
        let contexto_ia = texto_opcional(payload.contexto_ia)
            .unwrap_or_else(|| CONTEXTO_IA_PADRAO.to_string());

        let senha_hash = hash_password(&payload.senha, self.bcrypt_cost).await?;

        let nova = NovaEmpresa {
            nome: nome.clone(),
            email: email.clone(),
            telefone: texto_opcional(payload.telefone),
            contexto_ia,
            mensagem_captura: texto_opcional(payload.mensagem_captura),
            whatsapp_instance: texto_opcional(payload.whatsapp_instance),
            configuracoes,
        };
        let owner = NovoUsuario {
            nome,
            email,
            senha_hash,
            role: Role::Client,
            empresa_id: None,
        };

        let (empresa, usuario) = self.empresa_repo.create_with_owner(nova, owner).await?;
        tracing::info!("🏢 Empresa '{}' criada com o usuário {}", empresa.nome, usuario.email);
        Ok(empresa)
    }

    /// Alteração parcial. O e-mail da empresa é só contato: o login do usuário
    /// criado junto com ela não muda.
    pub async fn update(&self, id: Uuid, payload: UpdateEmpresaPayload) -> Result<Empresa, AppError> {
        let configuracoes = payload
            .configuracoes
            .map(ConfiguracoesEmpresa::from_value)
            .transpose()?;

        let alteracao = AtualizacaoEmpresa {
            nome: payload.nome.map(|n| n.trim().to_string()),
            email: payload.email.map(|e| e.trim().to_lowercase()),
            telefone: payload.telefone,
            contexto_ia: payload.contexto_ia,
            mensagem_captura: payload.mensagem_captura,
            whatsapp_instance: payload.whatsapp_instance.map(|i| texto_opcional(Some(i))),
            ativo: payload.ativo,
            configuracoes,
        };

        self.empresa_repo
            .update(id, alteracao)
            .await?
            .ok_or(AppError::EmpresaNotFound)
    }

    /// Remove só a empresa. As conversas dela continuam no banco.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.empresa_repo.delete(id).await? {
            return Err(AppError::EmpresaNotFound);
        }
        tracing::info!("🗑️ Empresa {} removida", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        db::{memory::MemoryStore, ConversaRepository, UserRepository},
        models::conversa::{Canal, ConversaFiltro, NovaConversa},
    };

    fn service(store: &MemoryStore) -> EmpresaService {
        EmpresaService::new(Arc::new(store.clone())).with_bcrypt_cost(4)
    }

    fn payload(nome: &str, email: &str) -> CreateEmpresaPayload {
        CreateEmpresaPayload {
            nome: nome.into(),
            email: email.into(),
            telefone: None,
            contexto_ia: None,
            mensagem_captura: None,
            whatsapp_instance: None,
            configuracoes: None,
            senha: "segredo1".into(),
        }
    }

    #[tokio::test]
    async fn criar_empresa_provisiona_usuario_cliente() {
        let store = MemoryStore::new();
        let empresas = service(&store);

        let empresa = empresas.create(payload("Padaria Sol", "Contato@PadariaSol.com")).await.unwrap();

        assert_eq!(empresa.email, "contato@padariasol.com");
        assert_eq!(empresa.contexto_ia, CONTEXTO_IA_PADRAO);
        assert_eq!(empresa.configuracoes.0, ConfiguracoesEmpresa::default());

        let usuario = store.find_by_email("contato@padariasol.com").await.unwrap().unwrap();
        assert_eq!(usuario.role, Role::Client);
        assert_eq!(usuario.empresa_id, Some(empresa.id));
        assert!(bcrypt::verify("segredo1", &usuario.senha_hash).unwrap());
    }

    #[tokio::test]
    async fn email_duplicado_nao_cria_nada() {
        let store = MemoryStore::new();
        let empresas = service(&store);
        empresas.create(payload("Padaria Sol", "contato@sol.com")).await.unwrap();

        let err = empresas.create(payload("Outra", "CONTATO@sol.com")).await.unwrap_err();

        assert!(matches!(err, AppError::EmailAlreadyExists));
        assert_eq!(empresas.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn configuracoes_invalidas_sao_rejeitadas_na_escrita() {
        let store = MemoryStore::new();
        let empresas = service(&store);

        let mut com_chave_estranha = payload("Padaria", "p@sol.com");
        com_chave_estranha.configuracoes = Some(json!({ "versao": 1, "tema": "escuro" }));
        let err = empresas.create(com_chave_estranha).await.unwrap_err();
        assert!(matches!(err, AppError::ConfiguracoesInvalidas(_)));

        let empresa = empresas.create(payload("Padaria", "p@sol.com")).await.unwrap();
        let err = empresas
            .update(
                empresa.id,
                UpdateEmpresaPayload {
                    configuracoes: Some(json!({ "versao": 1, "historico_limite": 500 })),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConfiguracoesInvalidas(_)));
    }

    #[tokio::test]
    async fn atualizacao_parcial_mantem_o_resto() {
        let store = MemoryStore::new();
        let empresas = service(&store);
        let empresa = empresas.create(payload("Padaria", "p@sol.com")).await.unwrap();

        let atualizada = empresas
            .update(
                empresa.id,
                UpdateEmpresaPayload {
                    contexto_ia: Some("Responda em uma palavra.".into()),
                    configuracoes: Some(json!({ "versao": 1, "historico_limite": 4 })),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(atualizada.nome, "Padaria");
        assert_eq!(atualizada.contexto_ia, "Responda em uma palavra.");
        assert_eq!(atualizada.configuracoes.historico_limite, 4);
        assert!(matches!(
            empresas.update(Uuid::new_v4(), UpdateEmpresaPayload::default()).await,
            Err(AppError::EmpresaNotFound)
        ));
    }

    #[tokio::test]
    async fn instancia_de_whatsapp_e_exclusiva() {
        let store = MemoryStore::new();
        let empresas = service(&store);
        let mut primeira = payload("A", "a@x.com");
        primeira.whatsapp_instance = Some("loja-1".into());
        empresas.create(primeira).await.unwrap();

        let mut segunda = payload("B", "b@x.com");
        segunda.whatsapp_instance = Some("loja-1".into());
        assert!(matches!(empresas.create(segunda).await, Err(AppError::InstanciaEmUso)));
    }

    #[tokio::test]
    async fn instancia_pode_ser_trocada_e_desvinculada() {
        let store = MemoryStore::new();
        let empresas = service(&store);
        let mut nova = payload("A", "a@x.com");
        nova.whatsapp_instance = Some("loja-1".into());
        let empresa = empresas.create(nova).await.unwrap();

        let instancia = |valor: &str| UpdateEmpresaPayload {
            whatsapp_instance: Some(valor.into()),
            ..Default::default()
        };

        let trocada = empresas.update(empresa.id, instancia("loja-2")).await.unwrap();
        assert_eq!(trocada.whatsapp_instance.as_deref(), Some("loja-2"));

        let sem_alteracao = empresas.update(empresa.id, UpdateEmpresaPayload::default()).await.unwrap();
        assert_eq!(sem_alteracao.whatsapp_instance.as_deref(), Some("loja-2"));

        let desvinculada = empresas.update(empresa.id, instancia("")).await.unwrap();
        assert_eq!(desvinculada.whatsapp_instance, None);
        assert!(store.find_by_instance("loja-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn trocar_email_da_empresa_nao_muda_o_login() {
        let store = MemoryStore::new();
        let empresas = service(&store);
        let empresa = empresas.create(payload("Padaria", "p@sol.com")).await.unwrap();

        let atualizada = empresas
            .update(
                empresa.id,
                UpdateEmpresaPayload { email: Some("Novo@Sol.com".into()), ..Default::default() },
            )
            .await
            .unwrap();

        assert_eq!(atualizada.email, "novo@sol.com");
        assert!(store.find_by_email("p@sol.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remover_empresa_mantem_as_conversas() {
        let store = MemoryStore::new();
        let empresas = service(&store);
        let empresa = empresas.create(payload("Padaria", "p@sol.com")).await.unwrap();
        store
            .find_or_create_active(NovaConversa {
                empresa_id: empresa.id,
                cliente_nome: "Ana".into(),
                cliente_telefone: Some("5511999990000".into()),
                cliente_email: None,
                canal: Canal::Web,
            })
            .await
            .unwrap();

        empresas.delete(empresa.id).await.unwrap();

        assert!(matches!(empresas.get(empresa.id).await, Err(AppError::EmpresaNotFound)));
        let restantes = ConversaRepository::list(
            &store,
            ConversaFiltro { empresa_id: Some(empresa.id), status: None, limite: 50 },
        )
        .await
        .unwrap();
        assert_eq!(restantes.len(), 1);
        assert!(matches!(empresas.delete(empresa.id).await, Err(AppError::EmpresaNotFound)));
    }
}
