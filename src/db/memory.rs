// src/db/memory.rs
//
// Repositórios em memória para os testes: mesmas regras de unicidade do
// schema do Postgres, sem banco.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ConversaRepository, EmpresaRepository, UserRepository},
    models::{
        auth::{NovoUsuario, Usuario},
        conversa::{
            Conversa, ConversaFiltro, ConversaResumo, ConversaStats, ConversaStatus, Mensagem,
            MensagemTipo, NovaConversa,
        },
        empresa::{AtualizacaoEmpresa, Empresa, NovaEmpresa},
    },
};

#[derive(Default)]
struct Dados {
    empresas: Vec<Empresa>,
    usuarios: Vec<Usuario>,
    conversas: Vec<Conversa>,
    mensagens: Vec<Mensagem>,
    escritas: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    dados: Arc<Mutex<Dados>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Dados> {
        self.dados.lock().expect("mutex envenenado")
    }

    /// Quantas escritas (insert/update/delete) já aconteceram.
    pub fn escritas(&self) -> usize {
        self.lock().escritas
    }

    pub fn total_conversas(&self) -> usize {
        self.lock().conversas.len()
    }

    pub fn total_mensagens(&self) -> usize {
        self.lock().mensagens.len()
    }

    pub fn seed_empresa(&self, nome: &str, contexto_ia: &str, instance: Option<&str>) -> Empresa {
        let agora = Utc::now();
        let empresa = Empresa {
            id: Uuid::new_v4(),
            nome: nome.to_string(),
            email: format!("{}@empresa.com", nome.to_lowercase().replace(' ', "")),
            telefone: None,
            contexto_ia: contexto_ia.to_string(),
            mensagem_captura: None,
            whatsapp_instance: instance.map(str::to_string),
            ativo: true,
            configuracoes: Json(Default::default()),
            created_at: agora,
            updated_at: agora,
        };
        self.lock().empresas.push(empresa.clone());
        empresa
    }

    pub fn set_ativo(&self, usuario_id: Uuid, ativo: bool) {
        let mut dados = self.lock();
        if let Some(u) = dados.usuarios.iter_mut().find(|u| u.id == usuario_id) {
            u.ativo = ativo;
        }
    }

    fn novo_usuario(novo: NovoUsuario) -> Usuario {
        Usuario {
            id: Uuid::new_v4(),
            nome: novo.nome,
            email: novo.email,
            senha_hash: novo.senha_hash,
            role: novo.role,
            empresa_id: novo.empresa_id,
            ativo: true,
            ultimo_login: None,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Usuario>, AppError> {
        Ok(self.lock().usuarios.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Usuario>, AppError> {
        Ok(self.lock().usuarios.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, novo: NovoUsuario) -> Result<Usuario, AppError> {
        let mut dados = self.lock();
        if dados.usuarios.iter().any(|u| u.email == novo.email) {
            return Err(AppError::EmailAlreadyExists);
        }
        let usuario = Self::novo_usuario(novo);
        dados.usuarios.push(usuario.clone());
        dados.escritas += 1;
        Ok(usuario)
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), AppError> {
        let mut dados = self.lock();
        if let Some(u) = dados.usuarios.iter_mut().find(|u| u.id == id) {
            u.ultimo_login = Some(Utc::now());
        }
        dados.escritas += 1;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, senha_hash: &str) -> Result<(), AppError> {
        let mut dados = self.lock();
        let usuario = dados
            .usuarios
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(AppError::UserNotFound)?;
        usuario.senha_hash = senha_hash.to_string();
        dados.escritas += 1;
        Ok(())
    }
}

#[async_trait]
impl EmpresaRepository for MemoryStore {
    async fn list(&self) -> Result<Vec<Empresa>, AppError> {
        let mut empresas = self.lock().empresas.clone();
        empresas.reverse();
        Ok(empresas)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Empresa>, AppError> {
        Ok(self.lock().empresas.iter().find(|e| e.id == id).cloned())
    }

    async fn find_by_instance(&self, instance: &str) -> Result<Option<Empresa>, AppError> {
        Ok(self
            .lock()
            .empresas
            .iter()
            .find(|e| e.whatsapp_instance.as_deref() == Some(instance))
            .cloned())
    }

    async fn create_with_owner(
        &self,
        empresa: NovaEmpresa,
        owner: NovoUsuario,
    ) -> Result<(Empresa, Usuario), AppError> {
        let mut dados = self.lock();
        if dados.empresas.iter().any(|e| e.email == empresa.email)
            || dados.usuarios.iter().any(|u| u.email == owner.email)
        {
            return Err(AppError::EmailAlreadyExists);
        }
        if empresa.whatsapp_instance.is_some()
            && dados.empresas.iter().any(|e| e.whatsapp_instance == empresa.whatsapp_instance)
        {
            return Err(AppError::InstanciaEmUso);
        }

        let agora = Utc::now();
        let nova = Empresa {
            id: Uuid::new_v4(),
            nome: empresa.nome,
            email: empresa.email,
            telefone: empresa.telefone,
            contexto_ia: empresa.contexto_ia,
            mensagem_captura: empresa.mensagem_captura,
            whatsapp_instance: empresa.whatsapp_instance,
            ativo: true,
            configuracoes: Json(empresa.configuracoes),
            created_at: agora,
            updated_at: agora,
        };
        let usuario = Self::novo_usuario(NovoUsuario { empresa_id: Some(nova.id), ..owner });

        dados.empresas.push(nova.clone());
        dados.usuarios.push(usuario.clone());
        dados.escritas += 2;
        Ok((nova, usuario))
    }

    async fn update(&self, id: Uuid, alteracao: AtualizacaoEmpresa) -> Result<Option<Empresa>, AppError> {
        let mut dados = self.lock();
        if let Some(Some(instance)) = &alteracao.whatsapp_instance {
            if dados
                .empresas
                .iter()
                .any(|e| e.id != id && e.whatsapp_instance.as_ref() == Some(instance))
            {
                return Err(AppError::InstanciaEmUso);
            }
        }
        let Some(empresa) = dados.empresas.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };

        if let Some(v) = alteracao.nome { empresa.nome = v; }
        if let Some(v) = alteracao.email { empresa.email = v; }
        if let Some(v) = alteracao.telefone { empresa.telefone = Some(v); }
        if let Some(v) = alteracao.contexto_ia { empresa.contexto_ia = v; }
        if let Some(v) = alteracao.mensagem_captura { empresa.mensagem_captura = Some(v); }
        if let Some(v) = alteracao.whatsapp_instance { empresa.whatsapp_instance = v; }
        if let Some(v) = alteracao.ativo { empresa.ativo = v; }
        if let Some(v) = alteracao.configuracoes { empresa.configuracoes = Json(v); }
        empresa.updated_at = Utc::now();

        let atualizada = empresa.clone();
        dados.escritas += 1;
        Ok(Some(atualizada))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut dados = self.lock();
        let antes = dados.empresas.len();
        dados.empresas.retain(|e| e.id != id);
        let removida = dados.empresas.len() < antes;
        if removida {
            for u in dados.usuarios.iter_mut().filter(|u| u.empresa_id == Some(id)) {
                u.empresa_id = None;
            }
            dados.escritas += 1;
        }
        Ok(removida)
    }
}

fn filtra(conversa: &Conversa, filtro: &ConversaFiltro) -> bool {
    filtro.empresa_id.is_none_or(|id| conversa.empresa_id == id)
        && filtro.status.is_none_or(|s| conversa.status == s)
}

fn ordena_por_atualizacao(conversas: &mut [Conversa]) {
    conversas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

#[async_trait]
impl ConversaRepository for MemoryStore {
    async fn find_or_create_active(&self, nova: NovaConversa) -> Result<Conversa, AppError> {
        let mut dados = self.lock();
        if nova.cliente_telefone.is_some() {
            if let Some(existente) = dados.conversas.iter_mut().find(|c| {
                c.empresa_id == nova.empresa_id
                    && c.cliente_telefone == nova.cliente_telefone
                    && c.status == ConversaStatus::Ativa
            }) {
                existente.updated_at = Utc::now();
                return Ok(existente.clone());
            }
        }

        let agora = Utc::now();
        let conversa = Conversa {
            id: Uuid::new_v4(),
            empresa_id: nova.empresa_id,
            cliente_nome: nova.cliente_nome,
            cliente_telefone: nova.cliente_telefone,
            cliente_email: nova.cliente_email,
            canal: nova.canal,
            status: ConversaStatus::Ativa,
            created_at: agora,
            updated_at: agora,
        };
        dados.conversas.push(conversa.clone());
        dados.escritas += 1;
        Ok(conversa)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversa>, AppError> {
        Ok(self.lock().conversas.iter().find(|c| c.id == id).cloned())
    }

    async fn list(&self, filtro: ConversaFiltro) -> Result<Vec<Conversa>, AppError> {
        let mut conversas: Vec<Conversa> = self
            .lock()
            .conversas
            .iter()
            .filter(|c| filtra(c, &filtro))
            .cloned()
            .collect();
        ordena_por_atualizacao(&mut conversas);
        conversas.truncate(filtro.limite.max(0) as usize);
        Ok(conversas)
    }

    async fn list_with_counts(&self, filtro: ConversaFiltro) -> Result<Vec<ConversaResumo>, AppError> {
        let conversas = ConversaRepository::list(self, filtro).await?;
        let dados = self.lock();
        Ok(conversas
            .into_iter()
            .map(|conversa| {
                let total_mensagens =
                    dados.mensagens.iter().filter(|m| m.conversa_id == conversa.id).count() as i64;
                ConversaResumo { conversa, total_mensagens }
            })
            .collect())
    }

    async fn stats(&self, empresa_id: Uuid) -> Result<ConversaStats, AppError> {
        let hoje = Utc::now().date_naive();
        let dados = self.lock();
        let mut stats = ConversaStats::default();
        for c in dados.conversas.iter().filter(|c| c.empresa_id == empresa_id) {
            stats.total += 1;
            match c.status {
                ConversaStatus::Ativa => stats.ativas += 1,
                ConversaStatus::Finalizada => stats.finalizadas += 1,
                ConversaStatus::Aguardando => stats.aguardando += 1,
            }
            if c.created_at.date_naive() == hoje {
                stats.hoje += 1;
            }
        }
        Ok(stats)
    }

    async fn update_status(&self, id: Uuid, status: ConversaStatus) -> Result<Option<Conversa>, AppError> {
        let mut dados = self.lock();
        let Some(atual) = dados.conversas.iter().find(|c| c.id == id).cloned() else {
            return Ok(None);
        };
        if status == ConversaStatus::Ativa
            && atual.cliente_telefone.is_some()
            && dados.conversas.iter().any(|c| {
                c.id != id
                    && c.empresa_id == atual.empresa_id
                    && c.cliente_telefone == atual.cliente_telefone
                    && c.status == ConversaStatus::Ativa
            })
        {
            return Err(AppError::ConversaAtivaExistente);
        }

        let conversa = dados
            .conversas
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(AppError::ConversaNotFound)?;
        conversa.status = status;
        conversa.updated_at = Utc::now();
        let atualizada = conversa.clone();
        dados.escritas += 1;
        Ok(Some(atualizada))
    }

    async fn insert_message(
        &self,
        conversa_id: Uuid,
        tipo: MensagemTipo,
        conteudo: &str,
    ) -> Result<Mensagem, AppError> {
        let mut dados = self.lock();
        let agora = Utc::now();
        let mensagem = Mensagem {
            id: Uuid::new_v4(),
            conversa_id,
            tipo,
            conteudo: conteudo.to_string(),
            created_at: agora,
        };
        if let Some(c) = dados.conversas.iter_mut().find(|c| c.id == conversa_id) {
            c.updated_at = agora;
        }
        dados.mensagens.push(mensagem.clone());
        dados.escritas += 1;
        Ok(mensagem)
    }

    async fn recent_messages(&self, conversa_id: Uuid, limite: i64) -> Result<Vec<Mensagem>, AppError> {
        Ok(self
            .lock()
            .mensagens
            .iter()
            .rev()
            .filter(|m| m.conversa_id == conversa_id)
            .take(limite.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn messages(&self, conversa_id: Uuid) -> Result<Vec<Mensagem>, AppError> {
        Ok(self
            .lock()
            .mensagens
            .iter()
            .filter(|m| m.conversa_id == conversa_id)
            .cloned()
            .collect())
    }
}
