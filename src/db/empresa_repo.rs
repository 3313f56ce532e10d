// src/db/empresa_repo.rs

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::{
        auth::{NovoUsuario, Usuario},
        empresa::{AtualizacaoEmpresa, Empresa, NovaEmpresa},
    },
};

#[async_trait]
pub trait EmpresaRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Empresa>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Empresa>, AppError>;
    async fn find_by_instance(&self, instance: &str) -> Result<Option<Empresa>, AppError>;

    /// Cria a empresa e o usuário de acesso dela, atomicamente.
    /// O `empresa_id` do usuário é preenchido aqui.
    async fn create_with_owner(
        &self,
        empresa: NovaEmpresa,
        owner: NovoUsuario,
    ) -> Result<(Empresa, Usuario), AppError>;

    async fn update(&self, id: Uuid, alteracao: AtualizacaoEmpresa) -> Result<Option<Empresa>, AppError>;

    /// Remove só a empresa. Conversas e mensagens ficam no banco.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgEmpresaRepository {
    pool: PgPool,
}

impl PgEmpresaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmpresaRepository for PgEmpresaRepository {
    async fn list(&self) -> Result<Vec<Empresa>, AppError> {
        let empresas =
            sqlx::query_as::<_, Empresa>("SELECT * FROM empresas ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(empresas)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Empresa>, AppError> {
        let empresa = sqlx::query_as::<_, Empresa>("SELECT * FROM empresas WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(empresa)
    }

    async fn find_by_instance(&self, instance: &str) -> Result<Option<Empresa>, AppError> {
        let empresa =
            sqlx::query_as::<_, Empresa>("SELECT * FROM empresas WHERE whatsapp_instance = $1")
                .bind(instance)
                .fetch_optional(&self.pool)
                .await?;
        Ok(empresa)
    }

    async fn create_with_owner(
        &self,
        empresa: NovaEmpresa,
        owner: NovoUsuario,
    ) -> Result<(Empresa, Usuario), AppError> {
        // 1. Inicia a transação
        let mut tx = self.pool.begin().await?;

        // 2. Cria a empresa
        let nova = sqlx::query_as::<_, Empresa>(
            r#"
            INSERT INTO empresas (
                nome, email, telefone, contexto_ia, mensagem_captura,
                whatsapp_instance, configuracoes, ativo
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            RETURNING *
            "#,
        )
        .bind(&empresa.nome)
        .bind(&empresa.email)
        .bind(&empresa.telefone)
        .bind(&empresa.contexto_ia)
        .bind(&empresa.mensagem_captura)
        .bind(&empresa.whatsapp_instance)
        .bind(Json(&empresa.configuracoes))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        // 3. Cria o usuário de acesso vinculado (se falhar, a empresa é desfeita)
        let usuario = sqlx::query_as::<_, Usuario>(
            r#"
            INSERT INTO usuarios (nome, email, senha_hash, role, empresa_id, ativo)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING *
            "#,
        )
        .bind(&owner.nome)
        .bind(&owner.email)
        .bind(&owner.senha_hash)
        .bind(owner.role)
        .bind(nova.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        // 4. Commit
        tx.commit().await?;

        Ok((nova, usuario))
    }

    async fn update(&self, id: Uuid, alteracao: AtualizacaoEmpresa) -> Result<Option<Empresa>, AppError> {
        sqlx::query_as::<_, Empresa>(
            r#"
            UPDATE empresas SET
                nome = COALESCE($2, nome),
                email = COALESCE($3, email),
                telefone = COALESCE($4, telefone),
                contexto_ia = COALESCE($5, contexto_ia),
                mensagem_captura = COALESCE($6, mensagem_captura),
                whatsapp_instance = CASE WHEN $7 THEN $8 ELSE whatsapp_instance END,
                ativo = COALESCE($9, ativo),
                configuracoes = COALESCE($10, configuracoes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(alteracao.nome)
        .bind(alteracao.email)
        .bind(alteracao.telefone)
        .bind(alteracao.contexto_ia)
        .bind(alteracao.mensagem_captura)
        .bind(alteracao.whatsapp_instance.is_some())
        .bind(alteracao.whatsapp_instance.flatten())
        .bind(alteracao.ativo)
        .bind(alteracao.configuracoes.map(Json))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM empresas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
