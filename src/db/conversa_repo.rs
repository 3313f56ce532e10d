// src/db/conversa_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::conversa::{
        Conversa, ConversaFiltro, ConversaResumo, ConversaStats, ConversaStatus, Mensagem,
        MensagemTipo, NovaConversa,
    },
};

#[async_trait]
pub trait ConversaRepository: Send + Sync {
    /// Devolve a conversa ativa do cliente ou abre uma nova.
    /// Sem telefone o cliente não é identificável e sempre abre uma nova.
    async fn find_or_create_active(&self, nova: NovaConversa) -> Result<Conversa, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversa>, AppError>;
    async fn list(&self, filtro: ConversaFiltro) -> Result<Vec<Conversa>, AppError>;
    async fn list_with_counts(&self, filtro: ConversaFiltro) -> Result<Vec<ConversaResumo>, AppError>;
    async fn stats(&self, empresa_id: Uuid) -> Result<ConversaStats, AppError>;
    async fn update_status(&self, id: Uuid, status: ConversaStatus) -> Result<Option<Conversa>, AppError>;

    async fn insert_message(
        &self,
        conversa_id: Uuid,
        tipo: MensagemTipo,
        conteudo: &str,
    ) -> Result<Mensagem, AppError>;

    /// As `limite` mensagens mais recentes, da mais nova para a mais antiga.
    async fn recent_messages(&self, conversa_id: Uuid, limite: i64) -> Result<Vec<Mensagem>, AppError>;

    /// Todas as mensagens, em ordem cronológica.
    async fn messages(&self, conversa_id: Uuid) -> Result<Vec<Mensagem>, AppError>;
}

#[derive(Clone)]
pub struct PgConversaRepository {
    pool: PgPool,
}

impl PgConversaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversaRepository for PgConversaRepository {
    async fn find_or_create_active(&self, nova: NovaConversa) -> Result<Conversa, AppError> {
        // O índice parcial conversas_ativa_por_cliente garante uma única
        // conversa ativa por (empresa, telefone); o upsert resolve a corrida.
        let conversa = sqlx::query_as::<_, Conversa>(
            r#"
            INSERT INTO conversas (
                empresa_id, cliente_nome, cliente_telefone, cliente_email, canal, status
            )
            VALUES ($1, $2, $3, $4, $5, 'ativa')
            ON CONFLICT (empresa_id, cliente_telefone) WHERE status = 'ativa'
            DO UPDATE SET updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(nova.empresa_id)
        .bind(&nova.cliente_nome)
        .bind(&nova.cliente_telefone)
        .bind(&nova.cliente_email)
        .bind(nova.canal)
        .fetch_one(&self.pool)
        .await?;

        Ok(conversa)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversa>, AppError> {
        let conversa = sqlx::query_as::<_, Conversa>("SELECT * FROM conversas WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(conversa)
    }

    async fn list(&self, filtro: ConversaFiltro) -> Result<Vec<Conversa>, AppError> {
        let conversas = sqlx::query_as::<_, Conversa>(
            r#"
            SELECT * FROM conversas
            WHERE ($1::uuid IS NULL OR empresa_id = $1)
              AND ($2::conversa_status IS NULL OR status = $2)
            ORDER BY updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(filtro.empresa_id)
        .bind(filtro.status)
        .bind(filtro.limite)
        .fetch_all(&self.pool)
        .await?;
        Ok(conversas)
    }

    async fn list_with_counts(&self, filtro: ConversaFiltro) -> Result<Vec<ConversaResumo>, AppError> {
        let conversas = sqlx::query_as::<_, ConversaResumo>(
            r#"
            SELECT c.*,
                   (SELECT COUNT(*) FROM mensagens m WHERE m.conversa_id = c.id) AS total_mensagens
            FROM conversas c
            WHERE ($1::uuid IS NULL OR c.empresa_id = $1)
              AND ($2::conversa_status IS NULL OR c.status = $2)
            ORDER BY c.updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(filtro.empresa_id)
        .bind(filtro.status)
        .bind(filtro.limite)
        .fetch_all(&self.pool)
        .await?;
        Ok(conversas)
    }

    async fn stats(&self, empresa_id: Uuid) -> Result<ConversaStats, AppError> {
        let stats = sqlx::query_as::<_, ConversaStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'ativa') AS ativas,
                COUNT(*) FILTER (WHERE status = 'finalizada') AS finalizadas,
                COUNT(*) FILTER (WHERE status = 'aguardando') AS aguardando,
                COUNT(*) FILTER (
                    WHERE (created_at AT TIME ZONE 'UTC')::date = (NOW() AT TIME ZONE 'UTC')::date
                ) AS hoje
            FROM conversas
            WHERE empresa_id = $1
            "#,
        )
        .bind(empresa_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn update_status(&self, id: Uuid, status: ConversaStatus) -> Result<Option<Conversa>, AppError> {
        sqlx::query_as::<_, Conversa>(
            r#"
            UPDATE conversas SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn insert_message(
        &self,
        conversa_id: Uuid,
        tipo: MensagemTipo,
        conteudo: &str,
    ) -> Result<Mensagem, AppError> {
        // Insere e já "toca" a conversa, para a listagem por updated_at
        let mensagem = sqlx::query_as::<_, Mensagem>(
            r#"
            WITH nova AS (
                INSERT INTO mensagens (conversa_id, tipo, conteudo)
                VALUES ($1, $2, $3)
                RETURNING *
            ), toque AS (
                UPDATE conversas SET updated_at = NOW() WHERE id = $1
            )
            SELECT * FROM nova
            "#,
        )
        .bind(conversa_id)
        .bind(tipo)
        .bind(conteudo)
        .fetch_one(&self.pool)
        .await?;
        Ok(mensagem)
    }

    async fn recent_messages(&self, conversa_id: Uuid, limite: i64) -> Result<Vec<Mensagem>, AppError> {
        let mensagens = sqlx::query_as::<_, Mensagem>(
            r#"
            SELECT * FROM mensagens
            WHERE conversa_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(conversa_id)
        .bind(limite)
        .fetch_all(&self.pool)
        .await?;
        Ok(mensagens)
    }

    async fn messages(&self, conversa_id: Uuid) -> Result<Vec<Mensagem>, AppError> {
        let mensagens = sqlx::query_as::<_, Mensagem>(
            "SELECT * FROM mensagens WHERE conversa_id = $1 ORDER BY created_at ASC",
        )
        .bind(conversa_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(mensagens)
    }
}
