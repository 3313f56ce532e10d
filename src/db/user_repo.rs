// src/db/user_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::auth::{NovoUsuario, Usuario},
};

// Todas as interações com a tabela 'usuarios'
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Usuario>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Usuario>, AppError>;
    async fn create(&self, novo: NovoUsuario) -> Result<Usuario, AppError>;
    async fn update_last_login(&self, id: Uuid) -> Result<(), AppError>;
    async fn update_password(&self, id: Uuid, senha_hash: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    // O e-mail chega já em minúsculas (o serviço normaliza)
    async fn find_by_email(&self, email: &str) -> Result<Option<Usuario>, AppError> {
        let usuario = sqlx::query_as::<_, Usuario>("SELECT * FROM usuarios WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(usuario)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Usuario>, AppError> {
        let usuario = sqlx::query_as::<_, Usuario>("SELECT * FROM usuarios WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(usuario)
    }

    // Cria um novo usuário, com tratamento específico para e-mail duplicado
    async fn create(&self, novo: NovoUsuario) -> Result<Usuario, AppError> {
        sqlx::query_as::<_, Usuario>(
            r#"
            INSERT INTO usuarios (nome, email, senha_hash, role, empresa_id, ativo)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING *
            "#,
        )
        .bind(&novo.nome)
        .bind(&novo.email)
        .bind(&novo.senha_hash)
        .bind(novo.role)
        .bind(novo.empresa_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE usuarios SET ultimo_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, senha_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE usuarios SET senha_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(senha_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }
}
