// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::{best_effort::best_effort, error::AppError},
    db::{EmpresaRepository, UserRepository},
    models::auth::{Claims, LoginResponse, NovoUsuario, RegisterPayload, Role, Usuario},
};

const VALIDADE_TOKEN_DIAS: i64 = 7;

#[derive(Clone)]
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    empresa_repo: Arc<dyn EmpresaRepository>,
    jwt_secret: String,
    bcrypt_cost: u32,
}

/// Hash da senha num thread separado (bcrypt é CPU-bound).
pub(crate) async fn hash_password(senha: &str, custo: u32) -> Result<String, AppError> {
    let senha = senha.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&senha, custo))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

async fn verify_password(senha: &str, senha_hash: &str) -> Result<bool, AppError> {
    let senha = senha.to_owned();
    let senha_hash = senha_hash.to_owned();

    // Executa a verificação em um thread separado
    let valida = tokio::task::spawn_blocking(move || verify(&senha, &senha_hash))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
    Ok(valida)
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        empresa_repo: Arc<dyn EmpresaRepository>,
        jwt_secret: String,
    ) -> Self {
        Self { user_repo, empresa_repo, jwt_secret, bcrypt_cost: bcrypt::DEFAULT_COST }
    }

    #[cfg(test)]
    pub fn with_bcrypt_cost(mut self, custo: u32) -> Self {
        self.bcrypt_cost = custo;
        self
    }

    pub async fn login(&self, email: &str, senha: &str) -> Result<LoginResponse, AppError> {
        let email = email.trim().to_lowercase();

        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !user.ativo || !verify_password(senha, &user.senha_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        best_effort("atualizar último login", self.user_repo.update_last_login(user.id)).await;

        let token = self.create_token(&user)?;
        tracing::info!("🔑 Login de {}", user.email);
        Ok(LoginResponse { token, user })
    }

    pub async fn verify_token(&self, token: &str) -> Result<Usuario, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        // Usuário desativado depois da emissão perde o acesso
        self.user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .filter(|u| u.ativo)
            .ok_or(AppError::InvalidToken)
    }

    pub async fn register(&self, payload: RegisterPayload) -> Result<Usuario, AppError> {
        let email = payload.email.trim().to_lowercase();
        let role = payload.role.unwrap_or(Role::Client);

        // Cliente sempre pertence a uma empresa existente
        match payload.empresa_id {
            Some(empresa_id) => {
                if self.empresa_repo.find_by_id(empresa_id).await?.is_none() {
                    return Err(AppError::EmpresaNotFound);
                }
            }
            None if role == Role::Client => {
                return Err(AppError::BadRequest(
                    "empresa_id é obrigatório para usuários do tipo client.".to_string(),
                ));
            }
            None => {}
        }

        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::EmailAlreadyExists);
        }

        let senha_hash = hash_password(&payload.senha, self.bcrypt_cost).await?;
        let user = self
            .user_repo
            .create(NovoUsuario {
                nome: payload.nome.trim().to_string(),
                email,
                senha_hash,
                role,
                empresa_id: payload.empresa_id,
            })
            .await?;

        tracing::info!("👤 Usuário {} registrado", user.email);
        Ok(user)
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        senha_atual: &str,
        nova_senha: &str,
    ) -> Result<(), AppError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if !verify_password(senha_atual, &user.senha_hash).await? {
            return Err(AppError::SenhaAtualIncorreta);
        }

        let senha_hash = hash_password(nova_senha, self.bcrypt_cost).await?;
        self.user_repo.update_password(user.id, &senha_hash).await
    }

    /// Cria o super admin inicial quando o e-mail ainda não existe.
    pub async fn ensure_bootstrap_admin(&self, email: &str, senha: &str) -> Result<bool, AppError> {
        let email = email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Ok(false);
        }

        let senha_hash = hash_password(senha, self.bcrypt_cost).await?;
        self.user_repo
            .create(NovoUsuario {
                nome: "Administrador".to_string(),
                email: email.clone(),
                senha_hash,
                role: Role::SuperAdmin,
                empresa_id: None,
            })
            .await?;

        tracing::info!("🛡️ Super admin {} criado", email);
        Ok(true)
    }

    fn create_token(&self, user: &Usuario) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(VALIDADE_TOKEN_DIAS);

        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            empresa_id: user.empresa_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

pub fn require_super_admin(user: &Usuario) -> Result<(), AppError> {
    if user.is_super_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Super admin acessa qualquer empresa; cliente, só a própria.
pub fn ensure_empresa_access(user: &Usuario, empresa_id: Uuid) -> Result<(), AppError> {
    if user.is_super_admin() || user.empresa_id == Some(empresa_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
