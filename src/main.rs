//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod common;
mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod router;
mod services;

use crate::config::{connect_database, AppState, Config};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Sem configuração mínima a aplicação não deve iniciar
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("🔥 Configuração inválida: {}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match connect_database(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("🔥 Falha ao conectar ao banco de dados: {:?}", e);
            std::process::exit(1);
        }
    };

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let app_state = AppState::from_pool(db_pool, &config)
        .expect("Falha ao inicializar o estado da aplicação.");

    if let Some(admin) = &config.admin {
        if let Err(e) = app_state
            .auth_service
            .ensure_bootstrap_admin(&admin.email, &admin.senha)
            .await
        {
            tracing::error!("🔥 Falha ao criar o super admin inicial: {}", e);
        }
    }

    let app = router::app_router(app_state);

    // Inicia o servidor
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", addr);
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
