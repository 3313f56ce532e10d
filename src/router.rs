// src/router.rs

use axum::{
    handler::Handler,
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppState, handlers, middleware::auth::auth_guard};

async fn info() -> Json<Value> {
    Json(json!({
        "status": "online",
        "message": "🤖 API de Atendimento Automatizado",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth",
            "empresas": "/api/empresas",
            "conversas": "/api/conversas",
            "chat": "/api/chat",
            "whatsapp": "/api/whatsapp"
        }
    }))
}

pub fn app_router(app_state: AppState) -> Router {
    let auth = axum_middleware::from_fn_with_state(app_state.clone(), auth_guard);

    // Login é público; o resto exige token
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/me", get(handlers::auth::get_me.layer(auth.clone())))
        .route("/register", post(handlers::auth::register.layer(auth.clone())))
        .route(
            "/change-password",
            put(handlers::auth::change_password.layer(auth.clone())),
        );

    // Leitura pública (landing page); escrita autenticada
    let empresa_routes = Router::new()
        .route(
            "/",
            get(handlers::empresas::list_empresas)
                .post(handlers::empresas::create_empresa.layer(auth.clone())),
        )
        .route(
            "/{id}",
            get(handlers::empresas::get_empresa)
                .put(handlers::empresas::update_empresa.layer(auth.clone()))
                .delete(handlers::empresas::delete_empresa.layer(auth.clone())),
        );

    let conversa_routes = Router::new()
        .route("/", get(handlers::conversas::list_conversas))
        .route("/empresa/{empresa_id}", get(handlers::conversas::list_by_empresa))
        .route("/empresa/{empresa_id}/stats", get(handlers::conversas::stats))
        .route("/{id}", get(handlers::conversas::get_conversa))
        .route("/{id}/status", patch(handlers::conversas::update_status))
        .layer(auth.clone());

    // O widget conversa sem login
    let chat_routes = Router::new()
        .route("/mensagem", post(handlers::chat::enviar_mensagem))
        .route("/conversa/{id}", get(handlers::chat::historico))
        .route("/sentimento", post(handlers::chat::sentimento.layer(auth.clone())));

    let whatsapp_routes = Router::new()
        .route("/webhook", post(handlers::whatsapp::webhook))
        .route("/enviar", post(handlers::whatsapp::enviar.layer(auth.clone())))
        .route("/qrcode", post(handlers::whatsapp::qrcode.layer(auth.clone())))
        .route(
            "/status/{instance_name}",
            get(handlers::whatsapp::status.layer(auth)),
        );

    Router::new()
        .route("/", get(info))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/empresas", empresa_routes)
        .nest("/api/conversas", conversa_routes)
        .nest("/api/chat", chat_routes)
        .nest("/api/whatsapp", whatsapp_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
