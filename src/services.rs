pub mod auth;
pub mod conversation_service;
pub mod empresa_service;
pub mod llm;
pub mod whatsapp;
