pub mod auth;
pub mod chat;
pub mod conversas;
pub mod empresas;
pub mod whatsapp;
