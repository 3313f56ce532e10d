pub mod auth;
pub mod conversa;
pub mod empresa;
pub mod whatsapp;
