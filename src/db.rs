pub mod conversa_repo;
pub mod empresa_repo;
pub mod user_repo;
#[cfg(test)]
pub mod memory;

pub use conversa_repo::{ConversaRepository, PgConversaRepository};
pub use empresa_repo::{EmpresaRepository, PgEmpresaRepository};
pub use user_repo::{PgUserRepository, UserRepository};
