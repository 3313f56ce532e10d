use std::{fmt::Display, future::Future};

/// Executa uma operação não crítica: a falha é logada e nunca propagada.
///
/// Usado para efeitos colaterais secundários (atualizar último login,
/// encaminhar a resposta ao WhatsApp) que não devem derrubar a requisição.
pub async fn best_effort<T, E, F>(operacao: &str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(valor) => Some(valor),
        Err(e) => {
            tracing::warn!("⚠️ Operação não crítica '{}' falhou: {}", operacao, e);
            None
        }
    }
}
