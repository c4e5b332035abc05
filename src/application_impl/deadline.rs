use crate::application_port::AuthError;
use std::future::Future;
use std::time::Duration;

/// Awaits a store or resolver call, failing with `DependencyTimeout` if it
/// does not settle within `limit`.
pub(crate) async fn bounded<T, E, F>(
    dependency: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AuthError>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            tracing::warn!(dependency, timeout_ms = limit.as_millis() as u64, "dependency call timed out");
            Err(AuthError::DependencyTimeout(dependency))
        }
    }
}
