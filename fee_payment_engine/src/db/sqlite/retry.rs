use std::future::Future;

use log::*;
use rand::Rng;

use crate::fpe_api::errors::FeeEngineError;

const MAX_ATTEMPTS: u32 = 20;

/// Runs `attempt` until it succeeds, fails with something other than a write conflict, or runs out of attempts.
///
/// Every attempt must open (and commit) its own transaction. A conflicting attempt has been rolled back by the time
/// its error surfaces here, so the next attempt re-reads whatever the winning transaction wrote.
pub(crate) async fn retry_on_conflict<T, F, Fut>(label: &str, mut attempt: F) -> Result<T, FeeEngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeeEngineError>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Err(e) if e.is_write_conflict() && tries < MAX_ATTEMPTS => {
                let backoff = rand::thread_rng().gen_range(2..10) * u64::from(tries);
                debug!("🗃️ {label}: write conflict on attempt {tries} ({e}). Retrying in {backoff}ms");
                tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
            },
            Err(e) if e.is_write_conflict() => {
                warn!("🗃️ {label}: giving up after {tries} conflicting attempts. Last error: {e}");
                return Err(FeeEngineError::RetriesExhausted(label.to_string()));
            },
            other => return other,
        }
    }
}
