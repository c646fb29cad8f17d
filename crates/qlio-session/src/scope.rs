//! Scoped units of work.

use asupersync::{Cx, Outcome};
use qlio_core::{Connector, Error};
use qlio_schema::Dialect;

use crate::Session;

/// Run `f` inside a started session and always release it.
///
/// - `f` succeeds: commit, then close. A failed commit is rolled back, the
///   session is closed with an error, and the commit error is returned.
/// - `f` fails, is cancelled or panics: roll back, close with an error, and
///   pass the original outcome through.
///
/// Cleanup failures on the error path are logged, never returned in place
/// of the original failure.
pub async fn run_scoped<C, T, F>(cx: &Cx, connector: &C, dialect: Dialect, f: F) -> Outcome<T, Error>
where
    C: Connector,
    F: AsyncFnOnce(&mut Session<'_, C>) -> Outcome<T, Error>,
{
    let mut session = Session::new(connector, dialect);
    match session.start(cx).await {
        Outcome::Ok(()) => {}
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    }

    let result = f(&mut session).await;
    if !session.is_ready() {
        // The body closed the session itself.
        return result;
    }

    match result {
        Outcome::Ok(value) => match session.commit(cx).await {
            Outcome::Ok(()) => match session.close(cx).await {
                Outcome::Ok(()) => Outcome::Ok(value),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            },
            Outcome::Err(e) => {
                abort(&mut session, cx).await;
                Outcome::Err(e)
            }
            Outcome::Cancelled(r) => {
                abort(&mut session, cx).await;
                Outcome::Cancelled(r)
            }
            Outcome::Panicked(p) => {
                abort(&mut session, cx).await;
                Outcome::Panicked(p)
            }
        },
        other => {
            abort(&mut session, cx).await;
            other
        }
    }
}

/// Roll back and close with an error, logging cleanup failures.
async fn abort<C: Connector>(session: &mut Session<'_, C>, cx: &Cx) {
    match session.rollback(cx, None).await {
        Outcome::Ok(()) => tracing::debug!("Rolled back scoped session"),
        Outcome::Err(e) => tracing::warn!(error = %e, "Rollback failed while aborting session"),
        Outcome::Cancelled(_) => tracing::warn!("Rollback cancelled while aborting session"),
        Outcome::Panicked(_) => tracing::warn!("Rollback panicked while aborting session"),
    }
    match session.close_with_error(cx).await {
        Outcome::Ok(()) => {}
        Outcome::Err(e) => tracing::warn!(error = %e, "Close failed while aborting session"),
        Outcome::Cancelled(_) => tracing::warn!("Close cancelled while aborting session"),
        Outcome::Panicked(_) => tracing::warn!("Close panicked while aborting session"),
    }
}
