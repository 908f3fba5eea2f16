//! Forward-only migration runner over embedded `.sql` files.
//!
//! Grounded on `original_source`'s `migrator.go`, which wraps
//! `golang-migrate`'s `iofs`-embedded files plus its Postgres driver in
//! exactly this shape: apply everything pending, in order, and treat "no
//! migrations to apply" as success rather than an error.

use tokio_postgres::Client;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Applies every migration under `migrations/` that hasn't run yet. A clean
/// "nothing to do" result is success, matching `migrate.ErrNoChange`.
pub async fn run_migrations(client: &mut Client) -> anyhow::Result<()> {
    let report = embedded::migrations::runner().run_async(client).await?;
    for migration in report.applied_migrations() {
        tracing::info!("applied migration {}", migration.name());
    }
    Ok(())
}
