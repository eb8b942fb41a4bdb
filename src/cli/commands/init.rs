//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::repository::AsyncSqlitePool;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let pool = AsyncSqlitePool::from_path(&settings.database_path());
    pool.init_schema().await?;

    println!(
        "{} Initialized scenesleuth in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
