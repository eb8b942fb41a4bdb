//! Status command.

use console::style;

use crate::config::Settings;
use crate::llm::LlmClient;
use crate::ocr::TesseractClient;
use crate::repository::{AsyncSqlitePool, ConversationRepository};
use crate::vision::DetectionClient;

/// Show database counts and engine availability.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    if !settings.database_exists() {
        println!(
            "{} No database at {} (run `sleuth init` first)",
            style("!").yellow(),
            settings.database_path().display()
        );
        return Ok(());
    }

    let pool = AsyncSqlitePool::from_path(&settings.database_path());
    let repo = ConversationRepository::new(pool);

    println!("{} Database: {}", style("→").cyan(), settings.database_path().display());
    println!("  Conversations: {}", repo.count_conversations().await?);
    println!("  Messages:      {}", repo.count_messages().await?);
    println!("  Images:        {}", repo.count_images().await?);

    let detection = DetectionClient::new(settings.detection.clone())?;
    let extraction = TesseractClient::new(settings.extraction.clone());
    let llm = LlmClient::new(settings.llm.clone())?;

    println!("{} Engines:", style("→").cyan());
    print_engine("detection", detection.is_available().await);
    print_engine("extraction", extraction.is_available().await);
    print_engine("llm", llm.is_available().await);

    Ok(())
}

fn print_engine(name: &str, available: bool) {
    if available {
        println!("  {} {}", style("✓").green(), name);
    } else {
        println!("  {} {} (unavailable)", style("✗").red(), name);
    }
}
