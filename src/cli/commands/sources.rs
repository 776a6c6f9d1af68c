//! Sources command handler

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_sources(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let sources = config.enabled_sources();

    if sources.is_empty() {
        println!("No sources enabled.");
        println!();
        println!("Add a [[sources]] entry to config.toml");
        return Ok(());
    }

    println!("Sources ({} enabled)", sources.len());
    println!("{:-<70}", "");

    for source in sources {
        let settings = config.source_settings(&source);
        let titles = store.count_titles(source.id).await.unwrap_or(0);

        println!("• {} ({})", source.id.display_name(), source.id);
        println!(
            "  Titles: {} | Cache: {}h titles, {}h genres | Main pages: {}",
            titles,
            settings.titles_period.as_secs() / 3600,
            settings.genres_period.as_secs() / 3600,
            settings.main_pages
        );

        match store.get_schedule(source.id).await? {
            Some(schedule) => {
                println!(
                    "  Last refresh: {} | Next: {}",
                    schedule.last_run_at.as_deref().unwrap_or("never"),
                    schedule.next_due_at
                );
                if let Some(error) = schedule.last_error {
                    println!("  Last error: {}", error);
                }
            }
            None => println!("  Never refreshed"),
        }
    }

    Ok(())
}
