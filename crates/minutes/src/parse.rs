use std::path::PathBuf;

use colored::Colorize;
use minutes_core::card::{card_name, transform, ParsedCard};
use serde::Serialize;

use crate::prelude::{println, *};

#[derive(Debug, clap::Args)]
pub struct ParseOptions {
    /// Markdown summary to convert
    file: PathBuf,

    /// Meeting subject used when the summary has no title
    #[arg(long, env = "MEETING_SUBJECT", default_value = "EDA Library")]
    subject: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Card as it would be posted
#[derive(Debug, Serialize)]
struct Preview {
    name: String,
    #[serde(flatten)]
    card: ParsedCard,
}

/// Run the card transform on a local file without touching any service.
pub async fn run(options: ParseOptions, global: crate::Global) -> Result<()> {
    let markdown = tokio::fs::read_to_string(&options.file)
        .await
        .map_err(|e| eyre!("Failed to read '{}': {}", options.file.display(), e))?;

    let card = transform(&markdown);
    let preview = Preview {
        name: card_name(card.title.as_deref(), &options.subject, today()),
        card,
    };

    if global.verbose {
        anstream::eprintln!("Read {} bytes from {}", markdown.len(), options.file.display());
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!("\n{}\n", preview.name.bold());

    if !preview.card.description.is_empty() {
        println!("{}", "Description:".bold().cyan());
        println!("{}\n", preview.card.description);
    }

    if preview.card.checklists.is_empty() {
        println!("No checklists.");
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row![
        "Checklist".bold().cyan(),
        "Items".bold().cyan()
    ]);
    for checklist in &preview.card.checklists {
        let items = checklist
            .items
            .iter()
            .map(|item| format!("[ ] {item}"))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(prettytable::row![checklist.name, items]);
    }
    table.printstd();

    Ok(())
}
