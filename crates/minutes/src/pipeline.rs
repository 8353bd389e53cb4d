//! Summary to card, with a local Markdown file as the fallback.

use std::path::{Path, PathBuf};

use log::{info, warn};
use minutes_core::board::PublishedCard;
use minutes_core::card::{
    card_name, fallback_markdown_path, raw_summary_card_name, transform, ParsedCard,
};

use crate::board::TrelloClient;
use crate::config::Settings;
use crate::prelude::*;

/// Where a summary ended up
#[derive(Debug)]
pub enum Outcome {
    Published(PublishedCard),
    Written(PathBuf),
}

impl Outcome {
    pub fn report(&self) -> String {
        match self {
            Outcome::Published(card) => format!(
                "Created Trello card: {}",
                card.card_url.as_deref().unwrap_or(&card.card_id)
            ),
            Outcome::Written(path) => format!("Summary written to {}", path.display()),
        }
    }
}

async fn connect(settings: &Settings) -> Result<(TrelloClient, String)> {
    let client = TrelloClient::from_settings(settings)?;
    let list_id = client
        .ensure_list_id(&settings.trello_list_id_or_board_id)
        .await?;
    Ok((client, list_id))
}

/// Transform a summary and publish it as a card with checklists.
///
/// The client is handed back so callers can attach files to the new card.
pub async fn publish_summary(
    settings: &Settings,
    summary_md: &str,
) -> Result<(TrelloClient, ParsedCard, PublishedCard)> {
    let (client, list_id) = connect(settings).await?;
    let parsed = transform(summary_md);
    let name = card_name(parsed.title.as_deref(), &settings.meeting_subject, today());

    let (_, published) = client.publish_card(&list_id, &name, &parsed).await?;
    Ok((client, parsed, published))
}

async fn publish_raw(settings: &Settings, summary_md: &str) -> Result<PublishedCard> {
    let (client, list_id) = connect(settings).await?;
    let name = raw_summary_card_name(&settings.meeting_subject, today());
    let card = client.create_card(&list_id, &name, summary_md).await?;

    Ok(PublishedCard {
        card_id: card.id,
        card_url: card.short_url,
        title: name,
        checklists: 0,
        items: 0,
    })
}

async fn write_fallback(
    summary_md: &str,
    path: PathBuf,
    error: &color_eyre::eyre::Report,
) -> Result<Outcome> {
    warn!("Trello failed ({error}). Writing Markdown to file.");
    tokio::fs::write(&path, summary_md)
        .await
        .map_err(|e| eyre!("Failed to write summary to {}: {}", path.display(), e))?;
    Ok(Outcome::Written(path))
}

/// Publish a generated summary, or save it locally when the board is
/// unreachable.
pub async fn process_summary(
    settings: &Settings,
    summary_md: &str,
    output_md: Option<&Path>,
) -> Result<Outcome> {
    match publish_summary(settings, summary_md).await {
        Ok((_, parsed, published)) => {
            info!(
                "Published '{}' with {} checklist(s), {} item(s)",
                published.title,
                parsed.checklists.len(),
                published.items
            );
            Ok(Outcome::Published(published))
        }
        Err(error) => {
            let path = output_md
                .map(Path::to_path_buf)
                .unwrap_or_else(|| {
                    PathBuf::from(fallback_markdown_path(&settings.meeting_subject, today()))
                });
            write_fallback(summary_md, path, &error).await
        }
    }
}

/// Post a pre-written summary as-is: the whole Markdown becomes the card
/// description, with no checklists.
pub async fn post_raw_summary(
    settings: &Settings,
    summary_md: &str,
    summary_path: &Path,
) -> Result<Outcome> {
    match publish_raw(settings, summary_md).await {
        Ok(published) => Ok(Outcome::Published(published)),
        Err(error) => write_fallback(summary_md, summary_path.to_path_buf(), &error).await,
    }
}
