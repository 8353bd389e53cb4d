use log::{debug, info};
use minutes_core::prompt::{SUMMARY_MODEL, SUMMARY_TEMPERATURE};
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;

use crate::config::Settings;
use crate::prelude::*;

fn create_client(api_key: &str, base_url: Option<&str>) -> Result<openai::Client> {
    let mut builder = openai::Client::builder().api_key(api_key);
    if let Some(url) = base_url {
        builder = builder.base_url(url);
    }

    builder
        .build()
        .map_err(|e| eyre!("Failed to create OpenAI client: {}", e))
}

/// Turn a plain-text transcript into Markdown meeting notes.
///
/// `system_prompt` is sent as the preamble and the transcript as the single
/// user turn.
pub async fn summarize_markdown(
    settings: &Settings,
    transcript: &str,
    system_prompt: &str,
) -> Result<String> {
    settings.require(&["OPENAI_API_KEY"])?;

    let client = create_client(&settings.openai_api_key, settings.openai_base_url.as_deref())?;
    let agent = client
        .agent(SUMMARY_MODEL)
        .preamble(system_prompt)
        .temperature(SUMMARY_TEMPERATURE)
        .build();

    debug!(
        "Summarizing {} chars of transcript with {SUMMARY_MODEL}",
        transcript.len()
    );

    let markdown = agent
        .prompt(transcript)
        .await
        .map_err(|e| eyre!("Summary generation failed: {}", e))?;

    info!("Summary generated ({} chars)", markdown.len());

    Ok(markdown)
}
