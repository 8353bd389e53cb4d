use std::path::{Path, PathBuf};

use log::{debug, info};
use minutes_core::graph::{
    event_join_url, event_line, pick_fallback_meeting, select_index,
    sort_transcripts_newest_first,
};

use crate::config::Settings;
use crate::docx::read_transcript;
use crate::graph::GraphClient;
use crate::pipeline::{post_raw_summary, process_summary};
use crate::prelude::{eprintln, println, *};
use crate::summarize::summarize_markdown;

const FALLBACK_MEETING_CANDIDATES: usize = 10;

const CALENDAR_FORBIDDEN_HINT: &str = "Graph returned 403 Forbidden for calendar access. \
Ensure the app has application permissions with admin consent: \
Calendars.Read.All, OnlineMeetings.Read.All, OnlineMeetingTranscript.Read.All.";

#[derive(Debug, clap::Args)]
pub struct RunOptions {
    /// Local transcript file (.docx, .vtt, .txt); skips Microsoft Graph
    #[arg(long, conflicts_with = "summary_file")]
    transcript_file: Option<PathBuf>,

    /// Pre-generated Markdown summary; skips summarization and posts it as-is
    #[arg(long)]
    summary_file: Option<PathBuf>,

    /// Sign in with a device code and read the signed-in user's meetings
    #[arg(long)]
    use_delegated: bool,

    /// List recent matching meetings and exit (with --use-delegated)
    #[arg(long, requires = "use_delegated")]
    list_meetings: bool,

    /// Meeting to process, by index in the --list-meetings output
    #[arg(long, requires = "use_delegated")]
    meeting_index: Option<usize>,

    /// Transcript to process, 0 being the latest
    #[arg(long, requires = "use_delegated")]
    transcript_index: Option<usize>,

    /// Where to write the summary if the card cannot be created
    #[arg(long)]
    output_md: Option<PathBuf>,
}

pub async fn run(options: RunOptions, global: crate::Global) -> Result<()> {
    let settings = Settings::from_env()?;

    if global.verbose {
        eprintln!("Meeting subject: {}", settings.meeting_subject);
        eprintln!("Time window: {}h", settings.time_window_hours);
    }

    if let Some(path) = &options.summary_file {
        return from_summary_file(&settings, path).await;
    }
    if let Some(path) = &options.transcript_file {
        return from_transcript_file(&settings, path, options.output_md.as_deref()).await;
    }
    if options.use_delegated {
        return delegated(&settings, &options).await;
    }

    application(&settings, options.output_md.as_deref()).await
}

async fn from_summary_file(settings: &Settings, path: &Path) -> Result<()> {
    let summary_md = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| eyre!("Summary file not found: {} ({})", path.display(), e))?;

    let outcome = post_raw_summary(settings, &summary_md, path).await?;
    println!("{}", outcome.report());
    Ok(())
}

async fn from_transcript_file(
    settings: &Settings,
    path: &Path,
    output_md: Option<&Path>,
) -> Result<()> {
    if !path.exists() {
        return Err(eyre!("Transcript file not found: {}", path.display()));
    }

    let transcript = read_transcript(path).await?;
    summarize_and_publish(settings, &transcript, output_md).await
}

async fn summarize_and_publish(
    settings: &Settings,
    transcript: &str,
    output_md: Option<&Path>,
) -> Result<()> {
    let summary_md =
        summarize_markdown(settings, transcript, &settings.summary_system_prompt).await?;
    let outcome = process_summary(settings, &summary_md, output_md).await?;
    println!("{}", outcome.report());
    Ok(())
}

/// Newest (or selected) transcript text of a meeting, `None` when the
/// meeting has no transcripts.
async fn fetch_transcript(
    client: &GraphClient,
    meeting_id: &str,
    index: Option<usize>,
) -> Result<Option<String>> {
    let mut transcripts = client.list_transcripts(meeting_id).await?;
    if transcripts.is_empty() {
        println!("No transcripts available; ensure transcription was enabled for the meeting.");
        return Ok(None);
    }

    sort_transcripts_newest_first(&mut transcripts);
    let index =
        select_index(transcripts.len(), index, "transcript-index").map_err(|e| eyre!(e))?;
    let transcript_id = &transcripts[index].id;
    debug!("Using transcript {transcript_id} of meeting {meeting_id}");

    client
        .download_transcript_content(meeting_id, transcript_id)
        .await
        .map(Some)
}

async fn delegated(settings: &Settings, options: &RunOptions) -> Result<()> {
    let client = GraphClient::for_delegated(settings).await?;
    let events = client
        .find_recent_events(&settings.meeting_subject, settings.time_window_hours)
        .await?;

    if options.list_meetings {
        for (i, event) in events.iter().enumerate() {
            println!("{}", event_line(i, event));
        }
        return Ok(());
    }
    if events.is_empty() {
        println!("No matching events found in the time window.");
        return Ok(());
    }

    let index = select_index(events.len(), options.meeting_index, "meeting-index")
        .map_err(|e| eyre!(e))?;
    let join_url = event_join_url(&events[index]).unwrap_or_default();

    let meeting = client
        .resolve_meeting_by_join_url(&join_url)
        .await?
        .ok_or_eyre("Online meeting not found for selected event.")?;

    let Some(transcript) = fetch_transcript(&client, &meeting.id, options.transcript_index).await?
    else {
        return Ok(());
    };

    summarize_and_publish(settings, &transcript, options.output_md.as_deref()).await
}

/// Unattended flow on application permissions: latest matching event,
/// its meeting, its newest transcript.
async fn application(settings: &Settings, output_md: Option<&Path>) -> Result<()> {
    let client = GraphClient::for_app(settings).await?;

    let events = match client
        .find_recent_events(&settings.meeting_subject, settings.time_window_hours)
        .await
    {
        Ok(events) => events,
        Err(e) if Error::status_of(&e) == Some(403) => {
            return Err(e.wrap_err(CALENDAR_FORBIDDEN_HINT))
        }
        Err(e) => return Err(e),
    };

    let Some(event) = events.first() else {
        println!("No matching events found in the time window.");
        return Ok(());
    };

    let join_url = event_join_url(event).ok_or_eyre(
        "Event does not contain an online meeting join URL; cannot resolve meeting id.",
    )?;

    let meeting = match client.resolve_meeting_by_join_url(&join_url).await? {
        Some(meeting) => meeting,
        None => {
            info!("Meeting not resolved by join URL, falling back to recent meetings");
            let candidates = client
                .list_online_meetings(FALLBACK_MEETING_CANDIDATES)
                .await?;
            pick_fallback_meeting(candidates, &settings.meeting_subject).ok_or_eyre(
                "Online meeting not found by join URL, and no recent meetings to fall back to.",
            )?
        }
    };

    let Some(transcript) = fetch_transcript(&client, &meeting.id, None).await? else {
        return Ok(());
    };

    summarize_and_publish(settings, &transcript, output_md).await
}
