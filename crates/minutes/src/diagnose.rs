//! Application-permission probes against Microsoft Graph.
//!
//! Each subcommand exercises one permission so a failing setup can be
//! narrowed down without running the whole pipeline. Transcript content is
//! never printed, only its length.

use minutes_core::graph::{
    first_join_url, meeting_line, select_index, sort_transcripts_newest_first, transcript_line,
};

use crate::config::Settings;
use crate::graph::GraphClient;
use crate::http::truncate_body;
use crate::prelude::{println, *};

const MEETINGS_TOP: usize = 10;
const BODY_PREVIEW_CHARS: usize = 400;

#[derive(Debug, clap::Parser)]
#[command(name = "graph")]
#[command(about = "Check Microsoft Graph access with application permissions")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Show the directory entry of GRAPH_TARGET_USER
    #[clap(name = "user-info")]
    UserInfo,

    /// List recent matching calendar events
    #[clap(name = "list-events")]
    ListEvents,

    /// Resolve an online meeting from the first event with a join URL
    #[clap(name = "resolve-join-url")]
    ResolveJoinUrl,

    /// List recent online meetings
    #[clap(name = "list-meetings")]
    ListMeetings,

    /// List transcripts of a meeting and check one can be downloaded
    #[clap(name = "list-transcripts")]
    ListTranscripts(ListTranscriptsOptions),
}

#[derive(Debug, clap::Args)]
pub struct ListTranscriptsOptions {
    /// Meeting index in the list-meetings output
    #[arg(long)]
    meeting_index: Option<usize>,

    /// Transcript index to download, 0 being the latest
    #[arg(long)]
    transcript_index: Option<usize>,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let settings = Settings::from_env()?;
    let client = GraphClient::for_app(&settings).await?;

    if global.verbose {
        anstream::eprintln!("Principal: {:?}", client.principal());
    }

    match app.command {
        Commands::UserInfo => user_info(&client).await,
        Commands::ListEvents => list_events(&client, &settings).await,
        Commands::ResolveJoinUrl => resolve_join_url(&client, &settings).await,
        Commands::ListMeetings => list_meetings(&client).await,
        Commands::ListTranscripts(options) => list_transcripts(&client, options).await,
    }
    .map_err(shorten_http_body)
}

/// Keep Graph error bodies readable in the terminal.
fn shorten_http_body(report: color_eyre::eyre::Report) -> color_eyre::eyre::Report {
    match report.downcast::<Error>() {
        Ok(Error::Http {
            context,
            status,
            body,
        }) => Error::Http {
            context,
            status,
            body: truncate_body(&body, BODY_PREVIEW_CHARS),
        }
        .into(),
        Ok(other) => other.into(),
        Err(report) => report,
    }
}

async fn user_info(client: &GraphClient) -> Result<()> {
    let user = client.get_user().await?;
    println!("User info:");
    println!("  id={}", user.id.unwrap_or_default());
    println!(
        "  userPrincipalName={}",
        user.user_principal_name.unwrap_or_default()
    );
    println!("  displayName={}", user.display_name.unwrap_or_default());
    Ok(())
}

async fn list_events(client: &GraphClient, settings: &Settings) -> Result<()> {
    let events = client
        .find_recent_events(&settings.meeting_subject, settings.time_window_hours)
        .await?;

    if events.is_empty() {
        println!("No matching events found in the time window.");
    }
    for (i, event) in events.iter().enumerate() {
        println!("{}", minutes_core::graph::event_line(i, event));
    }
    Ok(())
}

async fn resolve_join_url(client: &GraphClient, settings: &Settings) -> Result<()> {
    let events = client
        .find_recent_events(&settings.meeting_subject, settings.time_window_hours)
        .await?;

    let Some(join_url) = first_join_url(&events) else {
        println!("No event contains an online meeting join URL in the time window.");
        return Ok(());
    };

    match client.resolve_meeting_by_join_url(&join_url).await? {
        Some(meeting) => println!(
            "Resolved meeting id: {} | subject={} | created={}",
            meeting.id,
            meeting.subject.unwrap_or_default(),
            meeting.creation_date_time.unwrap_or_default()
        ),
        None => println!("Meeting not resolved by joinUrl (empty result)."),
    }
    Ok(())
}

async fn list_meetings(client: &GraphClient) -> Result<()> {
    let meetings = client.list_online_meetings(MEETINGS_TOP).await?;

    if meetings.is_empty() {
        println!(
            "No recent online meetings returned. If this should succeed, ensure an \
             Application Access Policy is granted to the organizer and wait for propagation."
        );
    }
    for (i, meeting) in meetings.iter().enumerate() {
        println!("{}", meeting_line(i, meeting));
    }
    Ok(())
}

async fn list_transcripts(client: &GraphClient, options: ListTranscriptsOptions) -> Result<()> {
    let meetings = client.list_online_meetings(MEETINGS_TOP).await?;
    if meetings.is_empty() {
        println!("No meetings to list transcripts for.");
        return Ok(());
    }

    let index = select_index(meetings.len(), options.meeting_index, "meeting-index")
        .map_err(|e| eyre!(e))?;
    let meeting_id = &meetings[index].id;

    let mut transcripts = client.list_transcripts(meeting_id).await?;
    if transcripts.is_empty() {
        println!("No transcripts available; ensure transcription was enabled for the meeting.");
        return Ok(());
    }

    sort_transcripts_newest_first(&mut transcripts);
    for (i, transcript) in transcripts.iter().enumerate() {
        println!("{}", transcript_line(i, transcript));
    }

    let index = select_index(
        transcripts.len(),
        options.transcript_index,
        "transcript-index",
    )
    .map_err(|e| eyre!(e))?;
    let content = client
        .download_transcript_content(meeting_id, &transcripts[index].id)
        .await?;

    println!(
        "Transcript content length: {} characters (not printing full text)",
        content.chars().count()
    );
    Ok(())
}
