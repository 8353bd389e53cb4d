use colored::Colorize;
use minutes_core::graph::first_join_url;

use crate::board::TrelloClient;
use crate::config::Settings;
use crate::graph::{app_token, GraphClient, Principal};
use crate::prelude::{println, *};

const OPENAI_MODELS_URL: &str = "https://api.openai.com/v1/models";
const FALLBACK_MEETINGS_TOP: usize = 5;

/// `[OK] name` or `[FAIL] name — detail`
fn check_line(name: &str, ok: bool, detail: Option<&str>) -> String {
    let status = if ok { "OK" } else { "FAIL" };
    match detail {
        Some(detail) => format!("[{status}] {name} — {detail}"),
        None => format!("[{status}] {name}"),
    }
}

/// Short failure detail: the HTTP status when there is one.
fn failure_detail(report: &color_eyre::eyre::Report) -> String {
    match Error::status_of(report) {
        Some(status) => format!("HTTP {status}"),
        None => crate::http::truncate_body(&report.to_string(), 120),
    }
}

#[derive(Debug, Default)]
struct Checks {
    failed: bool,
}

impl Checks {
    fn record(&mut self, name: &str, ok: bool, detail: Option<&str>) {
        self.failed |= !ok;
        let line = check_line(name, ok, detail);
        if ok {
            println!("{}", line.green());
        } else {
            println!("{}", line.red());
        }
    }

    fn pass(&mut self, name: &str, detail: Option<&str>) {
        self.record(name, true, detail);
    }

    fn fail(&mut self, name: &str, detail: &str) {
        self.record(name, false, Some(detail));
    }
}

/// Check credentials and permissions for every service the pipeline uses.
pub async fn run(global: crate::Global) -> Result<()> {
    let settings = Settings::from_env()?;
    let mut checks = Checks::default();

    for (name, set) in settings.required_vars() {
        checks.record(&format!("ENV {name}"), set, None);
    }

    let graph = match (app_token(&settings).await, settings.graph_target_user.clone()) {
        (Ok(token), Some(user)) => {
            checks.pass("Graph app token", None);
            Some(GraphClient::new(token, Principal::User(user)))
        }
        (Ok(_), None) => {
            checks.pass("Graph app token", None);
            None
        }
        (Err(e), _) => {
            checks.fail("Graph app token", &failure_detail(&e));
            None
        }
    };

    match &graph {
        Some(client) => check_graph(&settings, client, &mut checks).await,
        None => {
            checks.fail("Graph events access", "missing token or GRAPH_TARGET_USER");
            checks.fail("Graph online meeting access", "missing token or user");
            checks.fail("Graph transcript access", "missing meeting id");
        }
    }

    check_openai(&settings, &mut checks).await;

    match TrelloClient::from_settings(&settings) {
        Ok(client) => match client
            .ensure_list_id(&settings.trello_list_id_or_board_id)
            .await
        {
            Ok(list_id) => checks.pass("Trello access", Some(&format!("list id {list_id}"))),
            Err(e) => checks.fail("Trello access", &failure_detail(&e)),
        },
        Err(e) => checks.fail("Trello access", &failure_detail(&e)),
    }

    println!("\nVerification complete.");

    if global.verbose {
        anstream::eprintln!("Meeting subject: {}", settings.meeting_subject);
    }

    if checks.failed {
        Err(eyre!("One or more setup checks failed"))
    } else {
        Ok(())
    }
}

async fn check_graph(settings: &Settings, client: &GraphClient, checks: &mut Checks) {
    let join_url = match client
        .find_recent_events(&settings.meeting_subject, settings.time_window_hours)
        .await
    {
        Ok(events) => {
            checks.pass(
                "Graph events access",
                Some(&format!("found {} recent events", events.len())),
            );
            first_join_url(&events)
        }
        Err(e) => {
            checks.fail("Graph events access", &failure_detail(&e));
            None
        }
    };

    let resolved = match join_url {
        Some(url) => match client.resolve_meeting_by_join_url(&url).await {
            Ok(meeting) => Ok(meeting),
            Err(e) if Error::status_of(&e) == Some(404) => Ok(None),
            Err(e) => Err(failure_detail(&e)),
        },
        None => Ok(None),
    };

    let meeting = match resolved {
        Ok(Some(meeting)) => Ok(Some(meeting)),
        Ok(None) => client
            .list_online_meetings(FALLBACK_MEETINGS_TOP)
            .await
            .map(|candidates| candidates.into_iter().next())
            .map_err(|e| format!("{} on fallback list", failure_detail(&e))),
        Err(detail) => Err(detail),
    };

    let meeting_id = match meeting {
        Ok(Some(meeting)) => {
            checks.pass(
                "Graph online meeting access",
                Some(&format!("meeting id {}", meeting.id)),
            );
            Some(meeting.id)
        }
        Ok(None) => {
            checks.fail(
                "Graph online meeting access",
                "not found (join url or fallback)",
            );
            None
        }
        Err(detail) => {
            checks.fail("Graph online meeting access", &detail);
            None
        }
    };

    let Some(meeting_id) = meeting_id else {
        checks.fail("Graph transcript access", "missing meeting id");
        return;
    };

    match client.list_transcripts(&meeting_id).await {
        Ok(transcripts) => checks.pass(
            "Graph transcript access",
            Some(&format!("transcripts {}", transcripts.len())),
        ),
        Err(e) => checks.fail("Graph transcript access", &failure_detail(&e)),
    }
}

async fn list_models(settings: &Settings) -> Result<()> {
    let url = settings
        .openai_base_url
        .as_deref()
        .map(|base| format!("{}/models", base.trim_end_matches('/')))
        .unwrap_or_else(|| OPENAI_MODELS_URL.to_string());

    let response = reqwest::Client::new()
        .get(&url)
        .bearer_auth(&settings.openai_api_key)
        .send()
        .await
        .map_err(|e| eyre!("Failed to reach {url}: {e}"))?;
    crate::http::check_response(response, "List models failed").await?;
    Ok(())
}

async fn check_openai(settings: &Settings, checks: &mut Checks) {
    match list_models(settings).await {
        Ok(()) => checks.pass("OpenAI connectivity", None),
        Err(e) => checks.fail("OpenAI connectivity", &failure_detail(&e)),
    }
}
