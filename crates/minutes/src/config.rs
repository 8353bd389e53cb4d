use std::path::{Path, PathBuf};

use log::{debug, warn};
use minutes_core::prompt::resolve_system_prompt;

use crate::prelude::*;

const DEFAULT_MEETING_SUBJECT: &str = "EDA Library";
const DEFAULT_TIME_WINDOW_HOURS: u32 = 48;
const DEFAULT_PROMPT_FILE: &str = "prompts/summary_system_prompt.md";

/// Runtime configuration, read once from the environment (and `.env`).
///
/// Credentials are allowed to be empty here; each client checks the ones it
/// needs when it is built, so `parse` and `verify` work on a partial setup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub trello_key: String,
    pub trello_token: String,
    pub trello_list_id_or_board_id: String,
    pub graph_target_user: Option<String>,
    pub meeting_subject: String,
    pub time_window_hours: u32,
    pub summary_system_prompt: String,
}

fn var(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a prompt file, treating a missing or unreadable file as absent.
fn read_prompt_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Ignoring prompt file {}: {}", path.display(), e);
            None
        }
    }
}

fn parse_hours(raw: Option<String>) -> Result<u32> {
    match raw {
        None => Ok(DEFAULT_TIME_WINDOW_HOURS),
        Some(value) => value.trim().parse::<u32>().map_err(|e| {
            Error::Config(format!("TIME_WINDOW_HOURS must be a whole number of hours ({value:?}: {e})"))
                .into()
        }),
    }
}

impl Settings {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let prompt_path = optional_var("SUMMARY_PROMPT_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPT_FILE));
        let prompt_file = read_prompt_file(&prompt_path);
        let summary_system_prompt = resolve_system_prompt(
            prompt_file.as_deref(),
            optional_var("SUMMARY_SYSTEM_PROMPT").as_deref(),
        );

        Ok(Self {
            tenant_id: var("TENANT_ID"),
            client_id: var("CLIENT_ID"),
            client_secret: var("CLIENT_SECRET"),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: optional_var("OPENAI_BASE_URL"),
            trello_key: var("TRELLO_KEY"),
            trello_token: var("TRELLO_TOKEN"),
            trello_list_id_or_board_id: var("TRELLO_LIST_ID"),
            graph_target_user: optional_var("GRAPH_TARGET_USER"),
            meeting_subject: std::env::var("MEETING_SUBJECT")
                .unwrap_or_else(|_| DEFAULT_MEETING_SUBJECT.to_string()),
            time_window_hours: parse_hours(optional_var("TIME_WINDOW_HOURS"))?,
            summary_system_prompt,
        })
    }

    /// Every variable the full pipeline needs, with whether it is set.
    pub fn required_vars(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("TENANT_ID", !self.tenant_id.is_empty()),
            ("CLIENT_ID", !self.client_id.is_empty()),
            ("CLIENT_SECRET", !self.client_secret.is_empty()),
            ("OPENAI_API_KEY", !self.openai_api_key.is_empty()),
            ("TRELLO_KEY", !self.trello_key.is_empty()),
            ("TRELLO_TOKEN", !self.trello_token.is_empty()),
            ("TRELLO_LIST_ID", !self.trello_list_id_or_board_id.is_empty()),
            ("GRAPH_TARGET_USER", self.graph_target_user.is_some()),
        ]
    }

    /// Fail with a config error naming the first empty variable.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        let missing: Vec<&str> = self
            .required_vars()
            .into_iter()
            .filter(|(name, set)| names.contains(name) && !set)
            .map(|(name, _)| name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "{} environment variable not set",
                missing.join(", ")
            ))
            .into())
        }
    }

    /// Target user for application-permission Graph calls.
    pub fn target_user(&self) -> Result<&str> {
        self.graph_target_user
            .as_deref()
            .ok_or_else(|| {
                Error::Config("GRAPH_TARGET_USER is not set; set a UPN or user id".to_string())
                    .into()
            })
    }
}
