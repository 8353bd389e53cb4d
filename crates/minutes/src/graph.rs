//! Microsoft Graph client
//!
//! Two ways in: application permissions (client credentials, calls go to
//! `/users/{id}`) for unattended runs, and delegated permissions (device
//! code sign-in, calls go to `/me`) for operators without admin consent.

use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info};
use minutes_core::graph::{
    classify_poll_error, events_filter, filter_recent_events, join_url_filter, window_start,
    DeviceCodeResponse, GraphEvent, GraphUser, ODataPage, OnlineMeeting, PollOutcome,
    TokenErrorResponse, TokenResponse, TranscriptMeta, APP_SCOPE, DELEGATED_SCOPES,
};
use serde::de::DeserializeOwned;

use crate::config::Settings;
use crate::http::check_response;
use crate::prelude::{eprintln, *};

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const DELEGATED_EVENT_PAGE: usize = 50;
const APP_EVENT_PAGE: usize = 10;

/// Whose calendar and meetings the client reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Application permissions on behalf of a user id or UPN
    User(String),
    /// Delegated permissions for the signed-in user
    Me,
}

impl Principal {
    fn path(&self) -> String {
        match self {
            Principal::User(user) => format!("/users/{}", urlencoding::encode(user)),
            Principal::Me => "/me".to_string(),
        }
    }
}

/// Acquire an application token with the client-credentials grant.
pub async fn app_token(settings: &Settings) -> Result<String> {
    settings.require(&["TENANT_ID", "CLIENT_ID", "CLIENT_SECRET"])?;

    let url = format!("{LOGIN_BASE}/{}/oauth2/v2.0/token", settings.tenant_id);
    let response = reqwest::Client::new()
        .post(&url)
        .form(&[
            ("client_id", settings.client_id.as_str()),
            ("client_secret", settings.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", APP_SCOPE),
        ])
        .send()
        .await
        .map_err(|e| eyre!("Failed to request app token: {e}"))?;

    let response = check_response(response, "Failed to acquire app token").await?;
    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| eyre!("Failed to parse token response: {e}"))?;

    Ok(token.access_token)
}

/// Sign in interactively with the device-code flow.
///
/// Prints the sign-in instructions to stderr and polls until the user
/// finishes, declines, or the code expires.
pub async fn delegated_token(settings: &Settings) -> Result<String> {
    settings.require(&["TENANT_ID", "CLIENT_ID"])?;

    let client = reqwest::Client::new();
    let base = format!("{LOGIN_BASE}/{}/oauth2/v2.0", settings.tenant_id);
    let scope = DELEGATED_SCOPES.join(" ");

    let response = client
        .post(format!("{base}/devicecode"))
        .form(&[
            ("client_id", settings.client_id.as_str()),
            ("scope", scope.as_str()),
        ])
        .send()
        .await
        .map_err(|e| eyre!("Failed to create device flow: {e}"))?;
    let response = check_response(response, "Failed to create device flow").await?;
    let flow: DeviceCodeResponse = response
        .json()
        .await
        .map_err(|e| eyre!("Failed to parse device flow: {e}"))?;

    eprintln!("{}", flow.instructions());

    let deadline = Instant::now() + Duration::from_secs(flow.expires_in);
    let mut interval = Duration::from_secs(flow.interval);

    loop {
        tokio::time::sleep(interval).await;
        if Instant::now() > deadline {
            return Err(Error::Auth("device code expired before sign-in completed".into()).into());
        }

        let response = client
            .post(format!("{base}/token"))
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("client_id", settings.client_id.as_str()),
                ("device_code", flow.device_code.as_str()),
            ])
            .send()
            .await
            .map_err(|e| eyre!("Failed to poll for token: {e}"))?;

        if response.status().is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| eyre!("Failed to parse token response: {e}"))?;
            info!("Signed in with device code");
            return Ok(token.access_token);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let error = poll_error(status, body)?;
        match classify_poll_error(&error) {
            PollOutcome::Pending => debug!("Waiting for device sign-in"),
            PollOutcome::SlowDown => interval += Duration::from_secs(5),
            PollOutcome::Failed(reason) => return Err(Error::Auth(reason).into()),
        }
    }
}

/// OAuth error from a failed token poll. A body that is not an OAuth error
/// (an HTML gateway page, say) is reported as the HTTP failure it is.
fn poll_error(status: u16, body: String) -> std::result::Result<TokenErrorResponse, Error> {
    match serde_json::from_str::<TokenErrorResponse>(&body) {
        Ok(error) if !error.error.is_empty() => Ok(error),
        _ => Err(Error::Http {
            context: "Device code token poll failed".to_string(),
            status,
            body,
        }),
    }
}

/// Graph client bound to a bearer token and a principal
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    principal: Principal,
}

impl GraphClient {
    pub fn new(token: String, principal: Principal) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GRAPH_API_BASE.to_string(),
            token,
            principal,
        }
    }

    /// Client using application permissions for the configured target user.
    pub async fn for_app(settings: &Settings) -> Result<Self> {
        let user = settings.target_user()?.to_string();
        let token = app_token(settings).await?;
        Ok(Self::new(token, Principal::User(user)))
    }

    /// Client using delegated permissions for whoever signs in.
    pub async fn for_delegated(settings: &Settings) -> Result<Self> {
        let token = delegated_token(settings).await?;
        Ok(Self::new(token, Principal::Me))
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{path}", self.base_url, self.principal.path())
    }

    async fn get_response(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<reqwest::Response> {
        debug!("GET {url} {query:?}");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Prefer", r#"outlook.body-content-type="text""#)
            .query(query)
            .send()
            .await
            .map_err(|e| eyre!("{context}: {e}"))?;

        check_response(response, context).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        self.get_response(&self.url(path), query, context)
            .await?
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse Graph response ({context}): {e}"))
    }

    /// Profile of the principal.
    pub async fn get_user(&self) -> Result<GraphUser> {
        self.get_json("", &[], "Get user failed").await
    }

    /// Recent calendar events matching the meeting subject.
    ///
    /// Application permissions filter server side. Delegated calls fetch the
    /// latest page and filter locally, since `contains()` support on `/me`
    /// is unreliable.
    pub async fn find_recent_events(&self, subject: &str, hours: u32) -> Result<Vec<GraphEvent>> {
        let now = Utc::now();
        match self.principal {
            Principal::User(_) => {
                let query = [
                    ("$filter", events_filter(subject, &window_start(now, hours))),
                    ("$orderby", "end/dateTime desc".to_string()),
                    ("$top", APP_EVENT_PAGE.to_string()),
                    ("$select", "subject,end,onlineMeetingUrl,onlineMeeting,body".to_string()),
                ];
                let page: ODataPage<GraphEvent> =
                    self.get_json("/events", &query, "List events failed").await?;
                Ok(page.value)
            }
            Principal::Me => {
                let query = [
                    ("$select", "subject,start,end,onlineMeetingUrl,onlineMeeting".to_string()),
                    ("$orderby", "end/dateTime desc".to_string()),
                    ("$top", DELEGATED_EVENT_PAGE.to_string()),
                ];
                let page: ODataPage<GraphEvent> =
                    self.get_json("/events", &query, "List events failed").await?;
                let cutoff = (now - chrono::Duration::hours(i64::from(hours))).naive_utc();
                Ok(filter_recent_events(page.value, subject, cutoff))
            }
        }
    }

    /// Most recently created online meetings.
    pub async fn list_online_meetings(&self, top: usize) -> Result<Vec<OnlineMeeting>> {
        let query = [
            ("$orderby", "creationDateTime desc".to_string()),
            ("$top", top.to_string()),
        ];
        let page: ODataPage<OnlineMeeting> = self
            .get_json("/onlineMeetings", &query, "List online meetings failed")
            .await?;
        Ok(page.value)
    }

    /// Online meeting behind a join URL, if the principal can see it.
    pub async fn resolve_meeting_by_join_url(&self, join_url: &str) -> Result<Option<OnlineMeeting>> {
        if join_url.is_empty() {
            return Ok(None);
        }
        let query = [("$filter", join_url_filter(join_url)), ("$top", "1".to_string())];
        let page: ODataPage<OnlineMeeting> = self
            .get_json("/onlineMeetings", &query, "Resolve meeting by joinUrl failed")
            .await?;
        Ok(page.value.into_iter().next())
    }

    pub async fn list_transcripts(&self, meeting_id: &str) -> Result<Vec<TranscriptMeta>> {
        let page: ODataPage<TranscriptMeta> = self
            .get_json(
                &format!("/onlineMeetings/{meeting_id}/transcripts"),
                &[],
                "List transcripts failed",
            )
            .await?;
        Ok(page.value)
    }

    /// Transcript body as text (WebVTT by default).
    pub async fn download_transcript_content(
        &self,
        meeting_id: &str,
        transcript_id: &str,
    ) -> Result<String> {
        let url = self.url(&format!(
            "/onlineMeetings/{meeting_id}/transcripts/{transcript_id}/content"
        ));
        self.get_response(&url, &[], "Download transcript content failed")
            .await?
            .text()
            .await
            .map_err(|e| eyre!("Failed to read transcript content: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_paths() {
        assert_eq!(Principal::Me.path(), "/me");
        assert_eq!(
            Principal::User("alice@example.com".to_string()).path(),
            "/users/alice%40example.com"
        );
    }

    #[test]
    fn test_poll_error_parses_oauth_error() {
        let body = r#"{"error":"authorization_pending","error_description":"waiting"}"#;
        let error = poll_error(400, body.to_string()).unwrap();
        assert_eq!(error.error, "authorization_pending");
        assert_eq!(classify_poll_error(&error), PollOutcome::Pending);
    }

    #[test]
    fn test_poll_error_keeps_status_and_body_of_non_json() {
        let body = "<html><body>502 Bad Gateway</body></html>";
        let error = poll_error(502, body.to_string()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Device code token poll failed [502]: <html><body>502 Bad Gateway</body></html>"
        );

        let report: color_eyre::eyre::Report = poll_error(500, "{}".to_string()).unwrap_err().into();
        assert_eq!(Error::status_of(&report), Some(500));
    }

    #[test]
    fn test_client_urls() {
        let client = GraphClient::new("t".to_string(), Principal::Me);
        assert_eq!(
            client.url("/onlineMeetings"),
            "https://graph.microsoft.com/v1.0/me/onlineMeetings"
        );

        let client = GraphClient::new("t".to_string(), Principal::User("id-1".to_string()));
        assert_eq!(client.url(""), "https://graph.microsoft.com/v1.0/users/id-1");
    }
}
