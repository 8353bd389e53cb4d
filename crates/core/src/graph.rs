//! Microsoft Graph models and meeting selection logic
//!
//! The shell fetches calendar events, online meetings and transcripts; the
//! choices made on top of those responses (which event, which meeting, which
//! transcript) live here so they can be tested with fixture data.

use std::cmp::Reverse;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static TEAMS_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://teams\.microsoft\.com/[^\s"]+"#).expect("teams link pattern is valid")
});

/// Delegated scopes requested by the device-code flow.
pub const DELEGATED_SCOPES: [&str; 4] = [
    "User.Read",
    "Calendars.Read",
    "OnlineMeetings.Read",
    "OnlineMeetingTranscript.Read.All",
];

/// Scope used by the client-credentials flow.
pub const APP_SCOPE: &str = "https://graph.microsoft.com/.default";

/// OData collection wrapper (`{"value": [...]}`)
#[derive(Debug, Deserialize, Clone)]
pub struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// Graph date-time with separate time zone
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct DateTimeTimeZone {
    #[serde(rename = "dateTime", default)]
    pub date_time: Option<String>,
    #[serde(rename = "timeZone", default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct OnlineMeetingInfo {
    #[serde(rename = "joinUrl", default)]
    pub join_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct ItemBody {
    #[serde(default)]
    pub content: Option<String>,
}

/// Calendar event
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct GraphEvent {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub end: Option<DateTimeTimeZone>,
    #[serde(rename = "onlineMeetingUrl", default)]
    pub online_meeting_url: Option<String>,
    #[serde(rename = "onlineMeeting", default)]
    pub online_meeting: Option<OnlineMeetingInfo>,
    #[serde(default)]
    pub body: Option<ItemBody>,
}

impl GraphEvent {
    pub fn end_date_time(&self) -> Option<&str> {
        self.end.as_ref().and_then(|end| end.date_time.as_deref())
    }
}

/// Teams online meeting
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct OnlineMeeting {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(rename = "creationDateTime", default)]
    pub creation_date_time: Option<String>,
    #[serde(rename = "joinWebUrl", default)]
    pub join_web_url: Option<String>,
}

/// Transcript metadata of an online meeting
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct TranscriptMeta {
    pub id: String,
    #[serde(rename = "createdDateTime", default)]
    pub created_date_time: Option<String>,
}

/// Directory user
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct GraphUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "userPrincipalName", default)]
    pub user_principal_name: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// Successful token endpoint response
#[derive(Debug, Deserialize, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Error body of the token endpoint
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TokenErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// `POST /devicecode` response
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_poll_interval() -> u64 {
    5
}

impl DeviceCodeResponse {
    /// Instructions to show the user.
    pub fn instructions(&self) -> String {
        self.message.clone().unwrap_or_else(|| {
            format!(
                "To sign in, open {} and enter the code {}",
                self.verification_uri, self.user_code
            )
        })
    }
}

/// What to do after a failed device-code token poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// User hasn't finished signing in; poll again after the interval
    Pending,
    /// Poll again after the interval plus five seconds
    SlowDown,
    /// Stop polling
    Failed(String),
}

/// Classify a token endpoint error during device-code polling.
pub fn classify_poll_error(error: &TokenErrorResponse) -> PollOutcome {
    match error.error.as_str() {
        "authorization_pending" => PollOutcome::Pending,
        "slow_down" => PollOutcome::SlowDown,
        other => PollOutcome::Failed(
            error
                .error_description
                .clone()
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

/// Escape a value for use inside a single-quoted OData string literal.
pub fn odata_quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// Start of the lookback window, formatted for an OData filter.
pub fn window_start(now: DateTime<Utc>, hours: u32) -> String {
    (now - Duration::hours(i64::from(hours)))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// `$filter` for events ending inside the window, optionally matching a subject.
pub fn events_filter(subject: &str, window_start: &str) -> String {
    let mut parts = vec![format!("end/dateTime ge '{window_start}'")];
    if !subject.is_empty() {
        parts.insert(0, format!("contains(subject,'{}')", odata_quote(subject)));
    }
    parts.join(" and ")
}

/// `$filter` matching an online meeting by its join URL.
pub fn join_url_filter(join_url: &str) -> String {
    format!("joinWebUrl eq '{}'", odata_quote(join_url))
}

/// Parse a Graph `dateTime` value into naive UTC.
///
/// Graph returns both `2024-05-07T10:00:00.0000000` (no offset, seven
/// fractional digits) and RFC 3339 strings.
pub fn parse_graph_date_time(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Keep events whose subject contains `subject` (ignoring case) and that ended
/// at or after `cutoff`.
///
/// Events with a missing or unreadable end time are kept.
pub fn filter_recent_events(
    events: Vec<GraphEvent>,
    subject: &str,
    cutoff: NaiveDateTime,
) -> Vec<GraphEvent> {
    let needle = subject.to_lowercase();
    events
        .into_iter()
        .filter(|event| {
            event
                .subject
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(&needle)
        })
        .filter(|event| {
            event
                .end_date_time()
                .and_then(parse_graph_date_time)
                .unwrap_or(cutoff)
                >= cutoff
        })
        .collect()
}

/// Join URL of an event's Teams meeting.
///
/// Falls back from the structured `onlineMeeting.joinUrl` to the legacy
/// `onlineMeetingUrl`, then to the first Teams link in the event body.
pub fn event_join_url(event: &GraphEvent) -> Option<String> {
    event
        .online_meeting
        .as_ref()
        .and_then(|meeting| meeting.join_url.clone())
        .filter(|url| !url.is_empty())
        .or_else(|| event.online_meeting_url.clone().filter(|u| !u.is_empty()))
        .or_else(|| {
            let body = event.body.as_ref()?.content.as_deref()?;
            TEAMS_LINK.find(body).map(|m| m.as_str().to_string())
        })
}

/// First event, in order, that carries a join URL.
pub fn first_join_url(events: &[GraphEvent]) -> Option<String> {
    events.iter().find_map(event_join_url)
}

/// Newest transcript first; transcripts without a timestamp go last.
pub fn sort_transcripts_newest_first(transcripts: &mut [TranscriptMeta]) {
    transcripts.sort_by_key(|t| Reverse(t.created_date_time.clone().unwrap_or_default()));
}

/// Validate a user supplied index against a listing of `len` entries.
pub fn select_index(len: usize, index: Option<usize>, label: &str) -> Result<usize, String> {
    let index = index.unwrap_or(0);
    if index < len {
        Ok(index)
    } else {
        Err(format!(
            "{label} out of range (0..{})",
            len.saturating_sub(1)
        ))
    }
}

/// Meeting to use when the join URL lookup comes back empty.
///
/// Takes the first candidate whose subject contains the meeting subject
/// (ignoring case), otherwise the first candidate.
pub fn pick_fallback_meeting(
    candidates: Vec<OnlineMeeting>,
    subject: &str,
) -> Option<OnlineMeeting> {
    let needle = subject.to_lowercase();
    let by_subject = (!needle.is_empty())
        .then(|| {
            candidates.iter().position(|m| {
                m.subject
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(&needle)
            })
        })
        .flatten();

    let index = by_subject.or((!candidates.is_empty()).then_some(0))?;
    candidates.into_iter().nth(index)
}

/// `[0] Weekly sync | end=2024-05-02T10:00:00.0000000` listing line.
pub fn event_line(index: usize, event: &GraphEvent) -> String {
    format!(
        "[{index}] {} | end={}",
        event.subject.as_deref().unwrap_or_default(),
        event.end_date_time().unwrap_or_default()
    )
}

pub fn meeting_line(index: usize, meeting: &OnlineMeeting) -> String {
    format!(
        "[{index}] subject={} | created={} | id={}",
        meeting.subject.as_deref().unwrap_or_default(),
        meeting.creation_date_time.as_deref().unwrap_or_default(),
        meeting.id
    )
}

pub fn transcript_line(index: usize, transcript: &TranscriptMeta) -> String {
    format!(
        "[{index}] created={} | id={}",
        transcript.created_date_time.as_deref().unwrap_or_default(),
        transcript.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn event(subject: &str, end: &str) -> GraphEvent {
        GraphEvent {
            subject: Some(subject.to_string()),
            end: Some(DateTimeTimeZone {
                date_time: Some(end.to_string()),
                time_zone: Some("UTC".to_string()),
            }),
            ..Default::default()
        }
    }

    fn meeting(id: &str, subject: &str) -> OnlineMeeting {
        OnlineMeeting {
            id: id.to_string(),
            subject: Some(subject.to_string()),
            ..Default::default()
        }
    }

    fn transcript(id: &str, created: Option<&str>) -> TranscriptMeta {
        TranscriptMeta {
            id: id.to_string(),
            created_date_time: created.map(str::to_string),
        }
    }

    fn cutoff() -> NaiveDateTime {
        parse_graph_date_time("2024-05-07T00:00:00Z").unwrap()
    }

    #[test]
    fn test_window_start_format() {
        let now = Utc.with_ymd_and_hms(2024, 5, 9, 12, 30, 0).unwrap();
        assert_eq!(window_start(now, 48), "2024-05-07T12:30:00Z");
    }

    #[test]
    fn test_events_filter_with_and_without_subject() {
        assert_eq!(
            events_filter("EDA Library", "2024-05-07T12:30:00Z"),
            "contains(subject,'EDA Library') and end/dateTime ge '2024-05-07T12:30:00Z'"
        );
        assert_eq!(
            events_filter("", "2024-05-07T12:30:00Z"),
            "end/dateTime ge '2024-05-07T12:30:00Z'"
        );
    }

    #[test]
    fn test_filters_escape_quotes() {
        assert_eq!(
            events_filter("Bob's sync", "T"),
            "contains(subject,'Bob''s sync') and end/dateTime ge 'T'"
        );
        assert_eq!(join_url_filter("https://x/'a"), "joinWebUrl eq 'https://x/''a'");
    }

    #[test]
    fn test_parse_graph_date_time_variants() {
        let expected = Utc
            .with_ymd_and_hms(2024, 5, 7, 10, 0, 0)
            .unwrap()
            .naive_utc();
        assert_eq!(
            parse_graph_date_time("2024-05-07T10:00:00.0000000"),
            Some(expected)
        );
        assert_eq!(parse_graph_date_time("2024-05-07T10:00:00Z"), Some(expected));
        assert_eq!(
            parse_graph_date_time("2024-05-07T12:00:00+02:00"),
            Some(expected)
        );
        assert_eq!(parse_graph_date_time("yesterday"), None);
    }

    #[test]
    fn test_filter_recent_events_subject_and_window() {
        let events = vec![
            event("EDA Library weekly", "2024-05-07T10:00:00.0000000"),
            event("eda library retro", "2024-05-01T10:00:00.0000000"),
            event("Unrelated", "2024-05-08T10:00:00.0000000"),
            event("The EDA LIBRARY demo", "not a date"),
        ];
        let kept = filter_recent_events(events, "EDA Library", cutoff());
        let subjects: Vec<_> = kept.iter().filter_map(|e| e.subject.as_deref()).collect();
        assert_eq!(subjects, vec!["EDA Library weekly", "The EDA LIBRARY demo"]);
    }

    #[test]
    fn test_event_join_url_precedence() {
        let mut e = GraphEvent {
            online_meeting: Some(OnlineMeetingInfo {
                join_url: Some("https://teams.microsoft.com/l/structured".to_string()),
            }),
            online_meeting_url: Some("https://teams.microsoft.com/l/legacy".to_string()),
            ..Default::default()
        };
        assert_eq!(
            event_join_url(&e).as_deref(),
            Some("https://teams.microsoft.com/l/structured")
        );

        e.online_meeting = None;
        assert_eq!(
            event_join_url(&e).as_deref(),
            Some("https://teams.microsoft.com/l/legacy")
        );
    }

    #[test]
    fn test_event_join_url_from_body() {
        let e = GraphEvent {
            body: Some(ItemBody {
                content: Some(
                    "Join here: https://teams.microsoft.com/l/meetup-join/19%3a abc \"quoted\""
                        .to_string(),
                ),
            }),
            ..Default::default()
        };
        assert_eq!(
            event_join_url(&e).as_deref(),
            Some("https://teams.microsoft.com/l/meetup-join/19%3a")
        );
        assert_eq!(event_join_url(&GraphEvent::default()), None);
    }

    #[test]
    fn test_first_join_url_skips_events_without_links() {
        let events = vec![
            GraphEvent::default(),
            GraphEvent {
                online_meeting_url: Some("https://teams.microsoft.com/l/2".to_string()),
                ..Default::default()
            },
        ];
        assert_eq!(
            first_join_url(&events).as_deref(),
            Some("https://teams.microsoft.com/l/2")
        );
    }

    #[test]
    fn test_sort_transcripts_newest_first() {
        let mut transcripts = vec![
            transcript("old", Some("2024-05-01T10:00:00Z")),
            transcript("none", None),
            transcript("new", Some("2024-05-07T10:00:00Z")),
        ];
        sort_transcripts_newest_first(&mut transcripts);
        let ids: Vec<_> = transcripts.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "none"]);
    }

    #[test]
    fn test_select_index() {
        assert_eq!(select_index(3, None, "meeting-index"), Ok(0));
        assert_eq!(select_index(3, Some(2), "meeting-index"), Ok(2));
        assert_eq!(
            select_index(3, Some(3), "meeting-index"),
            Err("meeting-index out of range (0..2)".to_string())
        );
        assert_eq!(
            select_index(0, None, "transcript-index"),
            Err("transcript-index out of range (0..0)".to_string())
        );
    }

    #[test]
    fn test_pick_fallback_meeting() {
        let candidates = vec![meeting("1", "Standup"), meeting("2", "EDA Library sync")];
        assert_eq!(
            pick_fallback_meeting(candidates.clone(), "eda library").map(|m| m.id),
            Some("2".to_string())
        );
        assert_eq!(
            pick_fallback_meeting(candidates.clone(), "Retro").map(|m| m.id),
            Some("1".to_string())
        );
        assert_eq!(
            pick_fallback_meeting(candidates, "").map(|m| m.id),
            Some("1".to_string())
        );
        assert_eq!(pick_fallback_meeting(vec![], "EDA"), None);
    }

    #[test]
    fn test_classify_poll_error() {
        let pending = TokenErrorResponse {
            error: "authorization_pending".to_string(),
            error_description: None,
        };
        assert_eq!(classify_poll_error(&pending), PollOutcome::Pending);

        let slow = TokenErrorResponse {
            error: "slow_down".to_string(),
            error_description: None,
        };
        assert_eq!(classify_poll_error(&slow), PollOutcome::SlowDown);

        let expired = TokenErrorResponse {
            error: "expired_token".to_string(),
            error_description: Some("The code expired".to_string()),
        };
        assert_eq!(
            classify_poll_error(&expired),
            PollOutcome::Failed("The code expired".to_string())
        );
    }

    #[test]
    fn test_deserialize_event_page() {
        let page: ODataPage<GraphEvent> = serde_json::from_value(json!({
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#events",
            "value": [{
                "subject": "EDA Library",
                "end": {"dateTime": "2024-05-07T10:00:00.0000000", "timeZone": "UTC"},
                "onlineMeeting": {"joinUrl": "https://teams.microsoft.com/l/x"},
                "body": {"contentType": "text", "content": "hello"}
            }]
        }))
        .unwrap();
        assert_eq!(page.value.len(), 1);
        assert_eq!(
            page.value[0].end_date_time(),
            Some("2024-05-07T10:00:00.0000000")
        );

        let empty: ODataPage<TranscriptMeta> = serde_json::from_value(json!({})).unwrap();
        assert!(empty.value.is_empty());
    }

    #[test]
    fn test_device_code_instructions() {
        let response: DeviceCodeResponse = serde_json::from_value(json!({
            "device_code": "dev",
            "user_code": "ABC123",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900
        }))
        .unwrap();
        assert_eq!(response.interval, 5);
        assert_eq!(
            response.instructions(),
            "To sign in, open https://microsoft.com/devicelogin and enter the code ABC123"
        );
    }

    #[test]
    fn test_listing_lines() {
        assert_eq!(
            event_line(0, &event("EDA Library", "2024-05-07T10:00:00.0000000")),
            "[0] EDA Library | end=2024-05-07T10:00:00.0000000"
        );
        assert_eq!(event_line(3, &GraphEvent::default()), "[3]  | end=");

        let meeting = OnlineMeeting {
            id: "m1".to_string(),
            subject: Some("EDA Library".to_string()),
            creation_date_time: Some("2024-05-07T09:00:00Z".to_string()),
            join_web_url: None,
        };
        assert_eq!(
            meeting_line(1, &meeting),
            "[1] subject=EDA Library | created=2024-05-07T09:00:00Z | id=m1"
        );

        let transcript = TranscriptMeta {
            id: "t1".to_string(),
            created_date_time: None,
        };
        assert_eq!(transcript_line(0, &transcript), "[0] created= | id=t1");
    }
}
