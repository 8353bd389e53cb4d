//! System prompt handling for the summarizer

/// Model used to summarize transcripts.
pub const SUMMARY_MODEL: &str = "gpt-4o-mini";

/// Sampling temperature for summaries; low to keep the schema stable.
pub const SUMMARY_TEMPERATURE: f64 = 0.2;

/// Instruction used when neither a prompt file nor an environment override is set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Meeting Markdown Assistant. Produce concise, \
well-structured Markdown including: 1) Overview; 2) Key decisions; 3) Action items (owner + due \
date if present); 4) Risks/Blockers; 5) Follow-ups. Keep it clear and scannable.";

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Pick the active system prompt.
///
/// Precedence: prompt file contents, then the environment value, then
/// [`DEFAULT_SYSTEM_PROMPT`]. Blank values are skipped.
pub fn resolve_system_prompt(file_text: Option<&str>, env_text: Option<&str>) -> String {
    non_empty(file_text)
        .or_else(|| non_empty(env_text))
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string()
}

/// Prompt for a single request: a non-blank override wins over the configured prompt.
pub fn effective_prompt<'a>(configured: &'a str, one_time: Option<&'a str>) -> &'a str {
    non_empty(one_time).unwrap_or(configured)
}
