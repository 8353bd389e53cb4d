//! Markdown summary to task-board card transformation
//!
//! Turns the Markdown produced by the summarizer into a card title, a card
//! description, and the checklists attached to the card. The input is
//! untrusted model output: it may be wrapped in a code fence, it may be
//! missing headings, and it may mix list styles. Every input produces a
//! [`ParsedCard`]; missing pieces degrade to empty values.
//!
//! Everything from the first `## Actions...` heading onwards is treated as
//! actionable: that section and every level-2 section after it becomes a
//! checklist. Everything before it is the description.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

const FENCE: &str = "```";
const TITLE_MARKER: &str = "# ";
const SECTION_MARKER: &str = "## ";
const ACTIONS_PREFIX: &str = "actions";
const UNORDERED_MARKERS: [&str; 2] = ["- ", "* "];

static ORDERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+").expect("ordered list marker pattern is valid"));

/// Card derived from a Markdown summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCard {
    /// Text of the first level-1 heading, if any
    pub title: Option<String>,
    /// Markdown body preceding the actions section
    pub description: String,
    /// Checklists in document order, never empty
    pub checklists: Vec<Checklist>,
}

/// Named checklist extracted from a level-2 section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checklist {
    /// Heading text of the section, trimmed
    pub name: String,
    /// List item texts with their markers removed, never empty
    pub items: Vec<String>,
}

impl Checklist {
    pub fn new(name: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

/// A level-2 heading and the line it sits on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub line: usize,
    pub name: String,
}

/// Lines owned by one level-2 heading: `[heading line, next heading or end)`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section<'a> {
    name: &'a str,
    lines: Range<usize>,
}

/// Remove a code fence wrapping the whole document.
///
/// Only strips when the trimmed text both starts and ends with a triple
/// backtick. The opening fence line is discarded whole, so a language tag
/// such as ```` ```markdown ```` goes with it. Unwrapping repeats until the
/// text is no longer fully fenced, which keeps the function idempotent for
/// nested fences. Text fenced on one side only, or fenced mid-document, is
/// returned trimmed but otherwise untouched.
pub fn strip_fences(text: &str) -> String {
    let mut current = text.trim();

    while current.starts_with(FENCE) && current.ends_with(FENCE) {
        let mut inner = &current[FENCE.len()..];

        if let Some(newline) = inner.find('\n') {
            inner = &inner[newline + 1..];
        }

        if let Some(stripped) = inner.strip_suffix(FENCE) {
            inner = stripped;
        }

        current = inner.trim();
    }

    current.to_string()
}

fn is_title_line(line: &str) -> bool {
    line.trim().starts_with(TITLE_MARKER)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Text of the first level-1 heading, trimmed.
pub fn scan_title(lines: &[&str]) -> Option<String> {
    lines.iter().find_map(|line| {
        let title = line.trim().strip_prefix(TITLE_MARKER)?.trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}

/// Every level-2 heading in document order.
pub fn scan_level2_headings(lines: &[&str]) -> Vec<Heading> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(line, text)| {
            let name = text.trim().strip_prefix(SECTION_MARKER)?;
            Some(Heading {
                line,
                name: name.trim().to_string(),
            })
        })
        .collect()
}

/// Line index of the first heading whose name starts with "actions",
/// ignoring case.
///
/// This is a literal prefix match, so "Actions & Follow-Up"
/// and "ACTIONS" start the actions section while "Actionables" and
/// "Action items" do not.
pub fn find_actions_boundary(headings: &[Heading]) -> Option<usize> {
    headings
        .iter()
        .find(|heading| heading.name.to_lowercase().starts_with(ACTIONS_PREFIX))
        .map(|heading| heading.line)
}

/// Everything before the actions boundary, minus the title line and the
/// surrounding blank lines.
pub fn extract_description(lines: &[&str], boundary: Option<usize>) -> String {
    let end = boundary.unwrap_or(lines.len()).min(lines.len());
    let mut body = &lines[..end];

    if body.first().is_some_and(|line| is_title_line(line)) {
        body = &body[1..];
    }

    let start = body.iter().position(|line| !is_blank(line));
    let stop = body.iter().rposition(|line| !is_blank(line));

    match (start, stop) {
        (Some(start), Some(stop)) => body[start..=stop].join("\n").trim().to_string(),
        _ => String::new(),
    }
}

fn sections<'a>(headings: &'a [Heading], total_lines: usize) -> Vec<Section<'a>> {
    headings
        .iter()
        .enumerate()
        .map(|(index, heading)| {
            let end = headings
                .get(index + 1)
                .map(|next| next.line)
                .unwrap_or(total_lines);
            Section {
                name: &heading.name,
                lines: heading.line..end,
            }
        })
        .collect()
}

/// Item text for a top-level list line, or `None` for anything else.
fn list_item(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if UNORDERED_MARKERS
        .iter()
        .any(|marker| trimmed.starts_with(marker))
    {
        return Some(trimmed[2..].trim().to_string());
    }

    ORDERED_MARKER
        .find(trimmed)
        .map(|marker| trimmed[marker.end()..].trim().to_string())
}

/// Checklists for the actions section and every section after it.
///
/// Sections without list items are left out.
pub fn extract_checklists(
    lines: &[&str],
    headings: &[Heading],
    boundary: Option<usize>,
) -> Vec<Checklist> {
    let Some(boundary) = boundary else {
        return Vec::new();
    };

    sections(headings, lines.len())
        .into_iter()
        .filter(|section| section.lines.start >= boundary)
        .filter_map(|section| {
            let items: Vec<String> = lines[section.lines.start + 1..section.lines.end]
                .iter()
                .filter_map(|line| list_item(line))
                .collect();

            (!items.is_empty()).then(|| Checklist::new(section.name, items))
        })
        .collect()
}

/// Parse a Markdown summary into a card.
pub fn transform(raw_markdown: &str) -> ParsedCard {
    let clean = strip_fences(raw_markdown);
    let lines: Vec<&str> = clean.lines().collect();

    let title = scan_title(&lines);
    let headings = scan_level2_headings(&lines);
    let boundary = find_actions_boundary(&headings);

    ParsedCard {
        title,
        description: extract_description(&lines, boundary),
        checklists: extract_checklists(&lines, &headings, boundary),
    }
}

/// Card name: the parsed title, or "<subject> – <date>".
pub fn card_name(title: Option<&str>, meeting_subject: &str, date: NaiveDate) -> String {
    match title {
        Some(title) if !title.trim().is_empty() => title.trim().to_string(),
        _ => {
            let subject = if meeting_subject.trim().is_empty() {
                "Meeting"
            } else {
                meeting_subject.trim()
            };
            format!("{subject} – {}", date.format("%Y-%m-%d"))
        }
    }
}

/// Card name used when an already written summary is posted as-is.
pub fn raw_summary_card_name(meeting_subject: &str, date: NaiveDate) -> String {
    format!(
        "{} Meeting Notes – {}",
        meeting_subject.trim(),
        date.format("%Y-%m-%d")
    )
}

/// Display name of the summary attachment.
pub fn summary_attachment_name(card_name: &str) -> String {
    let base = if card_name.trim().is_empty() {
        "Meeting"
    } else {
        card_name
    };
    format!("{base} – Summary.md")
}

/// Where to keep the Markdown when the board can't be reached.
pub fn fallback_markdown_path(meeting_subject: &str, date: NaiveDate) -> String {
    let subject: String = meeting_subject
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let subject = if subject.is_empty() {
        "Meeting".to_string()
    } else {
        subject
    };
    format!("{subject}_Meeting_Notes_{}.md", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    fn checklist(name: &str, items: &[&str]) -> Checklist {
        Checklist::new(name, items.iter().map(|s| s.to_string()).collect())
    }

    const FULL_SUMMARY: &str = "\
# Weekly Sync

## Overview
The team reviewed the release.

## Key decisions
- Ship on Friday

## Actions & Follow-Up
- Alice: update changelog (due Thu)
1. Bob: tag the release

## Risks/Blockers
* CI is flaky
Some loose prose.

## Notes
Nothing to add.
";

    #[test]
    fn test_strip_fences_plain_text_is_trimmed() {
        assert_eq!(strip_fences("  # Title\nBody  \n"), "# Title\nBody");
    }

    #[test]
    fn test_strip_fences_removes_language_tag_line() {
        let fenced = "```markdown\n# Title\n\nBody\n```";
        assert_eq!(strip_fences(fenced), "# Title\n\nBody");
    }

    #[test]
    fn test_strip_fences_without_language_tag() {
        assert_eq!(strip_fences("```\nBody\n```"), "Body");
    }

    #[test]
    fn test_strip_fences_single_line_fence() {
        assert_eq!(strip_fences("```Body```"), "Body");
    }

    #[test]
    fn test_strip_fences_leaves_mid_document_fence() {
        let text = "Intro\n```\ncode\n```";
        assert_eq!(strip_fences(text), text);
    }

    #[test]
    fn test_strip_fences_leaves_one_sided_fence() {
        let text = "```markdown\n# Title\nBody";
        assert_eq!(strip_fences(text), text);
    }

    #[test]
    fn test_strip_fences_lone_fence_is_empty() {
        assert_eq!(strip_fences("```"), "");
        assert_eq!(strip_fences("  ```\n```  "), "");
    }

    #[test]
    fn test_strip_fences_is_idempotent() {
        let inputs = [
            "",
            "```",
            "plain text",
            "```markdown\n# T\n```",
            "```\n```x```\n```",
            "Intro\n```\ncode\n```",
            "```md\n```inner\nbody\n```\n```",
        ];

        for input in inputs {
            let once = strip_fences(input);
            assert_eq!(strip_fences(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_scan_title_first_h1_only() {
        let text = lines("intro\n# First\n# Second\n## Section");
        assert_eq!(scan_title(&text), Some("First".to_string()));
    }

    #[test]
    fn test_scan_title_ignores_level2_headings() {
        let text = lines("## Only a section\n- item");
        assert_eq!(scan_title(&text), None);
    }

    #[test]
    fn test_scan_title_trims_and_accepts_indentation() {
        let text = lines("   #   Spaced Title   ");
        assert_eq!(scan_title(&text), Some("Spaced Title".to_string()));
    }

    #[test]
    fn test_scan_level2_headings_in_order() {
        let text = lines("# T\n## One\ntext\n  ##  Two  \n### Three");
        let headings = scan_level2_headings(&text);
        assert_eq!(
            headings,
            vec![
                Heading {
                    line: 1,
                    name: "One".to_string()
                },
                Heading {
                    line: 3,
                    name: "Two".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_find_actions_boundary_case_insensitive_prefix() {
        let headings = vec![
            Heading {
                line: 0,
                name: "Overview".to_string(),
            },
            Heading {
                line: 4,
                name: "ACTIONS & FOLLOW-UP".to_string(),
            },
            Heading {
                line: 9,
                name: "Actions again".to_string(),
            },
        ];
        assert_eq!(find_actions_boundary(&headings), Some(4));
    }

    #[test]
    fn test_find_actions_boundary_action_items_does_not_match() {
        let headings = vec![Heading {
            line: 2,
            name: "Action items".to_string(),
        }];
        assert_eq!(find_actions_boundary(&headings), None);
    }

    #[test]
    fn test_find_actions_boundary_none_without_headings() {
        assert_eq!(find_actions_boundary(&[]), None);
    }

    #[test]
    fn test_extract_description_drops_title_and_blank_edges() {
        let text = lines("# Title\n\n\nPara one\n\nPara two\n\n## Actions\n- a");
        assert_eq!(
            extract_description(&text, Some(7)),
            "Para one\n\nPara two"
        );
    }

    #[test]
    fn test_extract_description_keeps_later_h1_lines() {
        let text = lines("Intro\n# Not the first line\nMore");
        assert_eq!(
            extract_description(&text, None),
            "Intro\n# Not the first line\nMore"
        );
    }

    #[test]
    fn test_extract_description_empty_input() {
        assert_eq!(extract_description(&[], None), "");
        assert_eq!(extract_description(&lines("# Only Title"), None), "");
    }

    #[test]
    fn test_extract_checklists_none_without_boundary() {
        let text = lines("## Risks\n- a");
        let headings = scan_level2_headings(&text);
        assert!(extract_checklists(&text, &headings, None).is_empty());
    }

    #[test]
    fn test_extract_checklists_flattens_nested_bullets_and_skips_prose() {
        let text = lines("## Actions\n- top\n    - nested\nprose\n\n2. second");
        let headings = scan_level2_headings(&text);
        // Markers are matched on the trimmed line, so nesting is flattened.
        assert_eq!(
            extract_checklists(&text, &headings, Some(0)),
            vec![checklist("Actions", &["top", "nested", "second"])]
        );
    }

    #[test]
    fn test_extract_checklists_ignores_bold_and_rules() {
        let text = lines("## Actions\n**Owner**\n---\n-no space\n1.no space\n* real");
        let headings = scan_level2_headings(&text);
        assert_eq!(
            extract_checklists(&text, &headings, Some(0)),
            vec![checklist("Actions", &["real"])]
        );
    }

    #[test]
    fn test_transform_reference_example() {
        let card = transform("# Title\n\nBody\n\n## Actions & Follow-Up\n- a\n- b\n");
        assert_eq!(card.title, Some("Title".to_string()));
        assert_eq!(card.description, "Body");
        assert_eq!(
            card.checklists,
            vec![checklist("Actions & Follow-Up", &["a", "b"])]
        );
    }

    #[test]
    fn test_transform_full_summary() {
        let card = transform(FULL_SUMMARY);

        assert_eq!(card.title.as_deref(), Some("Weekly Sync"));
        assert_eq!(
            card.description,
            "## Overview\nThe team reviewed the release.\n\n## Key decisions\n- Ship on Friday"
        );
        assert_eq!(
            card.checklists,
            vec![
                checklist(
                    "Actions & Follow-Up",
                    &["Alice: update changelog (due Thu)", "Bob: tag the release"]
                ),
                checklist("Risks/Blockers", &["CI is flaky"]),
            ]
        );
    }

    #[test]
    fn test_transform_sections_before_boundary_never_checklists() {
        let card = transform("## Decisions\n- keep\n## Actions\n- do");
        assert_eq!(card.checklists, vec![checklist("Actions", &["do"])]);
        assert_eq!(card.description, "## Decisions\n- keep");
    }

    #[test]
    fn test_transform_without_level2_headings() {
        let card = transform("# Title\n\nFirst paragraph\n\n- bullet\n");
        assert_eq!(card.title.as_deref(), Some("Title"));
        assert_eq!(card.description, "First paragraph\n\n- bullet");
        assert!(card.checklists.is_empty());
    }

    #[test]
    fn test_transform_actionables_is_not_a_boundary() {
        let headings = vec![Heading {
            line: 1,
            name: "Actionables".to_string(),
        }];
        assert_eq!(find_actions_boundary(&headings), None);

        let card = transform("Intro\n## Actionables\n- x\n## Later\n- y");
        assert!(card.checklists.is_empty());
        assert_eq!(card.description, "Intro\n## Actionables\n- x\n## Later\n- y");
    }

    #[test]
    fn test_transform_drops_section_without_items() {
        let card = transform("## Actions\nNothing yet.\n## Follow-ups\n- ping");
        assert_eq!(card.checklists, vec![checklist("Follow-ups", &["ping"])]);
    }

    #[test]
    fn test_transform_mixed_list_styles_keep_document_order() {
        let card = transform("## Actions\n1. x\n- y\n* z\n10.   w");
        assert_eq!(
            card.checklists,
            vec![checklist("Actions", &["x", "y", "z", "w"])]
        );
    }

    #[test]
    fn test_transform_fenced_matches_unfenced() {
        let body = "# Title\n\nBody\n\n## Actions & Follow-Up\n- a\n- b";
        let fenced = format!("```markdown\n{body}\n```");
        assert_eq!(transform(&fenced), transform(body));
    }

    #[test]
    fn test_transform_degenerate_inputs() {
        for input in ["", "   \n\n", "```", "```markdown\n```", "#", "##", "## ", "- a"] {
            let card = transform(input);
            assert!(card.checklists.is_empty(), "input: {input:?}");
        }

        let card = transform("");
        assert_eq!(card.title, None);
        assert_eq!(card.description, "");
    }

    #[test]
    fn test_transform_handles_crlf_and_unicode() {
        let card = transform("# Réunion\r\n\r\nRésumé\r\n## Actions\r\n- Écrire ✅\r\n");
        assert_eq!(card.title.as_deref(), Some("Réunion"));
        assert_eq!(card.description, "Résumé");
        assert_eq!(card.checklists, vec![checklist("Actions", &["Écrire ✅"])]);
    }

    /// Markdown-ish text assembled from the pieces the transform reacts to.
    fn markdown_pieces() -> impl Strategy<Value = String> {
        let pieces = vec![
            "```", "```markdown", "``", "`", "# ", "## ", "### ", "- ", "* ", "1. ", "10.  ",
            "Actions", "actions & follow-up", "Notes", "item", " ", "\t", "\n", "\r\n", "é", "✅",
        ];
        prop::collection::vec(prop::sample::select(pieces), 0..40).prop_map(|parts| parts.concat())
    }

    fn assert_card_shape(card: &ParsedCard) -> std::result::Result<(), TestCaseError> {
        prop_assert_eq!(card.description.trim(), card.description.as_str());
        for list in &card.checklists {
            prop_assert!(!list.items.is_empty(), "empty checklist {:?}", list.name);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn test_transform_any_string_is_well_formed(input in any::<String>()) {
            assert_card_shape(&transform(&input))?;
        }

        #[test]
        fn test_transform_markdown_pieces_are_well_formed(input in markdown_pieces()) {
            assert_card_shape(&transform(&input))?;
        }

        #[test]
        fn test_strip_fences_idempotent_for_any_string(input in any::<String>()) {
            let once = strip_fences(&input);
            prop_assert_eq!(strip_fences(&once), once);
        }

        #[test]
        fn test_strip_fences_idempotent_for_markdown_pieces(input in markdown_pieces()) {
            let once = strip_fences(&input);
            prop_assert_eq!(strip_fences(&once), once);
        }
    }

    #[test]
    fn test_card_name_prefers_title() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        assert_eq!(card_name(Some("Sync"), "EDA Library", date), "Sync");
        assert_eq!(
            card_name(None, "EDA Library", date),
            "EDA Library – 2024-05-07"
        );
        assert_eq!(card_name(Some("  "), "", date), "Meeting – 2024-05-07");
    }

    #[test]
    fn test_raw_summary_card_name() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        assert_eq!(
            raw_summary_card_name("EDA Library", date),
            "EDA Library Meeting Notes – 2024-05-07"
        );
    }

    #[test]
    fn test_summary_attachment_name() {
        assert_eq!(summary_attachment_name("Sync"), "Sync – Summary.md");
        assert_eq!(summary_attachment_name(""), "Meeting – Summary.md");
    }

    #[test]
    fn test_fallback_markdown_path() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        assert_eq!(
            fallback_markdown_path("EDA Library", date),
            "EDA_Library_Meeting_Notes_2024-05-07.md"
        );
        assert_eq!(
            fallback_markdown_path("  ", date),
            "Meeting_Meeting_Notes_2024-05-07.md"
        );
    }
}
