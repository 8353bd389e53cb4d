//! Trello board domain models and list selection

use serde::{Deserialize, Serialize};

/// List names a meeting card is dropped into when a board id is configured.
pub const PREFERRED_LIST_NAMES: [&str; 4] = ["Meeting Notes", "Notes", "To Do", "Inbox"];

/// List on a board (`GET /boards/{id}/lists?fields=id,name`)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BoardList {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Card returned by `POST /cards`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "shortUrl", default)]
    pub short_url: Option<String>,
}

/// Checklist returned by `POST /cards/{id}/checklists`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChecklistRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Item returned by `POST /checklists/{id}/checkItems`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CheckItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Attachment returned by `POST /cards/{id}/attachments`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Attachment {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Outcome of publishing a parsed card
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PublishedCard {
    #[serde(rename = "cardId")]
    pub card_id: String,
    #[serde(rename = "cardUrl")]
    pub card_url: Option<String>,
    pub title: String,
    pub checklists: usize,
    pub items: usize,
}

/// Choose the list to post into when a board id was given instead of a list id.
///
/// Walks the board in order and takes the first list with a preferred name,
/// then the first list, then gives back `fallback` unchanged.
pub fn pick_list_id(lists: &[BoardList], fallback: &str) -> String {
    lists
        .iter()
        .find(|list| {
            list.name
                .as_deref()
                .is_some_and(|name| PREFERRED_LIST_NAMES.contains(&name))
        })
        .or_else(|| lists.first())
        .map(|list| list.id.clone())
        .unwrap_or_else(|| fallback.to_string())
}
