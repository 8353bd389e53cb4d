//! Trello REST client
//!
//! Thin wrappers over the handful of endpoints needed to post a meeting
//! card: list resolution, card, checklist, check item and attachment
//! creation. Authentication is the `key`/`token` query pair.

use std::path::Path;

use log::{debug, info};
use minutes_core::board::{
    pick_list_id, Attachment, BoardList, Card, CheckItem, ChecklistRef, PublishedCard,
};
use minutes_core::card::ParsedCard;
use serde::de::DeserializeOwned;

use crate::config::Settings;
use crate::http::check_response;
use crate::prelude::*;

const TRELLO_API_BASE: &str = "https://api.trello.com/1";

/// Authenticated Trello client
#[derive(Debug, Clone)]
pub struct TrelloClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
    token: String,
}

impl TrelloClient {
    pub fn new(key: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http,
            base_url: TRELLO_API_BASE.to_string(),
            key: key.into(),
            token: token.into(),
        })
    }

    /// Build a client from settings, checking the credentials are present.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.require(&["TRELLO_KEY", "TRELLO_TOKEN", "TRELLO_LIST_ID"])?;
        Self::new(&settings.trello_key, &settings.trello_token)
    }

    fn auth(&self) -> [(&str, &str); 2] {
        [("key", self.key.as_str()), ("token", self.token.as_str())]
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        context: &str,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .query(&self.auth())
            .query(params)
            .send()
            .await
            .map_err(|e| eyre!("{context}: {e}"))?;

        let response = check_response(response, context).await?;

        response
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse Trello response ({context}): {e}"))
    }

    /// Resolve a configured id to a list id.
    ///
    /// The id is used as-is when it names a list. Otherwise it is treated as
    /// a board id and a list on that board is picked.
    pub async fn ensure_list_id(&self, list_or_board_id: &str) -> Result<String> {
        let url = format!("{}/lists/{list_or_board_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&self.auth())
            .send()
            .await
            .map_err(|e| eyre!("Failed to look up Trello list: {e}"))?;

        if response.status() == reqwest::StatusCode::OK {
            return Ok(list_or_board_id.to_string());
        }

        debug!(
            "{list_or_board_id} is not a list ({}), trying it as a board",
            response.status()
        );

        let url = format!("{}/boards/{list_or_board_id}/lists", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&self.auth())
            .query(&[("fields", "id,name")])
            .send()
            .await
            .map_err(|e| eyre!("Failed to list board lists: {e}"))?;

        let response = check_response(response, "Failed to list board lists").await?;
        let lists: Vec<BoardList> = response
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse board lists: {e}"))?;

        Ok(pick_list_id(&lists, list_or_board_id))
    }

    pub async fn create_card(&self, list_id: &str, name: &str, desc: &str) -> Result<Card> {
        self.post(
            "/cards",
            &[("idList", list_id), ("name", name), ("desc", desc)],
            "Failed to create card",
        )
        .await
    }

    pub async fn create_checklist(&self, card_id: &str, name: &str) -> Result<ChecklistRef> {
        self.post(
            &format!("/cards/{card_id}/checklists"),
            &[("name", name), ("pos", "bottom")],
            "Failed to create checklist",
        )
        .await
    }

    /// Add an unchecked item at the bottom of a checklist.
    pub async fn add_checkitem(&self, checklist_id: &str, name: &str) -> Result<CheckItem> {
        self.post(
            &format!("/checklists/{checklist_id}/checkItems"),
            &[("name", name), ("pos", "bottom")],
            "Failed to add check item",
        )
        .await
    }

    /// Upload a local file as a card attachment.
    pub async fn add_attachment(
        &self,
        card_id: &str,
        file_path: &Path,
        name: Option<&str>,
    ) -> Result<Attachment> {
        let file_name = name.map(str::to_string).unwrap_or_else(|| {
            file_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string()
        });

        let bytes = tokio::fs::read(file_path)
            .await
            .map_err(|e| eyre!("Failed to read {}: {e}", file_path.display()))?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_from_extension(&file_path.to_string_lossy()))
            .map_err(|e| eyre!("Invalid MIME type: {e}"))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/cards/{card_id}/attachments", self.base_url);
        let mut request = self.http.post(&url).query(&self.auth());
        if let Some(name) = name {
            request = request.query(&[("name", name)]);
        }

        let response = request
            .multipart(form)
            .send()
            .await
            .map_err(|e| eyre!("Failed to upload attachment: {e}"))?;

        let response = check_response(response, "Failed to upload attachment").await?;

        response
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse attachment response: {e}"))
    }

    /// Create the card, then each checklist with its items, in order.
    pub async fn publish_card(
        &self,
        list_id: &str,
        card_name: &str,
        parsed: &ParsedCard,
    ) -> Result<(Card, PublishedCard)> {
        let card = self
            .create_card(list_id, card_name, &parsed.description)
            .await?;
        info!("Created card {} in list {list_id}", card.id);

        let mut items = 0;
        for checklist in &parsed.checklists {
            let created = self.create_checklist(&card.id, &checklist.name).await?;
            for item in &checklist.items {
                self.add_checkitem(&created.id, item).await?;
                items += 1;
            }
            debug!(
                "Added checklist '{}' with {} item(s)",
                checklist.name,
                checklist.items.len()
            );
        }

        let published = PublishedCard {
            card_id: card.id.clone(),
            card_url: card.short_url.clone(),
            title: card_name.to_string(),
            checklists: parsed.checklists.len(),
            items,
        };

        Ok((card, published))
    }
}

/// Infer MIME type from file extension.
fn mime_from_extension(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();

    match ext.as_str() {
        "md" => "text/markdown",
        "txt" | "vtt" => "text/plain",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "pdf" => "application/pdf",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
