mod list;

use std::collections::BTreeSet;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{Router, routing::get};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppState, GetField,
    model::{Message, MessageBody, Room},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list::summaries))
}

/// Produces the closing summary of a room from its frozen message sequence.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, room: &Room, messages: &[Message]) -> anyhow::Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRequest<'a> {
    room_id: Uuid,
    title: &'a str,
    subject: &'a str,
    messages: &'a [Message],
}

/// Delegates to an external endpoint that answers `{ "content": "..." }`.
pub struct HttpSummarizer {
    client: reqwest::Client,
    url: String,
}

impl HttpSummarizer {
    pub fn new(url: impl Into<String>) -> Self {
        HttpSummarizer {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, room: &Room, messages: &[Message]) -> anyhow::Result<String> {
        let body: serde_json::Value = self
            .client
            .post(&self.url)
            .json(&SummaryRequest {
                room_id: room.id,
                title: &room.title,
                subject: &room.classification.subject,
                messages,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = body.get_str_field("content")?;
        if content.trim().is_empty() {
            return Err(anyhow!("summarizer returned empty content for room {}", room.id));
        }
        Ok(content)
    }
}

/// Local fallback: a markdown digest of who said what.
pub struct TranscriptSummarizer;

#[async_trait]
impl Summarizer for TranscriptSummarizer {
    async fn summarize(&self, room: &Room, messages: &[Message]) -> anyhow::Result<String> {
        let c = &room.classification;
        let mut out = format!(
            "## {}\n\n{} · Semester {} · {} {}\n\n",
            room.title, c.subject, c.semester, c.year, c.exam_type
        );

        if messages.is_empty() {
            out += "No messages were posted in this discussion.\n";
            return Ok(out);
        }

        let speakers: BTreeSet<&str> = messages
            .iter()
            .filter_map(|m| m.sender.as_ref().map(|s| s.name.as_str()))
            .collect();
        out += &format!(
            "{} messages from {} participants.\n\n",
            messages.len(),
            speakers.len()
        );

        for msg in messages {
            let who = msg.sender.as_ref().map_or("system", |s| s.name.as_str());
            match &msg.body {
                MessageBody::Text(text) => out += &format!("{}. **{who}**: {}\n", msg.seq, text.trim()),
                MessageBody::Image(url) => out += &format!("{}. **{who}** shared an image: <{url}>\n", msg.seq),
            }
        }
        Ok(out)
    }
}

pub(crate) fn markdown_to_html(content: &str) -> String {
    use pulldown_cmark::{Options, Parser};

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, Parser::new_ext(content, Options::ENABLE_STRIKETHROUGH));
    html
}
