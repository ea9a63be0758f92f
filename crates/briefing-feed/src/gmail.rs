use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;

use briefing_types::{BriefingError, DocumentState, Result, SourceDocument};

use crate::clean::{clean_newsletter_body, strip_markup};
use crate::{QueryWindow, SourceFeed};

const UNREAD: &str = "UNREAD";

/// Ids of the user labels that mark outcome states in the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmailLabels {
    pub parsed: String,
    pub published: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    #[serde(default)]
    label_ids: Vec<String>,
    internal_date: Option<String>,
    payload: MessagePart,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    data: Option<String>,
}

impl MessagePart {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn data(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.data.as_deref())
    }

    /// Depth-first search for the first part of `mime_type` with data.
    fn find(&self, mime_type: &str) -> Option<&MessagePart> {
        if self.mime_type.eq_ignore_ascii_case(mime_type) && self.data().is_some() {
            return Some(self);
        }
        self.parts.iter().find_map(|p| p.find(mime_type))
    }
}

// ---------------------------------------------------------------------------
// GmailFeed
// ---------------------------------------------------------------------------

/// Gmail REST v1 mailbox. The access token is acquired elsewhere.
#[derive(Debug)]
pub struct GmailFeed {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    user: String,
    labels: GmailLabels,
}

impl GmailFeed {
    pub fn new(access_token: String, labels: GmailLabels) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
            base_url: "https://gmail.googleapis.com".to_string(),
            user: "me".to_string(),
            labels,
        }
    }

    pub fn from_env(labels: GmailLabels) -> Result<Self> {
        let token = std::env::var("GMAIL_ACCESS_TOKEN").map_err(|_| {
            BriefingError::Config("GMAIL_ACCESS_TOKEN is not set".to_string())
        })?;
        Ok(Self::new(token, labels))
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/gmail/v1/users/{}/messages", self.base_url, self.user)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(fetch_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BriefingError::Fetch {
                message: format!("GET {url} returned HTTP {}: {body}", status.as_u16()),
            });
        }
        resp.json::<T>().await.map_err(fetch_error)
    }

    async fn list_ids(&self, query: &str) -> Result<Vec<String>> {
        let url = self.messages_url();
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![("q", query)];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }
            let page: ListResponse = self.get_json(&url, &params).await?;
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<GmailMessage> {
        let url = format!("{}/{}", self.messages_url(), id);
        self.get_json(&url, &[("format", "full")]).await
    }

    async fn modify(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()> {
        let url = format!("{}/{}/modify", self.messages_url(), id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "addLabelIds": add, "removeLabelIds": remove }))
            .send()
            .await
            .map_err(fetch_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BriefingError::Fetch {
                message: format!(
                    "modifying labels of {id} returned HTTP {}: {body}",
                    status.as_u16()
                ),
            });
        }
        Ok(())
    }

    fn state_from_labels(&self, label_ids: &[String]) -> DocumentState {
        let has = |label: &str| label_ids.iter().any(|l| l == label);
        if has(&self.labels.published) {
            DocumentState::Published
        } else if has(&self.labels.parsed) {
            DocumentState::Parsed
        } else if has(UNREAD) {
            DocumentState::Unread
        } else {
            DocumentState::Read
        }
    }

    /// Label changes that make `state_from_labels` read back `state`.
    fn label_changes(&self, state: DocumentState) -> (Vec<&str>, Vec<&str>) {
        let parsed = self.labels.parsed.as_str();
        let published = self.labels.published.as_str();
        match state {
            DocumentState::Unread => (vec![UNREAD], vec![parsed, published]),
            DocumentState::Read => (vec![], vec![UNREAD, parsed, published]),
            DocumentState::Parsed => (vec![parsed], vec![UNREAD, published]),
            DocumentState::Published => (vec![published], vec![UNREAD]),
        }
    }

    fn to_document(&self, message: GmailMessage) -> SourceDocument {
        let payload = &message.payload;
        let (sender_name, sender_address) = parse_address(payload.header("From").unwrap_or(""));

        SourceDocument {
            external_id: message.id.clone(),
            sender_name,
            sender_address,
            subject: payload.header("Subject").unwrap_or("No Subject").to_string(),
            received_at: received_at(&message),
            body: clean_newsletter_body(&extract_body(payload)),
            state: self.state_from_labels(&message.label_ids),
        }
    }
}

fn fetch_error(e: reqwest::Error) -> BriefingError {
    BriefingError::Fetch {
        message: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Message decoding helpers
// ---------------------------------------------------------------------------

/// Split a `From` header into display name and address.
fn parse_address(from: &str) -> (String, String) {
    match (from.rfind('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => {
            let name = from[..start].trim().trim_matches('"').trim().to_string();
            let address = from[start + 1..end].trim().to_string();
            (name, address)
        }
        _ => (String::new(), from.trim().to_string()),
    }
}

fn received_at(message: &GmailMessage) -> DateTime<Utc> {
    message
        .internal_date
        .as_deref()
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .or_else(|| {
            message
                .payload
                .header("Date")
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|d| d.with_timezone(&Utc))
        })
        .unwrap_or_else(Utc::now)
}

fn decode_data(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');
    match base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(trimmed) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "undecodable message body");
            String::new()
        }
    }
}

/// Body text, preferring a text/plain part over text/html anywhere in the tree.
fn extract_body(payload: &MessagePart) -> String {
    if let Some(part) = payload.find("text/plain") {
        return part.data().map(decode_data).unwrap_or_default();
    }
    if let Some(part) = payload.find("text/html") {
        return part.data().map(|d| strip_markup(&decode_data(d))).unwrap_or_default();
    }
    payload.data().map(decode_data).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// SourceFeed implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl SourceFeed for GmailFeed {
    async fn fetch(&self, window: &QueryWindow) -> Result<Vec<SourceDocument>> {
        let Some(query) = window.gmail_query() else {
            tracing::warn!(senders = ?window.senders, "no sender addresses to query, fetching nothing");
            return Ok(Vec::new());
        };
        tracing::debug!(query = %query, "querying mailbox");

        let ids = self.list_ids(&query).await?;
        tracing::info!(count = ids.len(), "messages matched");

        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            let message = self.get_message(&id).await?;
            documents.push(self.to_document(message));
        }
        Ok(documents)
    }

    async fn set_state(&self, external_id: &str, state: DocumentState) -> Result<()> {
        let (add, remove) = self.label_changes(state);
        self.modify(external_id, &add, &remove).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use briefing_types::{OutcomeLabel, Period};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn labels() -> GmailLabels {
        GmailLabels {
            parsed: "Label_parsed".into(),
            published: "Label_published".into(),
        }
    }

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    fn message_json(id: &str, labels: &[&str]) -> serde_json::Value {
        json!({
            "id": id,
            "labelIds": labels,
            "internalDate": "1740909600000",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    { "name": "From", "value": "TLDR AI <dan@tldrnewsletter.com>" },
                    { "name": "Subject", "value": "Model news" },
                    { "name": "Date", "value": "Sun, 2 Mar 2025 10:00:00 +0000" }
                ],
                "parts": [
                    { "mimeType": "text/html", "body": { "data": encode("<p>html version</p>") } },
                    {
                        "mimeType": "multipart/related",
                        "parts": [
                            { "mimeType": "text/plain", "body": { "data": encode("plain version https://t.co/x") } }
                        ]
                    }
                ]
            }
        })
    }

    #[test]
    fn parse_address_variants() {
        assert_eq!(
            parse_address("\"TLDR AI\" <dan@tldrnewsletter.com>"),
            ("TLDR AI".to_string(), "dan@tldrnewsletter.com".to_string())
        );
        assert_eq!(
            parse_address("dan@tldrnewsletter.com"),
            (String::new(), "dan@tldrnewsletter.com".to_string())
        );
    }

    #[test]
    fn nested_plain_text_is_preferred_over_html() {
        let message: GmailMessage = serde_json::from_value(message_json("m1", &[])).unwrap();
        assert_eq!(extract_body(&message.payload), "plain version https://t.co/x");
    }

    #[test]
    fn html_only_body_is_stripped_of_markup() {
        let part: MessagePart = serde_json::from_value(json!({
            "mimeType": "text/html",
            "body": { "data": encode("<div><b>Hello</b> there</div>") }
        }))
        .unwrap();
        assert_eq!(
            extract_body(&part).split_whitespace().collect::<Vec<_>>(),
            vec!["Hello", "there"]
        );
    }

    #[test]
    fn state_is_derived_from_labels() {
        let feed = GmailFeed::new("t".to_string(), labels());
        assert_eq!(feed.state_from_labels(&["UNREAD".to_string()]), DocumentState::Unread);
        assert_eq!(feed.state_from_labels(&["INBOX".to_string()]), DocumentState::Read);
        assert_eq!(
            feed.state_from_labels(&["Label_parsed".to_string()]),
            DocumentState::Parsed
        );
        assert_eq!(
            feed.state_from_labels(&["Label_parsed".to_string(), "Label_published".to_string()]),
            DocumentState::Published
        );
    }

    #[tokio::test]
    async fn fetch_lists_pages_and_decodes_messages() {
        let server = MockServer::start().await;
        let query = "from:dan@tldrnewsletter.com newer_than:7d";

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("q", query))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "m2", "threadId": "t2" }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("q", query))
            .and(header("Authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "m1", "threadId": "t1" }],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_json("m1", &["UNREAD"])))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(message_json("m2", &["Label_parsed"])),
            )
            .mount(&server)
            .await;

        let feed = GmailFeed::new("token-1".into(), labels()).with_base_url(server.uri());
        let window = QueryWindow::for_period(vec!["dan@tldrnewsletter.com".into()], Period::Weekly);
        let docs = feed.fetch(&window).await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].external_id, "m1");
        assert_eq!(docs[0].sender_name, "TLDR AI");
        assert_eq!(docs[0].sender_address, "dan@tldrnewsletter.com");
        assert_eq!(docs[0].subject, "Model news");
        assert_eq!(docs[0].body, "plain version");
        assert_eq!(docs[0].state, DocumentState::Unread);
        assert_eq!(docs[0].received_at.timestamp_millis(), 1_740_909_600_000);
        assert_eq!(docs[1].state, DocumentState::Parsed);
    }

    #[tokio::test]
    async fn set_state_and_label_outcome_modify_labels() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/m1/modify"))
            .and(body_json(json!({
                "addLabelIds": [],
                "removeLabelIds": ["UNREAD", "Label_parsed", "Label_published"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "m1" })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/m1/modify"))
            .and(body_json(json!({
                "addLabelIds": ["Label_published"],
                "removeLabelIds": ["UNREAD"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "m1" })))
            .expect(1)
            .mount(&server)
            .await;

        let feed = GmailFeed::new("t".into(), labels()).with_base_url(server.uri());
        feed.set_state("m1", DocumentState::Read).await.unwrap();
        feed.label_outcome(&["m1".to_string()], OutcomeLabel::Published)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn http_failure_surfaces_as_fetch_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
            .mount(&server)
            .await;

        let feed = GmailFeed::new("expired".into(), labels()).with_base_url(server.uri());
        let window = QueryWindow::for_period(vec!["dan@tldrnewsletter.com".into()], Period::Weekly);
        let err = feed.fetch(&window).await.unwrap_err();
        assert!(matches!(err, BriefingError::Fetch { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn fetch_without_sender_addresses_queries_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "m1", "threadId": "t1" }]
            })))
            .expect(0)
            .mount(&server)
            .await;

        let feed = GmailFeed::new("t".into(), labels()).with_base_url(server.uri());
        let window = QueryWindow::for_period(vec!["TLDR".into()], Period::Weekly);
        assert!(feed.fetch(&window).await.unwrap().is_empty());
    }
}
