use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TicketSource;
use crate::model::ticket::{FieldChoice, NewTicketField, Ticket, TicketChanges, TicketFieldDef};

/// Freshdesk REST client. Authentication is HTTP Basic with the API key as
/// the username and a literal "X" password.
pub struct FreshdeskSource {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl FreshdeskSource {
    pub fn new(domain: String, api_key: String) -> Self {
        let creds = format!("{api_key}:X");
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Self {
            base_url: format!("https://{domain}/api/v2"),
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json")
    }

    /// Ticket filter: open or reopened tickets (status outside the
    /// resolved/closed band) carrying the sync tag, scoped to one repository.
    fn search_query(tag: &str, repository: &str) -> String {
        format!("\"(status:<3 OR status:>6) AND tag:'{tag}' AND cf_repository:'{repository}'\"")
    }
}

/// Bail with status and body on a non-success response.
async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("Freshdesk {what} failed: HTTP {status}: {body}")
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<Ticket>,
}

#[derive(Deserialize)]
struct SummaryResponse {
    body: String,
}

#[derive(Deserialize)]
struct Company {
    name: String,
}

#[derive(Serialize)]
struct NewNote<'a> {
    body: &'a str,
    private: bool,
}

#[derive(Serialize)]
struct TicketUpdate<'a> {
    custom_fields: &'a TicketChanges,
}

#[derive(Serialize)]
struct FieldChoicesUpdate<'a> {
    label: &'a str,
    choices: &'a [FieldChoice],
}

#[async_trait]
impl TicketSource for FreshdeskSource {
    async fn search_tickets(&self, tag: &str, repository: &str) -> Result<Vec<Ticket>> {
        let query = Self::search_query(tag, repository);
        let path = format!("/search/tickets?query={}", urlencoding::encode(&query));
        debug!(repository, "searching tickets");

        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .context("Freshdesk ticket search request failed")?;
        let search: SearchResponse = check(response, "ticket search")
            .await?
            .json()
            .await
            .context("Failed to parse ticket search response")?;
        Ok(search.results)
    }

    async fn fetch_summary(&self, ticket_id: u64) -> Result<Option<String>> {
        let response = self
            .request(reqwest::Method::GET, &format!("/tickets/{ticket_id}/summary"))
            .send()
            .await
            .context("Freshdesk summary request failed")?;
        // A ticket without a summary note is a 404, not a failure.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let summary: SummaryResponse = check(response, "summary fetch")
            .await?
            .json()
            .await
            .context("Failed to parse summary response")?;
        Ok(Some(summary.body))
    }

    async fn ticket_fields(&self) -> Result<Vec<TicketFieldDef>> {
        let response = self
            .request(reqwest::Method::GET, "/admin/ticket_fields")
            .send()
            .await
            .context("Freshdesk field list request failed")?;
        check(response, "field list")
            .await?
            .json()
            .await
            .context("Failed to parse ticket fields")
    }

    async fn view_field(&self, field_id: u64) -> Result<TicketFieldDef> {
        let response = self
            .request(reqwest::Method::GET, &format!("/admin/ticket_fields/{field_id}"))
            .send()
            .await
            .context("Freshdesk field view request failed")?;
        check(response, "field view")
            .await?
            .json()
            .await
            .context("Failed to parse ticket field")
    }

    async fn create_field(&self, field: &NewTicketField) -> Result<TicketFieldDef> {
        debug!(label = %field.label, "creating ticket field");
        let response = self
            .request(reqwest::Method::POST, "/admin/ticket_fields")
            .json(field)
            .send()
            .await
            .context("Freshdesk field create request failed")?;
        check(response, "field create")
            .await?
            .json()
            .await
            .context("Failed to parse created field")
    }

    async fn update_field_choices(
        &self,
        field_id: u64,
        label: &str,
        choices: &[FieldChoice],
    ) -> Result<()> {
        let body = FieldChoicesUpdate { label, choices };
        let response = self
            .request(reqwest::Method::PUT, &format!("/admin/ticket_fields/{field_id}"))
            .json(&body)
            .send()
            .await
            .context("Freshdesk field update request failed")?;
        check(response, "field update").await?;
        Ok(())
    }

    async fn update_ticket(&self, ticket_id: u64, changes: &TicketChanges) -> Result<()> {
        let body = TicketUpdate {
            custom_fields: changes,
        };
        let response = self
            .request(reqwest::Method::PUT, &format!("/tickets/{ticket_id}"))
            .json(&body)
            .send()
            .await
            .context("Freshdesk ticket update request failed")?;
        check(response, "ticket update").await?;
        Ok(())
    }

    async fn add_private_note(&self, ticket_id: u64, html: &str) -> Result<()> {
        let body = NewNote {
            body: html,
            private: true,
        };
        let response = self
            .request(reqwest::Method::POST, &format!("/tickets/{ticket_id}/notes"))
            .json(&body)
            .send()
            .await
            .context("Freshdesk note request failed")?;
        check(response, "note create").await?;
        Ok(())
    }

    async fn company_name(&self, company_id: u64) -> Result<Option<String>> {
        let response = self
            .request(reqwest::Method::GET, &format!("/companies/{company_id}"))
            .send()
            .await
            .context("Freshdesk company request failed")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let company: Company = check(response, "company fetch")
            .await?
            .json()
            .await
            .context("Failed to parse company")?;
        Ok(Some(company.name))
    }
}
