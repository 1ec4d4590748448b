pub mod freshdesk;
pub mod github;
pub mod pagination;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::board::{BoardItem, ProjectField};
use crate::model::issue::{Issue, IssueChanges, NewIssue};
use crate::model::ticket::{FieldChoice, NewTicketField, Ticket, TicketChanges, TicketFieldDef};

/// The helpdesk side of the sync. Methods that can legitimately come back
/// empty-handed (missing summary, unknown company) return `Ok(None)` so the
/// caller can tell "not present" from "could not determine".
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Open tickets carrying the sync tag, scoped to one repository.
    async fn search_tickets(&self, tag: &str, repository: &str) -> Result<Vec<Ticket>>;
    async fn fetch_summary(&self, ticket_id: u64) -> Result<Option<String>>;
    async fn ticket_fields(&self) -> Result<Vec<TicketFieldDef>>;
    /// Full field definition including dropdown choices.
    async fn view_field(&self, field_id: u64) -> Result<TicketFieldDef>;
    async fn create_field(&self, field: &NewTicketField) -> Result<TicketFieldDef>;
    async fn update_field_choices(
        &self,
        field_id: u64,
        label: &str,
        choices: &[FieldChoice],
    ) -> Result<()>;
    async fn update_ticket(&self, ticket_id: u64, changes: &TicketChanges) -> Result<()>;
    async fn add_private_note(&self, ticket_id: u64, html: &str) -> Result<()>;
    async fn company_name(&self, company_id: u64) -> Result<Option<String>>;
}

/// The issue-tracker side: repositories, org members, the project board and
/// its issues. `get_issue` distinguishes a vanished issue (`Ok(None)`) from a
/// transport failure (`Err`).
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<String>>;
    async fn list_members(&self) -> Result<Vec<String>>;
    async fn project_fields(&self) -> Result<Vec<ProjectField>>;
    /// Full board snapshot, walked to the last page.
    async fn board_items(&self) -> Result<Vec<BoardItem>>;
    async fn create_issue(&self, repo: &str, issue: &NewIssue) -> Result<Issue>;
    async fn get_issue(&self, repo: &str, number: u64) -> Result<Option<Issue>>;
    async fn update_issue(&self, repo: &str, number: u64, changes: &IssueChanges) -> Result<()>;
    async fn set_item_text_field(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        text: &str,
    ) -> Result<()>;
    async fn set_item_option_field(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        option_id: &str,
    ) -> Result<()>;
}
