use serde::{Deserialize, Serialize};

/// A helpdesk ticket as returned by the search endpoint.
///
/// The summary body lives behind a separate endpoint and is filled in by the
/// orchestrator before the ticket is diffed.
#[derive(Debug, Clone, Deserialize)]
pub struct Ticket {
    pub id: u64,
    /// Category tag ("Incident", "Feature Request", ...). Drives the label
    /// applied to the linked issue.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Numeric priority code (1 = low .. 4 = urgent).
    pub priority: u64,
    pub company_id: Option<u64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub custom_fields: TicketCustomFields,
}

/// The custom fields this sync reads and writes. Everything is optional:
/// agents fill these in over the ticket's lifetime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketCustomFields {
    #[serde(rename = "cf_development_task_title")]
    pub task_title: Option<String>,
    #[serde(rename = "cf_repository")]
    pub repository: Option<String>,
    /// Cross-reference to the linked issue. Once non-empty it is never
    /// overwritten; it is the only join key between the two systems.
    #[serde(rename = "cf_github_issue")]
    pub github_issue: Option<String>,
    #[serde(rename = "cf_assigned_developer")]
    pub assigned_developer: Option<String>,
    #[serde(rename = "cf_development_status")]
    pub development_status: Option<String>,
    #[serde(rename = "cf_start_date")]
    pub start_date: Option<String>,
    #[serde(rename = "cf_end_date")]
    pub end_date: Option<String>,
}

impl Ticket {
    /// A ticket with no cross-reference is NEW; a linked ticket carries the
    /// issue number of its counterpart.
    pub fn issue_ref(&self) -> Option<&str> {
        self.custom_fields
            .github_issue
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}

/// Partial custom-field update written back to a ticket. Serializes to the
/// `cf_*` wire names; untouched fields are omitted entirely.
///
/// The date slots are double-optional: `Some(None)` serializes as an explicit
/// null and clears the field when a board item loses its iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketChanges {
    #[serde(rename = "cf_github_issue", skip_serializing_if = "Option::is_none")]
    pub github_issue: Option<String>,
    #[serde(
        rename = "cf_assigned_developer",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_developer: Option<String>,
    #[serde(
        rename = "cf_development_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub development_status: Option<String>,
    #[serde(rename = "cf_start_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<String>>,
    #[serde(rename = "cf_end_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<String>>,
}

impl TicketChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Helpdesk ticket-field schema metadata (admin API).
#[derive(Debug, Clone, Deserialize)]
pub struct TicketFieldDef {
    pub id: u64,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub choices: Vec<FieldChoice>,
}

/// One dropdown choice of a ticket field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChoice {
    pub label: String,
    pub value: String,
    pub position: u32,
}

/// Ticket-field creation request (admin API).
#[derive(Debug, Clone, Serialize)]
pub struct NewTicketField {
    pub label: String,
    pub label_for_customers: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<FieldChoice>,
    pub customers_can_edit: bool,
    pub required_for_closure: bool,
    pub required_for_agents: bool,
    pub required_for_customers: bool,
    pub displayed_to_customers: bool,
}

impl NewTicketField {
    /// Agent-only field with the permission flags every synced field uses.
    pub fn internal(label: &str, field_type: &str, displayed_to_customers: bool) -> Self {
        Self {
            label: label.to_string(),
            label_for_customers: label.to_string(),
            field_type: field_type.to_string(),
            choices: Vec::new(),
            customers_can_edit: false,
            required_for_closure: false,
            required_for_agents: false,
            required_for_customers: false,
            displayed_to_customers,
        }
    }

    pub fn with_choices(mut self, choices: Vec<FieldChoice>) -> Self {
        self.choices = choices;
        self
    }
}
