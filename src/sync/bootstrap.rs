use anyhow::Result;
use tracing::{info, warn};

use crate::config::BoardConfig;
use crate::model::board::{option_names, ProjectField};
use crate::model::ticket::{FieldChoice, NewTicketField, TicketFieldDef};
use crate::providers::{IssueTracker, TicketSource};

/// Bootstrap failures are fatal: the sync must not run against a helpdesk
/// whose field schema is unconfirmed. The process maps this error to a
/// distinguished exit status.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("could not inspect ticket field schema: {0}")]
    Inspect(anyhow::Error),
    #[error("could not provision ticket field '{field}': {error}")]
    Provision {
        field: &'static str,
        error: anyhow::Error,
    },
}

/// Name, label, type, customer-visible.
const PLAIN_FIELDS: &[(&str, &str, &str, bool)] = &[
    ("cf_development_task_title", "Task Title", "custom_text", true),
    ("cf_github_issue", "Github Issue", "custom_text", false),
    ("cf_start_date", "Start Date", "custom_date", true),
    ("cf_end_date", "End Date", "custom_date", true),
];

/// Make sure every custom field the sync writes exists on the helpdesk, and
/// top up the dropdown choices from live tracker data (org members, board
/// status options, repository names). Idempotent: a fully provisioned
/// helpdesk produces zero mutation calls.
pub async fn ensure_schema(
    source: &dyn TicketSource,
    tracker: &dyn IssueTracker,
    project_fields: &[ProjectField],
    repositories: &[String],
    board: &BoardConfig,
) -> Result<(), BootstrapError> {
    let existing = source
        .ticket_fields()
        .await
        .map_err(BootstrapError::Inspect)?;

    for &(name, label, field_type, visible) in PLAIN_FIELDS {
        if existing.iter().any(|f| f.name == name) {
            continue;
        }
        info!(field = name, "creating missing ticket field");
        let field = NewTicketField::internal(label, field_type, visible);
        source
            .create_field(&field)
            .await
            .map_err(|error| BootstrapError::Provision { field: name, error })?;
    }

    // Member list failure only means no new assignee choices this run.
    let members = match tracker.list_members().await {
        Ok(members) => members,
        Err(error) => {
            warn!(%error, "member list unavailable; assignee choices not refreshed");
            Vec::new()
        }
    };
    let statuses = option_names(project_fields, &board.status_field);

    ensure_dropdown(source, &existing, "cf_assigned_developer", "Assigned Developer", &members)
        .await?;
    ensure_dropdown(source, &existing, "cf_development_status", "Development Status", &statuses)
        .await?;
    ensure_dropdown(source, &existing, "cf_repository", "Repository", repositories).await?;

    Ok(())
}

/// Create a dropdown field if missing, otherwise append any values not
/// already among its choices. Existing choices are never removed or
/// repositioned.
async fn ensure_dropdown(
    source: &dyn TicketSource,
    existing: &[TicketFieldDef],
    name: &'static str,
    label: &str,
    values: &[String],
) -> Result<(), BootstrapError> {
    let provision = |error| BootstrapError::Provision { field: name, error };

    let def = match existing.iter().find(|f| f.name == name) {
        Some(def) => source.view_field(def.id).await.map_err(provision)?,
        None => {
            if values.is_empty() {
                warn!(field = name, "no choice values available; field not created");
                return Ok(());
            }
            info!(field = name, "creating missing dropdown field");
            let choices = values
                .iter()
                .enumerate()
                .map(|(i, value)| FieldChoice {
                    label: value.clone(),
                    value: value.clone(),
                    position: i as u32 + 1,
                })
                .collect();
            let field =
                NewTicketField::internal(label, "custom_dropdown", false).with_choices(choices);
            source.create_field(&field).await.map_err(provision)?;
            return Ok(());
        }
    };

    let mut choices = def.choices.clone();
    let mut position = choices.iter().map(|c| c.position).max().unwrap_or(0);
    let before = choices.len();
    for value in values {
        if choices.iter().any(|c| &c.value == value) {
            continue;
        }
        position += 1;
        choices.push(FieldChoice {
            label: value.clone(),
            value: value.clone(),
            position,
        });
    }
    if choices.len() > before {
        info!(field = name, added = choices.len() - before, "topping up dropdown choices");
        source
            .update_field_choices(def.id, &def.label, &choices)
            .await
            .map_err(provision)?;
    }
    Ok(())
}
