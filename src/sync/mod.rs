pub mod bootstrap;
pub mod diff;
pub mod identity;
pub mod mapping;


use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::model::board::{field_id, option_id, BoardItem, ProjectField};
use crate::model::ticket::{FieldChoice, Ticket, TicketChanges};
use crate::providers::{IssueTracker, TicketSource};
use diff::{
    build_new_issue, creation_note, diff_board_fields, diff_issue_fields, diff_ticket_fields,
    reference_note,
};
use identity::find_board_item;
use mapping::{resolve_priority_label, LabelMap};

/// Outcome counters for one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncStats {
    pub tickets_seen: u32,
    pub issues_created: u32,
    pub issues_updated: u32,
    pub tickets_updated: u32,
    pub board_fields_updated: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl SyncStats {
    /// True when the pass issued no mutations at all.
    pub fn is_noop(&self) -> bool {
        self.issues_created == 0
            && self.issues_updated == 0
            && self.tickets_updated == 0
            && self.board_fields_updated == 0
    }
}

/// Drives one reconciliation pass: repositories sequentially, tickets
/// sequentially, one outstanding remote call at a time. Correctness comes
/// from diff-before-write, not locking — re-running a pass converges.
pub struct SyncEngine<'a> {
    source: &'a dyn TicketSource,
    tracker: &'a dyn IssueTracker,
    config: &'a SyncConfig,
    labels: LabelMap,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        source: &'a dyn TicketSource,
        tracker: &'a dyn IssueTracker,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            source,
            tracker,
            config,
            labels: LabelMap::new(config.sync.type_labels.clone()),
        }
    }

    /// One full pass over the given repositories. The board snapshot is
    /// fetched once up front and read-only for the rest of the pass.
    pub async fn run(
        &self,
        repositories: &[String],
        project_fields: &[ProjectField],
    ) -> Result<SyncStats> {
        let board_items = self.tracker.board_items().await?;
        let priority_choices = self.priority_choices().await;
        let mut stats = SyncStats::default();

        for repo in repositories {
            info!(repo, "starting repository sync");
            match self.source.search_tickets(&self.config.sync.tag, repo).await {
                Ok(tickets) => {
                    for ticket in tickets {
                        self.sync_ticket(
                            ticket,
                            repo,
                            &board_items,
                            project_fields,
                            &priority_choices,
                            &mut stats,
                        )
                        .await?;
                    }
                }
                Err(err) => {
                    error!(repo, error = %err, "ticket search failed; skipping repository");
                    stats.errors += 1;
                }
            }
            info!(repo, "finished repository sync");
        }

        info!(?stats, "sync pass complete");
        Ok(stats)
    }

    /// Display labels for the helpdesk's numeric priority codes. Missing
    /// metadata degrades to code-as-label downstream.
    async fn priority_choices(&self) -> Vec<FieldChoice> {
        let fields = match self.source.ticket_fields().await {
            Ok(fields) => fields,
            Err(err) => {
                warn!(error = %err, "ticket field metadata unavailable; priority labels degraded");
                return Vec::new();
            }
        };
        let Some(def) = fields.iter().find(|f| f.name == "priority") else {
            warn!("no priority field on the helpdesk; priority labels degraded");
            return Vec::new();
        };
        match self.source.view_field(def.id).await {
            Ok(full) => full.choices,
            Err(err) => {
                warn!(error = %err, "priority field view failed; priority labels degraded");
                Vec::new()
            }
        }
    }

    async fn sync_ticket(
        &self,
        mut ticket: Ticket,
        repo: &str,
        board_items: &[BoardItem],
        project_fields: &[ProjectField],
        priority_choices: &[FieldChoice],
        stats: &mut SyncStats,
    ) -> Result<()> {
        stats.tickets_seen += 1;
        match self.source.fetch_summary(ticket.id).await {
            Ok(summary) => ticket.summary = summary,
            Err(err) => {
                warn!(ticket = ticket.id, error = %err, "summary fetch failed; proceeding without")
            }
        }

        match ticket.issue_ref().map(str::to_string) {
            None => {
                self.create_linked_issue(&ticket, repo, stats).await;
                Ok(())
            }
            Some(reference) => {
                self.reconcile_linked(
                    &ticket,
                    &reference,
                    repo,
                    board_items,
                    project_fields,
                    priority_choices,
                    stats,
                )
                .await
            }
        }
    }

    /// NEW → LINKED transition. The cross-reference is written only after a
    /// successful creation; any failure leaves the ticket NEW for the next
    /// pass.
    async fn create_linked_issue(&self, ticket: &Ticket, repo: &str, stats: &mut SyncStats) {
        if ticket.custom_fields.repository.is_none() {
            debug!(ticket = ticket.id, "no target repository; not ready for issue creation");
            stats.skipped += 1;
            return;
        }
        let label = ticket.kind.as_deref().and_then(|k| self.labels.resolve(k));
        let Some(new_issue) = build_new_issue(ticket, &self.config.freshdesk.domain, label) else {
            debug!(ticket = ticket.id, "no task title; not ready for issue creation");
            stats.skipped += 1;
            return;
        };

        let issue = match self.tracker.create_issue(repo, &new_issue).await {
            Ok(issue) => issue,
            Err(err) => {
                error!(ticket = ticket.id, repo, error = %err, "issue creation failed; ticket stays unlinked");
                stats.errors += 1;
                return;
            }
        };
        info!(ticket = ticket.id, repo, issue = issue.number, "created issue");
        stats.issues_created += 1;

        let changes = TicketChanges {
            github_issue: Some(issue.number.to_string()),
            ..Default::default()
        };
        if let Err(err) = self.source.update_ticket(ticket.id, &changes).await {
            // The next pass will re-create the issue; this is the known
            // duplicate-creation risk of a lost cross-reference.
            error!(ticket = ticket.id, error = %err, "failed to persist cross-reference");
            stats.errors += 1;
        }
        let note = creation_note(&issue, repo);
        if let Err(err) = self.source.add_private_note(ticket.id, &note).await {
            warn!(ticket = ticket.id, error = %err, "failed to post creation note");
            stats.errors += 1;
        }
    }

    /// LINKED reconciliation: ticket→issue diff always; board-dependent
    /// propagation only when a board item matches.
    #[allow(clippy::too_many_arguments)]
    async fn reconcile_linked(
        &self,
        ticket: &Ticket,
        reference: &str,
        repo: &str,
        board_items: &[BoardItem],
        project_fields: &[ProjectField],
        priority_choices: &[FieldChoice],
        stats: &mut SyncStats,
    ) -> Result<()> {
        let Ok(number) = reference.parse::<u64>() else {
            warn!(ticket = ticket.id, reference, "unparsable cross-reference; skipping");
            stats.skipped += 1;
            return Ok(());
        };
        let issue = match self.tracker.get_issue(repo, number).await {
            Ok(Some(issue)) => issue,
            Ok(None) => {
                warn!(ticket = ticket.id, repo, number, "linked issue not found; skipping");
                stats.skipped += 1;
                return Ok(());
            }
            Err(err) => {
                error!(ticket = ticket.id, repo, number, error = %err, "issue fetch failed; skipping");
                stats.errors += 1;
                return Ok(());
            }
        };

        let label = ticket.kind.as_deref().and_then(|k| self.labels.resolve(k));
        let note = reference_note(&self.config.freshdesk.domain, ticket.id);
        let issue_changes = diff_issue_fields(ticket, &issue, label, &note);
        if !issue_changes.is_empty() {
            match self.tracker.update_issue(repo, number, &issue_changes).await {
                Ok(()) => {
                    info!(ticket = ticket.id, repo, number, "updated issue");
                    stats.issues_updated += 1;
                }
                Err(err) => {
                    error!(ticket = ticket.id, repo, number, error = %err, "issue update failed");
                    stats.errors += 1;
                }
            }
        }

        let Some(item) = find_board_item(board_items, number, repo) else {
            debug!(ticket = ticket.id, number, "no board item; issue-only sync");
            return Ok(());
        };

        // Ticket → board: company and priority.
        let company = match ticket.company_id {
            Some(id) => match self.source.company_name(id).await {
                Ok(name) => name,
                Err(err) => {
                    warn!(ticket = ticket.id, error = %err, "company lookup failed");
                    None
                }
            },
            None => None,
        };
        let priority_label =
            resolve_priority_label(&ticket.priority.to_string(), priority_choices);
        let updates = diff_board_fields(item, company.as_deref(), &priority_label);

        if let Some(company) = updates.company {
            match field_id(project_fields, &self.config.board.company_field) {
                Some(fid) => {
                    self.tracker
                        .set_item_text_field(&item.project_id, &item.item_id, fid, &company)
                        .await?;
                    info!(item = %item.item_id, company, "updated board company");
                    stats.board_fields_updated += 1;
                }
                None => warn!("company field missing on the board"),
            }
        }
        if let Some(priority) = updates.priority {
            match option_id(project_fields, &self.config.board.priority_field, &priority) {
                Some((fid, oid)) => {
                    self.tracker
                        .set_item_option_field(&item.project_id, &item.item_id, fid, oid)
                        .await?;
                    info!(item = %item.item_id, priority, "updated board priority");
                    stats.board_fields_updated += 1;
                }
                None => warn!(priority, "priority has no matching board option"),
            }
        }

        // Board → ticket.
        let ticket_changes = diff_ticket_fields(item, issue.assignee_login(), ticket);
        if !ticket_changes.is_empty() {
            match self.source.update_ticket(ticket.id, &ticket_changes).await {
                Ok(()) => {
                    info!(ticket = ticket.id, "updated ticket from board");
                    stats.tickets_updated += 1;
                }
                Err(err) => {
                    error!(ticket = ticket.id, error = %err, "ticket update failed");
                    stats.errors += 1;
                }
            }
        }
        Ok(())
    }
}
