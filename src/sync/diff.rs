use crate::model::board::BoardItem;
use crate::model::issue::{Issue, IssueChanges, NewIssue};
use crate::model::ticket::{Ticket, TicketChanges};

/// Issue title derived from the ticket. The "(FD#id)" suffix keeps the
/// helpdesk id visible on the tracker side.
pub fn issue_title(ticket: &Ticket) -> Option<String> {
    let task_title = ticket.custom_fields.task_title.as_deref()?;
    Some(format!("{task_title} (FD#{})", ticket.id))
}

/// Cross-reference note linking an issue body back to its ticket. Appended
/// to the body exactly once; substring containment is the dedup test.
pub fn reference_note(domain: &str, ticket_id: u64) -> String {
    format!("<a href=https://{domain}/a/tickets/{ticket_id}>Freshdesk Ticket #{ticket_id}</a>")
}

/// Content for a freshly created issue. Requires the task title; summary and
/// reference note form the body, the mapped label and assignee are attached
/// only when present.
pub fn build_new_issue(ticket: &Ticket, domain: &str, label: Option<&str>) -> Option<NewIssue> {
    let title = issue_title(ticket)?;
    let summary = ticket.summary.as_deref().unwrap_or_default();
    let body = format!("{summary}\n\n{}", reference_note(domain, ticket.id));
    Some(NewIssue {
        title,
        body,
        labels: label.map(|l| vec![l.to_string()]),
        assignees: ticket
            .custom_fields
            .assigned_developer
            .as_ref()
            .map(|dev| vec![dev.clone()]),
    })
}

/// Private note posted to the ticket when its issue is created.
pub fn creation_note(issue: &Issue, repo: &str) -> String {
    let author = issue
        .user
        .as_ref()
        .map(|u| u.login.as_str())
        .unwrap_or_default();
    let repo_url = issue.repository_url.as_deref().unwrap_or_default();
    format!(
        "<html><h2 style=\"color: red;\">Github Notification</h2>\
         <p>{author} created <a href=\"{}\">#{}</a> at {} in <a href=\"{repo_url}\">{repo}</a></p></html>",
        issue.html_url,
        issue.number,
        issue.created_at.to_rfc3339(),
    )
}

/// Ticket → issue diff. Pure: compares the ticket-derived view against the
/// issue's current state and returns only what needs to change.
///
/// Labels are only ever added, and the reference note is appended to the
/// body, never replacing existing text. An empty result means the caller
/// must skip the mutation call entirely.
pub fn diff_issue_fields(
    ticket: &Ticket,
    issue: &Issue,
    label: Option<&str>,
    note: &str,
) -> IssueChanges {
    let mut changes = IssueChanges::default();

    if let Some(title) = issue_title(ticket) {
        if title != issue.title {
            changes.title = Some(title);
        }
    }

    if let Some(label) = label {
        if !issue.has_label(label) {
            // The update replaces the label set wholesale, so send the
            // existing labels plus the mapped one.
            let mut labels: Vec<String> = issue.labels.iter().map(|l| l.name.clone()).collect();
            labels.push(label.to_string());
            changes.labels = Some(labels);
        }
    }

    let body = issue.body.as_deref().unwrap_or_default();
    if !body.contains(note) {
        changes.body = Some(if body.is_empty() {
            note.to_string()
        } else {
            format!("{body}<br><br>{note}")
        });
    }

    changes
}

/// Board → ticket diff. The board is authoritative for status and iteration
/// dates, the issue for the assignee. All differing fields are merged into
/// one update.
///
/// A board item without an iteration clears the ticket's dates; status and
/// assignee are only propagated when the board/issue actually carries one.
pub fn diff_ticket_fields(
    item: &BoardItem,
    issue_assignee: Option<&str>,
    ticket: &Ticket,
) -> TicketChanges {
    let mut changes = TicketChanges::default();
    let fields = &ticket.custom_fields;

    if let Some(assignee) = issue_assignee {
        if fields.assigned_developer.as_deref() != Some(assignee) {
            changes.assigned_developer = Some(assignee.to_string());
        }
    }

    if let Some(status) = &item.status {
        if fields.development_status.as_deref() != Some(status.as_str()) {
            changes.development_status = Some(status.clone());
        }
    }

    let start = item.iteration_start.map(|d| d.to_string());
    if start != fields.start_date {
        changes.start_date = Some(start);
    }

    let end = item.iteration_end.map(|d| d.to_string());
    if end != fields.end_date {
        changes.end_date = Some(end);
    }

    changes
}

/// Ticket → board diff for the two fields that flow in that direction.
#[derive(Debug, Default, PartialEq)]
pub struct BoardFieldUpdates {
    pub company: Option<String>,
    pub priority: Option<String>,
}

pub fn diff_board_fields(
    item: &BoardItem,
    company: Option<&str>,
    priority_label: &str,
) -> BoardFieldUpdates {
    let mut updates = BoardFieldUpdates::default();
    if let Some(company) = company {
        if item.company.as_deref() != Some(company) {
            updates.company = Some(company.to_string());
        }
    }
    if item.priority.as_deref() != Some(priority_label) {
        updates.priority = Some(priority_label.to_string());
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::issue::{Label, User};
    use chrono::NaiveDate;

    fn ticket(id: u64) -> Ticket {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "type": "Incident",
            "priority": 2,
            "custom_fields": {
                "cf_development_task_title": "Fix crash",
                "cf_repository": "svc"
            }
        }))
        .unwrap()
    }

    fn issue(title: &str, body: &str, labels: &[&str]) -> Issue {
        Issue {
            number: 17,
            title: title.to_string(),
            body: Some(body.to_string()),
            html_url: "https://github.com/acme/svc/issues/17".into(),
            repository_url: Some("https://api.github.com/repos/acme/svc".into()),
            created_at: "2024-03-01T10:00:00Z".parse().unwrap(),
            labels: labels
                .iter()
                .map(|l| Label {
                    name: l.to_string(),
                })
                .collect(),
            assignee: None,
            user: Some(User {
                login: "octocat".into(),
            }),
        }
    }

    fn board_item() -> BoardItem {
        BoardItem {
            project_id: "P1".into(),
            item_id: "I1".into(),
            issue_number: 17,
            repository: "svc".into(),
            title: "Fix crash (FD#42)".into(),
            status: Some("In Progress".into()),
            company: Some("Acme Corp".into()),
            priority: Some("High".into()),
            iteration_start: NaiveDate::from_ymd_opt(2024, 1, 10),
            iteration_end: NaiveDate::from_ymd_opt(2024, 1, 15),
        }
    }

    #[test]
    fn issue_diff_empty_when_everything_holds() {
        let t = ticket(42);
        let note = reference_note("acme.freshdesk.com", 42);
        let body = format!("Some context<br><br>{note}");
        let gh = issue("Fix crash (FD#42)", &body, &["bug", "other"]);
        let changes = diff_issue_fields(&t, &gh, Some("bug"), &note);
        assert!(changes.is_empty());
    }

    #[test]
    fn issue_diff_detects_title_drift() {
        let t = ticket(42);
        let note = reference_note("acme.freshdesk.com", 42);
        let gh = issue("Old title", &note, &["bug"]);
        let changes = diff_issue_fields(&t, &gh, Some("bug"), &note);
        assert_eq!(changes.title.as_deref(), Some("Fix crash (FD#42)"));
        assert_eq!(changes.labels, None);
        assert_eq!(changes.body, None);
    }

    #[test]
    fn issue_diff_adds_missing_label_without_removing_existing() {
        let t = ticket(42);
        let note = reference_note("acme.freshdesk.com", 42);
        let gh = issue("Fix crash (FD#42)", &note, &["help wanted"]);
        let changes = diff_issue_fields(&t, &gh, Some("bug"), &note);
        assert_eq!(
            changes.labels,
            Some(vec!["help wanted".to_string(), "bug".to_string()])
        );
    }

    #[test]
    fn issue_diff_skips_label_when_unmapped() {
        let t = ticket(42);
        let note = reference_note("acme.freshdesk.com", 42);
        let gh = issue("Fix crash (FD#42)", &note, &[]);
        let changes = diff_issue_fields(&t, &gh, None, &note);
        assert_eq!(changes.labels, None);
    }

    #[test]
    fn issue_diff_appends_note_to_existing_body() {
        let t = ticket(42);
        let note = reference_note("acme.freshdesk.com", 42);
        let gh = issue("Fix crash (FD#42)", "Original report text", &[]);
        let changes = diff_issue_fields(&t, &gh, None, &note);
        assert_eq!(
            changes.body.as_deref(),
            Some(format!("Original report text<br><br>{note}").as_str())
        );
    }

    #[test]
    fn issue_diff_note_containment_is_pure_substring() {
        // The note appearing anywhere in the body counts, even if a human
        // pasted it there. Accepted risk, not a defect.
        let t = ticket(42);
        let note = reference_note("acme.freshdesk.com", 42);
        let body = format!("quoted earlier: {note} end");
        let gh = issue("Fix crash (FD#42)", &body, &[]);
        let changes = diff_issue_fields(&t, &gh, None, &note);
        assert_eq!(changes.body, None);
    }

    #[test]
    fn ticket_diff_merges_all_differing_fields() {
        let t = ticket(42);
        let changes = diff_ticket_fields(&board_item(), Some("octocat"), &t);
        assert_eq!(changes.assigned_developer.as_deref(), Some("octocat"));
        assert_eq!(changes.development_status.as_deref(), Some("In Progress"));
        assert_eq!(changes.start_date, Some(Some("2024-01-10".into())));
        assert_eq!(changes.end_date, Some(Some("2024-01-15".into())));
    }

    #[test]
    fn ticket_diff_empty_when_ticket_matches_board() {
        let mut t = ticket(42);
        t.custom_fields.assigned_developer = Some("octocat".into());
        t.custom_fields.development_status = Some("In Progress".into());
        t.custom_fields.start_date = Some("2024-01-10".into());
        t.custom_fields.end_date = Some("2024-01-15".into());
        let changes = diff_ticket_fields(&board_item(), Some("octocat"), &t);
        assert!(changes.is_empty());
    }

    #[test]
    fn ticket_diff_clears_dates_when_iteration_removed() {
        let mut t = ticket(42);
        t.custom_fields.start_date = Some("2024-01-10".into());
        t.custom_fields.end_date = Some("2024-01-15".into());
        let mut item = board_item();
        item.iteration_start = None;
        item.iteration_end = None;
        item.status = None;
        let changes = diff_ticket_fields(&item, None, &t);
        assert_eq!(changes.start_date, Some(None));
        assert_eq!(changes.end_date, Some(None));
        assert_eq!(changes.development_status, None);
        assert_eq!(changes.assigned_developer, None);
    }

    #[test]
    fn board_diff_flags_company_and_priority_mismatch() {
        let updates = diff_board_fields(&board_item(), Some("Other Inc"), "Urgent");
        assert_eq!(updates.company.as_deref(), Some("Other Inc"));
        assert_eq!(updates.priority.as_deref(), Some("Urgent"));
    }

    #[test]
    fn board_diff_empty_when_values_match() {
        let updates = diff_board_fields(&board_item(), Some("Acme Corp"), "High");
        assert_eq!(updates, BoardFieldUpdates::default());
    }

    #[test]
    fn board_diff_skips_company_when_unresolved() {
        let updates = diff_board_fields(&board_item(), None, "High");
        assert_eq!(updates.company, None);
    }

    #[test]
    fn new_issue_requires_task_title() {
        let mut t = ticket(42);
        t.custom_fields.task_title = None;
        assert!(build_new_issue(&t, "acme.freshdesk.com", None).is_none());
    }

    #[test]
    fn new_issue_carries_summary_note_label_and_assignee() {
        let mut t = ticket(42);
        t.summary = Some("It crashes on start".into());
        t.custom_fields.assigned_developer = Some("octocat".into());
        let new = build_new_issue(&t, "acme.freshdesk.com", Some("bug")).unwrap();
        assert_eq!(new.title, "Fix crash (FD#42)");
        assert!(new.body.starts_with("It crashes on start\n\n"));
        assert!(new.body.contains("Freshdesk Ticket #42"));
        assert_eq!(new.labels, Some(vec!["bug".to_string()]));
        assert_eq!(new.assignees, Some(vec!["octocat".to_string()]));
    }

    #[test]
    fn creation_note_references_issue_url_and_author() {
        let gh = issue("Fix crash (FD#42)", "", &[]);
        let note = creation_note(&gh, "svc");
        assert!(note.contains("octocat created"));
        assert!(note.contains("https://github.com/acme/svc/issues/17"));
        assert!(note.contains("#17"));
        assert!(note.contains("in <a href=\"https://api.github.com/repos/acme/svc\">svc</a>"));
    }
}
