use chrono::{Days, NaiveDate};
use serde::Deserialize;

/// A project-board entry linking an issue to board-scoped metadata.
///
/// Items are never created or deleted by the sync; only their field values
/// are mutated. `iteration_end` is derived at parse time from the iteration's
/// start date and duration.
#[derive(Debug, Clone)]
pub struct BoardItem {
    pub project_id: String,
    pub item_id: String,
    pub issue_number: u64,
    pub repository: String,
    pub title: String,
    pub status: Option<String>,
    pub company: Option<String>,
    pub priority: Option<String>,
    pub iteration_start: Option<NaiveDate>,
    pub iteration_end: Option<NaiveDate>,
}

/// Calendar-day arithmetic, no timezone involved: an iteration starting
/// 2024-01-10 with duration 5 ends 2024-01-15.
pub fn iteration_end(start: NaiveDate, duration_days: u64) -> NaiveDate {
    start
        .checked_add_days(Days::new(duration_days))
        .unwrap_or(start)
}

/// Board field schema metadata (single-select fields carry options).
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldOption {
    pub id: String,
    pub name: String,
}

/// Field id lookup by name.
pub fn field_id<'a>(fields: &'a [ProjectField], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.id.as_str())
}

/// Resolve a single-select option by field name and option name, yielding
/// `(field_id, option_id)` for a field-value mutation.
pub fn option_id<'a>(
    fields: &'a [ProjectField],
    field_name: &str,
    option_name: &str,
) -> Option<(&'a str, &'a str)> {
    let field = fields.iter().find(|f| f.name == field_name)?;
    let option = field.options.iter().find(|o| o.name == option_name)?;
    Some((field.id.as_str(), option.id.as_str()))
}

/// All option names of a single-select field, in board order.
pub fn option_names(fields: &[ProjectField], field_name: &str) -> Vec<String> {
    fields
        .iter()
        .find(|f| f.name == field_name)
        .map(|f| f.options.iter().map(|o| o.name.clone()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<ProjectField> {
        vec![
            ProjectField {
                id: "F1".into(),
                name: "Status".into(),
                options: vec![
                    FieldOption {
                        id: "O1".into(),
                        name: "Todo".into(),
                    },
                    FieldOption {
                        id: "O2".into(),
                        name: "Done".into(),
                    },
                ],
            },
            ProjectField {
                id: "F2".into(),
                name: "Company".into(),
                options: vec![],
            },
        ]
    }

    #[test]
    fn iteration_end_adds_calendar_days() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(
            iteration_end(start, 5),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn iteration_end_crosses_month_boundary() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        assert_eq!(
            iteration_end(start, 14),
            NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
        );
    }

    #[test]
    fn field_lookups() {
        let fields = fields();
        assert_eq!(field_id(&fields, "Company"), Some("F2"));
        assert_eq!(field_id(&fields, "Missing"), None);
        assert_eq!(option_id(&fields, "Status", "Done"), Some(("F1", "O2")));
        assert_eq!(option_id(&fields, "Status", "Blocked"), None);
        assert_eq!(option_names(&fields, "Status"), vec!["Todo", "Done"]);
        assert!(option_names(&fields, "Missing").is_empty());
    }
}
