use tracing::warn;

use crate::model::ticket::FieldChoice;

/// Ordered ticket-type → issue-label table, configured statically.
#[derive(Debug, Clone)]
pub struct LabelMap {
    pairs: Vec<(String, String)>,
}

impl LabelMap {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// First matching label for a ticket type. `None` means "no label to
    /// apply", which callers must treat as absence, not failure.
    pub fn resolve(&self, ticket_type: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(kind, _)| kind == ticket_type)
            .map(|(_, label)| label.as_str())
    }
}

/// Translate a helpdesk priority code into its display label using the
/// priority field's choice metadata. A code without a matching choice falls
/// back to the code itself; the sync degrades rather than halts.
pub fn resolve_priority_label(code: &str, choices: &[FieldChoice]) -> String {
    match choices.iter().find(|c| c.value == code) {
        Some(choice) => choice.label.clone(),
        None => {
            warn!(code, "priority code has no matching field choice");
            code.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices() -> Vec<FieldChoice> {
        vec![
            FieldChoice {
                label: "Low".into(),
                value: "1".into(),
                position: 1,
            },
            FieldChoice {
                label: "Urgent".into(),
                value: "4".into(),
                position: 4,
            },
        ]
    }

    #[test]
    fn resolves_mapped_types_in_order() {
        let map = LabelMap::new(vec![
            ("Incident".into(), "bug".into()),
            ("Incident".into(), "shadowed".into()),
            ("Feature Request".into(), "enhancement".into()),
        ]);
        assert_eq!(map.resolve("Incident"), Some("bug"));
        assert_eq!(map.resolve("Feature Request"), Some("enhancement"));
        assert_eq!(map.resolve("Question"), None);
    }

    #[test]
    fn priority_label_resolves_by_value() {
        assert_eq!(resolve_priority_label("4", &choices()), "Urgent");
    }

    #[test]
    fn priority_label_falls_back_to_code() {
        assert_eq!(resolve_priority_label("7", &choices()), "7");
        assert_eq!(resolve_priority_label("2", &[]), "2");
    }
}
