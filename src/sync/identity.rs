use crate::model::board::BoardItem;

/// Find the board item matching a linked issue. A match requires both the
/// issue number and the repository to agree; the first hit in board order
/// wins, and no match is an ordinary outcome.
pub fn find_board_item<'a>(
    items: &'a [BoardItem],
    issue_number: u64,
    repository: &str,
) -> Option<&'a BoardItem> {
    items
        .iter()
        .find(|item| item.issue_number == issue_number && item.repository == repository)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(item_id: &str, number: u64, repo: &str) -> BoardItem {
        BoardItem {
            project_id: "P1".into(),
            item_id: item_id.into(),
            issue_number: number,
            repository: repo.into(),
            title: String::new(),
            status: None,
            company: None,
            priority: None,
            iteration_start: None,
            iteration_end: None,
        }
    }

    #[test]
    fn matches_on_number_and_repository() {
        let items = vec![item("A", 7, "svc"), item("B", 7, "web"), item("C", 8, "svc")];
        assert_eq!(find_board_item(&items, 7, "web").unwrap().item_id, "B");
    }

    #[test]
    fn number_alone_is_not_enough() {
        let items = vec![item("A", 7, "svc")];
        assert!(find_board_item(&items, 7, "web").is_none());
        assert!(find_board_item(&items, 9, "svc").is_none());
    }

    #[test]
    fn first_of_duplicate_candidates_wins() {
        let items = vec![item("A", 7, "svc"), item("B", 7, "svc")];
        assert_eq!(find_board_item(&items, 7, "svc").unwrap().item_id, "A");
    }
}
