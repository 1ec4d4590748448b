use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::pagination::{drain_pages, FetchPage, Page};
use super::IssueTracker;
use crate::config::{BoardConfig, GithubConfig};
use crate::model::board::{iteration_end, BoardItem, FieldOption, ProjectField};
use crate::model::issue::{Issue, IssueChanges, NewIssue};

const REST_BASE: &str = "https://api.github.com";
const GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// GitHub client: REST for issues, repositories and members, GraphQL for the
/// Projects v2 board.
pub struct GithubTracker {
    client: reqwest::Client,
    token: String,
    org: String,
    project_number: u32,
    language: Option<String>,
    status_field: String,
    priority_field: String,
    company_field: String,
    iteration_field: String,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct Repo {
    name: String,
    archived: bool,
    language: Option<String>,
}

#[derive(Deserialize)]
struct Member {
    login: String,
}

// --- Projects v2 wire structs ---

#[derive(Deserialize)]
struct FieldsData {
    organization: FieldsOrg,
}

#[derive(Deserialize)]
struct FieldsOrg {
    #[serde(rename = "projectV2")]
    project: FieldsProject,
}

#[derive(Deserialize)]
struct FieldsProject {
    fields: FieldNodes,
}

#[derive(Deserialize)]
struct FieldNodes {
    nodes: Vec<FieldNode>,
}

/// Unmatched fragment types come back as empty objects, hence the optionals.
#[derive(Deserialize)]
struct FieldNode {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    options: Vec<FieldOption>,
}

#[derive(Deserialize)]
struct ItemsData {
    organization: ItemsOrg,
}

#[derive(Deserialize)]
struct ItemsOrg {
    #[serde(rename = "projectV2")]
    project: ItemsProject,
}

#[derive(Deserialize)]
struct ItemsProject {
    id: String,
    items: ItemConnection,
}

#[derive(Deserialize)]
struct ItemConnection {
    nodes: Vec<ItemNode>,
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
}

#[derive(Deserialize)]
struct PageInfo {
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
}

#[derive(Deserialize)]
struct ItemNode {
    id: String,
    content: Option<IssueContent>,
    #[serde(rename = "fieldValues")]
    field_values: FieldValueNodes,
}

/// Draft items and pull requests fall outside the Issue fragment and arrive
/// as empty objects; such items are skipped during parsing.
#[derive(Deserialize)]
struct IssueContent {
    number: Option<u64>,
    title: Option<String>,
    repository: Option<RepoRef>,
}

#[derive(Deserialize)]
struct RepoRef {
    name: String,
}

#[derive(Deserialize)]
struct FieldValueNodes {
    nodes: Vec<FieldValueNode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldValueNode {
    Iteration {
        #[serde(rename = "startDate")]
        start_date: NaiveDate,
        duration: u64,
        field: FieldName,
    },
    SingleSelect {
        name: String,
        field: FieldName,
    },
    Text {
        text: String,
        field: FieldName,
    },
    Empty {},
}

#[derive(Deserialize)]
struct FieldName {
    name: String,
}

const ITEMS_QUERY: &str = r#"
query($org: String!, $project: Int!, $after: String) {
  organization(login: $org) {
    projectV2(number: $project) {
      id
      items(first: 100, after: $after) {
        nodes {
          id
          content {
            ... on Issue {
              number
              title
              repository { name }
            }
          }
          fieldValues(first: 10) {
            nodes {
              ... on ProjectV2ItemFieldTextValue {
                text
                field { ... on ProjectV2Field { name } }
              }
              ... on ProjectV2ItemFieldSingleSelectValue {
                name
                field { ... on ProjectV2SingleSelectField { name } }
              }
              ... on ProjectV2ItemFieldIterationValue {
                startDate
                duration
                field { ... on ProjectV2IterationField { name } }
              }
            }
          }
        }
        pageInfo { endCursor hasNextPage }
      }
    }
  }
}"#;

const FIELDS_QUERY: &str = r#"
query($org: String!, $project: Int!) {
  organization(login: $org) {
    projectV2(number: $project) {
      fields(first: 20) {
        nodes {
          ... on ProjectV2SingleSelectField {
            id
            name
            options { id name }
          }
          ... on ProjectV2Field {
            id
            name
          }
        }
      }
    }
  }
}"#;

const UPDATE_TEXT_MUTATION: &str = r#"
mutation($project: ID!, $item: ID!, $field: ID!, $text: String!) {
  updateProjectV2ItemFieldValue(
    input: {projectId: $project, itemId: $item, fieldId: $field, value: {text: $text}}
  ) { clientMutationId }
}"#;

const UPDATE_OPTION_MUTATION: &str = r#"
mutation($project: ID!, $item: ID!, $field: ID!, $option: String!) {
  updateProjectV2ItemFieldValue(
    input: {projectId: $project, itemId: $item, fieldId: $field, value: {singleSelectOptionId: $option}}
  ) { clientMutationId }
}"#;

impl GithubTracker {
    pub fn new(github: &GithubConfig, board: &BoardConfig, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            org: github.org.clone(),
            project_number: github.project_number,
            language: github.language.clone(),
            status_field: board.status_field.clone(),
            priority_field: board.priority_field.clone(),
            company_field: board.company_field.clone(),
            iteration_field: board.iteration_field.clone(),
        }
    }

    fn rest(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{REST_BASE}{path}"))
            .bearer_auth(&self.token)
            .header("User-Agent", "deskbridge")
            .header("Accept", "application/vnd.github+json")
    }

    /// Execute a GraphQL query. A malformed query or an error in execution
    /// is a hard failure: unlike transport hiccups on individual REST calls
    /// it indicates a programming defect and aborts the run.
    async fn graphql<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(GRAPHQL_URL)
            .bearer_auth(&self.token)
            .header("User-Agent", "deskbridge")
            .header("X-Github-Next-Global-ID", "1")
            .json(&body)
            .send()
            .await
            .context("GitHub GraphQL request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("GitHub GraphQL query failed: HTTP {status}: {text}");
        }
        let result: GraphQlResponse<T> = response
            .json()
            .await
            .context("Failed to parse GraphQL response")?;
        if let Some(errors) = result.errors {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            bail!("GitHub GraphQL query failed: {message}");
        }
        result
            .data
            .context("No data in GitHub GraphQL response")
    }

    fn parse_items_page(&self, data: ItemsData) -> Page<BoardItem> {
        let project_id = data.organization.project.id;
        let connection = data.organization.project.items;
        let mut items = Vec::new();
        for node in connection.nodes {
            let Some(content) = node.content else {
                continue;
            };
            // Only items backed by a real issue participate in the sync.
            let (Some(number), Some(repository)) = (content.number, content.repository) else {
                continue;
            };
            let mut item = BoardItem {
                project_id: project_id.clone(),
                item_id: node.id,
                issue_number: number,
                repository: repository.name,
                title: content.title.unwrap_or_default(),
                status: None,
                company: None,
                priority: None,
                iteration_start: None,
                iteration_end: None,
            };
            for value in node.field_values.nodes {
                match value {
                    FieldValueNode::SingleSelect { name, field } => {
                        if field.name == self.status_field {
                            item.status = Some(name);
                        } else if field.name == self.priority_field {
                            item.priority = Some(name);
                        }
                    }
                    FieldValueNode::Text { text, field } => {
                        if field.name == self.company_field {
                            item.company = Some(text);
                        }
                    }
                    FieldValueNode::Iteration {
                        start_date,
                        duration,
                        field,
                    } => {
                        if field.name == self.iteration_field {
                            item.iteration_start = Some(start_date);
                            item.iteration_end = Some(iteration_end(start_date, duration));
                        }
                    }
                    FieldValueNode::Empty {} => {}
                }
            }
            items.push(item);
        }
        Page {
            items,
            end_cursor: connection.page_info.end_cursor.unwrap_or_default(),
            has_next: connection.page_info.has_next_page,
        }
    }
}

/// Follow a GitHub `Link` header to the next REST page, if any.
fn next_link(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let value = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    value.split(',').find_map(|part| {
        let (url, rel) = part.split_once(';')?;
        if rel.contains("rel=\"next\"") {
            Some(url.trim().trim_start_matches('<').trim_end_matches('>').to_string())
        } else {
            None
        }
    })
}

#[async_trait]
impl FetchPage for GithubTracker {
    type Item = BoardItem;

    async fn fetch_page(&self, cursor: &str) -> Result<Page<BoardItem>> {
        let after = if cursor.is_empty() {
            serde_json::Value::Null
        } else {
            json!(cursor)
        };
        let variables = json!({
            "org": self.org,
            "project": self.project_number,
            "after": after,
        });
        let data: ItemsData = self.graphql(ITEMS_QUERY, variables).await?;
        Ok(self.parse_items_page(data))
    }
}

#[async_trait]
impl IssueTracker for GithubTracker {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        let mut repos = Vec::new();
        let mut url = Some(format!("{REST_BASE}/orgs/{}/repos?per_page=100", self.org));
        while let Some(current) = url {
            let response = self
                .client
                .get(&current)
                .bearer_auth(&self.token)
                .header("User-Agent", "deskbridge")
                .header("Accept", "application/vnd.github+json")
                .send()
                .await
                .context("GitHub repository list request failed")?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                bail!("GitHub repository list failed: HTTP {status}: {text}");
            }
            url = next_link(response.headers());
            let page: Vec<Repo> = response
                .json()
                .await
                .context("Failed to parse repository list")?;
            for repo in page {
                if repo.archived {
                    continue;
                }
                match &self.language {
                    Some(language) => {
                        if repo.language.as_deref() == Some(language) {
                            repos.push(repo.name);
                        }
                    }
                    None => repos.push(repo.name),
                }
            }
        }
        debug!(count = repos.len(), "repositories in sync scope");
        Ok(repos)
    }

    async fn list_members(&self) -> Result<Vec<String>> {
        let response = self
            .rest(reqwest::Method::GET, &format!("/orgs/{}/members", self.org))
            .send()
            .await
            .context("GitHub member list request failed")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("GitHub member list failed: HTTP {status}: {text}");
        }
        let members: Vec<Member> = response
            .json()
            .await
            .context("Failed to parse member list")?;
        Ok(members.into_iter().map(|m| m.login).collect())
    }

    async fn project_fields(&self) -> Result<Vec<ProjectField>> {
        let variables = json!({ "org": self.org, "project": self.project_number });
        let data: FieldsData = self.graphql(FIELDS_QUERY, variables).await?;
        let fields = data
            .organization
            .project
            .fields
            .nodes
            .into_iter()
            .filter_map(|node| {
                Some(ProjectField {
                    id: node.id?,
                    name: node.name?,
                    options: node.options,
                })
            })
            .collect();
        Ok(fields)
    }

    async fn board_items(&self) -> Result<Vec<BoardItem>> {
        drain_pages(self).await
    }

    async fn create_issue(&self, repo: &str, issue: &NewIssue) -> Result<Issue> {
        let path = format!("/repos/{}/{repo}/issues", self.org);
        let response = self
            .rest(reqwest::Method::POST, &path)
            .json(issue)
            .send()
            .await
            .context("GitHub issue create request failed")?;
        let status = response.status();
        if status != StatusCode::CREATED {
            let text = response.text().await.unwrap_or_default();
            bail!("GitHub issue create failed: HTTP {status}: {text}");
        }
        response
            .json()
            .await
            .context("Failed to parse created issue")
    }

    async fn get_issue(&self, repo: &str, number: u64) -> Result<Option<Issue>> {
        let path = format!("/repos/{}/{repo}/issues/{number}", self.org);
        let response = self
            .rest(reqwest::Method::GET, &path)
            .send()
            .await
            .context("GitHub issue fetch request failed")?;
        match response.status() {
            StatusCode::OK => Ok(Some(
                response
                    .json()
                    .await
                    .context("Failed to parse issue")?,
            )),
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let text = response.text().await.unwrap_or_default();
                bail!("GitHub issue fetch failed: HTTP {status}: {text}")
            }
        }
    }

    async fn update_issue(&self, repo: &str, number: u64, changes: &IssueChanges) -> Result<()> {
        let path = format!("/repos/{}/{repo}/issues/{number}", self.org);
        let response = self
            .rest(reqwest::Method::PATCH, &path)
            .json(changes)
            .send()
            .await
            .context("GitHub issue update request failed")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("GitHub issue update failed: HTTP {status}: {text}");
        }
        Ok(())
    }

    async fn set_item_text_field(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        text: &str,
    ) -> Result<()> {
        let variables = json!({
            "project": project_id,
            "item": item_id,
            "field": field_id,
            "text": text,
        });
        let _: serde_json::Value = self.graphql(UPDATE_TEXT_MUTATION, variables).await?;
        Ok(())
    }

    async fn set_item_option_field(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        option_id: &str,
    ) -> Result<()> {
        let variables = json!({
            "project": project_id,
            "item": item_id,
            "field": field_id,
            "option": option_id,
        });
        let _: serde_json::Value = self.graphql(UPDATE_OPTION_MUTATION, variables).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> GithubTracker {
        let github = GithubConfig {
            org: "acme".into(),
            project_number: 3,
            token: None,
            language: None,
        };
        let board = BoardConfig {
            status_field: "Status".into(),
            priority_field: "Priority".into(),
            company_field: "Company".into(),
            iteration_field: "Iteration".into(),
        };
        GithubTracker::new(&github, &board, "token".into())
    }

    fn items_payload() -> serde_json::Value {
        json!({
            "organization": {
                "projectV2": {
                    "id": "P1",
                    "items": {
                        "nodes": [
                            {
                                "id": "I1",
                                "content": {
                                    "number": 12,
                                    "title": "Fix crash (FD#42)",
                                    "repository": { "name": "svc" }
                                },
                                "fieldValues": {
                                    "nodes": [
                                        {},
                                        { "name": "In Progress", "field": { "name": "Status" } },
                                        { "name": "High", "field": { "name": "Priority" } },
                                        { "text": "Acme Corp", "field": { "name": "Company" } },
                                        {
                                            "startDate": "2024-01-10",
                                            "duration": 5,
                                            "field": { "name": "Iteration" }
                                        }
                                    ]
                                }
                            },
                            {
                                "id": "I2",
                                "content": {},
                                "fieldValues": { "nodes": [] }
                            }
                        ],
                        "pageInfo": { "endCursor": "abc", "hasNextPage": true }
                    }
                }
            }
        })
    }

    #[test]
    fn parses_board_items_and_skips_unlinked_content() {
        let data: ItemsData = serde_json::from_value(items_payload()).unwrap();
        let page = tracker().parse_items_page(data);

        assert_eq!(page.items.len(), 1);
        assert!(page.has_next);
        assert_eq!(page.end_cursor, "abc");

        let item = &page.items[0];
        assert_eq!(item.project_id, "P1");
        assert_eq!(item.issue_number, 12);
        assert_eq!(item.repository, "svc");
        assert_eq!(item.status.as_deref(), Some("In Progress"));
        assert_eq!(item.priority.as_deref(), Some("High"));
        assert_eq!(item.company.as_deref(), Some("Acme Corp"));
        assert_eq!(
            item.iteration_start,
            NaiveDate::from_ymd_opt(2024, 1, 10)
        );
        assert_eq!(item.iteration_end, NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn ignores_field_values_with_unknown_names() {
        let mut payload = items_payload();
        payload["organization"]["projectV2"]["items"]["nodes"][0]["fieldValues"]["nodes"] =
            json!([{ "name": "Whatever", "field": { "name": "Size" } }]);
        let data: ItemsData = serde_json::from_value(payload).unwrap();
        let page = tracker().parse_items_page(data);
        assert_eq!(page.items[0].status, None);
        assert_eq!(page.items[0].priority, None);
    }

    #[test]
    fn next_link_extracts_rel_next() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::LINK,
            "<https://api.github.com/orgs/acme/repos?page=2>; rel=\"next\", \
             <https://api.github.com/orgs/acme/repos?page=5>; rel=\"last\""
                .parse()
                .unwrap(),
        );
        assert_eq!(
            next_link(&headers),
            Some("https://api.github.com/orgs/acme/repos?page=2".to_string())
        );

        let mut last_only = reqwest::header::HeaderMap::new();
        last_only.insert(
            reqwest::header::LINK,
            "<https://api.github.com/orgs/acme/repos?page=5>; rel=\"last\""
                .parse()
                .unwrap(),
        );
        assert_eq!(next_link(&last_only), None);
        assert_eq!(next_link(&reqwest::header::HeaderMap::new()), None);
    }
}
