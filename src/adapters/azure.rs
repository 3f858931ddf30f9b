use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::core::threads::Thread;
use crate::core::work_item::{self, WorkItemSummary};

const API_VERSION: &str = "7.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Guard for parent-chain walking: the relation graph is supplied by the
/// server and could be deep or even cyclic.
const MAX_PARENT_DEPTH: usize = 8;

/// Non-success response from the Azure DevOps REST API. Carries enough to
/// print a useful diagnostic; commands let it bubble to the top.
#[derive(Debug, Error)]
#[error("Azure DevOps API error ({status}): {body}")]
pub struct AzureError {
    pub status: StatusCode,
    pub body: String,
}

/// One file-level modification inside a PR iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub path: String,
    pub change_type: ChangeKind,
    pub change_tracking_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Edit,
    Delete,
    Rename,
}

impl ChangeKind {
    /// The API reports combined values like "edit, rename"; deletions win,
    /// then additions, then renames.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.contains("delete") {
            Self::Delete
        } else if lower.contains("add") {
            Self::Add
        } else if lower.contains("rename") {
            Self::Rename
        } else {
            Self::Edit
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: u64,
    pub title: String,
    #[serde(default)]
    pub last_merge_source_commit: Option<CommitRef>,
    #[serde(default)]
    pub last_merge_target_commit: Option<CommitRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRef {
    pub commit_id: String,
}

pub struct AzureClient {
    client: Client,
    base_url: String,
    pat: String,
}

impl AzureClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = format!(
            "https://dev.azure.com/{}/{}/_apis",
            config.organization, config.project
        );
        Self::with_base_url(&config.pat, base_url)
    }

    fn with_base_url(pat: &str, base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            pat: pat.to_string(),
        })
    }

    pub async fn get_work_item(&self, id: u64, expand_relations: bool) -> Result<Value> {
        let url = format!("{}/wit/workitems/{}", self.base_url, id);
        let mut query = vec![("api-version", API_VERSION.to_string())];
        if expand_relations {
            query.push(("$expand", "relations".to_string()));
        }

        match self.get_json_opt(&url, &query).await? {
            Some(raw) => Ok(raw),
            None => bail!("Work item {} not found", id),
        }
    }

    /// Fetch a work item plus its ancestor chain, bounded in depth and
    /// guarded against cyclic relation graphs. A parent that fails to
    /// fetch ends the walk with a warning instead of failing the command.
    pub async fn get_work_item_chain(
        &self,
        id: u64,
    ) -> Result<(WorkItemSummary, Vec<WorkItemSummary>)> {
        let raw = self.get_work_item(id, true).await?;
        let summary = WorkItemSummary::from_raw(&raw);

        let mut parents = Vec::new();
        let mut visited: HashSet<u64> = HashSet::from([id]);
        let mut next = work_item::find_parent_id(&raw);

        while let Some(parent_id) = next {
            if parents.len() >= MAX_PARENT_DEPTH || !visited.insert(parent_id) {
                break;
            }
            let parent_raw = match self.get_work_item(parent_id, true).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("Stopping parent walk at #{}: {}", parent_id, err);
                    break;
                }
            };
            next = work_item::find_parent_id(&parent_raw);
            parents.push(WorkItemSummary::from_raw(&parent_raw));
        }

        Ok((summary, parents))
    }

    pub async fn get_pull_request(&self, repo: &str, id: u64) -> Result<PullRequest> {
        let url = format!(
            "{}/git/repositories/{}/pullRequests/{}",
            self.base_url, repo, id
        );
        let query = [("api-version", API_VERSION.to_string())];
        match self.get_json_opt(&url, &query).await? {
            Some(raw) => {
                serde_json::from_value(raw).context("Unexpected pull request payload shape")
            }
            None => bail!("Pull request {} not found in repository {}", id, repo),
        }
    }

    pub async fn get_pr_work_item_ids(&self, repo: &str, id: u64) -> Result<Vec<u64>> {
        let url = format!(
            "{}/git/repositories/{}/pullRequests/{}/workitems",
            self.base_url, repo, id
        );
        let raw = self
            .get_json(&url, &[("api-version", API_VERSION.to_string())])
            .await?;

        let mut ids = Vec::new();
        if let Some(refs) = raw.get("value").and_then(Value::as_array) {
            for item in refs {
                // Ids arrive as strings here, unlike everywhere else.
                let id = match item.get("id") {
                    Some(Value::String(s)) => s.parse().ok(),
                    Some(Value::Number(n)) => n.as_u64(),
                    _ => None,
                };
                if let Some(id) = id {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    pub async fn get_latest_iteration(&self, repo: &str, pr: u64) -> Result<u64> {
        let url = format!(
            "{}/git/repositories/{}/pullRequests/{}/iterations",
            self.base_url, repo, pr
        );
        let raw = self
            .get_json(&url, &[("api-version", API_VERSION.to_string())])
            .await?;

        raw.get("value")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|it| it.get("id").and_then(Value::as_u64))
            .max()
            .with_context(|| format!("Pull request {} has no iterations", pr))
    }

    pub async fn get_iteration_changes(
        &self,
        repo: &str,
        pr: u64,
        iteration: u64,
    ) -> Result<Vec<ChangeEntry>> {
        let url = format!(
            "{}/git/repositories/{}/pullRequests/{}/iterations/{}/changes",
            self.base_url, repo, pr, iteration
        );
        let raw = self
            .get_json(&url, &[("api-version", API_VERSION.to_string())])
            .await?;

        let mut entries = Vec::new();
        if let Some(changes) = raw.get("changeEntries").and_then(Value::as_array) {
            for change in changes {
                let Some(path) = change
                    .get("item")
                    .and_then(|item| item.get("path"))
                    .and_then(Value::as_str)
                else {
                    continue;
                };
                let kind = change
                    .get("changeType")
                    .and_then(Value::as_str)
                    .map(ChangeKind::parse)
                    .unwrap_or(ChangeKind::Edit);
                let tracking_id = change
                    .get("changeTrackingId")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);

                entries.push(ChangeEntry {
                    path: path.to_string(),
                    change_type: kind,
                    change_tracking_id: tracking_id,
                });
            }
        }
        Ok(entries)
    }

    /// Raw file content at a commit. `None` when the file does not exist at
    /// that revision (new files on the target side, deletions on the source
    /// side).
    pub async fn get_file_content(
        &self,
        repo: &str,
        path: &str,
        commit: &str,
    ) -> Result<Option<String>> {
        let url = format!("{}/git/repositories/{}/items", self.base_url, repo);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("path", path),
                ("versionDescriptor.version", commit),
                ("versionDescriptor.versionType", "commit"),
                ("includeContent", "true"),
                ("api-version", API_VERSION),
            ])
            .header("Accept", "text/plain")
            .basic_auth("", Some(&self.pat))
            .send()
            .await
            .context("Failed to reach Azure DevOps")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(response.text().await?))
    }

    pub async fn get_threads(&self, repo: &str, pr: u64) -> Result<Vec<Thread>> {
        let url = format!(
            "{}/git/repositories/{}/pullRequests/{}/threads",
            self.base_url, repo, pr
        );
        let raw = self
            .get_json(&url, &[("api-version", API_VERSION.to_string())])
            .await?;

        let threads = raw.get("value").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(threads).context("Unexpected thread payload shape")
    }

    /// Post a general discussion comment on a PR (new active thread, no
    /// file anchor).
    pub async fn post_thread_comment(&self, repo: &str, pr: u64, text: &str) -> Result<()> {
        let url = format!(
            "{}/git/repositories/{}/pullRequests/{}/threads",
            self.base_url, repo, pr
        );
        let body = json!({
            "comments": [{
                "parentCommentId": 0,
                "content": text,
                "commentType": 1
            }],
            "status": 1
        });
        self.post_json(&url, &body).await?;
        Ok(())
    }

    /// Post a comment anchored to a file/line in a specific diff iteration.
    #[allow(clippy::too_many_arguments)]
    pub async fn post_file_comment(
        &self,
        repo: &str,
        pr: u64,
        iteration: u64,
        change_tracking_id: u64,
        path: &str,
        line: u64,
        text: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/git/repositories/{}/pullRequests/{}/threads",
            self.base_url, repo, pr
        );
        let body = json!({
            "comments": [{
                "parentCommentId": 0,
                "content": text,
                "commentType": 1
            }],
            "status": 1,
            "threadContext": {
                "filePath": path,
                "rightFileStart": {"line": line, "offset": 1},
                "rightFileEnd": {"line": line, "offset": 1}
            },
            "pullRequestThreadContext": {
                "changeTrackingId": change_tracking_id,
                "iterationContext": {
                    "firstComparingIteration": iteration,
                    "secondComparingIteration": iteration
                }
            }
        });
        self.post_json(&url, &body).await?;
        Ok(())
    }

    /// Publish generated text back onto a work item's discussion.
    pub async fn post_work_item_comment(&self, id: u64, text: &str) -> Result<()> {
        let url = format!("{}/wit/workItems/{}/comments", self.base_url, id);
        let body = json!({"text": text});
        let response = self
            .client
            .post(&url)
            // The comments endpoint has never left preview.
            .query(&[("api-version", "7.1-preview.3")])
            .basic_auth("", Some(&self.pat))
            .json(&body)
            .send()
            .await
            .context("Failed to reach Azure DevOps")?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        match self.get_json_opt(url, query).await? {
            Some(value) => Ok(value),
            None => bail!("Resource not found: {}", url),
        }
    }

    async fn get_json_opt(&self, url: &str, query: &[(&str, String)]) -> Result<Option<Value>> {
        let response = self
            .client
            .get(url)
            .query(query)
            .basic_auth("", Some(&self.pat))
            .send()
            .await
            .context("Failed to reach Azure DevOps")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let value = response
            .json()
            .await
            .context("Failed to parse Azure DevOps response")?;
        Ok(Some(value))
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .query(&[("api-version", API_VERSION)])
            .basic_auth("", Some(&self.pat))
            .json(body)
            .send()
            .await
            .context("Failed to reach Azure DevOps")?;

        let response = Self::check(response).await?;
        let value = response
            .json()
            .await
            .context("Failed to parse Azure DevOps response")?;
        Ok(value)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AzureError { status, body }.into())
    }
}
