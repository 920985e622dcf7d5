use crate::config::ClientConfig;
use crate::provider::{ProviderError, ProviderResult, SourceProvider};
use crate::types::{Branch, CommitAuthor, CommitNode, Repository};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const TARGET_PREFIX: &str = "CodeCommit_20150413";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const ERROR_TYPE_HEADER: &str = "x-amzn-ErrorType";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRepositoriesApiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRepositoriesApiResponse {
    #[serde(default)]
    repositories: Vec<RepositoryNameIdPair>,
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNameIdPair {
    repository_name: Option<String>,
    repository_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListBranchesApiRequest<'a> {
    repository_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBranchesApiResponse {
    #[serde(default)]
    branches: Vec<String>,
    next_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetBranchApiRequest<'a> {
    repository_name: &'a str,
    branch_name: &'a str,
}

#[derive(Deserialize)]
struct GetBranchApiResponse {
    branch: Option<BranchInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BranchInfo {
    branch_name: Option<String>,
    commit_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetCommitApiRequest<'a> {
    repository_name: &'a str,
    commit_id: &'a str,
}

#[derive(Deserialize)]
struct GetCommitApiResponse {
    commit: ApiCommit,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCommit {
    commit_id: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
    message: Option<String>,
    author: Option<ApiUserInfo>,
}

#[derive(Deserialize)]
struct ApiUserInfo {
    name: Option<String>,
    email: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Client for the CodeCommit JSON 1.1 API.
///
/// Requests are sent unsigned; the configured endpoint is expected to be a
/// signing proxy or a local emulator.
pub struct CodeCommitProvider {
    http_client: reqwest::Client,
    endpoint: String,
    config: ClientConfig,
}

impl CodeCommitProvider {
    pub fn new(config: ClientConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|msg| ProviderError::InvalidConfig { message: msg })?;

        let endpoint = if config.endpoint.ends_with('/') {
            config.endpoint.clone()
        } else {
            format!("{}/", config.endpoint)
        };

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Unknown {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            endpoint,
            config,
        })
    }

    pub fn with_default_config() -> ProviderResult<Self> {
        Self::new(ClientConfig::default())
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    async fn invoke<Req, Resp>(&self, operation: &str, request: &Req) -> ProviderResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)?;

        let http_response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .body(body)
            .send()
            .await
            .map_err(Self::handle_transport_error)?;

        let status = http_response.status();
        if !status.is_success() {
            let header_type = http_response
                .headers()
                .get(ERROR_TYPE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let error_text = http_response.text().await.unwrap_or_default();
            let err = Self::classify_error(status, header_type.as_deref(), &error_text);
            debug!("{} failed with {}: {}", operation, status, err);
            return Err(err);
        }

        let bytes = http_response
            .bytes()
            .await
            .map_err(Self::handle_transport_error)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn handle_transport_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::ServiceUnavailable {
                message: "Request timeout".to_string(),
            }
        } else if e.is_connect() {
            ProviderError::ServiceUnavailable {
                message: "Cannot connect to CodeCommit endpoint".to_string(),
            }
        } else {
            ProviderError::Network(e)
        }
    }

    /// Strips the namespace (`com.amazonaws.codecommit#`) and any trailing
    /// `:url` suffix from an error type string.
    fn error_code(raw: &str) -> &str {
        let code = raw.rsplit('#').next().unwrap_or(raw);
        code.split(':').next().unwrap_or(code).trim()
    }

    fn classify_error(
        status: reqwest::StatusCode,
        header_type: Option<&str>,
        body: &str,
    ) -> ProviderError {
        let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| body.to_string());
        let code = parsed
            .as_ref()
            .and_then(|b| b.error_type.as_deref())
            .or(header_type)
            .map(Self::error_code)
            .unwrap_or_default()
            .to_string();

        match code.as_str() {
            "ThrottlingException" | "TooManyRequestsException" => {
                ProviderError::Throttling { message }
            }
            "RepositoryDoesNotExistException"
            | "BranchDoesNotExistException"
            | "CommitIdDoesNotExistException"
            | "CommitDoesNotExistException" => ProviderError::NotFound {
                resource: format!("{} ({})", message, code),
            },
            "UnrecognizedClientException"
            | "AccessDeniedException"
            | "InvalidSignatureException"
            | "ExpiredTokenException"
            | "MissingAuthenticationTokenException" => ProviderError::Authentication { message },
            "" if status == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                ProviderError::Throttling { message }
            }
            "" if status.is_server_error() => ProviderError::ServiceUnavailable {
                message: format!("CodeCommit returned {}: {}", status, message),
            },
            "" => ProviderError::Unknown {
                message: format!("CodeCommit returned {}: {}", status, message),
            },
            _ => ProviderError::Api { code, message },
        }
    }

    fn parse_commit(requested_id: &str, commit: ApiCommit) -> CommitNode {
        let author = commit.author.map(|a| CommitAuthor {
            name: a.name,
            email: a.email,
            date: a.date,
        });

        CommitNode {
            id: commit.commit_id.unwrap_or_else(|| requested_id.to_string()),
            parent_ids: commit.parents,
            author,
            message: commit.message.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SourceProvider for CodeCommitProvider {
    async fn list_repositories(&self) -> ProviderResult<Vec<Repository>> {
        debug!("Listing repositories");

        let mut repositories = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let request = ListRepositoriesApiRequest {
                next_token: next_token.as_deref(),
            };
            let page: ListRepositoriesApiResponse =
                self.invoke("ListRepositories", &request).await?;

            for pair in page.repositories {
                match (pair.repository_name, pair.repository_id) {
                    (Some(name), id) => repositories.push(Repository {
                        name,
                        id: id.unwrap_or_default(),
                    }),
                    (None, id) => warn!("Skipping repository without a name (id: {:?})", id),
                }
            }

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        info!("Retrieved {} repositories", repositories.len());
        Ok(repositories)
    }

    async fn list_branches(&self, repository: &str) -> ProviderResult<Vec<String>> {
        debug!("Listing branches for repository: {}", repository);

        let mut branches = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let request = ListBranchesApiRequest {
                repository_name: repository,
                next_token: next_token.as_deref(),
            };
            let page: ListBranchesApiResponse = self.invoke("ListBranches", &request).await?;
            branches.extend(page.branches);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        info!(
            "Retrieved {} branches for repository: {}",
            branches.len(),
            repository
        );
        Ok(branches)
    }

    async fn get_branch(&self, repository: &str, branch: &str) -> ProviderResult<Branch> {
        debug!("Resolving branch {} in {}", branch, repository);

        let request = GetBranchApiRequest {
            repository_name: repository,
            branch_name: branch,
        };
        let response: GetBranchApiResponse = self.invoke("GetBranch", &request).await?;

        let info = response.branch.unwrap_or(BranchInfo {
            branch_name: None,
            commit_id: None,
        });

        Ok(Branch {
            name: info.branch_name.unwrap_or_else(|| branch.to_string()),
            head_commit_id: info.commit_id.filter(|id| !id.is_empty()),
        })
    }

    async fn get_commit(&self, repository: &str, commit_id: &str) -> ProviderResult<CommitNode> {
        debug!("Fetching commit {} from {}", commit_id, repository);

        let request = GetCommitApiRequest {
            repository_name: repository,
            commit_id,
        };
        let response: GetCommitApiResponse = self.invoke("GetCommit", &request).await?;

        Ok(Self::parse_commit(commit_id, response.commit))
    }

    fn provider_name(&self) -> &'static str {
        "codecommit"
    }
}
