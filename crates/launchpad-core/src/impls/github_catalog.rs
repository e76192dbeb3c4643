//! GitHub catalog: the owner's repositories that carry container build
//! files (a Dockerfile or a compose file in the repo root).

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::domain::app::AppDescriptor;
use crate::domain::errors::CatalogError;
use crate::ports::catalog::AppCatalog;

const API_BASE: &str = "https://api.github.com";

pub struct GithubCatalog {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RepoRow {
    name: String,
    full_name: String,
    description: Option<String>,
    language: Option<String>,
    stargazers_count: u32,
    clone_url: String,
}

#[derive(Debug, Deserialize)]
struct ContentRow {
    name: String,
}

impl GithubCatalog {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(token, API_BASE)
    }

    /// Point the catalog at a different API host (tests, GitHub Enterprise).
    pub fn with_base_url(token: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, CatalogError> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, "launchpad")
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }
        response
            .json()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))
    }
}

fn classify_status(status: StatusCode) -> CatalogError {
    match status.as_u16() {
        401 => CatalogError::Auth,
        403 | 429 => CatalogError::RateLimited,
        s => CatalogError::Network(format!("github returned status {s}")),
    }
}

fn is_container_build_file(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "dockerfile" | "compose.yaml" | "compose.yml" | "docker-compose.yaml" | "docker-compose.yml"
    )
}

#[async_trait]
impl AppCatalog for GithubCatalog {
    async fn list_apps(&self, owner: &str) -> Result<Vec<AppDescriptor>, CatalogError> {
        let repos: Vec<RepoRow> = self
            .get_json(&format!(
                "{}/users/{owner}/repos?per_page=100&sort=updated",
                self.base_url
            ))
            .await?;

        let mut apps = Vec::new();
        for repo in repos {
            let url = format!("{}/repos/{}/contents/", self.base_url, repo.full_name);
            let contents: Vec<ContentRow> = match self.get_json(&url).await {
                Ok(contents) => contents,
                // An unreadable repo (empty, private contents) is skipped,
                // not fatal to the listing.
                Err(CatalogError::Network(e)) => {
                    debug!(repo = %repo.full_name, error = %e, "skipping unreadable repo");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if contents.iter().any(|c| is_container_build_file(&c.name)) {
                apps.push(AppDescriptor {
                    name: repo.name,
                    description: repo.description,
                    repository: repo.clone_url,
                    language: repo.language,
                    stars: repo.stargazers_count,
                });
            }
        }

        apps.sort_by(|a, b| b.stars.cmp(&a.stars));
        Ok(apps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_container_build_files() {
        assert!(is_container_build_file("Dockerfile"));
        assert!(is_container_build_file("dockerfile"));
        assert!(is_container_build_file("docker-compose.yml"));
        assert!(is_container_build_file("compose.yaml"));
        assert!(!is_container_build_file("Makefile"));
        assert!(!is_container_build_file("Dockerfile.dev"));
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED),
            CatalogError::Auth
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            CatalogError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            CatalogError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            CatalogError::Network(_)
        ));
    }

    #[test]
    fn repo_rows_deserialize_from_api_shape() {
        let json = r#"{
            "name": "chatbot",
            "full_name": "u/chatbot",
            "description": "a bot",
            "language": "Python",
            "stargazers_count": 7,
            "clone_url": "https://github.com/u/chatbot.git",
            "extra_field_ignored": true
        }"#;
        let row: RepoRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.name, "chatbot");
        assert_eq!(row.stargazers_count, 7);
    }
}
