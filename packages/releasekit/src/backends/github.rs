//! GitHub releases backend using the REST API.

use crate::backends::{Forge, ReleaseRequest};
use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Public GitHub REST endpoint
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Serialize)]
struct CreateReleaseBody<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    html_url: String,
    #[serde(default)]
    upload_url: String,
}

/// Entry of the release listing; unlike get-by-tag, the listing includes drafts
#[derive(Debug, Clone, Deserialize)]
struct ReleaseSummary {
    id: u64,
    tag_name: String,
    #[serde(default)]
    draft: bool,
}

/// Releases per listing page (GitHub's maximum)
const PAGE_SIZE: usize = 100;

/// Listing pages read before giving up on a tag
const MAX_PAGES: usize = 20;

/// Ids of every release attached to `tag`, drafts included
fn releases_for_tag(releases: &[ReleaseSummary], tag: &str) -> Vec<u64> {
    releases.iter().filter(|r| r.tag_name == tag).map(|r| r.id).collect()
}

/// Forge backed by GitHub releases
#[derive(Debug, Clone)]
pub struct GitHubForge {
    api_base: String,
    owner: String,
    repo: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl GitHubForge {
    /// Forge for `owner/name`, reading the token from `GITHUB_TOKEN`
    pub fn new(repository: &str) -> Result<Self, BackendError> {
        Self::with_token(repository, std::env::var("GITHUB_TOKEN").ok())
    }

    /// Forge for `owner/name` with an explicit token
    pub fn with_token(repository: &str, token: Option<String>) -> Result<Self, BackendError> {
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
            .ok_or_else(|| BackendError::UnexpectedResponse {
                service: "github".to_string(),
                reason: format!("repository must be 'owner/name', got '{}'", repository),
            })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("releasekit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| BackendError::Http {
                url: DEFAULT_API_BASE.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            api_base: DEFAULT_API_BASE.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    /// Point at a GitHub Enterprise API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn releases_url(&self) -> String {
        format!("{}/repos/{}/{}/releases", self.api_base, self.owner, self.repo)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response, BackendError> {
        let response = builder.send().await.map_err(|e| BackendError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(BackendError::Transient {
                reason: format!("{} answered {}: {}", url, status, body),
            });
        }
        Err(BackendError::UnexpectedResponse {
            service: "github".to_string(),
            reason: format!("{} answered {}: {}", url, status, body),
        })
    }

    /// Ids of releases for `tag`, walking the paginated listing
    async fn find_releases(&self, tag: &str) -> Result<Vec<u64>, BackendError> {
        for page in 1..=MAX_PAGES {
            let url = format!("{}?per_page={}&page={}", self.releases_url(), PAGE_SIZE, page);
            let response = self.send(self.request(reqwest::Method::GET, &url), &url).await?;
            let releases: Vec<ReleaseSummary> =
                response.json().await.map_err(|e| BackendError::UnexpectedResponse {
                    service: "github".to_string(),
                    reason: format!("unreadable release listing: {}", e),
                })?;

            let ids = releases_for_tag(&releases, tag);
            if !ids.is_empty() {
                let drafts = releases.iter().filter(|r| r.tag_name == tag && r.draft).count();
                log::debug!("found {} release(s) at {} ({} draft)", ids.len(), tag, drafts);
                return Ok(ids);
            }
            if releases.len() < PAGE_SIZE {
                break;
            }
        }
        Ok(Vec::new())
    }

    async fn upload_asset(&self, upload_url: &str, asset: &Path) -> Result<(), BackendError> {
        let file_name = asset
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".to_string());
        let bytes = tokio::fs::read(asset).await.map_err(|e| BackendError::CommandFailed {
            command: format!("read {}", asset.display()),
            reason: e.to_string(),
        })?;

        // upload_url is an RFC 6570 template: ".../assets{?name,label}"
        let base = upload_url.split('{').next().unwrap_or(upload_url);
        let url = format!("{}?name={}", base, file_name);
        log::debug!("uploading {} to {}", asset.display(), base);

        let builder = self
            .request(reqwest::Method::POST, &url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes);
        self.send(builder, &url).await?;
        Ok(())
    }
}

#[async_trait]
impl Forge for GitHubForge {
    async fn is_available(&self) -> bool {
        self.token.is_some()
    }

    async fn create_release(&self, request: &ReleaseRequest, dry_run: bool) -> Result<String, BackendError> {
        if dry_run {
            log::info!(
                "[dry-run] would create {} release '{}' at {} with {} asset(s)",
                if request.draft { "draft" } else { "published" },
                request.title,
                request.tag,
                request.assets.len()
            );
            return Ok(format!(
                "https://github.com/{}/{}/releases/tag/{}",
                self.owner, self.repo, request.tag
            ));
        }

        let url = self.releases_url();
        let payload = CreateReleaseBody {
            tag_name: &request.tag,
            name: &request.title,
            body: &request.body,
            draft: request.draft,
            prerelease: request.prerelease,
        };
        let response = self
            .send(self.request(reqwest::Method::POST, &url).json(&payload), &url)
            .await?;
        let release: ReleaseResponse = response.json().await.map_err(|e| BackendError::UnexpectedResponse {
            service: "github".to_string(),
            reason: format!("unreadable release response: {}", e),
        })?;
        log::info!("created release {} (id {})", release.html_url, release.id);

        for asset in &request.assets {
            self.upload_asset(&release.upload_url, asset).await?;
        }

        Ok(release.html_url)
    }

    async fn delete_release(&self, tag: &str, dry_run: bool) -> Result<(), BackendError> {
        if dry_run {
            log::info!("[dry-run] would delete release at {}", tag);
            return Ok(());
        }

        let ids = self.find_releases(tag).await?;
        if ids.is_empty() {
            return Err(BackendError::UnexpectedResponse {
                service: "github".to_string(),
                reason: format!("no release found for tag {}", tag),
            });
        }

        for id in ids {
            let url = format!("{}/{}", self.releases_url(), id);
            self.send(self.request(reqwest::Method::DELETE, &url), &url).await?;
            log::info!("deleted release {} at {}", id, tag);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn availability_follows_token() {
        let with = GitHubForge::with_token("acme/widgets", Some("t0k".to_string())).expect("forge");
        let without = GitHubForge::with_token("acme/widgets", Some("  ".to_string())).expect("forge");
        assert!(with.is_available().await);
        assert!(!without.is_available().await);
    }

    #[test]
    fn repository_must_be_owner_slash_name() {
        assert!(GitHubForge::with_token("widgets", None).is_err());
        assert!(GitHubForge::with_token("a/b/c", None).is_err());
        let forge = GitHubForge::with_token("acme/widgets", None)
            .expect("forge")
            .with_api_base("https://ghe.example.com/api/v3/");
        assert_eq!(
            forge.releases_url(),
            "https://ghe.example.com/api/v3/repos/acme/widgets/releases"
        );
    }

    #[test]
    fn draft_releases_are_found_by_tag_name() {
        let listing: Vec<ReleaseSummary> = serde_json::from_str(
            r#"[
                {"id": 11, "tag_name": "v0.1.0", "draft": false, "html_url": "https://x/1"},
                {"id": 12, "tag_name": "v0.2.0", "draft": true},
                {"id": 13, "tag_name": "core-v0.2.0"}
            ]"#,
        )
        .expect("listing");

        assert_eq!(releases_for_tag(&listing, "v0.2.0"), vec![12]);
        assert_eq!(releases_for_tag(&listing, "core-v0.2.0"), vec![13]);
        assert!(releases_for_tag(&listing, "v0.3.0").is_empty());
        assert!(listing[1].draft);
    }

    #[tokio::test]
    async fn dry_run_release_returns_synthetic_url() {
        let forge = GitHubForge::with_token("acme/widgets", None).expect("forge");
        let request = ReleaseRequest {
            tag: "v0.2.0".to_string(),
            title: "v0.2.0".to_string(),
            body: String::new(),
            draft: true,
            prerelease: false,
            assets: Vec::new(),
        };
        let url = forge.create_release(&request, true).await.expect("dry run");
        assert_eq!(url, "https://github.com/acme/widgets/releases/tag/v0.2.0");
    }
}
