//! crates.io sparse index registry backend.

use crate::backends::Registry;
use crate::error::BackendError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Public sparse index of crates.io
pub const DEFAULT_SPARSE_INDEX: &str = "https://index.crates.io";

/// One line of a sparse index file
#[derive(Debug, Deserialize)]
struct IndexEntry {
    vers: String,
    cksum: String,
    #[serde(default)]
    yanked: bool,
}

/// Registry backed by a cargo sparse index
#[derive(Debug, Clone)]
pub struct SparseIndexRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl SparseIndexRegistry {
    /// Query the index rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .user_agent(concat!("releasekit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::Http {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { base_url, client })
    }

    /// Query crates.io
    pub fn crates_io() -> Result<Self, BackendError> {
        Self::new(DEFAULT_SPARSE_INDEX)
    }

    fn entry_url(&self, name: &str) -> Result<String, BackendError> {
        Ok(format!("{}/{}", self.base_url, index_path(name)?))
    }

    /// Fetch every non-yanked entry published for `name`
    async fn entries(&self, name: &str) -> Result<Vec<IndexEntry>, BackendError> {
        let url = self.entry_url(name)?;
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| BackendError::Http {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(BackendError::Transient {
                reason: format!("{} answered {}", url, status),
            });
        }
        if !status.is_success() {
            return Err(BackendError::UnexpectedResponse {
                service: "sparse index".to_string(),
                reason: format!("{} answered {}", url, status),
            });
        }

        let body = response.text().await.map_err(|e| BackendError::Http {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        parse_index(&body)
    }
}

#[async_trait]
impl Registry for SparseIndexRegistry {
    async fn is_available(&self, name: &str, version: &str) -> Result<bool, BackendError> {
        let entries = self.entries(name).await?;
        Ok(entries.iter().any(|e| e.vers == version))
    }

    async fn checksums(&self, name: &str, version: &str) -> Result<BTreeMap<String, String>, BackendError> {
        let entries = self.entries(name).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.vers == version)
            .map(|e| (format!("{}-{}.crate", name, version), e.cksum))
            .collect())
    }
}

/// Path of a crate's file inside a sparse index
///
/// Registry names are ASCII, so the prefix slices below are on char boundaries.
fn index_path(name: &str) -> Result<String, BackendError> {
    if name.is_empty() || !name.is_ascii() {
        return Err(BackendError::InvalidName { name: name.to_string() });
    }
    let name = name.to_ascii_lowercase();
    Ok(match name.len() {
        1 => format!("1/{}", name),
        2 => format!("2/{}", name),
        3 => format!("3/{}/{}", &name[..1], name),
        _ => format!("{}/{}/{}", &name[..2], &name[2..4], name),
    })
}

fn parse_index(body: &str) -> Result<Vec<IndexEntry>, BackendError> {
    let mut entries = Vec::new();
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let entry: IndexEntry = serde_json::from_str(line).map_err(|e| BackendError::UnexpectedResponse {
            service: "sparse index".to_string(),
            reason: format!("malformed index line: {}", e),
        })?;
        if !entry.yanked {
            entries.push(entry);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_paths_follow_cargo_layout() {
        assert_eq!(index_path("a").expect("path"), "1/a");
        assert_eq!(index_path("ab").expect("path"), "2/ab");
        assert_eq!(index_path("abc").expect("path"), "3/a/abc");
        assert_eq!(index_path("Serde_Json").expect("path"), "se/rd/serde_json");
    }

    #[test]
    fn non_ascii_names_are_rejected() {
        for name in ["", "é", "ñame", "crate-日本"] {
            match index_path(name) {
                Err(BackendError::InvalidName { name: reported }) => assert_eq!(reported, name),
                other => panic!("expected InvalidName for {:?}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn yanked_versions_are_ignored() {
        let body = concat!(
            r#"{"name":"core","vers":"0.1.0","cksum":"aa","yanked":false}"#,
            "\n",
            r#"{"name":"core","vers":"0.2.0","cksum":"bb","yanked":true}"#,
            "\n"
        );
        let entries = parse_index(body).expect("parse");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].vers, "0.1.0");
        assert_eq!(entries[0].cksum, "aa");
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_index("not json").is_err());
    }
}
