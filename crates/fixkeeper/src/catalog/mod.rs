//! Release catalog client
//!
//! Lists the fix projects published by one owner on a Gitea-compatible forge
//! and resolves the latest tagged release of a project. Wire records are
//! validated here and turned into fixed-shape [`FixProject`] and [`Release`]
//! values; nothing downstream sees raw JSON.

pub mod title;

pub use title::{derive_display_title, is_fix_project};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::FixKeeperConfig;
use crate::error::{FixError, Result};
use crate::http::HttpClient;

/// Archive extension installable by this ecosystem
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Upper bound on listing pages, in case a server ignores `page`
const MAX_PAGES: u32 = 500;

/// A fix project available in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct FixProject {
    /// Repository name, unique within the owner
    pub id: String,
    pub display_title: String,
    pub description: String,
    pub last_updated: DateTime<Utc>,
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
}

/// A tagged release of a fix project
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub tag: String,
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// First asset that is an installable archive
    pub fn archive_asset(&self) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name.ends_with(ARCHIVE_EXTENSION))
    }

    /// A release without an archive asset has nothing to install
    pub fn is_usable(&self) -> bool {
        self.archive_asset().is_some()
    }
}

/// Result of asking for a project's latest release
#[derive(Debug, Clone, PartialEq)]
pub enum LatestRelease {
    Found(Release),
    /// The project has no releases; a normal outcome, not an error
    NotFound,
}

/// Ordering for project listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Case-insensitive by display title
    #[default]
    Alphabetical,
    /// Most recently updated first
    LastUpdated,
}

/// Sort projects in place
pub fn sort_projects(projects: &mut [FixProject], order: SortOrder) {
    match order {
        SortOrder::Alphabetical => {
            projects.sort_by_cached_key(|p| p.display_title.to_lowercase());
        }
        SortOrder::LastUpdated => {
            projects.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        }
    }
}

/// Source of fix projects and their releases
#[async_trait]
pub trait ReleaseCatalog: Send + Sync {
    /// Every fix project, across all listing pages
    async fn list_projects(&self) -> Result<Vec<FixProject>>;

    /// Latest release of one project
    async fn latest_release(&self, project_id: &str) -> Result<LatestRelease>;
}

/// Repository entry as returned by the listing endpoint
#[derive(Debug, Deserialize)]
struct RepoRecord {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

/// Release as returned by the latest-release endpoint
#[derive(Debug, Deserialize)]
struct ReleaseRecord {
    tag_name: String,
    #[serde(default)]
    assets: Vec<AssetRecord>,
}

#[derive(Debug, Deserialize)]
struct AssetRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    browser_download_url: Option<String>,
}

impl RepoRecord {
    fn into_project(self) -> FixProject {
        let description = self.description.unwrap_or_default();
        let last_updated = self
            .updated_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        FixProject {
            display_title: derive_display_title(&self.name, &description),
            id: self.name,
            description,
            last_updated,
        }
    }
}

impl ReleaseRecord {
    fn into_release(self) -> Release {
        let assets = self
            .assets
            .into_iter()
            .filter_map(|a| match (a.name, a.browser_download_url) {
                (Some(name), Some(download_url)) => Some(ReleaseAsset { name, download_url }),
                _ => None,
            })
            .collect();

        Release { tag: self.tag_name, assets }
    }
}

/// Catalog backed by the forge's REST API
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    http: HttpClient,
    config: FixKeeperConfig,
}

impl HttpCatalog {
    pub fn new(config: &FixKeeperConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::from_config(config)?,
            config: config.clone(),
        })
    }

    pub fn with_client(http: HttpClient, config: &FixKeeperConfig) -> Self {
        Self { http, config: config.clone() }
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<RepoRecord>> {
        let url = self.config.repos_url();
        debug!("Fetching repository page {} from {}", page, url);

        let response = self
            .http
            .client()
            .get(&url)
            .query(&[("page", page)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FixError::catalog(&url, e))?;

        response
            .json::<Vec<RepoRecord>>()
            .await
            .map_err(|e| FixError::catalog(&url, e))
    }
}

#[async_trait]
impl ReleaseCatalog for HttpCatalog {
    async fn list_projects(&self) -> Result<Vec<FixProject>> {
        async move {
            let mut projects = Vec::new();

            for page in 1..=MAX_PAGES {
                let records = self.fetch_page(page).await?;
                if records.is_empty() {
                    break;
                }
                if page == MAX_PAGES {
                    warn!("Stopped listing after {} pages", MAX_PAGES);
                }

                projects.extend(
                    records
                        .into_iter()
                        .filter(|r| is_fix_project(&r.name))
                        .map(RepoRecord::into_project),
                );
            }

            info!("Found {} fix projects", projects.len());
            Ok(projects)
        }
        .instrument(info_span!("list_projects", owner = %self.config.owner))
        .await
    }

    async fn latest_release(&self, project_id: &str) -> Result<LatestRelease> {
        let url = self.config.latest_release_url(project_id);

        async move {
            let response = self
                .http
                .client()
                .get(&url)
                .send()
                .await
                .map_err(|e| FixError::catalog(&url, e))?;

            if response.status() == StatusCode::NOT_FOUND {
                debug!("No releases published");
                return Ok(LatestRelease::NotFound);
            }

            let record = response
                .error_for_status()
                .map_err(|e| FixError::catalog(&url, e))?
                .json::<ReleaseRecord>()
                .await
                .map_err(|e| FixError::catalog(&url, e))?;

            let release = record.into_release();
            debug!("Latest release is {} with {} assets", release.tag, release.assets.len());
            Ok(LatestRelease::Found(release))
        }
        .instrument(info_span!("latest_release", project = %project_id))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog_for(server: &MockServer) -> HttpCatalog {
        let config = FixKeeperConfig::builder()
            .api_base(format!("{}/api/v1", server.uri()))
            .owner("Lyall")
            .build();
        HttpCatalog::new(&config).unwrap()
    }

    async fn mount_page(server: &MockServer, page: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/v1/users/Lyall/repos"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_list_projects_walks_pages_and_filters() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "1",
            json!([
                {"name": "SuperGameFix", "description": "A fix for Super Game that adds ultrawide support.", "updated_at": "2024-05-01T10:00:00Z"},
                {"name": "dotfiles", "description": "my config", "updated_at": "2024-05-02T10:00:00Z"}
            ]),
        )
        .await;
        mount_page(
            &server,
            "2",
            json!([
                {"name": "OtherGameTweak", "description": null}
            ]),
        )
        .await;
        mount_page(&server, "3", json!([])).await;

        let projects = catalog_for(&server).list_projects().await.unwrap();

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].id, "SuperGameFix");
        assert_eq!(projects[0].display_title, "Super Game");
        assert_eq!(projects[0].last_updated.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(projects[1].id, "OtherGameTweak");
        assert_eq!(projects[1].display_title, "OtherGame");
        assert_eq!(projects[1].description, "");
        assert_eq!(projects[1].last_updated, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_list_projects_server_error_is_catalog_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let error = catalog_for(&server).list_projects().await.unwrap_err();
        assert_eq!(error.category(), "catalog_unavailable");
    }

    #[tokio::test]
    async fn test_latest_release_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/Lyall/SuperGameFix/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "v1.2.0",
                "assets": [
                    {"name": "README.txt", "browser_download_url": "https://example.invalid/README.txt"},
                    {"name": "SuperGameFix_v1.2.0.zip", "browser_download_url": "https://example.invalid/fix.zip"},
                    {"name": "broken"}
                ]
            })))
            .mount(&server)
            .await;

        let release = match catalog_for(&server).latest_release("SuperGameFix").await.unwrap() {
            LatestRelease::Found(release) => release,
            LatestRelease::NotFound => panic!("Expected a release"),
        };

        assert_eq!(release.tag, "v1.2.0");
        assert_eq!(release.assets.len(), 2);
        assert_eq!(release.archive_asset().unwrap().download_url, "https://example.invalid/fix.zip");
    }

    #[tokio::test]
    async fn test_latest_release_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = catalog_for(&server).latest_release("NoReleasesFix").await.unwrap();
        assert_eq!(result, LatestRelease::NotFound);
    }

    #[tokio::test]
    async fn test_latest_release_malformed_body_is_catalog_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"assets": []})))
            .mount(&server)
            .await;

        match catalog_for(&server).latest_release("GameFix").await {
            Err(FixError::CatalogUnavailable { url, .. }) => {
                assert!(url.ends_with("/repos/Lyall/GameFix/releases/latest"));
            }
            other => panic!("Expected CatalogUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_release_without_zip_is_unusable() {
        let release = Release {
            tag: "v1".to_string(),
            assets: vec![ReleaseAsset {
                name: "fix.7z".to_string(),
                download_url: "https://example.invalid/fix.7z".to_string(),
            }],
        };
        assert!(!release.is_usable());
    }

    #[test]
    fn test_sort_projects() {
        let project = |id: &str, title: &str, ts: i64| FixProject {
            id: id.to_string(),
            display_title: title.to_string(),
            description: String::new(),
            last_updated: DateTime::<Utc>::from_timestamp(ts, 0).unwrap(),
        };
        let mut projects = vec![
            project("BFix", "beta", 100),
            project("AFix", "Alpha", 50),
            project("CFix", "charlie", 300),
        ];

        sort_projects(&mut projects, SortOrder::Alphabetical);
        let ids: Vec<_> = projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["AFix", "BFix", "CFix"]);

        sort_projects(&mut projects, SortOrder::LastUpdated);
        let ids: Vec<_> = projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["CFix", "BFix", "AFix"]);
    }
}
