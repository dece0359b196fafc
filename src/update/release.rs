//! Release metadata and where it comes from.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::update::{RepoId, UpdateError};

pub const GITHUB_API: &str = "https://api.github.com";
pub const USER_AGENT: &str = "VirtualDisplayDriverControl";

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub download_url: String,
}

/// The parts of a published release the settings page cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub tag: String,
    pub html_url: String,
    pub assets: Vec<Asset>,
}

/// Something that can tell us about the newest published release of a repository.
///
/// Implementations are allowed to block, callers run them off the async executor.
pub trait ReleaseSource: Send + Sync + 'static {
    fn latest_release(&self, repo: &RepoId) -> Result<ReleaseInfo, UpdateError>;
}

/// Github release payload. Does not contain all fields.
///
/// See the github [docs](https://docs.github.com/en/rest/releases/releases#get-the-latest-release)
#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    html_url: String,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

impl From<GithubRelease> for ReleaseInfo {
    fn from(release: GithubRelease) -> Self {
        Self {
            tag: release.tag_name,
            html_url: release.html_url,
            assets: release
                .assets
                .into_iter()
                .map(|a| Asset {
                    name: a.name,
                    download_url: a.browser_download_url,
                })
                .collect(),
        }
    }
}

/// Fetches `GET /repos/{owner}/{repo}/releases/latest` from the GitHub REST API.
pub struct GithubReleaseSource {
    agent: ureq::Agent,
    api_base: String,
}

impl GithubReleaseSource {
    /// `timeout` of `None` leaves the transport defaults in place.
    pub fn new(api_base: impl Into<String>, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Self {
            agent: builder.build(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn latest_url(&self, repo: &RepoId) -> String {
        format!("{}/repos/{}/{}/releases/latest", self.api_base, repo.owner, repo.name)
    }
}

impl ReleaseSource for GithubReleaseSource {
    #[instrument(skip_all, fields(repo = %repo))]
    fn latest_release(&self, repo: &RepoId) -> Result<ReleaseInfo, UpdateError> {
        let url = self.latest_url(repo);
        debug!(%url, "fetching latest release");

        let response = match self.agent.get(&url).set("Accept", "application/vnd.github+json").call() {
            Ok(response) => response,
            // github answers 404 when a repository has no non-draft releases
            Err(ureq::Error::Status(404, _)) => return Err(UpdateError::NoReleases(repo.clone())),
            Err(e) => return Err(UpdateError::Http(Box::new(e))),
        };

        let release: GithubRelease = response.into_json()?;
        debug!(tag = %release.tag_name, assets = release.assets.len(), "received release");

        Ok(release.into())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    use super::*;

    const RELEASE_JSON: &str = r#"{
        "url": "https://api.github.com/repos/MolotovCherry/virtual-display-rs/releases/1",
        "html_url": "https://github.com/MolotovCherry/virtual-display-rs/releases/tag/v0.3.1",
        "tag_name": "v0.3.1",
        "name": "v0.3.1",
        "draft": false,
        "assets": [
            {
                "name": "virtual-desktop-driver-installer-x64.msi",
                "size": 1024,
                "browser_download_url": "https://github.com/MolotovCherry/virtual-display-rs/releases/download/v0.3.1/installer.msi"
            },
            {
                "name": "driver.zip",
                "browser_download_url": "https://github.com/MolotovCherry/virtual-display-rs/releases/download/v0.3.1/driver.zip"
            }
        ]
    }"#;

    /// Serves a single canned HTTP response and hands back the request head.
    fn serve_once(status: &str, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }
            tx.send(head).unwrap();

            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
        });

        (format!("http://{addr}"), rx)
    }

    #[test]
    fn decodes_github_payload() {
        let release: ReleaseInfo = serde_json::from_str::<GithubRelease>(RELEASE_JSON).unwrap().into();

        assert_eq!(release.tag, "v0.3.1");
        assert_eq!(
            release.html_url,
            "https://github.com/MolotovCherry/virtual-display-rs/releases/tag/v0.3.1"
        );
        assert_eq!(release.assets.len(), 2);
        assert_eq!(release.assets[1].name, "driver.zip");
        assert!(release.assets[1].download_url.ends_with("/driver.zip"));
    }

    #[test]
    fn missing_assets_decode_as_empty() {
        let json = r#"{"tag_name": "v1.0.0", "html_url": "https://example.invalid/r"}"#;
        let release: ReleaseInfo = serde_json::from_str::<GithubRelease>(json).unwrap().into();
        assert!(release.assets.is_empty());
    }

    #[test]
    fn fetches_latest_release() {
        let (base, requests) = serve_once("200 OK", RELEASE_JSON);
        let source = GithubReleaseSource::new(base, Some(Duration::from_secs(5)));

        let release = source.latest_release(&RepoId::default()).unwrap();
        assert_eq!(release.tag, "v0.3.1");

        let head = requests.recv().unwrap();
        assert!(head.starts_with("GET /repos/MolotovCherry/virtual-display-rs/releases/latest "));
        assert!(head.to_ascii_lowercase().contains("user-agent: virtualdisplaydrivercontrol"));
    }

    #[test]
    fn not_found_means_no_releases() {
        let (base, _requests) = serve_once("404 Not Found", r#"{"message": "Not Found"}"#);
        let source = GithubReleaseSource::new(base, Some(Duration::from_secs(5)));

        let err = source.latest_release(&RepoId::new("someone", "nothing")).unwrap_err();
        assert!(matches!(err, UpdateError::NoReleases(repo) if repo.name == "nothing"));
    }

    #[test]
    fn server_errors_are_http_errors() {
        let (base, _requests) = serve_once("500 Internal Server Error", "{}");
        let source = GithubReleaseSource::new(base, Some(Duration::from_secs(5)));

        assert!(matches!(
            source.latest_release(&RepoId::default()),
            Err(UpdateError::Http(_))
        ));
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let (base, _requests) = serve_once("200 OK", r#"{"tag_name": 5}"#);
        let source = GithubReleaseSource::new(base, Some(Duration::from_secs(5)));

        assert!(matches!(
            source.latest_release(&RepoId::default()),
            Err(UpdateError::Decode(_))
        ));
    }

    #[test]
    fn trailing_slash_in_api_base_is_ignored() {
        let source = GithubReleaseSource::new("https://ghe.example.invalid/api/v3/", None);
        assert_eq!(
            source.latest_url(&RepoId::default()),
            "https://ghe.example.invalid/api/v3/repos/MolotovCherry/virtual-display-rs/releases/latest"
        );
    }
}
