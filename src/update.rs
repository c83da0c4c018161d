//! Update check against a remote JSON feed.
//!
//! The feed is a JSON object `{latestVersion, message, downloadUrl}`. Any
//! failure along the way (network, timeout, HTTP status, malformed JSON or
//! version) is logged and reported as "no update available"; the caller
//! never sees an error.

use crate::error::{ToolkitError, ToolkitResult};
use crate::operations::OperationResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request deadline used when the caller does not give one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A dotted numeric release, optionally prefixed with `v`, followed by an
/// optional prerelease tag and an optional `+local` label.
///
/// The tag is either `-anything` or a PEP 440 style marker glued to the
/// release (`2.1.0rc1`, `1.0.b2`, `3.0alpha`). Missing trailing components
/// compare as zero (`1.2 == 1.2.0`), a prerelease sorts below its release
/// (`1.2.0-beta < 1.2.0`) and the local label is ignored when comparing.
#[derive(Debug, Clone)]
pub struct AppVersion {
    release: Vec<u64>,
    prerelease: Option<String>,
    pre_key: Vec<PreIdentifier>,
    local: Option<String>,
}

/// One comparable piece of a prerelease tag.
///
/// Numbers sort numerically and below words, so `rc9 < rc10` and
/// `beta.2 < beta.x`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum PreIdentifier {
    Numeric(u64),
    Alpha(String),
}

impl PreIdentifier {
    fn from_run(run: &str, numeric: bool) -> Self {
        if numeric {
            if let Ok(n) = run.parse() {
                return Self::Numeric(n);
            }
        }
        // Spellings of the same phase compare equal.
        let word = match run {
            "alpha" => "a",
            "beta" => "b",
            "c" | "pre" | "preview" => "rc",
            other => other,
        };
        Self::Alpha(word.to_string())
    }
}

/// Splits a tag on separators and on digit/letter boundaries.
fn prerelease_key(tag: &str) -> Vec<PreIdentifier> {
    let tag = tag.to_ascii_lowercase();
    let mut key = Vec::new();
    for part in tag.split(['.', '-', '_']) {
        let mut rest = part;
        while let Some(first) = rest.chars().next() {
            let numeric = first.is_ascii_digit();
            let end = rest
                .find(|c: char| c.is_ascii_digit() != numeric)
                .unwrap_or(rest.len());
            let (run, tail) = rest.split_at(end);
            key.push(PreIdentifier::from_run(run, numeric));
            rest = tail;
        }
    }
    key
}

impl AppVersion {
    fn pattern() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(concat!(
                r"^[vV]?(\d+(?:\.\d+)*)",
                r"(?:-([0-9A-Za-z][0-9A-Za-z.-]*)",
                r"|[._]?((?i:alpha|beta|preview|pre|rc|a|b|c)[._-]?\d*))?",
                r"(?:\+([0-9A-Za-z][0-9A-Za-z.]*))?$",
            ))
            .expect("Valid version regex")
        });
        &PATTERN
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    fn component(&self, i: usize) -> u64 {
        self.release.get(i).copied().unwrap_or(0)
    }
}

impl FromStr for AppVersion {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = Self::pattern()
            .captures(s.trim())
            .ok_or_else(|| ToolkitError::invalid_format(s, "not a dotted version number"))?;

        let release = caps[1]
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|e| ToolkitError::invalid_format(s, e.to_string()))
            })
            .collect::<ToolkitResult<Vec<_>>>()?;

        let prerelease = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string());
        Ok(Self {
            release,
            pre_key: prerelease.as_deref().map(prerelease_key).unwrap_or_default(),
            prerelease,
            local: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.release.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{}", local)?;
        }
        Ok(())
    }
}

impl Ord for AppVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.release.len().max(other.release.len());
        (0..width)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| match (self.is_prerelease(), other.is_prerelease()) {
                (false, false) => Ordering::Equal,
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                (true, true) => self.pre_key.cmp(&other.pre_key),
            })
    }
}

impl PartialOrd for AppVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for AppVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AppVersion {}

/// Body of the update feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateFeed {
    latest_version: Option<String>,
    message: Option<String>,
    download_url: Option<String>,
}

/// Outcome of an update check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub is_new_version: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl UpdateStatus {
    pub fn none() -> Self {
        Self::default()
    }

    /// Converts the status into the uniform operation result.
    pub fn into_result(self) -> OperationResult {
        let message = match (&self.message, self.is_new_version) {
            (Some(message), true) => message.clone(),
            (None, true) => "A new version is available".to_string(),
            (_, false) => "No update available".to_string(),
        };

        let mut result = OperationResult::ok(message).with("isNewVersion", self.is_new_version);
        if let Some(latest) = self.latest_version {
            result = result.with("latestVersion", latest);
        }
        if let Some(url) = self.download_url {
            result = result.with("downloadUrl", url);
        }
        result
    }
}

/// Fetches the feed and compares versions.
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    timeout: Duration,
}

impl Default for UpdateChecker {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl UpdateChecker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks `url` for a release newer than `current_version`.
    pub fn check(&self, url: &str, current_version: &str) -> UpdateStatus {
        if url.trim().is_empty() || current_version.trim().is_empty() {
            debug!("update check skipped: missing url or version");
            return UpdateStatus::none();
        }

        match self.evaluate(url, current_version) {
            Ok(status) => status,
            Err(e) => {
                warn!(url, error = %e, "update check failed");
                UpdateStatus::none()
            }
        }
    }

    fn evaluate(&self, url: &str, current_version: &str) -> ToolkitResult<UpdateStatus> {
        let feed = self.fetch(url)?;
        let Some(latest_raw) = feed.latest_version.filter(|v| !v.trim().is_empty()) else {
            debug!(url, "feed has no latestVersion");
            return Ok(UpdateStatus::none());
        };

        let latest: AppVersion = latest_raw.parse()?;
        let current: AppVersion = current_version.parse()?;
        if latest <= current {
            return Ok(UpdateStatus::none());
        }

        info!(current = %current, latest = %latest, "new version available");
        Ok(UpdateStatus {
            is_new_version: true,
            latest_version: Some(latest_raw),
            message: feed.message,
            download_url: feed.download_url,
        })
    }

    fn fetch(&self, url: &str) -> ToolkitResult<UpdateFeed> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("pdf-toolkit/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.request_error(url, e))?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| self.request_error(url, e))?;

        if !response.status().is_success() {
            return Err(ToolkitError::NetworkFailure {
                url: url.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let body = response.text().map_err(|e| self.request_error(url, e))?;
        serde_json::from_str(&body).map_err(|e| ToolkitError::invalid_format(url, e.to_string()))
    }

    fn request_error(&self, url: &str, err: reqwest::Error) -> ToolkitError {
        if err.is_timeout() {
            ToolkitError::Timeout {
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            ToolkitError::NetworkFailure {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Resolves the running application's version.
///
/// Sources are tried in order: an explicit value, the `APP_VERSION`
/// environment value, the `version` field of a JSON manifest, and finally
/// this crate's own version.
#[derive(Debug, Clone, Default)]
pub struct UpdateConfig {
    pub explicit: Option<String>,
    pub env_version: Option<String>,
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    version: Option<String>,
}

impl UpdateConfig {
    /// Reads `APP_VERSION` from the process environment.
    pub fn from_env(explicit: Option<String>, manifest: Option<PathBuf>) -> Self {
        Self {
            explicit,
            env_version: std::env::var("APP_VERSION").ok(),
            manifest,
        }
    }

    pub fn current_version(&self) -> String {
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());

        non_blank(&self.explicit)
            .or_else(|| non_blank(&self.env_version))
            .or_else(|| self.manifest.as_deref().and_then(read_manifest_version))
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }
}

fn read_manifest_version(path: &Path) -> Option<String> {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| ToolkitError::io(path, e))
        .and_then(|text| serde_json::from_str::<Manifest>(&text).map_err(ToolkitError::from));

    match parsed {
        Ok(manifest) => manifest.version.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read version manifest");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn version(s: &str) -> AppVersion {
        s.parse().unwrap()
    }

    /// Serves one HTTP response on a local port and returns its URL.
    fn serve_once(status: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}/feed.json", addr)
    }

    #[test]
    fn test_version_ordering() {
        assert!(version("1.10.0") > version("1.9.9"));
        assert!(version("v2.0") > version("1.99"));
        assert_eq!(version("1.2"), version("1.2.0"));
        assert!(version("1.2.0-beta") < version("1.2.0"));
        assert!(version("1.2.0-alpha") < version("1.2.0-beta"));
        assert_eq!(version("v1.2.3-rc1").to_string(), "1.2.3-rc1");
    }

    #[test]
    fn test_glued_prerelease_tags() {
        assert!(version("2.1.0rc1") < version("2.1.0"));
        assert!(version("2.1.0rc1") > version("2.0.9"));
        assert!(version("1.0a1") < version("1.0b1"));
        assert!(version("1.0.beta2") < version("1.0rc1"));
        assert_eq!(version("3.0alpha"), version("3.0-a"));
        assert_eq!(version("2.1.0rc1"), version("2.1.0-rc.1"));
        assert_eq!(version("2.1.0RC1").to_string(), "2.1.0-RC1");
    }

    #[test]
    fn test_prerelease_numbers_compare_numerically() {
        assert!(version("2.0.0rc10") > version("2.0.0rc9"));
        assert!(version("1.0.0-beta.11") > version("1.0.0-beta.2"));
        assert!(version("1.0.0-beta.2") < version("1.0.0-beta.x"));
        assert!(version("1.0.0-alpha") < version("1.0.0-alpha.1"));
    }

    #[test]
    fn test_local_label_ignored_in_comparison() {
        let local = version("1.0+build.7");
        assert_eq!(local, version("1.0"));
        assert_eq!(local.local(), Some("build.7"));
        assert_eq!(local.to_string(), "1.0+build.7");
        assert!(version("1.0rc2+abc") < version("1.0"));
    }

    #[test]
    fn test_version_rejects_garbage() {
        for bad in ["", "latest", "1..2", "1.2.x", "-1.0", "1.0+", "1.0.post1", "2.1.0rc1x"] {
            assert!(bad.parse::<AppVersion>().is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_unreachable_url_reports_no_update() {
        let checker = UpdateChecker::new(Duration::from_secs(1));
        let status = checker.check("http://127.0.0.1:9/feed.json", "1.0.0");
        assert_eq!(status, UpdateStatus::none());
    }

    #[test]
    fn test_empty_inputs_report_no_update() {
        let checker = UpdateChecker::default();
        assert!(!checker.check("", "1.0.0").is_new_version);
        assert!(!checker.check("http://127.0.0.1:9/", " ").is_new_version);
    }

    #[test]
    fn test_newer_version_detected() {
        let url = serve_once(
            "200 OK",
            r#"{"latestVersion": "2.1.0", "message": "Faster merges", "downloadUrl": "https://example.invalid/dl"}"#,
        );
        let status = UpdateChecker::default().check(&url, "2.0.3");
        assert!(status.is_new_version);
        assert_eq!(status.latest_version.as_deref(), Some("2.1.0"));
        assert_eq!(status.message.as_deref(), Some("Faster merges"));
    }

    #[test]
    fn test_same_version_is_not_new() {
        let url = serve_once("200 OK", r#"{"latestVersion": "2.0.3"}"#);
        assert!(!UpdateChecker::default().check(&url, "v2.0.3").is_new_version);
    }

    #[test]
    fn test_malformed_remote_version_is_not_new() {
        let url = serve_once("200 OK", r#"{"latestVersion": "soon"}"#);
        assert!(!UpdateChecker::default().check(&url, "1.0.0").is_new_version);
    }

    #[test]
    fn test_http_error_is_not_new() {
        let url = serve_once("500 Internal Server Error", "{}");
        assert!(!UpdateChecker::default().check(&url, "1.0.0").is_new_version);
    }

    #[test]
    fn test_status_serialisation_omits_missing_fields() {
        let json = serde_json::to_string(&UpdateStatus::none()).unwrap();
        assert_eq!(json, r#"{"isNewVersion":false}"#);

        let result = UpdateStatus::none().into_result();
        assert!(result.success);
        assert_eq!(result.get("isNewVersion"), Some(&serde_json::Value::Bool(false)));
    }

    #[test]
    fn test_version_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("package.json");
        std::fs::write(&manifest, r#"{"name": "app", "version": "3.4.5"}"#).unwrap();

        let config = UpdateConfig {
            explicit: Some("1.0.0".into()),
            env_version: Some("2.0.0".into()),
            manifest: Some(manifest.clone()),
        };
        assert_eq!(config.current_version(), "1.0.0");

        let config = UpdateConfig {
            explicit: None,
            ..config
        };
        assert_eq!(config.current_version(), "2.0.0");

        let config = UpdateConfig {
            env_version: None,
            ..config
        };
        assert_eq!(config.current_version(), "3.4.5");

        let config = UpdateConfig {
            manifest: Some(dir.path().join("missing.json")),
            ..config
        };
        assert_eq!(config.current_version(), env!("CARGO_PKG_VERSION"));
    }
}
