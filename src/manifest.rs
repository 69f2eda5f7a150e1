//! Provisioning role requirements.
//!
//! The required roles come from a remote requirements manifest; the
//! installed roles come from the provisioning tool's role listing. Both are
//! line oriented: only lines with exactly three whitespace-separated fields
//! name a role.

use std::collections::BTreeSet;

use futures_util::future::LocalBoxFuture;

/// Why a manifest could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-200 status.
    Status(u16),
    /// Connection, TLS or body decoding failed.
    Transport(String),
}

pub trait ManifestFetcher {
    /// Unauthenticated GET of `url`, returning the body as text.
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<String, FetchError>>;
}

/// Fetches manifests over HTTPS with reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ManifestFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<String, FetchError>> {
        Box::pin(async move {
            tracing::debug!(url, "fetching role manifest");
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            let status = response.status();
            if status != reqwest::StatusCode::OK {
                return Err(FetchError::Status(status.as_u16()));
            }

            response
                .text()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))
        })
    }
}

fn three_field_lines(text: &str) -> impl Iterator<Item = Vec<&str>> {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|fields| fields.len() == 3)
}

/// Required role names: the last field of every three-field line.
///
/// `- src: geerlingguy.apache` → `geerlingguy.apache`
pub fn parse_required_roles(manifest: &str) -> Vec<String> {
    three_field_lines(manifest)
        .map(|fields| fields[2].to_string())
        .collect()
}

/// Installed role names: the middle field of every three-field line, with
/// its trailing comma removed.
///
/// `- geerlingguy.apache, 1.0.0` → `geerlingguy.apache`
pub fn parse_installed_roles(listing: &str) -> Vec<String> {
    three_field_lines(listing)
        .map(|fields| fields[1].replace(',', ""))
        .collect()
}

/// Required roles missing from `installed`, in manifest order.
pub fn missing_roles(required: &[String], installed: &[String]) -> Vec<String> {
    let installed: BTreeSet<&str> = installed.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();
    required
        .iter()
        .filter(|role| !installed.contains(role.as_str()))
        .filter(|role| seen.insert(role.as_str()))
        .cloned()
        .collect()
}
