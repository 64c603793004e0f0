//! Slice definition fetching (HTTP or local filesystem).

use std::{fs, time::Duration};

use anyhow::Context;
use ureq::tls::{RootCerts, TlsConfig, TlsProvider};
use ureq::Agent;

/// Global timeout for the definition download.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Slice definitions are small text files; anything bigger than this is a
/// wrong URL, not a definition.
const MAX_DEFINITION_SIZE: u64 = 10 * 1024 * 1024;

/// Fetches the slice definition text from a URL or a local path.
///
/// HTTP(S) sources are downloaded with a bounded response size; GitHub
/// "blob view" URLs are rewritten to their raw-content form first. Anything
/// else is read from the filesystem as UTF-8.
///
/// # Errors
///
/// Fetch failures (network, HTTP status, filesystem) surface as errors with
/// source context; they are never silently turned into empty input.
pub(crate) fn fetch_text(source: &str) -> anyhow::Result<String> {
    let source = source.trim();
    if source.starts_with("http://") || source.starts_with("https://") {
        let url = normalize_github_url(source);
        download_text(&url).with_context(|| format!("failed to fetch slice definition from {url}"))
    } else {
        fs::read_to_string(source)
            .with_context(|| format!("failed to read slice definition from {source}"))
    }
}

fn download_text(url: &str) -> anyhow::Result<String> {
    let text = agent()
        .get(url)
        .header("User-Agent", "font-slices")
        .call()?
        .into_body()
        .with_config()
        .limit(MAX_DEFINITION_SIZE)
        .read_to_string()?;
    Ok(text)
}

/// Creates an HTTP agent configured with native-tls and a global timeout.
fn agent() -> Agent {
    let tls_config = TlsConfig::builder()
        .provider(TlsProvider::NativeTls)
        .root_certs(RootCerts::PlatformVerifier)
        .build();

    Agent::config_builder()
        .tls_config(tls_config)
        .timeout_global(Some(HTTP_TIMEOUT))
        .build()
        .into()
}

/// Rewrites a GitHub blob-view URL to the raw-content URL serving the file
/// itself; other URLs pass through unchanged.
fn normalize_github_url(url: &str) -> String {
    if url.contains("github.com") && url.contains("/blob/") {
        url.replace("github.com/", "raw.githubusercontent.com/")
            .replace("/blob/", "/")
    } else {
        url.to_owned()
    }
}
