//! Default desktop platform: blocking HTTP client plus local filesystem.

use std::{fs, thread, time::Duration};

use anyhow::{Context, Result};

use super::{FetchCallback, Platform};
use crate::core::SceneUrl;
use crate::{debug, log};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Platform backed by `reqwest` for remote scenes and `std::fs` for local
/// ones. Each request runs on its own thread; the fetch coordinator bounds
/// how many are outstanding.
pub struct HttpPlatform {
    client: reqwest::blocking::Client,
}

impl HttpPlatform {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

impl Platform for HttpPlatform {
    fn start_url_request(&self, url: &SceneUrl, callback: FetchCallback) {
        let client = self.client.clone();
        let url = url.clone();
        thread::spawn(move || {
            debug!("fetch"; "GET {}", url);
            let body = fetch(&client, url.as_str());
            if body.is_none() {
                log!("error"; "request failed: {}", url);
            }
            callback(body);
        });
    }

    fn bytes_from_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = strip_file_scheme(path);
        fs::read(path).with_context(|| format!("reading `{path}`"))
    }
}

fn fetch(client: &reqwest::blocking::Client, url: &str) -> Option<Vec<u8>> {
    let response = client.get(url).send().ok()?;
    if !response.status().is_success() {
        return None;
    }
    Some(response.bytes().ok()?.to_vec())
}

fn strip_file_scheme(path: &str) -> &str {
    path.strip_prefix("file://").unwrap_or(path)
}
