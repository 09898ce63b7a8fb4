use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::LinkError;

pub const DEFAULT_API_BASE: &str = "https://api.dropboxapi.com";

/// Anything that can hand out a public link for a path under the storage root.
pub trait LinkProvider {
    fn create_share_link(&self, path: &str) -> Result<String, LinkError>;
}

/// Blocking client for the Dropbox v2 sharing endpoints.
pub struct DropboxClient {
    client: Client,
    api_base: String,
    token: String,
}

#[derive(Deserialize, Debug)]
struct SharedLink {
    #[serde(default)]
    url: String,
}

#[derive(Deserialize, Debug)]
struct LinkListing {
    #[serde(default)]
    links: Vec<SharedLink>,
}

/// How a 409 from `create_shared_link_with_settings` should be handled.
#[derive(Debug, PartialEq)]
enum Conflict {
    /// The link exists and the error metadata already carries it.
    Existing(String),
    /// The link exists but has to be looked up.
    Exists,
    Other,
}

fn classify_conflict(body: &str) -> Conflict {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Conflict::Other,
    };
    let error = &parsed["error"];
    if error[".tag"] != "shared_link_already_exists" {
        return Conflict::Other;
    }
    match error["shared_link_already_exists"]["metadata"]["url"].as_str() {
        Some(url) if !url.is_empty() => Conflict::Existing(url.to_string()),
        _ => Conflict::Exists,
    }
}

impl DropboxClient {
    pub fn new(token: &str, api_base: &str) -> Result<Self, LinkError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, token, api_base))
    }

    pub fn with_client(client: Client, token: &str, api_base: &str) -> Self {
        DropboxClient {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn post(&self, endpoint: &str, body: &Value) -> Result<Response, LinkError> {
        let url = format!("{}/2/{}", self.api_base, endpoint);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()?;
        Ok(res)
    }

    fn list_existing_link(&self, path: &str) -> Result<String, LinkError> {
        let res = self.post(
            "sharing/list_shared_links",
            &json!({ "path": path, "direct_only": true }),
        )?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(LinkError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let listing: LinkListing = res.json()?;
        listing
            .links
            .into_iter()
            .map(|l| l.url)
            .find(|u| !u.is_empty())
            .ok_or_else(|| LinkError::EmptyUrl {
                path: path.to_string(),
            })
    }
}

impl LinkProvider for DropboxClient {
    fn create_share_link(&self, path: &str) -> Result<String, LinkError> {
        let res = self.post(
            "sharing/create_shared_link_with_settings",
            &json!({ "path": path }),
        )?;
        let status = res.status();

        if status.is_success() {
            let link: SharedLink = res.json()?;
            if link.url.is_empty() {
                return Err(LinkError::EmptyUrl {
                    path: path.to_string(),
                });
            }
            return Ok(link.url);
        }

        let body = res.text().unwrap_or_default();
        if status == StatusCode::CONFLICT {
            match classify_conflict(&body) {
                Conflict::Existing(url) => {
                    debug!(path, "share link already exists");
                    return Ok(url);
                }
                Conflict::Exists => {
                    debug!(path, "share link already exists, listing");
                    return self.list_existing_link(path);
                }
                Conflict::Other => {}
            }
        }

        Err(LinkError::Api {
            status: status.as_u16(),
            body,
        })
    }
}
