//! GitHub REST API client

use chrono::{DateTime, Utc};
use reviewminer_core::http::{self, HttpConfig, HttpError};
use serde::{Deserialize, Deserializer};

use crate::target::Target;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Budget snapshot from the rate-status endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateState {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateState {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// One pull-request review comment, as returned by the listing endpoint.
///
/// Only the fields the records need; everything else is ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RawComment {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pull_request_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub diff_hunk: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// The two endpoints the harvester consumes.
///
/// Implemented by [`GitHubClient`]; tests substitute scripted stubs.
pub trait ReviewApi: Send + Sync {
    /// Current request budget
    fn rate_limit(&self) -> Result<RateState, HttpError>;

    /// One page (1-based) of review comments; empty once past the last page
    fn comments_page(&self, target: &Target, page: u32) -> Result<Vec<RawComment>, HttpError>;
}

#[derive(Deserialize)]
struct RateLimitResponse {
    rate: RateBody,
}

#[derive(Deserialize)]
struct RateBody {
    remaining: u64,
    /// Unix seconds
    reset: i64,
}

impl TryFrom<RateBody> for RateState {
    type Error = HttpError;

    fn try_from(body: RateBody) -> Result<Self, Self::Error> {
        let reset_at = DateTime::from_timestamp(body.reset, 0)
            .ok_or_else(|| HttpError::Decode(format!("reset {} out of range", body.reset)))?;
        Ok(Self {
            remaining: body.remaining,
            reset_at,
        })
    }
}

/// Blocking GitHub client over the shared runtime
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    per_page: u32,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("per_page", &self.per_page)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    pub fn new(api_url: &str, per_page: u32, http: &HttpConfig) -> Result<Self, HttpError> {
        Ok(Self {
            client: http::build_client(http)?,
            api_url: api_url.trim_end_matches('/').to_string(),
            per_page,
        })
    }

    fn rate_limit_url(&self) -> String {
        format!("{}/rate_limit", self.api_url)
    }

    fn comments_url(&self, target: &Target, page: u32) -> String {
        format!(
            "{}/repos/{}/{}/pulls/comments?page={page}&per_page={}",
            self.api_url, target.owner, target.name, self.per_page
        )
    }
}

impl ReviewApi for GitHubClient {
    fn rate_limit(&self) -> Result<RateState, HttpError> {
        let body: RateLimitResponse = http::get_json(&self.client, &self.rate_limit_url())?;
        body.rate.try_into()
    }

    fn comments_page(&self, target: &Target, page: u32) -> Result<Vec<RawComment>, HttpError> {
        http::get_json(&self.client, &self.comments_url(target, page))
    }
}
