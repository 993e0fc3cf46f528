//! HTTP network client

use async_trait::async_trait;
use folio_storage::{Request, Response};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::error::ProxyError;
use crate::fetcher::Fetcher;

/// Request headers that are never forwarded
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "x-folio-client",
];

/// HTTP fetcher configuration
#[derive(Clone, Debug)]
pub struct HttpFetcherConfig {
    /// Origin the app shell is served from; relative URLs resolve against it
    pub base_url: String,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            skip_tls_verify: false,
            user_agent: format!("folio-cache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// `reqwest`-backed [`Fetcher`]
pub struct HttpFetcher {
    base_url: Url,
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new(config: HttpFetcherConfig) -> Result<Self, ProxyError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ProxyError::InvalidUrl {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;

        let mut builder = Client::builder().user_agent(config.user_agent);

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        info!("Created HTTP fetcher for origin {}", base_url);

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a possibly relative URL against the origin
    pub fn resolve(&self, raw: &str) -> Result<Url, ProxyError> {
        self.base_url.join(raw).map_err(|e| ProxyError::InvalidUrl {
            url: raw.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, ProxyError> {
        let url = self.resolve(&request.url)?;
        debug!("Fetching {} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await?;

        debug!("Fetched {} -> {} ({} bytes)", request.url, status, body.len());

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}
