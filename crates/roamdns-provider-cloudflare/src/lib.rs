// # Cloudflare DNS Provider
//
// Cloudflare implementation of the roamdns `DnsProvider` trait.
//
// Each trait method is a single-shot call against Cloudflare API v4:
//
// - No retry logic: the reconciler retries lookups and nothing else
// - No caching: every lookup lists the zone again
// - No background tasks
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Provider fails fast if token or zone id is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use roamdns_core::config::ProviderConfig;
use roamdns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType};
use roamdns_core::{Error, PluginRegistry, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per listing page
const PAGE_SIZE: u32 = 100;

/// Automatic TTL
const TTL_AUTO: u32 = 1;

const PROVIDER: &str = "cloudflare";

/// Envelope every Cloudflare v4 response is wrapped in
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    page: u32,
    total_pages: u32,
}

/// DNS record as returned by the API
#[derive(Debug, Clone, Deserialize)]
struct CfRecord {
    id: String,
    name: String,
    content: String,
    #[serde(rename = "type")]
    record_type: String,
}

/// Cloudflare DNS provider
///
/// Records are addressed inside one zone, so `zone_id` is required up front;
/// updates and deletes only carry a record identifier.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone holding the managed records
    zone_id: String,

    /// API base URL
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Zone the records live in
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either value is empty or the HTTP client
    /// cannot be built.
    pub fn new(api_token: impl Into<String>, zone_id: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        let zone_id = zone_id.into();

        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone_id cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at a different API endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, self.zone_id)
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("{}/{}", self.records_url(), record_id)
    }

    /// Send a request and unwrap the v4 envelope
    ///
    /// `action` names the operation in error messages.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<ApiResponse<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status.as_u16(), action, &error_text));
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        if !body.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{} rejected: {}", action, describe(&body.errors)),
            ));
        }
        Ok(body)
    }

    /// Fetch one page of A/AAAA records
    async fn list_page(&self, page: u32) -> Result<(Vec<CfRecord>, u32)> {
        let request = self.client.get(self.records_url()).query(&[
            ("page", page.to_string()),
            ("per_page", PAGE_SIZE.to_string()),
        ]);
        let body: ApiResponse<Vec<CfRecord>> = self.send(request, "Record lookup").await?;

        let total_pages = body
            .result_info
            .map(|info| info.total_pages.max(info.page))
            .unwrap_or(page);
        Ok((body.result.unwrap_or_default(), total_pages))
    }
}

/// Fully-qualified name for `record_name` under `domain`; `@` is the apex
pub fn fqdn(domain: &str, record_name: &str) -> String {
    let domain = domain.trim_end_matches('.');
    if record_name.is_empty() || record_name == "@" {
        domain.to_string()
    } else {
        format!("{}.{}", record_name, domain)
    }
}

/// Record name relative to `domain`, the inverse of [`fqdn`]
fn relative_name(domain: &str, name: &str) -> String {
    let domain = domain.trim_end_matches('.');
    let name = name.trim_end_matches('.');
    if name.eq_ignore_ascii_case(domain) {
        return "@".to_string();
    }
    match name.len().checked_sub(domain.len() + 1) {
        Some(cut)
            if name.as_bytes()[cut] == b'.' && name[cut + 1..].eq_ignore_ascii_case(domain) =>
        {
            name[..cut].to_string()
        }
        _ => name.to_string(),
    }
}

fn parse_record_type(text: &str) -> Option<RecordType> {
    match text {
        "A" => Some(RecordType::A),
        "AAAA" => Some(RecordType::Aaaa),
        _ => None,
    }
}

/// First address record whose name equals `fqdn` exactly
fn scan(records: Vec<CfRecord>, domain: &str, fqdn: &str) -> Option<DnsRecord> {
    records.into_iter().find_map(|r| {
        let record_type = parse_record_type(&r.record_type)?;
        if !r.name.trim_end_matches('.').eq_ignore_ascii_case(fqdn) {
            return None;
        }
        Some(DnsRecord {
            name: relative_name(domain, &r.name),
            id: r.id,
            value: r.content,
            record_type,
        })
    })
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map a non-success HTTP status to a descriptive error
fn status_error(status: u16, action: &str, error_text: &str) -> Error {
    match status {
        401 | 403 => Error::provider(
            PROVIDER,
            format!(
                "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{}: zone or record not found", action)),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict: record changed concurrently. Status: {}", status),
        ),
        429 => Error::provider(
            PROVIDER,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", action, status, error_text),
        ),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// List the zone and scan for an exact name match
    ///
    /// Walks every page of the listing; the record set of one zone is small
    /// enough that no server-side filter is used.
    async fn find_record(&self, domain: &str, record_name: &str) -> Result<Option<DnsRecord>> {
        let fqdn = fqdn(domain, record_name);
        tracing::debug!("Looking up Cloudflare record {}", fqdn);

        let mut page = 1;
        loop {
            let (records, total_pages) = self.list_page(page).await?;
            if let Some(found) = scan(records, domain, &fqdn) {
                tracing::debug!("Found record {} (id {})", fqdn, found.id);
                return Ok(Some(found));
            }
            if page >= total_pages {
                return Ok(None);
            }
            page += 1;
        }
    }

    async fn create_record(
        &self,
        domain: &str,
        record_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<String> {
        let payload = serde_json::json!({
            "type": record_type.as_str(),
            "name": fqdn(domain, record_name),
            "content": value,
            "ttl": TTL_AUTO,
            "proxied": false,
        });

        let request = self.client.post(self.records_url()).json(&payload);
        let body: ApiResponse<CfRecord> = self.send(request, "Record create").await?;

        let record = body.result.ok_or_else(|| {
            Error::provider(PROVIDER, "Invalid response format: missing result")
        })?;
        tracing::info!("Cloudflare record created: {} -> {}", record.name, value);
        Ok(record.id)
    }

    async fn update_record(
        &self,
        record_id: &str,
        record_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<()> {
        let payload = serde_json::json!({
            "type": record_type.as_str(),
            "content": value,
        });

        let request = self.client.patch(self.record_url(record_id)).json(&payload);
        let _: ApiResponse<CfRecord> = self.send(request, "Record update").await?;

        tracing::info!(
            "Cloudflare record updated: {} (id {}) -> {}",
            record_name,
            record_id,
            value
        );
        Ok(())
    }

    async fn delete_record(&self, record_id: &str) -> Result<()> {
        let request = self.client.delete(self.record_url(record_id));
        let _: ApiResponse<serde_json::Value> = self.send(request, "Record delete").await?;

        tracing::info!("Cloudflare record deleted: id {}", record_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare { api_token, zone_id } => Ok(Box::new(
                CloudflareProvider::new(api_token.clone(), zone_id.clone())?,
            )),
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use roamdns_core::PluginRegistry;
///
/// let registry = PluginRegistry::new();
/// roamdns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &PluginRegistry) {
    registry.register_provider(PROVIDER, Box::new(CloudflareFactory));
}
