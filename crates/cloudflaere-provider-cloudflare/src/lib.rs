// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of `DnsProvider`.
//
// ## Behavior
//
// - One logical API operation per trait call (list calls follow pagination)
// - Errors are returned with the HTTP status preserved; nothing is retried
// - HTTP timeout configured (30 seconds)
// - Dry-run mode: reads hit the API, writes are only logged
// - Only A and AAAA records are ever returned
//
// ## Trust Level: Untrusted (DNS Provider)
//
// The provider never spawns tasks, caches zones or records, or decides
// whether a mutation is needed. All of that belongs to the engine.
//
// ## Security Requirements
//
// - Tokens NEVER appear in logs or Debug output
// - Two tokens: one with Zone:Read (zones), one with Zone:DNS:Edit (records)
// - Construction fails fast if a token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cloudflaere_core::config::ProviderConfig;
use cloudflaere_core::record::{Hostname, NewRecord, Record, RecordType, Zone};
use cloudflaere_core::traits::DnsProvider;
use cloudflaere_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const ZONES_PER_PAGE: u32 = 50;
const RECORDS_PER_PAGE: u32 = 100;

/// TTL value Cloudflare treats as "automatic"
const AUTO_TTL: u32 = 1;

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zones, records)
/// - Log the intended POST/PATCH/DELETE payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// Token with Zone:Read permission
    /// ⚠️ NEVER log this value
    zone_token: String,

    /// Token with Zone:DNS:Edit permission
    /// ⚠️ NEVER log this value
    dns_token: String,

    client: reqwest::Client,

    base_url: String,

    dry_run: bool,
}

// Custom Debug implementation that hides the tokens
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("zone_token", &"<REDACTED>")
            .field("dns_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Envelope shared by every Cloudflare v4 response
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
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    page: u32,
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct CfZone {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CfRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    proxied: Option<bool>,
}

impl CfRecord {
    /// Convert to the core model; non-address record types yield `None`
    fn into_record(self) -> Result<Option<Record>> {
        let Ok(record_type) = self.record_type.parse::<RecordType>() else {
            return Ok(None);
        };
        Ok(Some(Record {
            id: self.id,
            record_type,
            name: Hostname::new(&self.name)?,
            address: self.content,
            comment: self.comment.unwrap_or_default(),
            proxied: self.proxied.unwrap_or(false),
        }))
    }
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    ttl: u32,
    proxied: bool,
    comment: &'a str,
}

#[derive(Debug, Serialize)]
struct PatchContentRequest {
    content: String,
}

#[derive(Debug, Deserialize)]
struct DeletedRecord {
    #[allow(dead_code)]
    id: String,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `zone_token`: API token with Zone:Read permission
    /// - `dns_token`: API token with Zone:DNS:Edit permission
    /// - `dry_run`: If true, perform reads but only log writes
    pub fn new(
        zone_token: impl Into<String>,
        dns_token: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let zone_token = zone_token.into();
        let dns_token = dns_token.into();

        if zone_token.is_empty() {
            return Err(Error::config("Cloudflare zone token cannot be empty"));
        }
        if dns_token.is_empty() {
            return Err(Error::config("Cloudflare DNS token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            zone_token,
            dns_token,
            client,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            dry_run,
        })
    }

    /// Build a provider from configuration
    pub fn from_config(config: &ProviderConfig, dry_run: bool) -> Result<Self> {
        match config {
            ProviderConfig::Cloudflare {
                zone_token,
                dns_token,
            } => {
                if dry_run {
                    warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
                }
                Self::new(zone_token.clone(), dns_token.clone(), dry_run)
            }
        }
    }

    /// Point the provider at another API root (for tests and proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the Cloudflare envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        token: &str,
        context: &str,
    ) -> Result<(T, Option<ResultInfo>)> {
        let response = request
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(None, format!("{}: HTTP request failed: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status.as_u16(), context, &error_text));
        }

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            Error::provider(
                Some(status.as_u16()),
                format!("{}: Failed to parse response: {}", context, e),
            )
        })?;

        if !envelope.success {
            let messages: Vec<String> = envelope
                .errors
                .iter()
                .map(|m| format!("{} ({})", m.message, m.code))
                .collect();
            return Err(Error::provider(
                Some(status.as_u16()),
                format!("{}: API reported failure: {}", context, messages.join("; ")),
            ));
        }

        let result = envelope.result.ok_or_else(|| {
            Error::provider(
                Some(status.as_u16()),
                format!("{}: Invalid response format: missing result", context),
            )
        })?;

        Ok((result, envelope.result_info))
    }

    /// Follow `result_info` pagination until the last page
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        per_page: u32,
        token: &str,
        context: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self
                .client
                .get(self.url(path))
                .query(query)
                .query(&[("page", page), ("per_page", per_page)]);

            let (batch, info): (Vec<T>, _) = self.send(request, token, context).await?;
            items.extend(batch);

            match info {
                Some(info) if info.page < info.total_pages => page = info.page + 1,
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Map an HTTP failure status to a provider error
fn status_error(status: u16, context: &str, body: &str) -> Error {
    let message = match status {
        401 | 403 => format!(
            "{}: Authentication failed: Invalid API token or insufficient permissions",
            context
        ),
        404 => format!("{}: Not found: {}", context, body),
        409 => format!("{}: Conflict: {}", context, body),
        429 => format!("{}: Rate limit exceeded. Please retry later", context),
        500..=599 => format!("{}: Cloudflare server error (transient): {}", context, body),
        _ => format!("{}: Request failed: {}", context, body),
    };
    Error::provider(Some(status), message)
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let zones: Vec<CfZone> = self
            .get_all("/zones", &[], ZONES_PER_PAGE, &self.zone_token, "list zones")
            .await?;

        debug!(count = zones.len(), "listed Cloudflare zones");
        Ok(zones
            .into_iter()
            .map(|z| Zone::new(z.name, z.id))
            .collect())
    }

    async fn list_records(
        &self,
        zone_id: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<Record>> {
        let path = format!("/zones/{}/dns_records", zone_id);
        let query: Vec<(&str, String)> = record_type
            .map(|t| vec![("type", t.as_str().to_string())])
            .unwrap_or_default();

        let raw: Vec<CfRecord> = self
            .get_all(&path, &query, RECORDS_PER_PAGE, &self.dns_token, "list records")
            .await?;

        let mut records = Vec::with_capacity(raw.len());
        for record in raw {
            if let Some(record) = record.into_record()? {
                records.push(record);
            }
        }

        debug!(zone_id, count = records.len(), "listed Cloudflare address records");
        Ok(records)
    }

    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<Record> {
        let body = CreateRecordRequest {
            record_type: record.record_type.as_str(),
            name: record.name.as_str(),
            content: record.address.to_string(),
            ttl: AUTO_TTL,
            proxied: record.proxied,
            comment: &record.comment,
        };

        if self.dry_run {
            info!(
                zone_id,
                payload = %serde_json::to_string(&body)?,
                "[DRY-RUN] Would create DNS record"
            );
            return Ok(Record {
                id: "dry-run".to_string(),
                record_type: record.record_type,
                name: record.name.clone(),
                address: record.address.to_string(),
                comment: record.comment.clone(),
                proxied: record.proxied,
            });
        }

        let request = self
            .client
            .post(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .json(&body);
        let (created, _): (CfRecord, _) = self.send(request, &self.dns_token, "create record").await?;

        created.into_record()?.ok_or_else(|| {
            Error::provider(None, "create record: Cloudflare returned a non-address record")
        })
    }

    async fn update_record_address(
        &self,
        zone_id: &str,
        record_id: &str,
        address: IpAddr,
    ) -> Result<()> {
        let body = PatchContentRequest {
            content: address.to_string(),
        };
        let url = self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id));

        if self.dry_run {
            info!(
                zone_id,
                record_id,
                payload = %serde_json::to_string(&body)?,
                "[DRY-RUN] Would patch DNS record"
            );
            return Ok(());
        }

        let request = self.client.patch(url).json(&body);
        let _: (serde_json::Value, _) = self.send(request, &self.dns_token, "update record").await?;
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let url = self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id));

        if self.dry_run {
            info!(zone_id, record_id, "[DRY-RUN] Would delete DNS record");
            return Ok(());
        }

        let request = self.client.delete(url);
        let _: (DeletedRecord, _) = self.send(request, &self.dns_token, "delete record").await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}
