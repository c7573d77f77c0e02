// # Traefik Route Discovery
//
// Lists the hostnames Traefik currently routes HTTP traffic for, by reading
// the router table from the Traefik API.
//
// ## API Reference
//
// - Routers: GET `/api/http/routers?page=N&per_page=M` → `[{ "name", "service", "rule", "status" }]`
//   The `X-Next-Page` header names the next page; it points back to 1 on the last one.
// - Version: GET `/api/version` → `{ "Version", "Codename" }`
//
// ## Rule Parsing
//
// Only `Host(...)` matchers (and the v2 alias `HostHeader(...)`) name
// hostnames. Both the v2 multi-argument form and the v3 single-argument form
// are accepted, with backtick or double-quoted arguments:
//
// ```text
// Host(`a.example.com`) || (Host("b.example.com") && PathPrefix(`/api`))
// Host(`a.example.com`, `b.example.com`)
// ```
//
// Matcher names are case-insensitive (`host`, `HOST` and `Host` are the same).
// `HostRegexp` and `HostSNI` matchers do not name concrete hostnames and are
// skipped. Text inside quoted arguments is never read as a matcher. A `Host(`
// clause that cannot be parsed fails the whole discovery.

use async_trait::async_trait;
use cloudflaere_core::config::TraefikConfig;
use cloudflaere_core::record::Hostname;
use cloudflaere_core::traits::RouteDiscovery;
use cloudflaere_core::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Router status that makes a router count
const ENABLED: &str = "enabled";

/// Page size requested from the router listing
const ROUTERS_PER_PAGE: u32 = 100;

const NEXT_PAGE_HEADER: &str = "X-Next-Page";

/// One entry of the Traefik HTTP router table
#[derive(Debug, Clone, Deserialize)]
pub struct TraefikRouter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub status: String,
}

/// Response of `/api/version`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TraefikVersion {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Codename", default)]
    pub codename: String,
}

/// Extracts hostnames from Traefik router rules
#[derive(Debug, Clone)]
pub struct RuleParser {
    matcher: Regex,
    argument: Regex,
}

impl RuleParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::config(format!("invalid rule pattern: {}", e)))
        };

        Ok(Self {
            matcher: compile(r"(?i)\b(host[a-z]*)\s*\(")?,
            argument: compile(r#"`([^`]*)`|"([^"]*)""#)?,
        })
    }

    /// Hostnames named by `Host(...)` matchers in a rule, in rule order
    pub fn hosts(&self, rule: &str) -> Result<Vec<Hostname>> {
        let mut hosts = Vec::new();
        let mut pos = 0;

        while let Some(caps) = self.matcher.captures_at(rule, pos) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            // A match inside another matcher's quoted argument is just text
            if let Some(quote_end) = enclosing_quote_end(rule, pos, whole.start()) {
                pos = quote_end + 1;
                continue;
            }
            let open = whole.end();
            let close = closing_paren(rule, open).ok_or_else(|| {
                Error::discovery(format!("unterminated {}( in rule: {}", name.as_str(), rule))
            })?;
            pos = close + 1;

            let name = name.as_str();
            if ["Host", "HostHeader"].iter().any(|m| m.eq_ignore_ascii_case(name)) {
                let args = &rule[open..close];
                hosts.extend(self.arguments(args, rule)?);
            } else if ["HostRegexp", "HostSNI", "HostSNIRegexp"]
                .iter()
                .any(|m| m.eq_ignore_ascii_case(name))
            {
                debug!(matcher = name, rule, "skipping non-literal host matcher");
            } else {
                debug!(matcher = name, rule, "skipping unknown matcher");
            }
        }

        Ok(hosts)
    }

    fn arguments(&self, args: &str, rule: &str) -> Result<Vec<Hostname>> {
        let mut hosts = Vec::new();

        for caps in self.argument.captures_iter(args) {
            let value = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let host = Hostname::new(value)
                .map_err(|_| Error::discovery(format!("empty host in rule: {}", rule)))?;
            hosts.push(host);
        }

        let leftover = self.argument.replace_all(args, "");
        if leftover.chars().any(|c| !c.is_whitespace() && c != ',') {
            return Err(Error::discovery(format!("malformed Host() arguments in rule: {}", rule)));
        }
        if hosts.is_empty() {
            return Err(Error::discovery(format!("Host() without arguments in rule: {}", rule)));
        }

        Ok(hosts)
    }
}

/// If `at` lies inside a quoted region that opened at or after `from`,
/// the byte index of the closing quote (or the end of the rule)
///
/// `from` must itself be outside any quote.
fn enclosing_quote_end(rule: &str, from: usize, at: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for ch in rule[from..at].chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (None, '`' | '"') => quote = Some(ch),
            _ => {}
        }
    }
    let q = quote?;
    Some(rule[at..].find(q).map(|i| at + i).unwrap_or(rule.len()))
}

/// Byte index of the `)` closing a matcher opened just before `from`
fn closing_paren(rule: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, ch) in rule[from..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '`' | '"') => quote = Some(ch),
            (None, ')') => return Some(from + offset),
            (None, _) => {}
        }
    }
    None
}

/// Route discovery backed by the Traefik API
#[derive(Debug, Clone)]
pub struct TraefikRouteDiscovery {
    base_url: String,
    client: reqwest::Client,
    parser: RuleParser,
}

impl TraefikRouteDiscovery {
    /// Create a discovery client
    ///
    /// # Parameters
    ///
    /// - `url`: Traefik API base URL
    /// - `insecure_skip_verify`: accept invalid TLS certificates
    pub fn new(url: impl Into<String>, insecure_skip_verify: bool) -> Result<Self> {
        let base_url = url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("Traefik URL cannot be empty"));
        }

        if insecure_skip_verify {
            warn!(url = %base_url, "TLS certificate verification disabled for Traefik API");
        }

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .danger_accept_invalid_certs(insecure_skip_verify)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            parser: RuleParser::new()?,
        })
    }

    pub fn from_config(config: &TraefikConfig) -> Result<Self> {
        Self::new(config.url.clone(), config.insecure_skip_verify)
    }

    async fn send(&self, path: &str, query: &[(&str, u32)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::discovery(format!("could not reach Traefik at {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::discovery(format!("{} returned HTTP {}", url, status)));
        }
        Ok(response)
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let url = response.url().to_string();
        response
            .json()
            .await
            .map_err(|e| Error::discovery(format!("could not decode response from {}: {}", url, e)))
    }

    /// Query the Traefik version; used as a reachability probe at startup
    pub async fn version(&self) -> Result<TraefikVersion> {
        Self::decode(self.send("/api/version", &[]).await?).await
    }

    /// The raw HTTP router table, across every page
    pub async fn routers(&self) -> Result<Vec<TraefikRouter>> {
        let mut routers = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .send(
                    "/api/http/routers",
                    &[("page", page), ("per_page", ROUTERS_PER_PAGE)],
                )
                .await?;
            let next = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());

            let batch: Vec<TraefikRouter> = Self::decode(response).await?;
            routers.extend(batch);

            match next {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(routers)
    }
}

#[async_trait]
impl RouteDiscovery for TraefikRouteDiscovery {
    async fn active_hostnames(&self) -> Result<BTreeSet<Hostname>> {
        let routers = self.routers().await?;
        let mut hostnames = BTreeSet::new();

        for router in &routers {
            if router.status != ENABLED {
                debug!(router = %router.name, status = %router.status, "skipping inactive router");
                continue;
            }
            for host in self.parser.hosts(&router.rule)? {
                hostnames.insert(host);
            }
        }

        debug!(routers = routers.len(), hostnames = hostnames.len(), "discovered Traefik hostnames");
        Ok(hostnames)
    }

    fn source_name(&self) -> &'static str {
        "traefik"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn names(rule: &str) -> Vec<String> {
        RuleParser::new()
            .unwrap()
            .hosts(rule)
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_v3_single_argument_hosts() {
        assert_eq!(names("Host(`www.example.com`)"), vec!["www.example.com"]);
        assert_eq!(
            names(r#"Host(`a.example.com`) || (Host("B.example.com") && PathPrefix(`/api`))"#),
            vec!["a.example.com", "b.example.com"]
        );
    }

    #[test]
    fn parses_v2_multi_argument_hosts() {
        assert_eq!(
            names("Host(`a.example.com`, `b.example.com`) && Path(`/`)"),
            vec!["a.example.com", "b.example.com"]
        );
        assert_eq!(names("HostHeader(`legacy.example.com`)"), vec!["legacy.example.com"]);
    }

    #[test]
    fn ignores_regexp_and_sni_matchers() {
        assert!(names("HostRegexp(`{sub:[a-z]+}.example.com`)").is_empty());
        assert!(names("HostSNI(`*`)").is_empty());
        assert_eq!(
            names("HostRegexp(`^.+\\.example\\.com$`) || Host(`x.example.com`)"),
            vec!["x.example.com"]
        );
        assert!(names("PathPrefix(`/`)").is_empty());
    }

    #[test]
    fn parentheses_inside_quotes_do_not_close_matcher() {
        assert_eq!(
            names("HostRegexp(`(a|b).example.com`) && Host(`c.example.com`)"),
            vec!["c.example.com"]
        );
    }

    #[test]
    fn matcher_names_are_case_insensitive() {
        assert_eq!(names("host(`www.example.com`)"), vec!["www.example.com"]);
        assert_eq!(names("HOST(`api.example.com`)"), vec!["api.example.com"]);
        assert_eq!(names("hostHeader(`legacy.example.com`)"), vec!["legacy.example.com"]);
        assert!(names("hostregexp(`{sub:[a-z]+}.example.com`)").is_empty());
        assert!(names("HOSTSNI(`*`)").is_empty());
    }

    #[test]
    fn matcher_text_inside_quotes_is_ignored() {
        assert!(names("Path(`/Host(`)").is_empty());
        assert_eq!(
            names(r#"PathPrefix("/Host(x") && Host(`www.example.com`)"#),
            vec!["www.example.com"]
        );
        assert_eq!(
            names("Path(`/a`) && Host(`a.example.com`) || Path(`/host(`)"),
            vec!["a.example.com"]
        );
    }

    #[test]
    fn malformed_host_clauses_are_errors() {
        let parser = RuleParser::new().unwrap();
        for rule in [
            "Host(`www.example.com`",
            "Host()",
            "Host(www.example.com)",
            "Host(``)",
        ] {
            let err = parser.hosts(rule).unwrap_err();
            assert!(matches!(err, Error::Discovery(_)), "rule {:?}", rule);
        }
    }

    fn discovery(server: &MockServer) -> TraefikRouteDiscovery {
        TraefikRouteDiscovery::new(format!("{}/", server.uri()), false).unwrap()
    }

    #[tokio::test]
    async fn only_enabled_routers_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/http/routers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "name": "web@docker", "service": "web", "rule": "Host(`www.example.com`)", "status": "enabled" },
                { "name": "api@docker", "service": "api", "rule": "Host(`api.example.com`) || Host(`WWW.example.com`)", "status": "enabled" },
                { "name": "old@docker", "service": "old", "rule": "Host(`old.example.com`)", "status": "disabled" },
                { "name": "bad@docker", "service": "bad", "rule": "Host(`broken.example.com`)", "status": "warning" }
            ])))
            .mount(&server)
            .await;

        let hostnames = discovery(&server).active_hostnames().await.unwrap();
        let hostnames: Vec<&str> = hostnames.iter().map(|h| h.as_str()).collect();
        assert_eq!(hostnames, vec!["api.example.com", "www.example.com"]);
    }

    fn enabled_router(host: &str) -> serde_json::Value {
        serde_json::json!({
            "name": format!("{}@docker", host),
            "service": "web",
            "rule": format!("Host(`{}`)", host),
            "status": "enabled"
        })
    }

    #[tokio::test]
    async fn follows_router_pagination() {
        let server = MockServer::start().await;
        let first: Vec<_> = (0..100)
            .map(|i| enabled_router(&format!("app{}.example.com", i)))
            .collect();

        Mock::given(method("GET"))
            .and(path("/api/http/routers"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Next-Page", "2")
                    .set_body_json(serde_json::Value::Array(first)),
            )
            .expect(1)
            .mount(&server)
            .await;
        // Traefik points back to page 1 once the listing is exhausted
        Mock::given(method("GET"))
            .and(path("/api/http/routers"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Next-Page", "1")
                    .set_body_json(serde_json::json!([enabled_router("late.example.com")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let hostnames = discovery(&server).active_hostnames().await.unwrap();
        assert_eq!(hostnames.len(), 101);
        assert!(hostnames.contains(&Hostname::new("late.example.com").unwrap()));
        assert!(hostnames.contains(&Hostname::new("app99.example.com").unwrap()));
    }

    #[tokio::test]
    async fn failing_later_page_fails_discovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/http/routers"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Next-Page", "2")
                    .set_body_json(serde_json::json!([enabled_router("www.example.com")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/http/routers"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = discovery(&server).active_hostnames().await.unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
    }

    #[tokio::test]
    async fn malformed_rule_fails_discovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/http/routers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "service": "web", "rule": "Host(`www.example.com`", "status": "enabled" }
            ])))
            .mount(&server)
            .await;

        let err = discovery(&server).active_hostnames().await.unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
    }

    #[tokio::test]
    async fn unreachable_or_failing_api_is_a_discovery_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/http/routers"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = discovery(&server).active_hostnames().await.unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn version_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Version": "3.1.2",
                "Codename": "comte"
            })))
            .mount(&server)
            .await;

        let version = discovery(&server).version().await.unwrap();
        assert_eq!(version.version, "3.1.2");
        assert_eq!(version.codename, "comte");
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(matches!(
            TraefikRouteDiscovery::new("", false),
            Err(Error::Config(_))
        ));
    }
}
