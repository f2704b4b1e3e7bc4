//! OWASP ZAP engine adapter
//!
//! Speaks ZAP's JSON API (`/JSON/<component>/<action|view>/<operation>/`).
//! Passive profiles are driven through `core/accessUrl` and the passive
//! scanner queue, active profiles through `ascan`, and spider profiles run
//! `spider` first and hand over to `ascan` via a continuation handle.

use crate::catalog::{EngineScanKind, ScanProfile};
use crate::engine::alerts::AlertSummary;
use crate::engine::client::{
    EnginePhase, EngineSessionHandle, EngineStatus, ScanEngineClient,
};
use crate::engine::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENGINE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "OWASP-ZAP-Security-Scanner";

const API_KEY_HEADER: &str = "X-ZAP-API-Key";
const BODY_EXCERPT_LEN: usize = 200;

/// Connection configuration for a ZAP endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ZapConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ZapConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENGINE_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Which calls a request belongs to, for fault classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallContext {
    Start,
    Poll,
    Stop,
    Alerts,
}

/// `ScanEngineClient` for an OWASP ZAP daemon
pub struct ZapEngineClient {
    config: ZapConfig,
    base_url: Url,
    endpoint: String,
    http: reqwest::Client,
}

impl ZapEngineClient {
    pub fn new(config: ZapConfig) -> EngineResult<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| EngineError::Rejected {
            detail: format!("Invalid engine URL '{}': {}", config.base_url, e),
        })?;
        // Url::join replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| EngineError::Rejected {
                detail: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint: base_url.as_str().trim_end_matches('/').to_string(),
            base_url,
            config,
            http,
        })
    }

    pub fn config(&self) -> &ZapConfig {
        &self.config
    }

    fn api_url(
        &self,
        component: &str,
        kind: &str,
        operation: &str,
        params: &[(&str, &str)],
    ) -> EngineResult<Url> {
        let mut url = self
            .base_url
            .join(&format!("JSON/{}/{}/{}/", component, kind, operation))
            .map_err(|e| EngineError::Rejected {
                detail: format!("Cannot build engine URL for {}/{}: {}", component, operation, e),
            })?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(api_key) = &self.config.api_key {
                query.append_pair("apikey", api_key);
            }
        }
        Ok(url)
    }

    async fn call(
        &self,
        context: CallContext,
        component: &str,
        kind: &str,
        operation: &str,
        params: &[(&str, &str)],
    ) -> EngineResult<Value> {
        let url = self.api_url(component, kind, operation, params)?;
        log::trace!("Engine call {}/{}/{}", component, kind, operation);

        let mut request = self.http.get(url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        let response = request.send().await.map_err(|e| EngineError::Unreachable {
            endpoint: self.endpoint.clone(),
            detail: format!("{}/{} request failed: {}", component, operation, e),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| EngineError::Unreachable {
            endpoint: self.endpoint.clone(),
            detail: format!("Failed to read {}/{} response: {}", component, operation, e),
        })?;

        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        if let Some(Value::Object(object)) = &parsed {
            if let Some(code) = object.get("code").and_then(Value::as_str) {
                let message = object
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(code);
                return Err(self.classify_api_error(context, code, message, params));
            }
        }

        if status.is_server_error() {
            return Err(EngineError::Unreachable {
                endpoint: self.endpoint.clone(),
                detail: format!("HTTP {} from {}/{}", status.as_u16(), component, operation),
            });
        }
        if !status.is_success() {
            return Err(EngineError::Rejected {
                detail: format!(
                    "HTTP {} from {}/{}: {}",
                    status.as_u16(),
                    component,
                    operation,
                    excerpt(&body)
                ),
            });
        }

        parsed.ok_or_else(|| EngineError::Rejected {
            detail: format!(
                "Unparseable response from {}/{}: {}",
                component,
                operation,
                excerpt(&body)
            ),
        })
    }

    fn classify_api_error(
        &self,
        context: CallContext,
        code: &str,
        message: &str,
        params: &[(&str, &str)],
    ) -> EngineError {
        if context == CallContext::Poll && code == "does_not_exist" {
            let engine_id = params
                .iter()
                .find(|(key, _)| *key == "scanId")
                .map(|(_, value)| value.to_string())
                .unwrap_or_default();
            return EngineError::SessionNotFound { engine_id };
        }
        EngineError::Rejected {
            detail: format!("{} ({})", message, code),
        }
    }

    async fn register_exclusions(&self, patterns: &[String]) -> EngineResult<()> {
        for pattern in patterns {
            let params = [("regex", pattern.as_str())];
            self.call(CallContext::Start, "spider", "action", "excludeFromScan", &params)
                .await?;
            self.call(CallContext::Start, "ascan", "action", "excludeFromScan", &params)
                .await?;
        }
        Ok(())
    }

    async fn launch_active_scan(&self, target: &str) -> EngineResult<String> {
        let response = self
            .call(
                CallContext::Start,
                "ascan",
                "action",
                "scan",
                &[("url", target), ("recurse", "true")],
            )
            .await?;
        scan_id_from(&response)
    }

    async fn scan_status(&self, component: &str, scan_id: &str) -> EngineResult<f64> {
        let response = self
            .call(
                CallContext::Poll,
                component,
                "view",
                "status",
                &[("scanId", scan_id)],
            )
            .await?;
        parse_percent(response.get("status")).ok_or_else(|| EngineError::Rejected {
            detail: format!("{} status missing from response: {}", component, response),
        })
    }
}

#[async_trait]
impl ScanEngineClient for ZapEngineClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn start(
        &self,
        target: &Url,
        profile: &ScanProfile,
        excluded_url_patterns: &[String],
    ) -> EngineResult<EngineSessionHandle> {
        let target_str = target.as_str();
        match profile.engine_kind {
            EngineScanKind::Passive => {
                self.register_exclusions(excluded_url_patterns).await?;
                self.call(
                    CallContext::Start,
                    "core",
                    "action",
                    "accessUrl",
                    &[("url", target_str), ("followRedirects", "true")],
                )
                .await?;
                Ok(EngineSessionHandle::new(
                    "passive",
                    EnginePhase::Passive,
                    target,
                ))
            }
            EngineScanKind::Active => {
                self.register_exclusions(excluded_url_patterns).await?;
                let scan_id = self.launch_active_scan(target_str).await?;
                Ok(EngineSessionHandle::new(scan_id, EnginePhase::Active, target))
            }
            EngineScanKind::SpiderThenActive => {
                self.register_exclusions(excluded_url_patterns).await?;
                let response = self
                    .call(
                        CallContext::Start,
                        "spider",
                        "action",
                        "scan",
                        &[("url", target_str), ("recurse", "true")],
                    )
                    .await?;
                let scan_id = scan_id_from(&response)?;
                Ok(EngineSessionHandle::new(scan_id, EnginePhase::Spider, target))
            }
        }
    }

    async fn poll(&self, handle: &EngineSessionHandle) -> EngineResult<EngineStatus> {
        match handle.phase {
            EnginePhase::Passive => {
                let response = self
                    .call(CallContext::Poll, "pscan", "view", "recordsToScan", &[])
                    .await?;
                let remaining = parse_percent(response.get("recordsToScan")).ok_or_else(|| {
                    EngineError::Rejected {
                        detail: format!("recordsToScan missing from response: {}", response),
                    }
                })?;
                if remaining <= 0.0 {
                    Ok(EngineStatus::succeeded())
                } else {
                    // Queue length is not a percentage; no incremental signal
                    Ok(EngineStatus::running(None))
                }
            }
            EnginePhase::Active => {
                let percent = self.scan_status("ascan", &handle.engine_id).await?;
                if percent >= 100.0 {
                    Ok(EngineStatus::succeeded())
                } else {
                    Ok(EngineStatus::running(Some(percent)))
                }
            }
            EnginePhase::Spider => {
                let percent = self.scan_status("spider", &handle.engine_id).await?;
                if percent < 100.0 {
                    return Ok(EngineStatus::running(Some(percent / 2.0)));
                }
                // A lost reply may still have started the scan; never launch a second one
                let scan_id = self
                    .launch_active_scan(&handle.target)
                    .await
                    .map_err(|e| match e {
                        EngineError::Unreachable { detail, .. } => EngineError::Rejected {
                            detail: format!(
                                "active scan handover after spider {} unconfirmed: {}",
                                handle.engine_id, detail
                            ),
                        },
                        other => other,
                    })?;
                log::debug!(
                    "Spider {} finished; active scan {} launched for {}",
                    handle.engine_id,
                    scan_id,
                    handle.target
                );
                Ok(EngineStatus::running(Some(50.0)).with_continuation(EngineSessionHandle {
                    engine_id: scan_id,
                    phase: EnginePhase::ActiveAfterSpider,
                    target: handle.target.clone(),
                }))
            }
            EnginePhase::ActiveAfterSpider => {
                let percent = self.scan_status("ascan", &handle.engine_id).await?;
                if percent >= 100.0 {
                    Ok(EngineStatus::succeeded())
                } else {
                    Ok(EngineStatus::running(Some(50.0 + percent / 2.0)))
                }
            }
        }
    }

    async fn stop(&self, handle: &EngineSessionHandle) -> EngineResult<()> {
        let component = match handle.phase {
            EnginePhase::Passive => return Ok(()),
            EnginePhase::Spider => "spider",
            EnginePhase::Active | EnginePhase::ActiveAfterSpider => "ascan",
        };
        self.call(
            CallContext::Stop,
            component,
            "action",
            "stop",
            &[("scanId", handle.engine_id.as_str())],
        )
        .await?;
        Ok(())
    }

    async fn alert_summary(&self, target: &Url) -> EngineResult<AlertSummary> {
        let response = self
            .call(
                CallContext::Alerts,
                "alert",
                "view",
                "alertsSummary",
                &[("baseurl", target.as_str())],
            )
            .await?;
        response
            .get("alertsSummary")
            .and_then(AlertSummary::from_zap_summary)
            .ok_or_else(|| EngineError::Rejected {
                detail: format!("alertsSummary missing from response: {}", response),
            })
    }
}

/// Extract the `scan` id returned by `spider/scan` and `ascan/scan`
fn scan_id_from(response: &Value) -> EngineResult<String> {
    match response.get("scan") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(EngineError::Rejected {
            detail: format!("Engine did not return a scan id: {}", response),
        }),
    }
}

/// ZAP reports numbers as strings (`"45"`); accept either representation
fn parse_percent(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_with(base: &str, api_key: Option<&str>) -> ZapEngineClient {
        ZapEngineClient::new(ZapConfig {
            base_url: base.to_string(),
            api_key: api_key.map(str::to_string),
            ..ZapConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_api_url_layout() {
        let client = client_with("http://localhost:8080", None);
        let url = client
            .api_url("ascan", "view", "status", &[("scanId", "3")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/JSON/ascan/view/status/?scanId=3"
        );
    }

    #[test]
    fn test_api_url_keeps_base_path_and_key() {
        let client = client_with("http://zap.internal:8090/proxy", Some("s3cret"));
        let url = client
            .api_url("core", "action", "accessUrl", &[("url", "https://example.org/a b")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://zap.internal:8090/proxy/JSON/core/action/accessUrl/?url=https%3A%2F%2Fexample.org%2Fa+b&apikey=s3cret"
        );
        assert_eq!(client.endpoint(), "http://zap.internal:8090/proxy");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = ZapEngineClient::new(ZapConfig {
            base_url: "not a url".to_string(),
            ..ZapConfig::default()
        });
        assert!(matches!(result, Err(EngineError::Rejected { .. })));
    }

    #[test]
    fn test_scan_id_from() {
        assert_eq!(scan_id_from(&json!({"scan": "4"})).unwrap(), "4");
        assert_eq!(scan_id_from(&json!({"scan": 7})).unwrap(), "7");
        assert!(scan_id_from(&json!({"scan": ""})).is_err());
        assert!(scan_id_from(&json!({"Result": "OK"})).is_err());
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent(Some(&json!("45"))), Some(45.0));
        assert_eq!(parse_percent(Some(&json!(100))), Some(100.0));
        assert_eq!(parse_percent(Some(&json!("n/a"))), None);
        assert_eq!(parse_percent(None), None);
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let long = "x".repeat(500);
        let cut = excerpt(&long);
        assert_eq!(cut.len(), BODY_EXCERPT_LEN + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("  short  "), "short");
    }

    #[test]
    fn test_does_not_exist_maps_to_session_not_found_only_when_polling() {
        let client = client_with("http://localhost:8080", None);
        let params = [("scanId", "9")];

        let classify = |context| {
            client.classify_api_error(context, "does_not_exist", "Does Not Exist", &params)
        };

        assert_eq!(
            classify(CallContext::Poll),
            EngineError::SessionNotFound {
                engine_id: "9".to_string()
            }
        );
        assert!(matches!(
            classify(CallContext::Stop),
            EngineError::Rejected { .. }
        ));
    }
}
