//! Network adapter: address-family workarounds and the diagnostic
//! fetch tap.
//!
//! Some home networks advertise broken IPv6; the platform's resolver
//! then wedges deliveries on unreachable AAAA records. The adapter
//! builds the shared HTTP client with an IPv4-first resolver and a
//! bounded connect attempt, applied exactly once per configured value.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use sha2::{Digest, Sha256};
use sk_domain::config::{DnsResultOrder, TelegramConfig};
use sk_domain::TraceEvent;

use crate::context;

const TELEGRAM_API_HOST: &str = "api.telegram.org";
const FAMILY_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(300);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DNS ordering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolver that reorders system results by address family. The sort is
/// stable, so within-family order is preserved.
struct OrderedResolver {
    order: DnsResultOrder,
}

impl Resolve for OrderedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let order = self.order;
        let host = name.as_str().to_owned();
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((host.as_str(), 0)).await?;
            let mut resolved: Vec<SocketAddr> = addrs.collect();
            if order == DnsResultOrder::Ipv4first {
                resolved.sort_by_key(|addr| match addr {
                    SocketAddr::V4(_) => 0u8,
                    SocketAddr::V6(_) => 1u8,
                });
            }
            Ok(Box::new(resolved.into_iter()) as Addrs)
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
struct AppliedTuning {
    auto_select_family: bool,
    dns_result_order: DnsResultOrder,
}

/// Owns the tuned, shared `reqwest::Client` for outbound Telegram calls.
pub struct NetAdapter {
    config: TelegramConfig,
    applied: Mutex<Option<AppliedTuning>>,
    client: OnceLock<reqwest::Client>,
}

impl NetAdapter {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            applied: Mutex::new(None),
            client: OnceLock::new(),
        }
    }

    /// The tuned client; built on first use, reused afterwards.
    pub fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(|| {
            self.note_applied();
            self.build_client()
        })
    }

    /// Idempotence check: applying the same tuning twice is a no-op;
    /// a changed value after the client exists can only be logged.
    fn note_applied(&self) {
        let tuning = AppliedTuning {
            auto_select_family: self.config.auto_select_family,
            dns_result_order: self.config.dns_result_order,
        };
        let mut applied = self.applied.lock();
        match &*applied {
            Some(prev) if *prev == tuning => {}
            Some(prev) => {
                tracing::warn!(
                    ?prev,
                    ?tuning,
                    "network tuning changed after first use; restart to apply"
                );
            }
            None => {
                tracing::info!(
                    auto_select_family = tuning.auto_select_family,
                    dns_result_order = ?tuning.dns_result_order,
                    "applying network tuning"
                );
                *applied = Some(tuning);
            }
        }
    }

    fn build_client(&self) -> reqwest::Client {
        let mut builder = reqwest::Client::builder().dns_resolver(Arc::new(OrderedResolver {
            order: self.config.dns_result_order,
        }));
        if self.config.auto_select_family {
            // Bound each connect attempt so a dead AAAA route fails over
            // to the IPv4 candidate quickly instead of eating the whole
            // delivery budget.
            builder = builder.connect_timeout(FAMILY_ATTEMPT_TIMEOUT * 10);
        }
        builder.build().unwrap_or_default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Diagnostic fetch tap
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Wraps a client with the opt-in Telegram diagnostics tap. Tap failures
/// never interrupt the underlying request.
pub struct DiagnosticFetch {
    client: reqwest::Client,
    enabled: bool,
}

impl DiagnosticFetch {
    pub fn new(client: reqwest::Client, enabled: bool) -> Self {
        Self { client, enabled }
    }

    pub async fn execute(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        if self.enabled {
            let body_bytes = request
                .body()
                .and_then(|b| b.as_bytes())
                .map(|b| b.to_vec());
            if let Some(event) =
                diagnose(request.method().as_str(), request.url(), body_bytes.as_deref())
            {
                event.emit();
            }
        }
        self.client.execute(request).await
    }
}

/// Build the diagnostic event for one outbound call, when it targets the
/// Telegram API. Pure so it can be exercised without a network.
pub(crate) fn diagnose(
    http_method: &str,
    url: &reqwest::Url,
    body: Option<&[u8]>,
) -> Option<TraceEvent> {
    if url.host_str() != Some(TELEGRAM_API_HOST) {
        return None;
    }
    let (api_method, redacted_path) = redact_path(url.path())?;

    let summary = match body {
        None => "empty:0".to_owned(),
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => format!("string:{}", text.len()),
            Err(_) => format!("bytes:{}", bytes.len()),
        },
    };
    let payload_hash = hex::encode(Sha256::digest(summary.as_bytes()));

    let ctx = context::current();
    Some(TraceEvent::TelegramHttpFetch {
        delivery_id: ctx.map(|c| c.delivery_id),
        http_method: http_method.to_owned(),
        api_method,
        path: redacted_path,
        payload_hash,
    })
}

/// `/bot<token>/<method>` → `("<method>", "/bot<redacted>/<method>")`;
/// `/file/bot<token>/<rest>` analogously, keeping the file path.
fn redact_path(path: &str) -> Option<(String, String)> {
    if let Some(rest) = path.strip_prefix("/file/bot") {
        let (_token, file_path) = rest.split_once('/')?;
        let api_method = file_path.split('/').next()?.to_owned();
        return Some((api_method, format!("/file/bot<redacted>/{file_path}")));
    }
    if let Some(rest) = path.strip_prefix("/bot") {
        let (_token, method) = rest.split_once('/')?;
        if method.is_empty() {
            return None;
        }
        return Some((method.to_owned(), format!("/bot<redacted>/{method}")));
    }
    None
}
