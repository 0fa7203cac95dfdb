//! Mail exchanger resolution.

use super::message::HostPort;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for one DNS lookup.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Port used for hosts taken from MX records.
pub const SMTP_PORT: u16 = 25;

/// One MX record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    /// Lower is tried first.
    pub preference: u16,
    /// Exchange host name, possibly with a trailing dot.
    pub exchange: String,
}

impl MxRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// A failed MX lookup.
#[derive(Debug, Clone, thiserror::Error)]
#[error("MX lookup for {domain} failed: {reason}")]
pub struct MxLookupError {
    /// Domain that was queried.
    pub domain: String,
    /// Resolver message.
    pub reason: String,
}

/// Looks up MX records for a domain.
pub trait MxResolver: Send + Sync {
    /// Returns the MX records for `domain`, in any order.
    fn lookup_mx(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<MxRecord>, MxLookupError>> + Send;
}

impl<T: MxResolver> MxResolver for Arc<T> {
    fn lookup_mx(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<MxRecord>, MxLookupError>> + Send {
        (**self).lookup_mx(domain)
    }
}

/// MX lookups through the system DNS configuration.
#[derive(Clone)]
pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
}

impl DnsMxResolver {
    /// Creates a resolver from the system configuration.
    ///
    /// Falls back to the resolver library's default upstreams when the system
    /// configuration cannot be read.
    #[must_use]
    pub fn from_system_conf() -> Self {
        let (config, mut opts) = hickory_resolver::system_conf::read_system_conf()
            .unwrap_or_else(|e| {
                warn!(error = %e, "cannot read system DNS configuration, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            });
        opts.timeout = LOOKUP_TIMEOUT;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl MxResolver for DnsMxResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, MxLookupError> {
        let failed = |reason: String| MxLookupError {
            domain: domain.to_string(),
            reason,
        };

        let lookup = tokio::time::timeout(LOOKUP_TIMEOUT, self.resolver.mx_lookup(domain))
            .await
            .map_err(|_| failed(format!("timed out after {}s", LOOKUP_TIMEOUT.as_secs())))?
            .map_err(|e| failed(e.to_string()))?;

        Ok(lookup
            .iter()
            .map(|mx| MxRecord::new(mx.preference(), mx.exchange().to_utf8()))
            .collect())
    }
}

/// Known inbound hosts for domains whose MX lookup fails.
///
/// Built once; lookups never modify it.
#[derive(Debug, Clone)]
pub struct StaticMxTable {
    entries: HashMap<String, Vec<HostPort>>,
}

impl StaticMxTable {
    /// Creates the table of well-known consumer providers.
    #[must_use]
    pub fn builtin() -> Self {
        const PROVIDERS: &[(&str, &[&str])] = &[
            (
                "gmail.com",
                &["gmail-smtp-in.l.google.com", "alt1.gmail-smtp-in.l.google.com"],
            ),
            ("outlook.com", &["outlook-com.olc.protection.outlook.com"]),
            ("hotmail.com", &["hotmail-com.olc.protection.outlook.com"]),
            ("live.com", &["hotmail-com.olc.protection.outlook.com"]),
            ("yahoo.com", &["mta5.am0.yahoodns.net", "mta6.am0.yahoodns.net"]),
            ("qq.com", &["mx1.qq.com", "mx2.qq.com"]),
            (
                "163.com",
                &["163mx00.mxmail.netease.com", "163mx01.mxmail.netease.com"],
            ),
            (
                "126.com",
                &["126mx00.mxmail.netease.com", "126mx01.mxmail.netease.com"],
            ),
            ("sina.com", &["mx1.sina.com.cn", "mx2.sina.com.cn"]),
        ];

        let entries = PROVIDERS
            .iter()
            .map(|(domain, hosts)| {
                let hosts = hosts.iter().map(|h| HostPort::new(*h, SMTP_PORT)).collect();
                ((*domain).to_string(), hosts)
            })
            .collect();
        Self { entries }
    }

    /// Creates the built-in table with `extra` entries merged over it.
    ///
    /// Entries with no hosts are ignored.
    #[must_use]
    pub fn with_entries(extra: &HashMap<String, Vec<HostPort>>) -> Self {
        let mut table = Self::builtin();
        for (domain, hosts) in extra.iter().filter(|(_, hosts)| !hosts.is_empty()) {
            table.entries.insert(domain.to_ascii_lowercase(), hosts.clone());
        }
        table
    }

    /// Returns the hosts for `domain`, or `domain:25` then `domain:587`.
    #[must_use]
    pub fn candidates(&self, domain: &str) -> Vec<HostPort> {
        self.entries
            .get(&domain.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| vec![HostPort::new(domain, SMTP_PORT), HostPort::new(domain, 587)])
    }
}

impl Default for StaticMxTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Builds the ordered candidate list for `domain`.
///
/// MX records are sorted by preference, trailing dots are trimmed and port 25
/// is used. A failed lookup or an empty answer falls back to `table`.
pub async fn resolve_candidates<R: MxResolver>(
    resolver: &R,
    table: &StaticMxTable,
    domain: &str,
) -> Vec<HostPort> {
    match resolver.lookup_mx(domain).await {
        Ok(mut records) => {
            records.sort_by_key(|mx| mx.preference);
            let hosts: Vec<HostPort> = records
                .iter()
                .map(|mx| mx.exchange.trim_end_matches('.'))
                .filter(|host| !host.is_empty())
                .map(|host| HostPort::new(host, SMTP_PORT))
                .collect();
            if hosts.is_empty() {
                debug!(domain, "no MX records, using static table");
                table.candidates(domain)
            } else {
                hosts
            }
        }
        Err(e) => {
            debug!(domain, error = %e, "MX lookup failed, using static table");
            table.candidates(domain)
        }
    }
}
