use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::ResolverOpts;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::system_conf::read_system_conf;

use super::{Error, MxRecord, MxStatus};

/// Source of MX answers for a domain.
///
/// Implementations issue exactly one query. A NOERROR answer without any MX
/// record is reported as `Ok(vec![])`, every other failure as an [`Error`].
pub trait LookupMx: Send + Sync {
    fn lookup_mx(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<MxRecord>, Error>> + Send;
}

/// [`LookupMx`] backed by the system DNS configuration.
#[derive(Clone)]
pub struct SystemResolver {
    inner: TokioAsyncResolver,
}

impl SystemResolver {
    /// Build a resolver from the system configuration. Retries and caching
    /// are disabled and each upstream query is bounded by `timeout`.
    pub fn from_system_conf(timeout: Duration) -> Result<Self, Error> {
        let (config, opts) = read_system_conf().map_err(Error::resolver_init)?;
        Ok(Self {
            inner: TokioAsyncResolver::tokio(config, single_shot(opts, timeout)),
        })
    }
}

pub(crate) fn single_shot(mut opts: ResolverOpts, timeout: Duration) -> ResolverOpts {
    opts.timeout = timeout;
    opts.attempts = 1;
    opts.cache_size = 0;
    opts
}

/// Absolute form of `domain`, so the system `search` list is never applied.
pub(crate) fn fully_qualified(domain: &str) -> String {
    if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{domain}.")
    }
}

impl LookupMx for SystemResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, Error> {
        match self.inner.mx_lookup(fully_qualified(domain).as_str()).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| MxRecord::new(mx.preference(), mx.exchange().to_utf8()))
                .collect()),
            Err(err) if is_empty_answer(&err) => Ok(Vec::new()),
            Err(err) => Err(Error::lookup(err)),
        }
    }
}

fn is_empty_answer(err: &ResolveError) -> bool {
    matches!(
        err.kind(),
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NoError
    )
}

/// Lookup MX records for `domain`, bounded by `timeout`.
///
/// The resulting [`MxStatus`] holds the records in ascending preference;
/// equal preferences keep the resolver's order.
pub async fn resolve_mx<R>(resolver: &R, domain: &str, timeout: Duration) -> Result<MxStatus, Error>
where
    R: LookupMx,
{
    if domain.is_empty() {
        return Err(Error::EmptyDomain);
    }

    let records = match tokio::time::timeout(timeout, resolver.lookup_mx(domain)).await {
        Ok(Ok(records)) => records,
        Ok(Err(err)) => {
            warn!(%domain, error = %err, "MX lookup failed");
            return Err(err);
        }
        Err(_) => {
            warn!(%domain, ?timeout, "MX lookup timed out");
            return Err(Error::Timeout {
                domain: domain.to_string(),
                timeout,
            });
        }
    };

    let records = order_records(records);
    debug!(%domain, count = records.len(), "MX lookup finished");

    if records.is_empty() {
        Ok(MxStatus::NoRecords)
    } else {
        Ok(MxStatus::Records(records))
    }
}

pub(crate) fn order_records(records: Vec<MxRecord>) -> Vec<MxRecord> {
    let mut seen = HashSet::new();
    let mut out: Vec<MxRecord> = records
        .into_iter()
        .map(|record| MxRecord::new(record.preference, normalize_exchange(&record.exchange)))
        // null MX (RFC 7505)
        .filter(|record| !record.exchange.is_empty())
        .filter(|record| seen.insert(record.clone()))
        .collect();
    out.sort_by_key(|record| record.preference);
    out
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}
