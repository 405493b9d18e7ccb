//! The three-stage pipeline: syntax, MX resolution, SMTP probe.
//!
//! [`Verifier::verify`] never fails; every path ends in a [`Verdict`].

mod types;

pub use types::{Reason, VerificationReport, Verdict, VerifyOptions};

use tracing::{debug, error, info, warn};

use crate::mx::{self, LookupMx, MxStatus, SystemResolver};
use crate::smtp_verify::{self, Connector, TcpConnector};
use crate::syntax;

pub struct Verifier<R = SystemResolver, C = TcpConnector> {
    resolver: R,
    connector: C,
    options: VerifyOptions,
}

impl Verifier {
    /// Production verifier: system DNS configuration and plain TCP.
    pub fn from_system_conf(options: VerifyOptions) -> Result<Self, mx::Error> {
        let resolver = SystemResolver::from_system_conf(options.dns_timeout())?;
        Ok(Self::new(resolver, TcpConnector, options))
    }
}

impl<R, C> Verifier<R, C>
where
    R: LookupMx,
    C: Connector,
{
    pub fn new(resolver: R, connector: C, options: VerifyOptions) -> Self {
        Self {
            resolver,
            connector,
            options,
        }
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    pub async fn verify(&self, email: &str) -> Verdict {
        self.inspect(email).await.verdict
    }

    /// Run the pipeline and keep MX records and the SMTP transcript.
    pub async fn inspect(&self, email: &str) -> VerificationReport {
        let report = self.run(email).await;
        info!(
            email,
            valid = report.verdict.valid(),
            reason = %report.verdict.reason(),
            "verification finished"
        );
        report
    }

    async fn run(&self, email: &str) -> VerificationReport {
        if !syntax::check(email) {
            debug!(email, "address rejected by syntax check");
            return VerificationReport::early(email, Reason::InvalidFormat);
        }
        let Some((_, domain)) = syntax::split_address(email) else {
            return VerificationReport::early(email, Reason::InvalidFormat);
        };

        let records =
            match mx::resolve_mx(&self.resolver, domain, self.options.dns_timeout()).await {
                Ok(MxStatus::Records(records)) => records,
                Ok(MxStatus::NoRecords) => {
                    debug!(domain, "domain has no MX records");
                    return VerificationReport::early(email, Reason::NoMxRecords);
                }
                Err(err) => {
                    warn!(domain, error = %err, "domain lookup failed");
                    return VerificationReport::early(email, Reason::DomainLookupFailed);
                }
            };

        debug!(domain, mx = records.len(), "probing mail exchangers");
        let probe =
            smtp_verify::probe(&self.connector, email, &records, &self.options.probe).await;
        let reason = Reason::from(&probe.outcome);

        VerificationReport {
            email: email.to_string(),
            verdict: Verdict::from(reason),
            mx_records: records,
            probe: Some(probe),
        }
    }
}

/// One-shot verification with the system resolver.
///
/// A resolver that cannot be initialised yields `DomainLookupFailed`.
pub async fn verify_email(email: &str, options: &VerifyOptions) -> Verdict {
    if !syntax::check(email) {
        return Verdict::from(Reason::InvalidFormat);
    }
    match Verifier::from_system_conf(options.clone()) {
        Ok(verifier) => verifier.verify(email).await,
        Err(err) => {
            error!(error = %err, "cannot initialise DNS resolver");
            Verdict::from(Reason::DomainLookupFailed)
        }
    }
}
