mod args;
mod output;

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use mailprobe::{SystemResolver, Verifier, resolve_mx};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Commands};

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_filter());
    let options = cli.probe.verify_options()?;

    let emails: Vec<String> = if cli.stdin {
        let mut emails = Vec::new();
        for line in io::stdin().lock().lines() {
            let line = line.context("read stdin")?;
            let email = line.trim();
            if !email.is_empty() {
                emails.push(email.to_string());
            }
        }
        emails
    } else {
        match &cli.cmd {
            Some(Commands::Verify { email }) => vec![email.clone()],
            Some(Commands::Mx { domain }) => {
                let resolver = SystemResolver::from_system_conf(options.dns_timeout())?;
                let status = resolve_mx(&resolver, domain, options.dns_timeout())
                    .await
                    .with_context(|| format!("MX lookup for {domain}"))?;
                let records = status.records();
                output::write_mx(domain, records, cli.format)?;
                // codes: 0 records, 2 none, 1 fatal
                if records.is_empty() {
                    std::process::exit(2);
                }
                return Ok(());
            }
            None => {
                Cli::clap_command().print_help()?;
                println!();
                return Ok(());
            }
        }
    };

    let verifier = Verifier::from_system_conf(options).context("initialise DNS resolver")?;
    let mut reports = Vec::with_capacity(emails.len());
    for email in &emails {
        reports.push(verifier.inspect(email).await);
    }

    output::write_reports(&reports, cli.format, cli.transcript)?;

    // codes: 0 all valid, 2 any invalid, 1 fatal
    if output::any_invalid(&reports) {
        std::process::exit(2);
    }
    Ok(())
}
