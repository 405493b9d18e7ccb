use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mailprobe::{SmtpProbeOptions, VerifyOptions};

#[derive(Parser)]
#[command(name = "mailprobe-cli", version, about = "Check e-mail addresses from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,

    /// read addresses from stdin, one per line
    #[arg(long)]
    pub stdin: bool,

    /// output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    pub format: OutputFormat,

    /// print the SMTP transcript (human format)
    #[arg(long, global = true)]
    pub transcript: bool,

    /// log progress to stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub probe: ProbeArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

#[derive(Subcommand)]
pub enum Commands {
    /// run the full check on one address
    Verify { email: String },
    /// list the mail exchangers of a domain
    Mx { domain: String },
}

#[derive(Args)]
pub struct ProbeArgs {
    /// name sent with EHLO/HELO
    #[arg(long, global = true)]
    pub helo: Option<String>,

    /// MAIL FROM envelope sender
    #[arg(long = "from", global = true)]
    pub mail_from: Option<String>,

    /// deadline of the whole SMTP probe (ms)
    #[arg(long = "timeout", global = true)]
    pub timeout_ms: Option<u64>,

    /// TCP connect timeout per host (ms)
    #[arg(long = "connect-timeout", global = true)]
    pub connect_timeout_ms: Option<u64>,

    /// DNS lookup timeout (ms)
    #[arg(long = "dns-timeout", global = true)]
    pub dns_timeout_ms: Option<u64>,

    /// maximum number of MX hosts to try
    #[arg(long = "max-mx", global = true)]
    pub max_mx: Option<usize>,

    /// SMTP port
    #[arg(long, global = true)]
    pub port: Option<u16>,
}

impl ProbeArgs {
    pub fn verify_options(&self) -> Result<VerifyOptions> {
        let mut probe = SmtpProbeOptions::default();
        if let Some(helo) = &self.helo {
            probe.helo_domain = helo.clone();
        }
        if let Some(from) = &self.mail_from {
            probe.mail_from = from.clone();
        }
        if let Some(timeout) = self.timeout_ms {
            probe.timeout_ms = timeout;
            probe.command_timeout_ms = probe.command_timeout_ms.min(timeout);
        }
        if let Some(timeout) = self.connect_timeout_ms {
            probe.connect_timeout_ms = timeout;
        }
        if let Some(max_mx) = self.max_mx {
            probe.max_mx = max_mx;
        }
        if let Some(port) = self.port {
            probe.port = port;
        }

        let mut options = VerifyOptions {
            probe,
            ..VerifyOptions::default()
        };
        if let Some(timeout) = self.dns_timeout_ms {
            options.dns_timeout_ms = timeout;
        }

        if options.probe.timeout_ms == 0
            || options.probe.connect_timeout_ms == 0
            || options.dns_timeout_ms == 0
        {
            bail!("timeouts must be greater than zero");
        }
        if options.probe.max_mx == 0 {
            bail!("--max-mx must be at least 1");
        }
        Ok(options)
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "mailprobe=warn",
            1 => "mailprobe=debug",
            _ => "mailprobe=trace",
        }
    }
}
