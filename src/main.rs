//! dnsclaim - verify a domain-ownership claim from the command line.
//!
//! Usage:
//!   dnsclaim <domain> [lookup_key]
//!   dnsclaim --config verifier.toml <domain>

use anyhow::Context;
use console::style;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dnsclaim::{ClaimVerifier, LogLevel, VerifierConfig, DEFAULT_LOOKUP_KEY};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let mut args = std::env::args().skip(1);
    let mut config = VerifierConfig::default();
    let mut positional: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config requires a path")?;
                config = VerifierConfig::load(&path)
                    .with_context(|| format!("failed to load config from {path}"))?;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("dnsclaim {}", dnsclaim::VERSION);
                return Ok(());
            }
            _ => positional.push(arg),
        }
    }

    let Some(domain) = positional.first() else {
        print_help();
        std::process::exit(2);
    };
    let lookup_key = positional
        .get(1)
        .map_or(DEFAULT_LOOKUP_KEY, String::as_str);

    let verifier = ClaimVerifier::new(config).context("failed to build verifier")?;
    let report = verifier.verify(domain, lookup_key).await;

    for entry in &report.logs {
        let line = match entry.level {
            LogLevel::Info => style(entry.content.as_str()).dim(),
            LogLevel::Success => style(entry.content.as_str()).green(),
            LogLevel::Warning => style(entry.content.as_str()).yellow(),
            LogLevel::Error => style(entry.content.as_str()).red(),
        };
        println!("{line}");
    }

    std::process::exit(i32::from(!report.success));
}

fn print_help() {
    println!("dnsclaim v{}", dnsclaim::VERSION);
    println!("Verify a wallet-signed domain-ownership claim published in DNS.");
    println!();
    println!("USAGE:");
    println!("    dnsclaim [OPTIONS] <domain> [lookup_key]");
    println!();
    println!("ARGS:");
    println!("    <domain>        Domain whose claim to verify");
    println!("    [lookup_key]    Claim key, queried at aqua._<key>.<domain> (default: wallet)");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>   Load verifier settings from a TOML file");
    println!("    -h, --help        Print help");
    println!("    -V, --version     Print version");
    println!();
    println!("EXAMPLES:");
    println!("    dnsclaim example.com");
    println!("    dnsclaim --config verifier.toml example.com wallet");
}
