//! S3 Account Finder CLI
//!
//! Finds the AWS account that owns an S3 bucket by probing it under session
//! policies scoped to account ID prefixes.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{debug, LevelFilter};
use serde::Serialize;
use std::process::ExitCode;
use std::time::Duration;

use s3_account_finder_discovery::{
    AccountFinderService, AssumeRoleDescriptor, DiscoveryConfig, DiscoveryError, ServiceOptions,
    Target, DEFAULT_BASE_REGION, DEFAULT_SESSION_NAME,
};

const EXIT_FAILURE: u8 = 1;
const EXIT_NO_ACCESS: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "s3-account-finder",
    version,
    about = "Discover the AWS account ID that owns an S3 bucket",
    long_about = "Discover the AWS account ID that owns an S3 bucket.\n\n\
        The role is assumed repeatedly with session policies that only allow S3 access \
        to resources owned by accounts starting with a given prefix. Whether the bucket \
        stays reachable reveals the owner one digit at a time."
)]
struct Cli {
    /// ARN of the role to assume; it must be able to reach the bucket
    #[arg(long, env = "S3AF_ROLE_ARN")]
    role_arn: String,

    /// S3 bucket or bucket/key to test with (s3:// prefix optional)
    #[arg(long, env = "S3AF_PATH")]
    path: String,

    /// Role session name for the assumed sessions
    #[arg(long, default_value = DEFAULT_SESSION_NAME)]
    session_name: String,

    /// External ID required by the role's trust policy, if any
    #[arg(long, env = "S3AF_EXTERNAL_ID")]
    external_id: Option<String>,

    /// Region used to look up the bucket's region
    #[arg(long, default_value = DEFAULT_BASE_REGION)]
    base_region: String,

    /// Times to repeat a digit round in which no digit matched
    #[arg(long, default_value_t = 0)]
    round_retries: u32,

    /// Per-probe deadline in seconds (0 disables)
    #[arg(long, default_value_t = 30)]
    probe_timeout_secs: u64,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryReport<'a> {
    bucket: &'a str,
    key: &'a str,
    account_id: &'a str,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => exit_for_error(&err),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    // Reject bad input before touching AWS.
    let target = Target::parse(&cli.path).context("Invalid --path")?;

    let identity = AssumeRoleDescriptor::new(&cli.role_arn)
        .with_session_name(&cli.session_name)
        .with_external_id(cli.external_id.clone());

    let probe_timeout = (cli.probe_timeout_secs > 0)
        .then(|| Duration::from_secs(cli.probe_timeout_secs));
    let options = ServiceOptions {
        base_region: cli.base_region.clone(),
        discovery: DiscoveryConfig::new()
            .with_round_retries(cli.round_retries)
            .with_probe_timeout(probe_timeout),
    };
    debug!("Discovery options: {options:?}");

    let service = AccountFinderService::new(options)
        .await
        .context("Failed to initialize S3 Account Finder")?;

    eprintln!("Starting search (this can take a while)");
    let account = service
        .find_owner(&cli.path, &identity, |prefix| {
            eprintln!("Found digits so far: {prefix}");
        })
        .await?;

    if cli.json {
        let report = DiscoveryReport {
            bucket: target.bucket(),
            key: target.key(),
            account_id: account.as_str(),
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize result")?;
        println!("{json}");
    } else {
        println!("Bucket owner account ID: {account}");
    }
    Ok(())
}

fn exit_for_error(err: &anyhow::Error) -> ExitCode {
    eprintln!("Error: {err:#}");

    match err.downcast_ref::<DiscoveryError>() {
        Some(discovery) if discovery.is_no_access() => ExitCode::from(EXIT_NO_ACCESS),
        Some(discovery) => {
            if let Some(partial) = discovery.partial_account_id().filter(|p| !p.is_empty()) {
                eprintln!("Partial account ID: {partial}");
            }
            ExitCode::from(EXIT_FAILURE)
        }
        None => ExitCode::from(EXIT_FAILURE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from([
            "s3-account-finder",
            "--role-arn",
            "arn:aws:iam::111122223333:role/Prober",
            "--path",
            "s3://demo",
        ])
        .expect("should parse");
        assert_eq!(cli.session_name, "s3-account-finder");
        assert_eq!(cli.base_region, "us-east-1");
        assert_eq!(cli.round_retries, 0);
        assert_eq!(cli.probe_timeout_secs, 30);
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from([
            "s3-account-finder",
            "--role-arn",
            "arn",
            "--path",
            "demo",
            "-vv",
        ])
        .expect("should parse");
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_no_access_maps_to_exit_code() {
        let err = anyhow::Error::new(DiscoveryError::NoBaselineAccess {
            role_arn: "arn".to_string(),
            bucket: "demo".to_string(),
            outcome: s3_account_finder_discovery::AccessOutcome::NoMatch,
        });
        assert_eq!(exit_for_error(&err), ExitCode::from(EXIT_NO_ACCESS));

        let err = anyhow::Error::new(DiscoveryError::DigitNotFound {
            position: 3,
            prefix: "012".to_string(),
        })
        .context("wrapped");
        assert_eq!(exit_for_error(&err), ExitCode::from(EXIT_FAILURE));
    }

    #[test]
    fn test_report_json_field_names() {
        let report = DiscoveryReport {
            bucket: "demo",
            key: "",
            account_id: "123456789012",
        };
        let json = serde_json::to_string(&report).expect("serializable");
        assert!(json.contains("\"accountId\":\"123456789012\""));
    }
}
