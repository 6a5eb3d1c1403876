mod cache;
mod config;
mod credentials;
mod flow;
mod instances;
mod output;
mod selector;
mod session;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use cache::FileCacheStore;
use config::Config;
use flow::Terminal;
use instances::Ec2InstanceSource;
use output::print_debug;

#[derive(Parser)]
#[command(name = "aws-ssm-picker")]
#[command(about = "Pick an EC2 instance from a filterable list and open an SSM session to it")]
#[command(version)]
pub struct Cli {
    /// AWS profile whose instances are listed and cached
    #[arg(short = 'p', long = "profile", env = "AWS_PROFILE", default_value = "default")]
    pub profile: String,

    /// AWS region to list instances in and connect through
    #[arg(short = 'r', long = "region", env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Instance cache file (defaults to .aws_ec2_cache.json next to the binary)
    #[arg(long = "cache-file", env = "SSM_PICKER_CACHE_FILE")]
    pub cache_file: Option<PathBuf>,

    /// Hours a cached instance list stays fresh
    #[arg(long = "cache-ttl-hours", env = "SSM_PICKER_CACHE_TTL_HOURS", default_value_t = 24)]
    pub cache_ttl_hours: u64,

    /// Ignore the cached instance list and fetch from AWS
    #[arg(long = "refresh")]
    pub refresh: bool,

    /// AWS CLI executable used to start the session
    #[arg(long = "aws-cli", env = "SSM_PICKER_AWS_CLI", default_value = "aws")]
    pub aws_cli: String,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;

    print_debug(&format!("Profile: {}", config.profile), config.verbose);
    print_debug(
        &format!("Instance cache: {}", config.cache_path.display()),
        config.verbose,
    );
    print_debug(
        &format!("SSO cache: {}", config.sso_cache_path.display()),
        config.verbose,
    );

    let source = Ec2InstanceSource::new(&config).await;
    let store = FileCacheStore::new(&config.cache_path);

    let outcome = flow::run(&config, &source, &store, &Terminal).await?;
    if outcome.exit_code() != 0 {
        std::process::exit(outcome.exit_code());
    }

    Ok(())
}
