// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// There is one subcommand, `check`, which validates a built site directory.
// Every flag maps onto a field of ValidatorConfig; `into_config` does that
// mapping so the rest of the program never looks at the CLI again.
//
// The CI flag can also come from the GITHUB_ACTIONS environment variable.
// clap reads it once at parse time; nothing else in the program reads the
// environment.
// =============================================================================

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::checker::{FilenameFallback, RetryPolicy};
use crate::config::{default_timeout, ProbePolicy, ValidatorConfig, DEFAULT_BASE_URL};
use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(
    name = "resource-guardian",
    version = "0.1.0",
    about = "Checks every resource a static website references, locally and on the live site",
    long_about = "resource-guardian reads the HTML documents of a built static site, extracts every \
                  stylesheet, script, image and link they reference, and checks that each one \
                  resolves on disk or is reachable on the deployed site. \
                  The exit code (0 clean, 1 non-critical failures, 2 critical failures) is meant for CI."
)]
pub struct Cli {
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the resources of a site directory
    ///
    /// Example: resource-guardian check ./_site --base-url https://example.github.io
    Check(CheckArgs),
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Root directory of the built site
    pub site_root: PathBuf,

    /// Live site that relative references are resolved against
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// CI mode: tolerate bot-blocking hosts, skip known blockers, no failure log
    #[arg(long, env = "GITHUB_ACTIONS", value_parser = parse_ci_flag, default_value = "false", num_args = 0..=1, default_missing_value = "true")]
    pub ci: bool,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Maximum references checked at once (1-64)
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Per-request timeout in seconds (default 12, or 8 in CI)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Extra attempts after a transport error
    #[arg(long, default_value_t = 1)]
    pub retries: u32,

    /// Base delay for retry backoff, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub backoff_ms: u64,

    /// Stop the run after this many seconds; unchecked references are reported
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Domains to skip in CI (replaces the default list; may be repeated)
    #[arg(long = "skip-domain")]
    pub skip_domains: Vec<String>,

    /// Probe the web even for references that resolved locally
    #[arg(long)]
    pub always_probe: bool,

    /// Do not search the tree for bare filenames that did not resolve
    #[arg(long)]
    pub no_filename_fallback: bool,

    /// Maximum directory depth of the filename search
    #[arg(long, default_value_t = 8)]
    pub fallback_depth: usize,

    /// Maximum failed resources listed in the report
    #[arg(long, default_value_t = 10)]
    pub sample_limit: usize,

    /// Maximum failed resources listed per type
    #[arg(long, default_value_t = 5)]
    pub samples_per_type: usize,

    /// Key files to smoke-test (replaces the default list; may be repeated)
    #[arg(long = "key-file")]
    pub key_files: Vec<String>,

    /// Failing key files make the run fail
    #[arg(long)]
    pub strict_key_files: bool,

    /// Directory for the failure log (outside CI)
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

// GITHUB_ACTIONS is "true" on GitHub runners; accept the usual spellings
fn parse_ci_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected true or false, got '{}'", other)),
    }
}

impl CheckArgs {
    pub fn into_config(self) -> Result<ValidatorConfig, ConfigError> {
        let mut config = ValidatorConfig::new(self.site_root, &self.base_url, self.ci)?;

        config.concurrency = self.concurrency.clamp(1, 64);
        config.request_timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| default_timeout(self.ci));
        config.retry = RetryPolicy {
            max_retries: self.retries,
            base_delay: Duration::from_millis(self.backoff_ms),
            ..RetryPolicy::default()
        };
        config.deadline = self.deadline_secs.map(Duration::from_secs);

        if !self.skip_domains.is_empty() {
            config.skip_domains = self
                .skip_domains
                .iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
        }

        if self.always_probe {
            config.probe_policy = ProbePolicy::Always;
        }
        config.filename_fallback = if self.no_filename_fallback {
            FilenameFallback::Disabled
        } else {
            FilenameFallback::UniqueMatch {
                max_depth: self.fallback_depth,
            }
        };

        config.sample_limit = self.sample_limit;
        config.samples_per_type = self.samples_per_type;
        if !self.key_files.is_empty() {
            config.key_files = self.key_files;
        }
        config.strict_key_files = self.strict_key_files;
        config.log_dir = self.log_dir;

        Ok(config)
    }
}


// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a separate CheckArgs struct?
//    - #[derive(clap::Args)] lets a subcommand's flags live in their own struct
//    - We can then give that struct methods, like into_config()
//
// 2. What does ArgAction::Count do?
//    - Each -v adds one, so -vv gives 2
//
// 3. Why is `ci` parsed by hand?
//    - With env = "GITHUB_ACTIONS" clap reads the variable as the flag's value
//    - num_args = 0..=1 keeps plain `--ci` working as a switch
// -----------------------------------------------------------------------------
