//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "athlethia",
    about = "Athlethia - check links for scams and phishing",
    version
)]
pub struct Args {
    /// Config file (defaults to the XDG config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides the config file)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan one or more links
    Scan {
        /// Links to check
        #[arg(required = true)]
        targets: Vec<String>,

        /// Caller tag stored with the scan
        #[arg(long, default_value = "cli")]
        source: String,
    },

    /// Report a link or domain as a scam
    Report {
        /// Link or domain to report
        target: String,

        /// Reporter tag
        #[arg(long, default_value = "cli")]
        reporter: String,
    },

    /// Mark a domain as a confirmed scam
    Confirm {
        /// Link or domain to confirm
        target: String,

        /// Category, e.g. phishing, fake_shop, crypto_scam
        #[arg(long, default_value = "phishing")]
        scam_type: String,
    },

    /// Show detection statistics
    Stats,

    /// Show recent scans
    History {
        /// Number of scans to show
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Only the latest scan of this link
        #[arg(long)]
        url: Option<String>,
    },

    /// Show the community reports filed against a domain
    Reports {
        /// Link or domain
        target: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_scan() {
        let args = Args::try_parse_from([
            "athlethia",
            "--json",
            "scan",
            "paypa1.com",
            "http://192.168.1.1/login",
        ])
        .expect("valid arguments");
        assert!(args.json);
        match args.command {
            Command::Scan { targets, source } => {
                assert_eq!(targets.len(), 2);
                assert_eq!(source, "cli");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_scan_requires_target() {
        assert!(Args::try_parse_from(["athlethia", "scan"]).is_err());
    }
}
