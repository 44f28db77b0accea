use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use paylink_core::{AccountId, TransactionId};
use paylink_transfer::{DatePreference, MatchOptions, TransferConfig};

/// Find credit card payments in a ledger and link them as transfers.
#[derive(Parser, Debug)]
#[command(name = "paylink", version)]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a JSON ledger snapshot into a SQLite ledger file
    Import {
        #[arg(long)]
        db: PathBuf,
        /// Snapshot with `accounts`, `payees` and `transactions` arrays
        snapshot: PathBuf,
    },

    /// Print ranked transfer candidates without changing anything
    Match {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        matching: MatchArgs,
        /// Also list rejected pairs with their reasons
        #[arg(long)]
        explain: bool,
        #[arg(long)]
        json: bool,
    },

    /// Link candidates, or one explicit pair, as transfers in a SQLite ledger
    Link {
        #[arg(long)]
        db: PathBuf,
        #[command(flatten)]
        matching: MatchArgs,
        /// Link exactly this pair, given as OUTFLOW_ID:INFLOW_ID, skipping matching
        #[arg(long, value_parser = parse_pair)]
        pair: Option<PairArg>,
        /// Link at most this many candidates, best first
        #[arg(long)]
        limit: Option<usize>,
        /// Tag appended to the merged notes of both sides
        #[arg(long)]
        tag: Option<String>,
        /// Which date the linked pair keeps: outflow, inflow, min or max
        #[arg(long)]
        date_preference: Option<DatePreference>,
        /// Leave the remaining candidates untouched after the first failure
        #[arg(long)]
        stop_on_error: bool,
        /// Print the plans without writing them
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },

    /// Write a SQLite ledger back out as a JSON snapshot
    Export {
        #[arg(long)]
        db: PathBuf,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// SQLite ledger file
    #[arg(long, required_unless_present = "snapshot", conflicts_with = "snapshot")]
    pub db: Option<PathBuf>,
    /// JSON ledger snapshot
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// TOML file with [match] and [link] tables
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Maximum days between the two sides of a payment
    #[arg(long)]
    pub window_days: Option<u32>,
    /// Minimum score in [0, 1] for a pair to be accepted
    #[arg(long)]
    pub min_score: Option<f64>,
    /// Treat this account id as a credit card (repeatable)
    #[arg(long = "cc-account")]
    pub cc_accounts: Vec<String>,
    /// Treat accounts whose name matches this pattern as credit cards
    #[arg(long)]
    pub cc_name_regex: Option<String>,
}

impl MatchArgs {
    /// Flags win over file values.
    pub fn apply_to(&self, options: &mut MatchOptions) {
        if let Some(window_days) = self.window_days {
            options.window_days = window_days;
        }
        if let Some(min_score) = self.min_score {
            options.min_score = min_score;
        }
        if !self.cc_accounts.is_empty() {
            options.credit_card_account_ids = self.cc_accounts.iter().map(AccountId::new).collect();
        }
        if let Some(pattern) = &self.cc_name_regex {
            options.credit_card_account_name_regex = Some(pattern.clone());
        }
    }

    pub fn resolve(&self, file: Option<TransferConfig>) -> TransferConfig {
        let mut config = file.unwrap_or_default();
        self.apply_to(&mut config.matching);
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairArg {
    pub outflow: TransactionId,
    pub inflow: TransactionId,
}

pub fn parse_pair(value: &str) -> Result<PairArg, String> {
    let (outflow, inflow) = value
        .split_once(':')
        .ok_or_else(|| "pair must look like OUTFLOW_ID:INFLOW_ID".to_string())?;
    let (outflow, inflow) = (outflow.trim(), inflow.trim());
    if outflow.is_empty() || inflow.is_empty() {
        return Err("pair must name both transaction ids".to_string());
    }
    if outflow == inflow {
        return Err("pair must name two different transactions".to_string());
    }
    Ok(PairArg {
        outflow: TransactionId::new(outflow),
        inflow: TransactionId::new(inflow),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_pair_accepts_two_ids() {
        let pair = parse_pair("abc-1:def-2").unwrap();
        assert_eq!(pair.outflow, TransactionId::new("abc-1"));
        assert_eq!(pair.inflow, TransactionId::new("def-2"));
    }

    #[test]
    fn parse_pair_rejects_malformed_values() {
        assert!(parse_pair("abc").is_err());
        assert!(parse_pair(":def").is_err());
        assert!(parse_pair("abc:abc").is_err());
    }

    #[test]
    fn match_requires_a_source() {
        assert!(Cli::try_parse_from(["paylink", "match"]).is_err());
        assert!(Cli::try_parse_from(["paylink", "match", "--db", "a.db", "--snapshot", "b.json"]).is_err());
        assert!(Cli::try_parse_from(["paylink", "match", "--snapshot", "b.json"]).is_ok());
    }

    #[test]
    fn link_parses_date_preference_and_pair() {
        let cli = Cli::try_parse_from([
            "paylink",
            "link",
            "--db",
            "ledger.db",
            "--pair",
            "o1:i1",
            "--date-preference",
            "max",
            "--tag",
            "#cc",
        ])
        .unwrap();
        match cli.command {
            Command::Link {
                pair,
                date_preference,
                tag,
                ..
            } => {
                assert_eq!(pair.unwrap().inflow, TransactionId::new("i1"));
                assert_eq!(date_preference, Some(DatePreference::Max));
                assert_eq!(tag.as_deref(), Some("#cc"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn export_takes_optional_output() {
        let cli = Cli::try_parse_from(["paylink", "export", "--db", "ledger.db"]).unwrap();
        assert!(matches!(cli.command, Command::Export { out: None, .. }));
        assert!(Cli::try_parse_from(["paylink", "export"]).is_err());
    }

    #[test]
    fn flags_override_file_options() {
        let args = MatchArgs {
            config: None,
            window_days: Some(7),
            min_score: None,
            cc_accounts: vec!["visa".to_string()],
            cc_name_regex: None,
        };
        let file = TransferConfig::from_toml("[match]\nwindow_days = 2\nmin_score = 0.9").unwrap();
        let config = args.resolve(Some(file));
        assert_eq!(config.matching.window_days, 7);
        assert_eq!(config.matching.min_score, 0.9);
        assert_eq!(config.matching.credit_card_account_ids, vec![AccountId::new("visa")]);
    }
}
