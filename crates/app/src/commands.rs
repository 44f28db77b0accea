use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use paylink_core::LedgerSnapshot;
use paylink_storage::SqliteLedger;
use paylink_transfer::{
    apply_plan, build_link_plan, find_pair, link_candidates, select_candidates, CandidateFilter,
    LinkOutcome, TransferConfig, TransferMatcher,
};
use serde::Serialize;

use crate::cli::{Command, MatchArgs, PairArg, SourceArgs};
use crate::report;

pub async fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Import { db, snapshot } => import(&db, &snapshot).await,
        Command::Match {
            source,
            matching,
            explain,
            json,
        } => match_candidates(&source, &matching, explain, json).await,
        Command::Link {
            db,
            matching,
            pair,
            limit,
            tag,
            date_preference,
            stop_on_error,
            dry_run,
            json,
        } => {
            let mut config = load_config(&matching)?;
            if tag.is_some() {
                config.link.tag = tag;
            }
            if let Some(preference) = date_preference {
                config.link.date_preference = preference;
            }
            config.link.stop_on_error |= stop_on_error;
            let request = LinkRequest {
                pair,
                limit,
                dry_run,
                json,
            };
            link(&db, &config, request).await
        }
        Command::Export { db, out } => export(&db, out.as_deref()).await,
    }
}

fn read_snapshot_file(path: &Path) -> anyhow::Result<LedgerSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    LedgerSnapshot::from_json_str(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
}

async fn load_source(source: &SourceArgs) -> anyhow::Result<LedgerSnapshot> {
    match (&source.db, &source.snapshot) {
        (Some(db), _) => {
            let pool = paylink_storage::create_db(db)
                .await
                .with_context(|| format!("opening ledger {}", db.display()))?;
            Ok(paylink_storage::load_snapshot(&pool).await?)
        }
        (None, Some(snapshot)) => read_snapshot_file(snapshot),
        (None, None) => bail!("either --db or --snapshot is required"),
    }
}

fn load_config(matching: &MatchArgs) -> anyhow::Result<TransferConfig> {
    let file = match &matching.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Some(TransferConfig::from_toml(&raw)?)
        }
        None => None,
    };
    Ok(matching.resolve(file))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn import(db: &Path, snapshot: &Path) -> anyhow::Result<ExitCode> {
    let snapshot = read_snapshot_file(snapshot)?;
    let pool = paylink_storage::create_db(db)
        .await
        .with_context(|| format!("opening ledger {}", db.display()))?;
    paylink_storage::import_snapshot(&pool, &snapshot).await?;
    println!(
        "Imported {} account(s), {} payee(s), {} transaction(s) into {}",
        snapshot.accounts.len(),
        snapshot.payees.len(),
        snapshot.transactions.len(),
        db.display()
    );
    Ok(ExitCode::SUCCESS)
}

async fn export(db: &Path, out: Option<&Path>) -> anyhow::Result<ExitCode> {
    let pool = paylink_storage::create_db(db)
        .await
        .with_context(|| format!("opening ledger {}", db.display()))?;
    let json = paylink_storage::load_snapshot(&pool).await?.to_json_string()?;
    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing snapshot {}", path.display()))?;
            tracing::info!(path = %path.display(), "snapshot exported");
        }
        None => println!("{json}"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn match_candidates(
    source: &SourceArgs,
    matching: &MatchArgs,
    explain: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let config = load_config(matching)?;
    let snapshot = load_source(source).await?;
    let matcher = TransferMatcher::new(config.matching)?;
    let candidates = matcher.find_candidates(&snapshot.transactions, &snapshot.accounts);

    if json {
        print_json(&candidates)?;
    } else {
        print!("{}", report::candidates_text(&candidates, &snapshot.accounts));
        if explain {
            let scored = matcher.score_candidates(&snapshot.transactions, &snapshot.accounts);
            print!("{}", report::rejected_text(&scored, &snapshot.accounts));
        }
    }
    Ok(ExitCode::SUCCESS)
}

struct LinkRequest {
    pair: Option<PairArg>,
    limit: Option<usize>,
    dry_run: bool,
    json: bool,
}

async fn link(db: &Path, config: &TransferConfig, request: LinkRequest) -> anyhow::Result<ExitCode> {
    let pool = paylink_storage::create_db(db)
        .await
        .with_context(|| format!("opening ledger {}", db.display()))?;
    let snapshot = paylink_storage::load_snapshot(&pool).await?;
    let ledger = SqliteLedger::new(pool);

    if let Some(pair) = &request.pair {
        return link_explicit_pair(&ledger, &snapshot, config, pair, &request).await;
    }

    let matcher = TransferMatcher::new(config.matching.clone())?;
    let candidates = select_candidates(
        matcher.find_candidates(&snapshot.transactions, &snapshot.accounts),
        &CandidateFilter {
            pair: None,
            limit: request.limit,
        },
    );

    if request.dry_run {
        let plans: Vec<_> = candidates
            .iter()
            .map(|c| build_link_plan(&c.outflow, &c.inflow, &snapshot.payees, &snapshot.accounts, &config.link))
            .collect();
        if request.json {
            print_json(&report::plan_records(&candidates, &plans))?;
        } else {
            for (c, plan) in candidates.iter().zip(&plans) {
                match plan {
                    Ok(plan) => print!("plan     {}", report::plan_text(plan)),
                    Err(e) => println!("failed   {} -> {}: {e}", c.outflow.id, c.inflow.id),
                }
            }
        }
        let failed = plans.iter().any(Result::is_err);
        return Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS });
    }

    let outcomes = link_candidates(
        &ledger,
        &candidates,
        &snapshot.payees,
        &snapshot.accounts,
        &config.link,
    )
    .await;

    if request.json {
        print_json(&report::outcome_records(&candidates, &outcomes))?;
    } else {
        print!("{}", report::outcomes_text(&candidates, &outcomes));
    }

    if outcomes.iter().any(LinkOutcome::is_failure) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn link_explicit_pair(
    ledger: &SqliteLedger,
    snapshot: &LedgerSnapshot,
    config: &TransferConfig,
    pair: &PairArg,
    request: &LinkRequest,
) -> anyhow::Result<ExitCode> {
    let (outflow, inflow) = find_pair(&snapshot.transactions, &pair.outflow, &pair.inflow)?;
    let plan = build_link_plan(outflow, inflow, &snapshot.payees, &snapshot.accounts, &config.link)?;

    if !request.dry_run {
        apply_plan(ledger, &plan).await?;
    }
    if request.json {
        let record = if request.dry_run {
            report::OutcomeRecord::Planned { plan: &plan }
        } else {
            report::OutcomeRecord::Linked { plan: &plan }
        };
        print_json(&[record])?;
    } else {
        let label = if request.dry_run { "plan    " } else { "linked  " };
        print!("{label} {}", report::plan_text(&plan));
    }
    Ok(ExitCode::SUCCESS)
}
