use chrono::NaiveDate;
use paylink_core::{
    Account, AccountId, LedgerError, LedgerWriter, Payee, PayeeId, Transaction, TransactionId,
    TransactionPatch,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::match_engine::Candidate;

const NOTES_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePreference {
    #[default]
    Outflow,
    Inflow,
    Min,
    Max,
}

impl DatePreference {
    pub fn choose(self, outflow: NaiveDate, inflow: NaiveDate) -> NaiveDate {
        match self {
            DatePreference::Outflow => outflow,
            DatePreference::Inflow => inflow,
            DatePreference::Min => outflow.min(inflow),
            DatePreference::Max => outflow.max(inflow),
        }
    }
}

impl std::str::FromStr for DatePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "outflow" => Ok(DatePreference::Outflow),
            "inflow" => Ok(DatePreference::Inflow),
            "min" => Ok(DatePreference::Min),
            "max" => Ok(DatePreference::Max),
            other => Err(format!("Unknown date preference: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    pub tag: Option<String>,
    pub date_preference: DatePreference,
    /// Leave the remaining candidates untouched after the first failure.
    pub stop_on_error: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("No transfer payee exists for account {account}")]
    MissingTransferPayee { account: String },
    #[error("Outflow and inflow both belong to account {0}")]
    SameAccount(AccountId),
    #[error("Transaction not found: {0}")]
    UnknownTransaction(TransactionId),
}

/// The two symmetric patches that turn a candidate into a ledger transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkPlan {
    pub outflow_id: TransactionId,
    pub inflow_id: TransactionId,
    pub outflow_update: TransactionPatch,
    pub inflow_update: TransactionPatch,
    pub chosen_date: NaiveDate,
    pub merged_notes: Option<String>,
    /// Written onto the outflow: the transfer payee of the inflow's account.
    pub outflow_transfer_payee_id: PayeeId,
    /// Written onto the inflow: the transfer payee of the outflow's account.
    pub inflow_transfer_payee_id: PayeeId,
}

pub fn transfer_payee_for<'a>(payees: &'a [Payee], account: &AccountId) -> Option<&'a Payee> {
    payees
        .iter()
        .find(|p| p.transfer_account_id.as_ref() == Some(account))
}

fn account_label(accounts: &[Account], id: &AccountId) -> String {
    accounts
        .iter()
        .find(|a| &a.id == id)
        .map(|a| format!("{} ({})", a.name, a.id))
        .unwrap_or_else(|| id.to_string())
}

pub fn build_link_plan(
    outflow: &Transaction,
    inflow: &Transaction,
    payees: &[Payee],
    accounts: &[Account],
    options: &LinkOptions,
) -> Result<LinkPlan, LinkError> {
    if outflow.account == inflow.account {
        return Err(LinkError::SameAccount(outflow.account.clone()));
    }

    let to_inflow_account = transfer_payee_for(payees, &inflow.account).ok_or_else(|| {
        LinkError::MissingTransferPayee {
            account: account_label(accounts, &inflow.account),
        }
    })?;
    let to_outflow_account = transfer_payee_for(payees, &outflow.account).ok_or_else(|| {
        LinkError::MissingTransferPayee {
            account: account_label(accounts, &outflow.account),
        }
    })?;

    let chosen_date = options.date_preference.choose(outflow.date, inflow.date);
    let merged_notes = merge_notes(
        outflow.notes.as_deref(),
        inflow.notes.as_deref(),
        options.tag.as_deref(),
    );

    let outflow_update = TransactionPatch {
        payee: Some(to_inflow_account.id.clone()),
        transfer_id: Some(inflow.id.clone()),
        date: Some(chosen_date),
        notes: merged_notes.clone(),
    };
    let inflow_update = TransactionPatch {
        payee: Some(to_outflow_account.id.clone()),
        transfer_id: Some(outflow.id.clone()),
        date: Some(chosen_date),
        notes: merged_notes.clone(),
    };

    Ok(LinkPlan {
        outflow_id: outflow.id.clone(),
        inflow_id: inflow.id.clone(),
        outflow_update,
        inflow_update,
        chosen_date,
        merged_notes,
        outflow_transfer_payee_id: to_inflow_account.id.clone(),
        inflow_transfer_payee_id: to_outflow_account.id.clone(),
    })
}

/// Combine both sides' notes and append `tag` once.
///
/// Blank notes count as absent. Equal notes collapse, a note contained in
/// the other yields the longer one, anything else is joined with `" | "`.
pub fn merge_notes(outflow: Option<&str>, inflow: Option<&str>, tag: Option<&str>) -> Option<String> {
    let outflow = outflow.map(str::trim).filter(|s| !s.is_empty());
    let inflow = inflow.map(str::trim).filter(|s| !s.is_empty());

    let merged = match (outflow, inflow) {
        (None, None) => None,
        (Some(a), None) | (None, Some(a)) => Some(a.to_string()),
        (Some(a), Some(b)) if a == b => Some(a.to_string()),
        (Some(a), Some(b)) if a.contains(b) => Some(a.to_string()),
        (Some(a), Some(b)) if b.contains(a) => Some(b.to_string()),
        (Some(a), Some(b)) => Some(format!("{a}{NOTES_SEPARATOR}{b}")),
    };

    let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) else {
        return merged;
    };
    match merged {
        Some(notes) if has_tag(&notes, tag) => Some(notes),
        Some(notes) => Some(format!("{notes} {tag}")),
        None => Some(tag.to_string()),
    }
}

/// The tag counts as present only as a whole whitespace-delimited run.
fn has_tag(notes: &str, tag: &str) -> bool {
    notes.match_indices(tag).any(|(start, _)| {
        let end = start + tag.len();
        let before_ok = notes[..start].chars().next_back().map_or(true, char::is_whitespace);
        let after_ok = notes[end..].chars().next().map_or(true, char::is_whitespace);
        before_ok && after_ok
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Outflow,
    Inflow,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Outflow => write!(f, "outflow"),
            Side::Inflow => write!(f, "inflow"),
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("Updating {side} transaction {transaction} failed: {source}")]
pub struct ApplyError {
    pub side: Side,
    pub transaction: TransactionId,
    pub source: LedgerError,
}

/// Write the outflow patch, then the inflow patch. A failure on the inflow
/// leaves the outflow written; re-running the same pair converges.
pub async fn apply_plan<L: LedgerWriter>(ledger: &L, plan: &LinkPlan) -> Result<(), ApplyError> {
    ledger
        .update_transaction(&plan.outflow_id, &plan.outflow_update)
        .await
        .map_err(|source| ApplyError {
            side: Side::Outflow,
            transaction: plan.outflow_id.clone(),
            source,
        })?;
    ledger
        .update_transaction(&plan.inflow_id, &plan.inflow_update)
        .await
        .map_err(|source| ApplyError {
            side: Side::Inflow,
            transaction: plan.inflow_id.clone(),
            source,
        })?;
    tracing::info!(
        outflow = %plan.outflow_id,
        inflow = %plan.inflow_id,
        date = %plan.chosen_date,
        "linked transfer"
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub enum LinkOutcome {
    Linked(LinkPlan),
    PlanFailed(LinkError),
    ApplyFailed(ApplyError),
    Skipped,
}

impl LinkOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, LinkOutcome::PlanFailed(_) | LinkOutcome::ApplyFailed(_))
    }
}

/// Plan and apply each candidate in order, one at a time. Outcomes line up
/// index-for-index with `candidates`.
pub async fn link_candidates<L: LedgerWriter>(
    ledger: &L,
    candidates: &[Candidate],
    payees: &[Payee],
    accounts: &[Account],
    options: &LinkOptions,
) -> Vec<LinkOutcome> {
    let mut outcomes = Vec::with_capacity(candidates.len());
    let mut halted = false;

    for candidate in candidates {
        if halted {
            outcomes.push(LinkOutcome::Skipped);
            continue;
        }
        let outcome = match build_link_plan(&candidate.outflow, &candidate.inflow, payees, accounts, options) {
            Ok(plan) => match apply_plan(ledger, &plan).await {
                Ok(()) => LinkOutcome::Linked(plan),
                Err(e) => {
                    tracing::warn!("{e}");
                    LinkOutcome::ApplyFailed(e)
                }
            },
            Err(e) => {
                tracing::warn!(
                    outflow = %candidate.outflow.id,
                    inflow = %candidate.inflow.id,
                    "cannot plan transfer: {e}"
                );
                LinkOutcome::PlanFailed(e)
            }
        };
        halted = options.stop_on_error && outcome.is_failure();
        outcomes.push(outcome);
    }

    outcomes
}

/// Look up an explicitly named pair, bypassing matching entirely.
pub fn find_pair<'a>(
    transactions: &'a [Transaction],
    outflow_id: &TransactionId,
    inflow_id: &TransactionId,
) -> Result<(&'a Transaction, &'a Transaction), LinkError> {
    let find = |id: &TransactionId| {
        transactions
            .iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| LinkError::UnknownTransaction(id.clone()))
    };
    Ok((find(outflow_id)?, find(inflow_id)?))
}

#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub pair: Option<(TransactionId, TransactionId)>,
    pub limit: Option<usize>,
}

/// Narrow matcher output to an explicit pair and/or the first `limit` entries,
/// keeping the matcher's order.
pub fn select_candidates(candidates: Vec<Candidate>, filter: &CandidateFilter) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| match &filter.pair {
            Some((out, inf)) => &c.outflow.id == out && &c.inflow.id == inf,
            None => true,
        })
        .take(filter.limit.unwrap_or(usize::MAX))
        .collect()
}
