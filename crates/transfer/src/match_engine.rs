use std::collections::{HashMap, HashSet};

use paylink_core::{Account, AccountId, Transaction, TransactionId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::{AccountIndex, CardConstraints};
use crate::scoring::{score_pair, PairScore, Reason, ScoringContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    pub window_days: u32,
    pub min_score: f64,
    pub credit_card_account_ids: Vec<AccountId>,
    pub credit_card_account_name_regex: Option<String>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            window_days: 3,
            min_score: 0.7,
            credit_card_account_ids: Vec::new(),
            credit_card_account_name_regex: None,
        }
    }
}

impl MatchOptions {
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.window_days == 0 {
            return Err(MatchError::InvalidWindow);
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(MatchError::InvalidMinScore(self.min_score));
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("window_days must be at least 1")]
    InvalidWindow,
    #[error("min_score must be within [0, 1], got {0}")]
    InvalidMinScore(f64),
    #[error("Invalid credit card account name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// A scored potential transfer pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub outflow: Transaction,
    pub inflow: Transaction,
    pub score: f64,
    pub reasons: Vec<Reason>,
}

impl Candidate {
    pub fn later_date(&self) -> chrono::NaiveDate {
        self.outflow.date.max(self.inflow.date)
    }
}

/// Every raw pair the matcher considered, with its score and audit trail.
#[derive(Debug, Clone)]
pub struct ScoredPair<'a> {
    pub outflow: &'a Transaction,
    pub inflow: &'a Transaction,
    pub result: PairScore,
}

pub struct TransferMatcher {
    options: MatchOptions,
    constraints: CardConstraints,
}

impl TransferMatcher {
    pub fn new(options: MatchOptions) -> Result<Self, MatchError> {
        options.validate()?;
        let name_pattern = options
            .credit_card_account_name_regex
            .as_deref()
            .map(Regex::new)
            .transpose()?;
        let constraints = CardConstraints {
            account_ids: options.credit_card_account_ids.iter().cloned().collect(),
            name_pattern,
        };
        Ok(Self { options, constraints })
    }

    /// Score every sign/amount compatible pair across distinct accounts,
    /// including the ones that end up rejected.
    pub fn score_candidates<'a>(
        &self,
        transactions: &'a [Transaction],
        accounts: &[Account],
    ) -> Vec<ScoredPair<'a>> {
        let index = AccountIndex::build(accounts, &self.constraints);
        let ctx = ScoringContext {
            index: &index,
            window_days: self.options.window_days,
            explicit_targets: self.constraints.is_explicit(),
        };

        let mut inflows_by_amount: HashMap<i64, Vec<&Transaction>> = HashMap::new();
        for tx in transactions.iter().filter(|t| is_eligible(t) && t.is_inflow()) {
            inflows_by_amount.entry(tx.amount).or_default().push(tx);
        }

        let mut scored = Vec::new();
        for outflow in transactions.iter().filter(|t| is_eligible(t) && t.is_outflow()) {
            let Some(amount) = outflow.amount.checked_neg() else {
                continue;
            };
            let Some(inflows) = inflows_by_amount.get(&amount) else {
                continue;
            };
            for inflow in inflows.iter().copied().filter(|i| i.account != outflow.account) {
                scored.push(ScoredPair {
                    outflow,
                    inflow,
                    result: score_pair(outflow, inflow, &ctx),
                });
            }
        }
        scored
    }

    /// Accepted candidates, resolved one-to-one, best first.
    pub fn find_candidates(&self, transactions: &[Transaction], accounts: &[Account]) -> Vec<Candidate> {
        let scored = self.score_candidates(transactions, accounts);
        let raw_count = scored.len();

        let mut rejections: HashMap<String, usize> = HashMap::new();
        let mut accepted: Vec<Candidate> = Vec::new();
        for pair in scored {
            if let Some(rejection) = pair.result.rejection() {
                *rejections.entry(rejection.to_string()).or_default() += 1;
                continue;
            }
            if pair.result.score < self.options.min_score {
                *rejections.entry("below_min_score".to_string()).or_default() += 1;
                continue;
            }
            accepted.push(Candidate {
                outflow: pair.outflow.clone(),
                inflow: pair.inflow.clone(),
                score: pair.result.score,
                reasons: pair.result.reasons,
            });
        }
        let accepted_count = accepted.len();

        let selected = resolve_one_to_one(accepted);

        let mut summary: Vec<_> = rejections.into_iter().collect();
        summary.sort();
        for (reason, count) in summary {
            tracing::debug!(%reason, count, "pairs not accepted");
        }
        tracing::info!(
            raw = raw_count,
            accepted = accepted_count,
            selected = selected.len(),
            "transfer candidates resolved"
        );
        selected
    }
}

fn is_eligible(tx: &Transaction) -> bool {
    !tx.is_parent && !tx.is_transfer()
}

/// Greedy one-to-one assignment by descending score, then presentation order
/// by score and later date, both descending. Sorts are stable so ties keep
/// generation order.
pub fn resolve_one_to_one(mut accepted: Vec<Candidate>) -> Vec<Candidate> {
    accepted.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut used: HashSet<TransactionId> = HashSet::new();
    let mut selected = Vec::new();
    for candidate in accepted {
        if used.contains(&candidate.outflow.id) || used.contains(&candidate.inflow.id) {
            continue;
        }
        used.insert(candidate.outflow.id.clone());
        used.insert(candidate.inflow.id.clone());
        selected.push(candidate);
    }

    selected.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.later_date().cmp(&a.later_date()))
    });
    selected
}

/// Convenience wrapper: validate options, match, resolve.
pub fn find_transfer_candidates(
    transactions: &[Transaction],
    accounts: &[Account],
    options: &MatchOptions,
) -> Result<Vec<Candidate>, MatchError> {
    let matcher = TransferMatcher::new(options.clone())?;
    Ok(matcher.find_candidates(transactions, accounts))
}
