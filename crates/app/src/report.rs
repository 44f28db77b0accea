use std::fmt::Write as _;

use paylink_core::{Account, AccountId, Money, Transaction, TransactionId};
use paylink_transfer::{Candidate, LinkError, LinkOutcome, LinkPlan, ScoredPair};
use serde::Serialize;

fn account_name<'a>(accounts: &'a [Account], id: &'a AccountId) -> &'a str {
    accounts
        .iter()
        .find(|a| &a.id == id)
        .map(|a| a.name.as_str())
        .unwrap_or(id.as_str())
}

fn side_line(tx: &Transaction, accounts: &[Account]) -> String {
    format!(
        "{} {:>12}  {:<24} {} [{}]",
        tx.date,
        Money::from_cents(tx.amount).to_string(),
        account_name(accounts, &tx.account),
        tx.imported_payee_text(),
        tx.id
    )
}

fn reasons_line<T: ToString>(reasons: &[T]) -> String {
    reasons.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

pub fn candidates_text(candidates: &[Candidate], accounts: &[Account]) -> String {
    if candidates.is_empty() {
        return "No transfer candidates found.\n".to_string();
    }
    let mut out = String::new();
    for (i, c) in candidates.iter().enumerate() {
        let _ = writeln!(out, "#{} score {:.2}", i + 1, c.score);
        let _ = writeln!(out, "  out  {}", side_line(&c.outflow, accounts));
        let _ = writeln!(out, "  in   {}", side_line(&c.inflow, accounts));
        let _ = writeln!(out, "  why  {}", reasons_line(&c.reasons));
    }
    let _ = writeln!(out, "{} candidate(s)", candidates.len());
    out
}

pub fn rejected_text(scored: &[ScoredPair<'_>], accounts: &[Account]) -> String {
    let mut out = String::new();
    for pair in scored.iter().filter(|p| p.result.is_rejected()) {
        let _ = writeln!(out, "rejected: {}", reasons_line(&pair.result.reasons));
        let _ = writeln!(out, "  out  {}", side_line(pair.outflow, accounts));
        let _ = writeln!(out, "  in   {}", side_line(pair.inflow, accounts));
    }
    out
}

pub fn plan_text(plan: &LinkPlan) -> String {
    format!(
        "{} -> {} on {} (payees {} / {}), notes: {}\n",
        plan.outflow_id,
        plan.inflow_id,
        plan.chosen_date,
        plan.outflow_transfer_payee_id,
        plan.inflow_transfer_payee_id,
        plan.merged_notes.as_deref().unwrap_or("-")
    )
}

pub fn outcomes_text(candidates: &[Candidate], outcomes: &[LinkOutcome]) -> String {
    let mut out = String::new();
    let mut linked = 0;
    for (c, outcome) in candidates.iter().zip(outcomes) {
        match outcome {
            LinkOutcome::Linked(plan) => {
                linked += 1;
                let _ = write!(out, "linked   {}", plan_text(plan));
            }
            LinkOutcome::PlanFailed(e) => {
                let _ = writeln!(out, "failed   {} -> {}: {e}", c.outflow.id, c.inflow.id);
            }
            LinkOutcome::ApplyFailed(e) => {
                let _ = writeln!(out, "failed   {} -> {}: {e}", c.outflow.id, c.inflow.id);
            }
            LinkOutcome::Skipped => {
                let _ = writeln!(out, "skipped  {} -> {}", c.outflow.id, c.inflow.id);
            }
        }
    }
    let _ = writeln!(out, "{linked} of {} pair(s) linked", candidates.len());
    out
}

/// JSON shape of one `link` result, tagged by `status`.
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutcomeRecord<'a> {
    Linked {
        plan: &'a LinkPlan,
    },
    Planned {
        plan: &'a LinkPlan,
    },
    Failed {
        outflow_id: &'a TransactionId,
        inflow_id: &'a TransactionId,
        error: String,
    },
    Skipped {
        outflow_id: &'a TransactionId,
        inflow_id: &'a TransactionId,
    },
}

impl<'a> OutcomeRecord<'a> {
    fn failed(c: &'a Candidate, error: &dyn std::fmt::Display) -> Self {
        OutcomeRecord::Failed {
            outflow_id: &c.outflow.id,
            inflow_id: &c.inflow.id,
            error: error.to_string(),
        }
    }
}

pub fn outcome_records<'a>(candidates: &'a [Candidate], outcomes: &'a [LinkOutcome]) -> Vec<OutcomeRecord<'a>> {
    candidates
        .iter()
        .zip(outcomes)
        .map(|(c, outcome)| match outcome {
            LinkOutcome::Linked(plan) => OutcomeRecord::Linked { plan },
            LinkOutcome::PlanFailed(e) => OutcomeRecord::failed(c, e),
            LinkOutcome::ApplyFailed(e) => OutcomeRecord::failed(c, e),
            LinkOutcome::Skipped => OutcomeRecord::Skipped {
                outflow_id: &c.outflow.id,
                inflow_id: &c.inflow.id,
            },
        })
        .collect()
}

/// Dry-run counterpart of [`outcome_records`].
pub fn plan_records<'a>(
    candidates: &'a [Candidate],
    plans: &'a [Result<LinkPlan, LinkError>],
) -> Vec<OutcomeRecord<'a>> {
    candidates
        .iter()
        .zip(plans)
        .map(|(c, plan)| match plan {
            Ok(plan) => OutcomeRecord::Planned { plan },
            Err(e) => OutcomeRecord::failed(c, e),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use paylink_core::{PayeeId, TransactionId, TransactionPatch};
    use paylink_transfer::{Reason, Side};

    fn tx(id: &str, account: &str, amount: i64) -> Transaction {
        Transaction {
            id: TransactionId::new(id),
            account: AccountId::new(account),
            amount,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            imported_payee: Some("PAYMENT".to_string()),
            payee: None,
            notes: None,
            transfer_id: None,
            is_parent: false,
        }
    }

    fn candidate() -> Candidate {
        Candidate {
            outflow: tx("o1", "chk", -12345),
            inflow: tx("i1", "visa", 12345),
            score: 0.95,
            reasons: vec![Reason::AmountExact, Reason::DayDistance(0)],
        }
    }

    #[test]
    fn candidates_text_uses_account_names_and_money() {
        let accounts = vec![Account::new("chk", "Checking"), Account::new("visa", "Visa Card")];
        let text = candidates_text(&[candidate()], &accounts);
        assert!(text.contains("#1 score 0.95"));
        assert!(text.contains("-$123.45"));
        assert!(text.contains("Visa Card"));
        assert!(text.contains("amount_exact, days:0"));
        assert!(text.ends_with("1 candidate(s)\n"));
    }

    #[test]
    fn empty_candidate_list_says_so() {
        assert_eq!(candidates_text(&[], &[]), "No transfer candidates found.\n");
    }

    fn plan_for(c: &Candidate) -> LinkPlan {
        LinkPlan {
            outflow_id: c.outflow.id.clone(),
            inflow_id: c.inflow.id.clone(),
            outflow_update: TransactionPatch::default(),
            inflow_update: TransactionPatch::default(),
            chosen_date: c.outflow.date,
            merged_notes: None,
            outflow_transfer_payee_id: PayeeId::new("p-visa"),
            inflow_transfer_payee_id: PayeeId::new("p-chk"),
        }
    }

    fn inflow_failure(c: &Candidate) -> paylink_transfer::ApplyError {
        paylink_transfer::ApplyError {
            side: Side::Inflow,
            transaction: c.inflow.id.clone(),
            source: paylink_core::LedgerError::Backend("locked".to_string()),
        }
    }

    #[test]
    fn outcomes_text_counts_links() {
        let c = candidate();
        let plan = plan_for(&c);
        let failure = inflow_failure(&c);
        let text = outcomes_text(
            &[c.clone(), c],
            &[LinkOutcome::Linked(plan), LinkOutcome::ApplyFailed(failure)],
        );
        assert!(text.contains("linked   o1 -> i1"));
        assert!(text.contains("failed   o1 -> i1: Updating inflow transaction i1 failed"));
        assert!(text.ends_with("1 of 2 pair(s) linked\n"));
    }

    #[test]
    fn outcome_records_keep_failures_and_skips() {
        let c = candidate();
        let candidates = vec![c.clone(), c.clone(), c.clone()];
        let outcomes = vec![
            LinkOutcome::Linked(plan_for(&c)),
            LinkOutcome::ApplyFailed(inflow_failure(&c)),
            LinkOutcome::Skipped,
        ];
        let json = serde_json::to_value(outcome_records(&candidates, &outcomes)).unwrap();
        let statuses: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["status"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(statuses, vec!["linked", "failed", "skipped"]);
        assert_eq!(json[0]["plan"]["inflow_id"], "i1");
        assert_eq!(json[1]["outflow_id"], "o1");
        assert!(json[1]["error"].as_str().unwrap().contains("locked"));
    }

    #[test]
    fn plan_records_report_plan_errors() {
        let c = candidate();
        let plans = vec![
            Ok(plan_for(&c)),
            Err(LinkError::MissingTransferPayee {
                account: "Visa Card (visa)".to_string(),
            }),
        ];
        let candidates = [c.clone(), c];
        let records = plan_records(&candidates, &plans);
        assert!(matches!(records[0], OutcomeRecord::Planned { .. }));
        match &records[1] {
            OutcomeRecord::Failed { error, .. } => assert!(error.contains("No transfer payee")),
            other => panic!("unexpected record {other:?}"),
        }
    }
}
