//! Pair scoring as an ordered pipeline: hard gates first, additive evidence last.
//!
//! Every gate either passes or returns a [`Rejection`]; a rejected pair
//! scores exactly zero no matter what evidence was collected before it.

use std::fmt;

use paylink_core::{days_between, Transaction};
use serde::{Serialize, Serializer};

use crate::classify::AccountIndex;
use crate::payee_text::{last_four, looks_like_card_payment, looks_like_payment_received, token_set};

/// Base credit for an exact amount match.
pub const BASE_EXACT_AMOUNT: f64 = 0.55;
/// Proximity credit for a same-day pair; decays per day of distance.
pub const PROXIMITY_MAX: f64 = 0.25;
pub const PROXIMITY_DECAY_PER_DAY: f64 = 0.05;
pub const PAYEE_PATTERN: f64 = 0.15;
pub const INFLOW_PATTERN: f64 = 0.05;
pub const INFLOW_CREDIT_CARD: f64 = 0.10;
pub const LAST4_MATCH: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    WrongSign,
    SameAccount,
    AlreadyTransfer,
    SplitParent,
    AmountMismatch,
    NotTargetAccount,
    OutsideWindow,
    OtherCardNamed,
    NoPaymentEvidence,
    InflowNotCreditCard,
}

impl Rejection {
    pub fn tag(self) -> &'static str {
        match self {
            Rejection::WrongSign => "wrong_sign",
            Rejection::SameAccount => "same_account",
            Rejection::AlreadyTransfer => "already_transfer",
            Rejection::SplitParent => "split_parent",
            Rejection::AmountMismatch => "amount_mismatch",
            Rejection::NotTargetAccount => "not_target_account",
            Rejection::OutsideWindow => "outside_window",
            Rejection::OtherCardNamed => "other_card_named",
            Rejection::NoPaymentEvidence => "no_payment_evidence",
            Rejection::InflowNotCreditCard => "inflow_not_credit_card",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One audit entry explaining how a pair was scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    AmountExact,
    DayDistance(i64),
    PayeePaymentPattern,
    InflowPaymentReceived,
    Last4Match,
    InflowCreditCard,
    Rejected(Rejection),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::AmountExact => f.write_str("amount_exact"),
            Reason::DayDistance(days) => write!(f, "days:{days}"),
            Reason::PayeePaymentPattern => f.write_str("payee_payment_pattern"),
            Reason::InflowPaymentReceived => f.write_str("inflow_payment_received"),
            Reason::Last4Match => f.write_str("last4_match"),
            Reason::InflowCreditCard => f.write_str("inflow_credit_card"),
            Reason::Rejected(rejection) => write!(f, "rejected:{rejection}"),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evidence {
    pub payee_pattern: bool,
    pub inflow_pattern: bool,
    pub last4_match: bool,
    pub inflow_is_credit_card: bool,
}

impl Evidence {
    pub fn has_payment_evidence(&self) -> bool {
        self.payee_pattern || self.inflow_pattern || self.last4_match
    }

    fn push_reasons(&self, reasons: &mut Vec<Reason>) {
        if self.payee_pattern {
            reasons.push(Reason::PayeePaymentPattern);
        }
        if self.inflow_pattern {
            reasons.push(Reason::InflowPaymentReceived);
        }
        if self.last4_match {
            reasons.push(Reason::Last4Match);
        }
        if self.inflow_is_credit_card {
            reasons.push(Reason::InflowCreditCard);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairScore {
    pub score: f64,
    pub reasons: Vec<Reason>,
}

impl PairScore {
    pub fn rejection(&self) -> Option<Rejection> {
        self.reasons.iter().find_map(|r| match r {
            Reason::Rejected(rejection) => Some(*rejection),
            _ => None,
        })
    }

    pub fn is_rejected(&self) -> bool {
        self.rejection().is_some()
    }
}

/// Inputs shared by every pair scored in one matcher call.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub index: &'a AccountIndex,
    pub window_days: u32,
    /// The caller supplied credit-card account ids or a name pattern.
    pub explicit_targets: bool,
}

pub fn score_pair(outflow: &Transaction, inflow: &Transaction, ctx: &ScoringContext<'_>) -> PairScore {
    let mut reasons = Vec::new();
    match run_stages(outflow, inflow, ctx, &mut reasons) {
        Ok(score) => PairScore { score, reasons },
        Err(rejection) => {
            reasons.push(Reason::Rejected(rejection));
            PairScore { score: 0.0, reasons }
        }
    }
}

fn run_stages(
    outflow: &Transaction,
    inflow: &Transaction,
    ctx: &ScoringContext<'_>,
    reasons: &mut Vec<Reason>,
) -> Result<f64, Rejection> {
    check_shape(outflow, inflow)?;
    reasons.push(Reason::AmountExact);

    check_targeted_account(inflow, ctx)?;

    let days = check_window(outflow, inflow, ctx.window_days)?;
    reasons.push(Reason::DayDistance(days));

    check_cross_card(outflow, inflow, ctx.index)?;

    let evidence = collect_evidence(outflow, inflow, ctx.index);
    evidence.push_reasons(reasons);

    require_payment_evidence(&evidence)?;
    require_credit_card_inflow(&evidence, ctx)?;

    Ok(additive_score(days, &evidence))
}

pub fn check_shape(outflow: &Transaction, inflow: &Transaction) -> Result<(), Rejection> {
    if !outflow.is_outflow() || !inflow.is_inflow() {
        return Err(Rejection::WrongSign);
    }
    if outflow.account == inflow.account {
        return Err(Rejection::SameAccount);
    }
    if outflow.is_transfer() || inflow.is_transfer() {
        return Err(Rejection::AlreadyTransfer);
    }
    if outflow.is_parent || inflow.is_parent {
        return Err(Rejection::SplitParent);
    }
    if outflow.amount.checked_neg() != Some(inflow.amount) {
        return Err(Rejection::AmountMismatch);
    }
    Ok(())
}

pub fn check_targeted_account(inflow: &Transaction, ctx: &ScoringContext<'_>) -> Result<(), Rejection> {
    if ctx.explicit_targets && !ctx.index.is_targeted(&inflow.account) {
        return Err(Rejection::NotTargetAccount);
    }
    Ok(())
}

/// Returns the day distance when it fits the window.
pub fn check_window(outflow: &Transaction, inflow: &Transaction, window_days: u32) -> Result<i64, Rejection> {
    let days = days_between(outflow.date, inflow.date);
    if days > i64::from(window_days) {
        return Err(Rejection::OutsideWindow);
    }
    Ok(days)
}

pub fn check_cross_card(outflow: &Transaction, inflow: &Transaction, index: &AccountIndex) -> Result<(), Rejection> {
    let payee_tokens = token_set(outflow.imported_payee_text());
    match index.other_card_named(&inflow.account, &payee_tokens) {
        Some(other) => {
            tracing::trace!(
                outflow = %outflow.id,
                inflow = %inflow.id,
                other_card = %other.name,
                "outflow payee names a different card"
            );
            Err(Rejection::OtherCardNamed)
        }
        None => Ok(()),
    }
}

pub fn collect_evidence(outflow: &Transaction, inflow: &Transaction, index: &AccountIndex) -> Evidence {
    let empty = Default::default();
    let inflow_tokens = index.card_tokens(&inflow.account).unwrap_or(&empty);
    let outflow_text = outflow.imported_payee_text();
    let inflow_text = inflow.imported_payee_text();

    let last4_match = match (last_four(outflow_text), last_four(inflow_text)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };

    Evidence {
        payee_pattern: looks_like_card_payment(outflow_text, inflow_tokens),
        inflow_pattern: looks_like_payment_received(inflow_text),
        last4_match,
        inflow_is_credit_card: index.is_credit_card(&inflow.account),
    }
}

pub fn require_payment_evidence(evidence: &Evidence) -> Result<(), Rejection> {
    if evidence.has_payment_evidence() {
        Ok(())
    } else {
        Err(Rejection::NoPaymentEvidence)
    }
}

pub fn require_credit_card_inflow(evidence: &Evidence, ctx: &ScoringContext<'_>) -> Result<(), Rejection> {
    if !ctx.explicit_targets && !evidence.inflow_is_credit_card {
        return Err(Rejection::InflowNotCreditCard);
    }
    Ok(())
}

pub fn additive_score(days: i64, evidence: &Evidence) -> f64 {
    let mut score = BASE_EXACT_AMOUNT;
    score += (PROXIMITY_MAX - PROXIMITY_DECAY_PER_DAY * days as f64).max(0.0);
    if evidence.payee_pattern {
        score += PAYEE_PATTERN;
    }
    if evidence.inflow_pattern {
        score += INFLOW_PATTERN;
    }
    if evidence.inflow_is_credit_card {
        score += INFLOW_CREDIT_CARD;
    }
    if evidence.last4_match {
        score += LAST4_MATCH;
    }
    // Four decimals keeps sums like 0.55 + 0.25 + 0.15 comparable to thresholds.
    ((score * 10_000.0).round() / 10_000.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::CardConstraints;
    use chrono::NaiveDate;
    use paylink_core::{Account, AccountId, TransactionId};

    fn tx(id: &str, account: &str, amount: i64, day: u32, payee: &str) -> Transaction {
        Transaction {
            id: TransactionId::new(id),
            account: AccountId::new(account),
            amount,
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            imported_payee: Some(payee.to_string()),
            payee: None,
            notes: None,
            transfer_id: None,
            is_parent: false,
        }
    }

    fn index() -> AccountIndex {
        AccountIndex::build(
            &[
                Account::new("chk", "Checking"),
                Account::new("visa", "Visa Card"),
                Account::new("wmt", "Walmart Mastercard"),
                Account::new("sav", "Savings"),
            ],
            &CardConstraints::default(),
        )
    }

    fn ctx(index: &AccountIndex) -> ScoringContext<'_> {
        ScoringContext {
            index,
            window_days: 3,
            explicit_targets: false,
        }
    }

    #[test]
    fn full_evidence_clamps_to_one() {
        let index = index();
        let out = tx("o", "chk", -12345, 10, "ONLINE PAYMENT VISA ****1234");
        let inf = tx("i", "visa", 12345, 11, "PAYMENT RECEIVED ****1234");
        let result = score_pair(&out, &inf, &ctx(&index));
        assert_eq!(result.score, 1.0);
        assert!(!result.is_rejected());
        assert_eq!(
            result.reasons,
            vec![
                Reason::AmountExact,
                Reason::DayDistance(1),
                Reason::PayeePaymentPattern,
                Reason::InflowPaymentReceived,
                Reason::Last4Match,
                Reason::InflowCreditCard,
            ]
        );
    }

    #[test]
    fn additive_weights_are_applied_per_signal() {
        let evidence = Evidence {
            payee_pattern: true,
            inflow_is_credit_card: true,
            ..Default::default()
        };
        // 0.55 + 0.15 (two days) + 0.15 + 0.10
        assert_eq!(additive_score(2, &evidence), 0.95);
        // proximity credit bottoms out at zero
        assert_eq!(additive_score(9, &Evidence::default()), 0.55);
    }

    #[test]
    fn shape_gates_reject_in_order() {
        let out = tx("o", "chk", -500, 10, "");
        let inf = tx("i", "visa", 500, 10, "");
        assert_eq!(check_shape(&inf, &out), Err(Rejection::WrongSign));
        assert_eq!(
            check_shape(&out, &tx("i", "chk", 500, 10, "")),
            Err(Rejection::SameAccount)
        );

        let mut linked = inf.clone();
        linked.transfer_id = Some(TransactionId::new("x"));
        assert_eq!(check_shape(&out, &linked), Err(Rejection::AlreadyTransfer));

        let mut parent = inf.clone();
        parent.is_parent = true;
        assert_eq!(check_shape(&out, &parent), Err(Rejection::SplitParent));

        assert_eq!(
            check_shape(&out, &tx("i", "visa", 501, 10, "")),
            Err(Rejection::AmountMismatch)
        );
        assert_eq!(check_shape(&out, &inf), Ok(()));
    }

    #[test]
    fn window_gate_is_inclusive() {
        let out = tx("o", "chk", -500, 10, "");
        assert_eq!(check_window(&out, &tx("i", "visa", 500, 13, ""), 3), Ok(3));
        assert_eq!(
            check_window(&out, &tx("i", "visa", 500, 14, ""), 3),
            Err(Rejection::OutsideWindow)
        );
        assert_eq!(check_window(&out, &tx("i", "visa", 500, 7, ""), 3), Ok(3));
    }

    #[test]
    fn amount_and_date_alone_are_not_enough() {
        let index = index();
        let out = tx("o", "chk", -500, 10, "TRANSFER");
        let inf = tx("i", "visa", 500, 10, "TRANSFER");
        let result = score_pair(&out, &inf, &ctx(&index));
        assert_eq!(result.score, 0.0);
        assert_eq!(result.rejection(), Some(Rejection::NoPaymentEvidence));
    }

    #[test]
    fn inflow_must_be_card_unless_targeted() {
        let index = index();
        let out = tx("o", "chk", -500, 10, "CREDIT CARD PAYMENT");
        let inf = tx("i", "sav", 500, 10, "PAYMENT RECEIVED");
        let result = score_pair(&out, &inf, &ctx(&index));
        assert_eq!(result.rejection(), Some(Rejection::InflowNotCreditCard));
    }

    #[test]
    fn explicit_targets_gate_inflow_account() {
        let constraints = CardConstraints {
            account_ids: [AccountId::new("sav")].into_iter().collect(),
            name_pattern: None,
        };
        let index = AccountIndex::build(
            &[Account::new("chk", "Checking"), Account::new("sav", "Savings"), Account::new("visa", "Visa")],
            &constraints,
        );
        let context = ScoringContext {
            index: &index,
            window_days: 3,
            explicit_targets: true,
        };
        let out = tx("o", "chk", -500, 10, "CREDIT CARD PAYMENT");

        let to_visa = score_pair(&out, &tx("i", "visa", 500, 10, "PAYMENT RECEIVED"), &context);
        assert_eq!(to_visa.rejection(), Some(Rejection::NotTargetAccount));

        let to_savings = score_pair(&out, &tx("i", "sav", 500, 10, "PAYMENT RECEIVED"), &context);
        assert!(!to_savings.is_rejected());
        assert!(to_savings.reasons.contains(&Reason::InflowCreditCard));
    }

    #[test]
    fn cross_card_contamination_zeroes_strong_pairs() {
        let index = index();
        let out = tx("o", "chk", -500, 10, "WALMART MC PAYMENT");
        let inf = tx("i", "visa", 500, 10, "PAYMENT RECEIVED");
        let result = score_pair(&out, &inf, &ctx(&index));
        assert_eq!(result.score, 0.0);
        assert_eq!(result.rejection(), Some(Rejection::OtherCardNamed));
    }

    #[test]
    fn reason_tags_render_stably() {
        assert_eq!(Reason::DayDistance(2).to_string(), "days:2");
        assert_eq!(
            Reason::Rejected(Rejection::OtherCardNamed).to_string(),
            "rejected:other_card_named"
        );
        assert_eq!(serde_json::to_string(&Reason::Last4Match).unwrap(), r#""last4_match""#);
    }
}
