//! Heuristics over free-text import payees.

use std::collections::BTreeSet;

re!(re_payment_word,
    r"(?i)\b(?:payment|pymt|pmt|autopay|auto\s+pay|epay|e-payment|bill\s*pay(?:ment)?)\b");
re!(re_card_word,
    r"(?i)\b(?:visa|mastercard|master\s+card|mc|amex|card|credit|cc|discover)\b");
re!(re_installment_or_refund,
    r"(?i)\b(?:installments?|instalments?|plan\s*it|equal\s+pay(?:ments?)?|refunds?|reversal|returns?)\b");
re!(re_payment_received,
    r"(?i)\b(?:payment|pymt|pmt)\b.*\b(?:received|rcvd|thank\s*you)\b|\bthank\s*you\b|\bautopay\b|^\s*payment\s*$");
re!(re_last4_masked,
    r"(?i)(?:\*+|\bx{2,}|#|\bending(?:\s+in)?\s+)\s*(\d{4})\b");
re!(re_last4_bare,
    r"\b\d{4}\b");

/// Lowercase alphanumeric words, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn token_set(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

/// Outflow-side evidence: the description reads like a card payment.
///
/// A payment word must appear together with a card word (or one of the
/// target card's own tokens), and installment-plan or refund phrasing
/// disqualifies the text.
pub fn looks_like_card_payment(text: &str, card_tokens: &BTreeSet<String>) -> bool {
    if !re_payment_word().is_match(text) || re_installment_or_refund().is_match(text) {
        return false;
    }
    if re_card_word().is_match(text) {
        return true;
    }
    tokenize(text).iter().any(|t| card_tokens.contains(t))
}

/// Inflow-side evidence: a generic "payment received" description.
pub fn looks_like_payment_received(text: &str) -> bool {
    re_payment_received().is_match(text)
}

/// Extract a 4-digit card suffix. Masked forms such as `****1234`,
/// `XX1234` or `ending in 1234` win over a bare 4-digit word. A bare word
/// only counts when the text talks about a card or a payment, and never
/// when it is part of a date such as `2024-01-15` or `01/15/2024`.
pub fn last_four(text: &str) -> Option<String> {
    if let Some(caps) = re_last4_masked().captures_iter(text).last() {
        return Some(caps[1].to_string());
    }
    if !re_card_word().is_match(text) && !re_payment_word().is_match(text) {
        return None;
    }
    re_last4_bare()
        .find_iter(text)
        .filter(|m| !is_date_part(text, m.start(), m.end()))
        .last()
        .map(|m| m.as_str().to_string())
}

fn is_date_part(text: &str, start: usize, end: usize) -> bool {
    let is_separator = |c: Option<char>| matches!(c, Some('-' | '/' | '.'));
    is_separator(text[..start].chars().next_back()) || is_separator(text[end..].chars().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_tokens() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn tokenize_lowercases_and_splits_on_punctuation() {
        assert_eq!(tokenize("WALMART-MC  Pymt*1234"), vec!["walmart", "mc", "pymt", "1234"]);
        assert!(tokenize("  ** ").is_empty());
    }

    #[test]
    fn card_payment_needs_payment_and_card_words() {
        assert!(looks_like_card_payment("ONLINE PAYMENT VISA ****1234", &no_tokens()));
        assert!(looks_like_card_payment("AMEX EPAYMENT ACH PMT", &no_tokens()));
        assert!(!looks_like_card_payment("ONLINE PAYMENT", &no_tokens()));
        assert!(!looks_like_card_payment("VISA PURCHASE STARBUCKS", &no_tokens()));
    }

    #[test]
    fn card_payment_accepts_target_card_tokens() {
        let tokens: BTreeSet<String> = ["rogers".to_string()].into_iter().collect();
        assert!(looks_like_card_payment("ROGERS BANK PAYMENT", &tokens));
        assert!(!looks_like_card_payment("ROGERS BANK PAYMENT", &no_tokens()));
    }

    #[test]
    fn installment_and_refund_phrasing_is_excluded() {
        assert!(!looks_like_card_payment("VISA INSTALLMENT PAYMENT", &no_tokens()));
        assert!(!looks_like_card_payment("CREDIT CARD PAYMENT REFUND", &no_tokens()));
        assert!(!looks_like_card_payment("MC EQUAL PAYMENTS PLAN", &no_tokens()));
    }

    #[test]
    fn payment_received_variants() {
        assert!(looks_like_payment_received("PAYMENT RECEIVED"));
        assert!(looks_like_payment_received("Payment - Thank You"));
        assert!(looks_like_payment_received("PYMT RCVD"));
        assert!(looks_like_payment_received("AUTOPAY 240115"));
        assert!(looks_like_payment_received("payment"));
        assert!(!looks_like_payment_received("AMAZON.COM PURCHASE"));
        assert!(!looks_like_payment_received("PAYMENT TO HYDRO"));
    }

    #[test]
    fn last_four_prefers_masked_suffix() {
        assert_eq!(last_four("ONLINE PAYMENT VISA ****1234").as_deref(), Some("1234"));
        assert_eq!(last_four("PAYMENT CARD XX9876 REF 2024").as_deref(), Some("9876"));
        assert_eq!(last_four("card ending in 4321").as_deref(), Some("4321"));
        assert_eq!(last_four("PAYMENT RECEIVED 5555").as_deref(), Some("5555"));
    }

    #[test]
    fn last_four_ignores_longer_numbers() {
        assert_eq!(last_four("REF 123456789"), None);
        assert_eq!(last_four("PAYMENT RECEIVED"), None);
        assert_eq!(last_four(""), None);
    }

    #[test]
    fn last_four_skips_dates_and_context_free_numbers() {
        assert_eq!(last_four("ONLINE TRANSFER 2024-01-15"), None);
        assert_eq!(last_four("DEPOSIT 2024-01-15"), None);
        assert_eq!(last_four("PAYMENT RECEIVED 01/15/2024"), None);
        assert_eq!(last_four("STORE 4411"), None);
        assert_eq!(last_four("VISA PAYMENT 2024-01-15 7788").as_deref(), Some("7788"));
    }
}
