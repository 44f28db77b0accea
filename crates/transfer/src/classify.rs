use std::collections::{BTreeSet, HashMap};

use paylink_core::{Account, AccountId};
use regex::Regex;

use crate::payee_text::tokenize;

/// Words that describe card products in general rather than one specific card.
const GENERIC_CARD_WORDS: &[&str] = &[
    "visa", "mastercard", "master", "card", "credit", "rewards", "account", "cc", "mc", "amex",
    "american", "express", "cash", "back", "cashback", "world", "elite", "signature",
    "platinum", "gold", "infinite", "preferred",
];

/// Bank-name suffixes and filler that never identify a card.
const NOISE_WORDS: &[&str] = &["bank", "the", "of", "and", "inc", "co", "na", "us", "ca", "ltd"];

const MAX_CARD_TOKENS: usize = 3;

re!(builtin_card_pattern, r"(?i)\b(?:visa|mastercard|amex|credit|card|cc)\b");

/// Caller-supplied description of which accounts are credit cards.
#[derive(Debug, Clone, Default)]
pub struct CardConstraints {
    pub account_ids: BTreeSet<AccountId>,
    pub name_pattern: Option<Regex>,
}

impl CardConstraints {
    /// True when the caller named credit-card accounts explicitly.
    pub fn is_explicit(&self) -> bool {
        !self.account_ids.is_empty() || self.name_pattern.is_some()
    }

    pub fn admits(&self, account: &Account) -> bool {
        self.account_ids.contains(&account.id)
            || self
                .name_pattern
                .as_ref()
                .is_some_and(|re| re.is_match(&account.name))
    }
}

#[derive(Debug, Clone)]
pub struct AccountProfile {
    pub id: AccountId,
    pub name: String,
    pub is_credit_card: bool,
    /// Satisfies the explicit constraints. Always false when none were given.
    pub targeted: bool,
    pub card_tokens: BTreeSet<String>,
}

/// Per-call classification of every account, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct AccountIndex {
    profiles: HashMap<AccountId, AccountProfile>,
    card_order: Vec<AccountId>,
    /// Explicitly listed ids, which count as targeted credit cards even
    /// when the account list does not carry them.
    listed_ids: BTreeSet<AccountId>,
}

impl AccountIndex {
    pub fn build(accounts: &[Account], constraints: &CardConstraints) -> Self {
        let mut profiles = HashMap::with_capacity(accounts.len());
        let mut card_order = Vec::new();

        for account in accounts {
            let targeted = constraints.admits(account);
            let is_credit_card = if constraints.is_explicit() {
                targeted
            } else {
                builtin_card_pattern().is_match(&account.name)
            };
            let card_tokens = if is_credit_card {
                card_tokens(&account.name)
            } else {
                BTreeSet::new()
            };
            if is_credit_card && !profiles.contains_key(&account.id) {
                card_order.push(account.id.clone());
            }
            profiles.insert(
                account.id.clone(),
                AccountProfile {
                    id: account.id.clone(),
                    name: account.name.clone(),
                    is_credit_card,
                    targeted,
                    card_tokens,
                },
            );
        }

        Self {
            profiles,
            card_order,
            listed_ids: constraints.account_ids.clone(),
        }
    }

    pub fn profile(&self, id: &AccountId) -> Option<&AccountProfile> {
        self.profiles.get(id)
    }

    pub fn is_credit_card(&self, id: &AccountId) -> bool {
        match self.profile(id) {
            Some(p) => p.is_credit_card,
            None => self.listed_ids.contains(id),
        }
    }

    pub fn is_targeted(&self, id: &AccountId) -> bool {
        match self.profile(id) {
            Some(p) => p.targeted,
            None => self.listed_ids.contains(id),
        }
    }

    pub fn card_tokens(&self, id: &AccountId) -> Option<&BTreeSet<String>> {
        self.profile(id).map(|p| &p.card_tokens)
    }

    /// Credit-card accounts in input order.
    pub fn credit_cards(&self) -> impl Iterator<Item = &AccountProfile> {
        self.card_order.iter().filter_map(|id| self.profiles.get(id))
    }

    /// The first tracked card other than `inflow_account` whose identifying
    /// tokens appear in `payee_tokens`. Tokens shared with the inflow's own
    /// card are ignored so "TD" does not split two TD-issued cards.
    pub fn other_card_named<'a>(
        &'a self,
        inflow_account: &AccountId,
        payee_tokens: &BTreeSet<String>,
    ) -> Option<&'a AccountProfile> {
        let empty = BTreeSet::new();
        let own = self.card_tokens(inflow_account).unwrap_or(&empty);
        self.credit_cards()
            .filter(|card| &card.id != inflow_account)
            .find(|card| {
                card.card_tokens
                    .iter()
                    .any(|t| !own.contains(t) && payee_tokens.contains(t))
            })
    }
}

/// Tokens that identify one specific card, e.g. "Amazon Rewards Visa" → {amazon}.
pub fn card_tokens(name: &str) -> BTreeSet<String> {
    let mut kept: Vec<String> = Vec::new();
    for token in tokenize(name) {
        if token.len() < 2
            || token.chars().all(|c| c.is_ascii_digit())
            || GENERIC_CARD_WORDS.contains(&token.as_str())
            || NOISE_WORDS.contains(&token.as_str())
            || kept.contains(&token)
        {
            continue;
        }
        kept.push(token);
        if kept.len() == MAX_CARD_TOKENS {
            break;
        }
    }
    kept.into_iter().collect()
}
