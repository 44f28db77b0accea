use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayeeId(pub String);

impl PayeeId {
    pub fn new(id: impl Into<String>) -> Self {
        PayeeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger account. The name is free text; the flags are carried through
/// for reporting and never influence matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub offbudget: bool,
    #[serde(default)]
    pub closed: bool,
}

impl Account {
    pub fn new(id: &str, name: &str) -> Self {
        Account {
            id: AccountId::new(id),
            name: name.to_string(),
            offbudget: false,
            closed: false,
        }
    }
}

/// A payee record. When `transfer_account_id` is set the payee is the
/// ledger's canonical "transfer to that account" payee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payee {
    pub id: PayeeId,
    pub name: String,
    #[serde(default)]
    pub transfer_account_id: Option<AccountId>,
}

impl Payee {
    pub fn new(id: &str, name: &str) -> Self {
        Payee {
            id: PayeeId::new(id),
            name: name.to_string(),
            transfer_account_id: None,
        }
    }

    pub fn transfer_to(id: &str, account: &Account) -> Self {
        Payee {
            id: PayeeId::new(id),
            name: format!("Transfer: {}", account.name),
            transfer_account_id: Some(account.id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_flags_default_to_false_when_missing() {
        let account: Account =
            serde_json::from_str(r#"{"id": "acc-1", "name": "Checking"}"#).unwrap();
        assert_eq!(account.id, AccountId::new("acc-1"));
        assert!(!account.offbudget);
        assert!(!account.closed);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&AccountId::new("abc")).unwrap();
        assert_eq!(json, r#""abc""#);
    }

    #[test]
    fn transfer_payee_points_at_account() {
        let visa = Account::new("visa", "TD Visa");
        let payee = Payee::transfer_to("p-visa", &visa);
        assert_eq!(payee.transfer_account_id, Some(AccountId::new("visa")));
        assert_eq!(payee.name, "Transfer: TD Visa");
    }
}
