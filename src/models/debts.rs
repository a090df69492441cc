use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{default_currency, Identified, UnknownVariant};
use crate::aggregation::{DateField, Grouping, Measure, Measured};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtType {
    Personal,
    HomeLoan,
    CreditCard,
    Other,
}

impl DebtType {
    pub const ALL: [DebtType; 4] = [
        DebtType::Personal,
        DebtType::HomeLoan,
        DebtType::CreditCard,
        DebtType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DebtType::Personal => "personal",
            DebtType::HomeLoan => "home_loan",
            DebtType::CreditCard => "credit_card",
            DebtType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DebtType::Personal => "Personal Loan",
            DebtType::HomeLoan => "Home Loan / Mortgage",
            DebtType::CreditCard => "Credit Card",
            DebtType::Other => "Other Debt",
        }
    }
}

impl FromStr for DebtType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DebtType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "debt type",
                value: value.to_string(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Debt {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: DebtType,
    pub lender: String,
    pub principal: f64,
    pub interest_rate: Option<f64>,
    pub term_years: Option<i32>,
    pub balance: f64,
    pub currency: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewDebt {
    #[serde(rename = "type")]
    pub kind: DebtType,
    pub lender: String,
    pub principal: f64,
    #[serde(default)]
    pub interest_rate: Option<f64>,
    #[serde(default)]
    pub term_years: Option<i32>,
    pub balance: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DebtPatch {
    #[serde(rename = "type", default)]
    pub kind: Option<DebtType>,
    #[serde(default)]
    pub lender: Option<String>,
    #[serde(default)]
    pub principal: Option<f64>,
    #[serde(default)]
    pub interest_rate: Option<f64>,
    #[serde(default)]
    pub term_years: Option<i32>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Debt {
    pub fn new(id: String, user_id: String, fields: NewDebt, now: DateTime<Utc>) -> Self {
        Debt {
            id,
            user_id,
            kind: fields.kind,
            lender: fields.lender,
            principal: fields.principal,
            interest_rate: fields.interest_rate,
            term_years: fields.term_years,
            balance: fields.balance,
            currency: fields.currency,
            metadata: fields.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: DebtPatch, now: DateTime<Utc>) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(lender) = patch.lender {
            self.lender = lender;
        }
        if let Some(principal) = patch.principal {
            self.principal = principal;
        }
        if let Some(rate) = patch.interest_rate {
            self.interest_rate = Some(rate);
        }
        if let Some(term) = patch.term_years {
            self.term_years = Some(term);
        }
        if let Some(balance) = patch.balance {
            self.balance = balance;
        }
        if let Some(currency) = patch.currency {
            self.currency = currency;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = Some(metadata);
        }
        self.updated_at = now;
    }
}

impl Identified for Debt {
    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Measured for Debt {
    fn measure(&self, measure: Measure) -> Option<f64> {
        match measure {
            Measure::Principal => Some(self.principal),
            Measure::Balance => Some(self.balance),
            Measure::InterestRate => self.interest_rate,
            Measure::TermYears => self.term_years.map(f64::from),
            Measure::Value => None,
        }
    }

    fn group_key(&self, grouping: Grouping) -> Option<&str> {
        match grouping {
            Grouping::Kind => Some(self.kind.as_str()),
            Grouping::Subtype => None,
            Grouping::Currency => Some(&self.currency),
        }
    }

    fn date(&self, field: DateField) -> DateTime<Utc> {
        match field {
            DateField::CreatedAt => self.created_at,
            DateField::UpdatedAt => self.updated_at,
        }
    }
}
