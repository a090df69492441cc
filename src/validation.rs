use serde::Serialize;

use crate::models::{
    assets::{AssetPatch, NewAsset},
    debts::{DebtPatch, NewDebt},
    family::{
        FamilyAssetPatch, FamilyDebtPatch, FamilyMemberPatch, NewFamilyAsset, NewFamilyDebt,
        NewFamilyMember,
    },
    users::Credentials,
};

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, thiserror::Error)]
#[error("invalid input: {}", join_errors(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{} {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field == field)
    }

    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn required(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "is required");
        }
    }

    fn at_least(&mut self, field: &'static str, value: f64, min: f64) {
        if !value.is_finite() {
            self.push(field, "must be a number");
        } else if value < min {
            self.push(field, format!("must be at least {min}"));
        }
    }

    fn currency(&mut self, value: &str) {
        if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
            self.push("currency", "must be a three-letter currency code");
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Input checks run before anything is sent to the record store.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

impl Validate for NewAsset {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("name", &self.name);
        errors.at_least("value", self.value, 0.0);
        errors.currency(&self.currency);
        errors.finish()
    }
}

impl Validate for AssetPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(name) = &self.name {
            errors.required("name", name);
        }
        if let Some(value) = self.value {
            errors.at_least("value", value, 0.0);
        }
        if let Some(currency) = &self.currency {
            errors.currency(currency);
        }
        errors.finish()
    }
}

impl Validate for NewDebt {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("lender", &self.lender);
        errors.at_least("principal", self.principal, 0.0);
        errors.at_least("balance", self.balance, 0.0);
        if let Some(rate) = self.interest_rate {
            errors.at_least("interest_rate", rate, 0.0);
        }
        if let Some(term) = self.term_years {
            errors.at_least("term_years", f64::from(term), 1.0);
        }
        errors.currency(&self.currency);
        errors.finish()
    }
}

impl Validate for DebtPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(lender) = &self.lender {
            errors.required("lender", lender);
        }
        if let Some(principal) = self.principal {
            errors.at_least("principal", principal, 0.0);
        }
        if let Some(balance) = self.balance {
            errors.at_least("balance", balance, 0.0);
        }
        if let Some(rate) = self.interest_rate {
            errors.at_least("interest_rate", rate, 0.0);
        }
        if let Some(term) = self.term_years {
            errors.at_least("term_years", f64::from(term), 1.0);
        }
        if let Some(currency) = &self.currency {
            errors.currency(currency);
        }
        errors.finish()
    }
}

impl Validate for NewFamilyMember {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("name", &self.name);
        errors.finish()
    }
}

impl Validate for FamilyMemberPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(name) = &self.name {
            errors.required("name", name);
        }
        errors.finish()
    }
}

fn merge(
    mut errors: ValidationErrors,
    inner: Result<(), ValidationErrors>,
) -> Result<(), ValidationErrors> {
    if let Err(inner) = inner {
        errors.errors.extend(inner.errors);
    }
    errors.finish()
}

impl Validate for NewFamilyAsset {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("family_member_id", &self.family_member_id);
        merge(errors, self.asset.validate())
    }
}

impl Validate for FamilyAssetPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(member) = &self.family_member_id {
            errors.required("family_member_id", member);
        }
        merge(errors, self.asset.validate())
    }
}

impl Validate for NewFamilyDebt {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("family_member_id", &self.family_member_id);
        merge(errors, self.debt.validate())
    }
}

impl Validate for FamilyDebtPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(member) = &self.family_member_id {
            errors.required("family_member_id", member);
        }
        merge(errors, self.debt.validate())
    }
}

impl Validate for Credentials {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if !self.email.contains('@') {
            errors.push("email", "must be an email address");
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(
                "password",
                format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
            );
        }
        errors.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{assets::AssetType, debts::DebtType};

    fn new_debt() -> NewDebt {
        NewDebt {
            kind: DebtType::HomeLoan,
            lender: "Wells Fargo".to_string(),
            principal: 350000.0,
            interest_rate: Some(3.2),
            term_years: Some(30),
            balance: 320000.0,
            currency: "USD".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn message_lists_every_failing_field() {
        let debt = NewDebt {
            lender: " ".to_string(),
            balance: -5.0,
            ..new_debt()
        };

        let errors = debt.validate().unwrap_err();
        assert_eq!(
            errors.to_string(),
            "invalid input: lender is required, balance must be at least 0"
        );
    }

    #[test]
    fn accepts_a_well_formed_debt() {
        assert!(new_debt().validate().is_ok());
    }

    #[test]
    fn rejects_negative_amounts_and_short_terms() {
        let debt = NewDebt {
            principal: -1.0,
            balance: -5.0,
            interest_rate: Some(-0.5),
            term_years: Some(0),
            ..new_debt()
        };

        let errors = debt.validate().unwrap_err();
        assert!(errors.field("principal").is_some());
        assert!(errors.field("balance").is_some());
        assert!(errors.field("interest_rate").is_some());
        assert_eq!(errors.field("term_years").unwrap().message, "must be at least 1");
        assert!(errors.field("lender").is_none());
    }

    #[test]
    fn rejects_blank_required_fields() {
        let asset = NewAsset {
            kind: AssetType::Cash,
            subtype: None,
            name: "   ".to_string(),
            value: f64::NAN,
            currency: "RUPEES".to_string(),
            metadata: None,
        };

        let errors = asset.validate().unwrap_err();
        assert_eq!(errors.errors.len(), 3);
        assert_eq!(errors.field("value").unwrap().message, "must be a number");
    }

    #[test]
    fn empty_patch_is_valid() {
        assert!(AssetPatch::default().validate().is_ok());
        assert!(FamilyDebtPatch::default().validate().is_ok());
    }

    #[test]
    fn family_record_errors_include_nested_fields() {
        let debt = NewFamilyDebt {
            family_member_id: String::new(),
            debt: NewDebt {
                balance: -1.0,
                ..new_debt()
            },
        };

        let errors = debt.validate().unwrap_err();
        assert!(errors.field("family_member_id").is_some());
        assert!(errors.field("balance").is_some());
    }

    #[test]
    fn credentials_need_email_and_password_length() {
        let credentials = Credentials {
            email: "not-an-email".to_string(),
            password: "123".to_string(),
        };

        let errors = credentials.validate().unwrap_err();
        assert_eq!(errors.errors.len(), 2);
    }
}
