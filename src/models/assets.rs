use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{default_currency, Identified, UnknownVariant};
use crate::aggregation::{DateField, Grouping, Measure, Measured};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Home,
    #[serde(rename = "fd")]
    FixedDeposit,
    #[serde(rename = "rd")]
    RecurringDeposit,
    Stock,
    MutualFund,
    Property,
    ForeignStock,
    Rsu,
    DirectInvestment,
    Gold,
    Crypto,
    Cash,
    Other,
}

impl AssetType {
    pub const ALL: [AssetType; 13] = [
        AssetType::Home,
        AssetType::FixedDeposit,
        AssetType::RecurringDeposit,
        AssetType::Stock,
        AssetType::MutualFund,
        AssetType::Property,
        AssetType::ForeignStock,
        AssetType::Rsu,
        AssetType::DirectInvestment,
        AssetType::Gold,
        AssetType::Crypto,
        AssetType::Cash,
        AssetType::Other,
    ];

    /// Name stored in the `type` column and used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Home => "home",
            AssetType::FixedDeposit => "fd",
            AssetType::RecurringDeposit => "rd",
            AssetType::Stock => "stock",
            AssetType::MutualFund => "mutual_fund",
            AssetType::Property => "property",
            AssetType::ForeignStock => "foreign_stock",
            AssetType::Rsu => "rsu",
            AssetType::DirectInvestment => "direct_investment",
            AssetType::Gold => "gold",
            AssetType::Crypto => "crypto",
            AssetType::Cash => "cash",
            AssetType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssetType::Home => "Primary Home",
            AssetType::FixedDeposit => "Fixed Deposits",
            AssetType::RecurringDeposit => "Recurring Deposits",
            AssetType::Stock => "Stocks",
            AssetType::MutualFund => "Mutual Funds",
            AssetType::Property => "Real Estate",
            AssetType::ForeignStock => "Foreign Stocks",
            AssetType::Rsu => "RSUs",
            AssetType::DirectInvestment => "Direct Investments",
            AssetType::Gold => "Gold & Precious Metals",
            AssetType::Crypto => "Cryptocurrency",
            AssetType::Cash => "Cash & Savings",
            AssetType::Other => "Other",
        }
    }
}

impl FromStr for AssetType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AssetType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "asset type",
                value: value.to_string(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Asset {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: AssetType,
    pub subtype: Option<String>,
    pub name: String,
    pub value: f64,
    pub currency: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewAsset {
    #[serde(rename = "type")]
    pub kind: AssetType,
    #[serde(default)]
    pub subtype: Option<String>,
    pub name: String,
    pub value: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AssetPatch {
    #[serde(rename = "type", default)]
    pub kind: Option<AssetType>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Asset {
    pub fn new(id: String, user_id: String, fields: NewAsset, now: DateTime<Utc>) -> Self {
        Asset {
            id,
            user_id,
            kind: fields.kind,
            subtype: fields.subtype,
            name: fields.name,
            value: fields.value,
            currency: fields.currency,
            metadata: fields.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: AssetPatch, now: DateTime<Utc>) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(subtype) = patch.subtype {
            self.subtype = Some(subtype);
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(value) = patch.value {
            self.value = value;
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

impl Identified for Asset {
    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Measured for Asset {
    fn measure(&self, measure: Measure) -> Option<f64> {
        match measure {
            Measure::Value => Some(self.value),
            _ => None,
        }
    }

    fn group_key(&self, grouping: Grouping) -> Option<&str> {
        match grouping {
            Grouping::Kind => Some(self.kind.as_str()),
            Grouping::Subtype => self.subtype.as_deref(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for kind in AssetType::ALL {
            assert_eq!(kind.as_str().parse::<AssetType>().unwrap(), kind);
        }
        assert!("savings".parse::<AssetType>().is_err());
    }

    #[test]
    fn new_asset_defaults_currency() {
        let fields: NewAsset =
            serde_json::from_str(r#"{"type":"fd","name":"Bank FD","value":1000}"#).unwrap();

        assert_eq!(fields.kind, AssetType::FixedDeposit);
        assert_eq!(fields.currency, "INR");
        assert!(fields.subtype.is_none());
    }

    #[test]
    fn patch_only_touches_provided_fields() {
        let created = Utc::now();
        let mut asset = Asset::new(
            "a1".to_string(),
            "u1".to_string(),
            NewAsset {
                kind: AssetType::Cash,
                subtype: None,
                name: "Emergency Fund".to_string(),
                value: 25000.0,
                currency: "USD".to_string(),
                metadata: None,
            },
            created,
        );
        let later = created + chrono::Duration::minutes(5);

        asset.apply(
            AssetPatch {
                value: Some(26000.0),
                ..Default::default()
            },
            later,
        );

        assert_eq!(asset.value, 26000.0);
        assert_eq!(asset.name, "Emergency Fund");
        assert_eq!(asset.currency, "USD");
        assert_eq!(asset.created_at, created);
        assert_eq!(asset.updated_at, later);
    }
}
