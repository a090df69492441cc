use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assets::{Asset, AssetPatch, NewAsset};
use super::debts::{Debt, DebtPatch, NewDebt};
use super::{Identified, MemberScoped, UnknownVariant};
use crate::aggregation::{DateField, Grouping, Measure, Measured};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Spouse,
    Child,
    Parent,
    Sibling,
    Grandparent,
    Grandchild,
    Other,
}

impl Relation {
    pub const ALL: [Relation; 7] = [
        Relation::Spouse,
        Relation::Child,
        Relation::Parent,
        Relation::Sibling,
        Relation::Grandparent,
        Relation::Grandchild,
        Relation::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Spouse => "spouse",
            Relation::Child => "child",
            Relation::Parent => "parent",
            Relation::Sibling => "sibling",
            Relation::Grandparent => "grandparent",
            Relation::Grandchild => "grandchild",
            Relation::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Relation::Spouse => "Spouse",
            Relation::Child => "Child",
            Relation::Parent => "Parent",
            Relation::Sibling => "Sibling",
            Relation::Grandparent => "Grandparent",
            Relation::Grandchild => "Grandchild",
            Relation::Other => "Other",
        }
    }
}

impl FromStr for Relation {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Relation::ALL
            .into_iter()
            .find(|relation| relation.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "relation",
                value: value.to_string(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FamilyMember {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub relation: Relation,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewFamilyMember {
    pub name: String,
    pub relation: Relation,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FamilyMemberPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub relation: Option<Relation>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl FamilyMember {
    pub fn new(id: String, user_id: String, fields: NewFamilyMember, now: DateTime<Utc>) -> Self {
        FamilyMember {
            id,
            user_id,
            name: fields.name,
            relation: fields.relation,
            avatar_url: fields.avatar_url,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: FamilyMemberPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(relation) = patch.relation {
            self.relation = relation;
        }
        if let Some(avatar_url) = patch.avatar_url {
            self.avatar_url = Some(avatar_url);
        }
        self.updated_at = now;
    }
}

impl Identified for FamilyMember {
    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Measured for FamilyMember {
    fn measure(&self, _measure: Measure) -> Option<f64> {
        None
    }

    fn group_key(&self, grouping: Grouping) -> Option<&str> {
        match grouping {
            Grouping::Kind => Some(self.relation.as_str()),
            _ => None,
        }
    }

    fn date(&self, field: DateField) -> DateTime<Utc> {
        match field {
            DateField::CreatedAt => self.created_at,
            DateField::UpdatedAt => self.updated_at,
        }
    }
}

/// An asset held by a family member. Serialized flat, as the asset's fields
/// plus `family_member_id`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FamilyAsset {
    pub family_member_id: String,
    #[serde(flatten)]
    pub asset: Asset,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewFamilyAsset {
    pub family_member_id: String,
    #[serde(flatten)]
    pub asset: NewAsset,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FamilyAssetPatch {
    #[serde(default)]
    pub family_member_id: Option<String>,
    #[serde(flatten)]
    pub asset: AssetPatch,
}

impl FamilyAsset {
    pub fn new(id: String, user_id: String, fields: NewFamilyAsset, now: DateTime<Utc>) -> Self {
        FamilyAsset {
            family_member_id: fields.family_member_id,
            asset: Asset::new(id, user_id, fields.asset, now),
        }
    }

    pub fn apply(&mut self, patch: FamilyAssetPatch, now: DateTime<Utc>) {
        if let Some(member) = patch.family_member_id {
            self.family_member_id = member;
        }
        self.asset.apply(patch.asset, now);
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FamilyDebt {
    pub family_member_id: String,
    #[serde(flatten)]
    pub debt: Debt,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewFamilyDebt {
    pub family_member_id: String,
    #[serde(flatten)]
    pub debt: NewDebt,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FamilyDebtPatch {
    #[serde(default)]
    pub family_member_id: Option<String>,
    #[serde(flatten)]
    pub debt: DebtPatch,
}

impl FamilyDebt {
    pub fn new(id: String, user_id: String, fields: NewFamilyDebt, now: DateTime<Utc>) -> Self {
        FamilyDebt {
            family_member_id: fields.family_member_id,
            debt: Debt::new(id, user_id, fields.debt, now),
        }
    }

    pub fn apply(&mut self, patch: FamilyDebtPatch, now: DateTime<Utc>) {
        if let Some(member) = patch.family_member_id {
            self.family_member_id = member;
        }
        self.debt.apply(patch.debt, now);
    }
}

impl Identified for FamilyAsset {
    fn id(&self) -> &str {
        &self.asset.id
    }

    fn user_id(&self) -> &str {
        &self.asset.user_id
    }
}

impl Identified for FamilyDebt {
    fn id(&self) -> &str {
        &self.debt.id
    }

    fn user_id(&self) -> &str {
        &self.debt.user_id
    }
}

impl MemberScoped for FamilyAsset {
    fn family_member_id(&self) -> &str {
        &self.family_member_id
    }
}

impl MemberScoped for FamilyDebt {
    fn family_member_id(&self) -> &str {
        &self.family_member_id
    }
}

impl Measured for FamilyAsset {
    fn measure(&self, measure: Measure) -> Option<f64> {
        self.asset.measure(measure)
    }

    fn group_key(&self, grouping: Grouping) -> Option<&str> {
        self.asset.group_key(grouping)
    }

    fn date(&self, field: DateField) -> DateTime<Utc> {
        self.asset.date(field)
    }
}

impl Measured for FamilyDebt {
    fn measure(&self, measure: Measure) -> Option<f64> {
        self.debt.measure(measure)
    }

    fn group_key(&self, grouping: Grouping) -> Option<&str> {
        self.debt.group_key(grouping)
    }

    fn date(&self, field: DateField) -> DateTime<Utc> {
        self.debt.date(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_asset_serializes_flat() {
        let fields: NewFamilyAsset = serde_json::from_str(
            r#"{"family_member_id":"m1","type":"gold","name":"Coins","value":1200}"#,
        )
        .unwrap();
        let asset = FamilyAsset::new("fa1".to_string(), "u1".to_string(), fields, Utc::now());

        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["family_member_id"], "m1");
        assert_eq!(json["type"], "gold");
        assert_eq!(json["currency"], "INR");
        assert_eq!(json["id"], "fa1");
    }

    #[test]
    fn unknown_relation_is_rejected() {
        let result = serde_json::from_str::<NewFamilyMember>(r#"{"name":"Sam","relation":"cousin"}"#);
        assert!(result.is_err());
        assert_eq!("grandchild".parse::<Relation>().unwrap(), Relation::Grandchild);
    }
}
