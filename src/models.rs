use serde::{Deserialize, Serialize};

pub mod assets;
pub mod debts;
pub mod family;
pub mod users;

pub const DEFAULT_CURRENCY: &str = "INR";

pub(crate) fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// The tables a user's records live in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Asset,
    Debt,
    FamilyMember,
    FamilyAsset,
    FamilyDebt,
}

impl EntityKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Asset => "assets",
            EntityKind::Debt => "debts",
            EntityKind::FamilyMember => "family_members",
            EntityKind::FamilyAsset => "family_assets",
            EntityKind::FamilyDebt => "family_debts",
        }
    }
}

/// Identity of a stored row and of the user that owns it.
pub trait Identified {
    fn id(&self) -> &str;
    fn user_id(&self) -> &str;
}

/// Records that are additionally scoped to a family member.
pub trait MemberScoped {
    fn family_member_id(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
