use std::sync::Arc;

use tokio::sync::oneshot;

use finance_tracker::aggregation::{self, Grouping, Measure};
use finance_tracker::models::{
    assets::{AssetType, NewAsset},
    debts::{DebtType, NewDebt},
    family::{NewFamilyAsset, NewFamilyMember, Relation},
    users::Credentials,
};
use finance_tracker::repositories::{
    AssetTable, DebtTable, FamilyAssetTable, FamilyMemberTable, MemoryStore,
};
use finance_tracker::services::{
    ledger::{Ledger, LedgerRequest, TableRequest},
    session::SessionRequest,
    spawn_services, ServiceError,
};
use finance_tracker::session::SessionContext;

fn asset(kind: AssetType, name: &str, value: f64) -> NewAsset {
    NewAsset {
        kind,
        subtype: None,
        name: name.to_string(),
        value,
        currency: "INR".to_string(),
        metadata: None,
    }
}

fn card_debt(balance: f64) -> NewDebt {
    NewDebt {
        kind: DebtType::CreditCard,
        lender: "HDFC".to_string(),
        principal: balance,
        interest_rate: Some(36.0),
        term_years: Some(1),
        balance,
        currency: "INR".to_string(),
        metadata: None,
    }
}

async fn sign_up(channels: &finance_tracker::services::Channels, email: &str) {
    let (response, reply) = oneshot::channel();
    channels
        .session
        .send(SessionRequest::SignUp {
            credentials: Credentials {
                email: email.to_string(),
                password: "secret-pass".to_string(),
            },
            response,
        })
        .await
        .unwrap();
    reply.await.unwrap().unwrap();
}

#[tokio::test]
async fn net_worth_through_the_services() {
    let channels = spawn_services(Arc::new(MemoryStore::new()));
    sign_up(&channels, "family@example.com").await;

    for fields in [
        asset(AssetType::FixedDeposit, "FD", 10000.0),
        asset(AssetType::Gold, "Gold", 15000.0),
    ] {
        let (response, reply) = oneshot::channel();
        channels
            .ledger
            .send(LedgerRequest::Assets(TableRequest::Create { fields, response }))
            .await
            .unwrap();
        reply.await.unwrap().unwrap();
    }

    let (response, reply) = oneshot::channel();
    channels
        .ledger
        .send(LedgerRequest::Debts(TableRequest::Create {
            fields: card_debt(2500.0),
            response,
        }))
        .await
        .unwrap();
    reply.await.unwrap().unwrap();

    let (response, reply) = oneshot::channel();
    channels
        .ledger
        .send(LedgerRequest::Summary { response })
        .await
        .unwrap();
    let summary = reply.await.unwrap().unwrap();

    assert_eq!(summary.total_assets, 25000.0);
    assert_eq!(summary.total_debts, 2500.0);
    assert_eq!(summary.net_worth, 22500.0);
    assert_eq!(summary.asset_breakdown.len(), 2);
    assert_eq!(summary.asset_breakdown[0].key, "gold");
}

#[tokio::test]
async fn signed_out_writes_are_refused() {
    let channels = spawn_services(Arc::new(MemoryStore::new()));

    let (response, reply) = oneshot::channel();
    channels
        .ledger
        .send(LedgerRequest::Assets(TableRequest::Create {
            fields: asset(AssetType::Cash, "Wallet", 50.0),
            response,
        }))
        .await
        .unwrap();

    assert!(matches!(
        reply.await.unwrap(),
        Err(ServiceError::Unauthenticated)
    ));
}

#[tokio::test]
async fn family_breakdowns_follow_the_ledger() {
    let store = Arc::new(MemoryStore::new());
    let session = SessionContext::new();
    let ledger = Ledger::new(store, session.clone());
    session.establish(finance_tracker::models::users::User {
        id: "u1".to_string(),
        email: "u1@example.com".to_string(),
        created_at: chrono::Utc::now(),
    });

    let parent = ledger
        .create::<FamilyMemberTable>(NewFamilyMember {
            name: "Meera".to_string(),
            relation: Relation::Parent,
            avatar_url: None,
        })
        .await
        .unwrap();
    for (kind, value) in [
        (AssetType::Property, 500000.0),
        (AssetType::Gold, 20000.0),
        (AssetType::Gold, 5000.0),
    ] {
        ledger
            .create::<FamilyAssetTable>(NewFamilyAsset {
                family_member_id: parent.id.clone(),
                asset: asset(kind, "Holding", value),
            })
            .await
            .unwrap();
    }
    ledger
        .create::<AssetTable>(asset(AssetType::Cash, "Own cash", 100.0))
        .await
        .unwrap();
    ledger.create::<DebtTable>(card_debt(40.0)).await.unwrap();

    let family_assets = ledger.list::<FamilyAssetTable>(Some(&parent.id)).await.unwrap();
    let breakdown = aggregation::breakdown_by_type(&family_assets, Grouping::Kind, Measure::Value);
    assert_eq!(breakdown.get("gold"), Some(&25000.0));
    assert_eq!(breakdown.get("property"), Some(&500000.0));

    let overview = ledger.family_overview().await.unwrap();
    assert_eq!(overview.total_assets, 525000.0);
    assert_eq!(overview.members.len(), 1);

    let summary = ledger.summary().await.unwrap();
    assert_eq!(summary.net_worth, 60.0);
}

#[tokio::test]
async fn cash_minus_personal_loan() {
    let store = Arc::new(MemoryStore::new());
    let session = SessionContext::new();
    let ledger = Ledger::new(store, session.clone());
    session.establish(finance_tracker::models::users::User {
        id: "u1".to_string(),
        email: "u1@example.com".to_string(),
        created_at: chrono::Utc::now(),
    });
    assert_eq!(ledger.summary().await.unwrap().net_worth, 0.0);

    ledger
        .create::<AssetTable>(asset(AssetType::Cash, "Savings", 25000.0))
        .await
        .unwrap();
    ledger
        .create::<DebtTable>(NewDebt {
            kind: DebtType::Personal,
            lender: "Friend".to_string(),
            principal: 2500.0,
            interest_rate: None,
            term_years: None,
            balance: 2500.0,
            currency: "INR".to_string(),
            metadata: None,
        })
        .await
        .unwrap();

    let assets = ledger.list::<AssetTable>(None).await.unwrap();
    let debts = ledger.list::<DebtTable>(None).await.unwrap();
    assert_eq!(aggregation::net_worth(&assets, &debts), 22500.0);
}
