//! Derived figures over fetched asset and debt records.
//!
//! Everything here is a pure function of its inputs. A measure a record does
//! not carry counts as 0; a grouping key a record does not carry is skipped.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::models::{Identified, MemberScoped};

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Numeric fields that can be summed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Measure {
    Value,
    Principal,
    Balance,
    InterestRate,
    TermYears,
}

/// Categorical fields a breakdown can group by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grouping {
    Kind,
    Subtype,
    Currency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateField {
    CreatedAt,
    UpdatedAt,
}

pub trait Measured {
    fn measure(&self, measure: Measure) -> Option<f64>;
    fn group_key(&self, grouping: Grouping) -> Option<&str>;
    fn date(&self, field: DateField) -> DateTime<Utc>;
}

fn amount<R: Measured>(record: &R, measure: Measure) -> f64 {
    record.measure(measure).unwrap_or(0.0)
}

pub fn total_value<R: Measured>(records: &[R], measure: Measure) -> f64 {
    records.iter().map(|record| amount(record, measure)).sum()
}

/// Asset value minus debt balance. Never clamped.
pub fn net_worth<A: Measured, D: Measured>(assets: &[A], debts: &[D]) -> f64 {
    total_value(assets, Measure::Value) - total_value(debts, Measure::Balance)
}

/// Sum of `measure` per distinct group key. Only keys present in the input
/// appear in the result.
pub fn breakdown_by_type<R: Measured>(
    records: &[R],
    grouping: Grouping,
    measure: Measure,
) -> HashMap<String, f64> {
    let mut breakdown = HashMap::new();
    for record in records {
        if let Some(key) = record.group_key(grouping) {
            *breakdown.entry(key.to_string()).or_insert(0.0) += amount(record, measure);
        }
    }
    breakdown
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BreakdownEntry {
    pub key: String,
    pub value: f64,
}

/// Descending by value, ties alphabetical.
pub fn sorted_by_value(breakdown: &HashMap<String, f64>) -> Vec<BreakdownEntry> {
    let mut entries = to_entries(breakdown);
    entries.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
    entries
}

pub fn sorted_by_name(breakdown: &HashMap<String, f64>) -> Vec<BreakdownEntry> {
    let mut entries = to_entries(breakdown);
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
}

fn to_entries(breakdown: &HashMap<String, f64>) -> Vec<BreakdownEntry> {
    breakdown
        .iter()
        .map(|(key, value)| BreakdownEntry {
            key: key.clone(),
            value: *value,
        })
        .collect()
}

/// Percentage of `total` that `part` represents, 0 for an empty total.
pub fn share_of_total(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total * 100.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityMetrics {
    pub entity_id: String,
    pub total_assets: f64,
    pub total_debts: f64,
    pub net_worth: f64,
    pub asset_count: usize,
    pub debt_count: usize,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Metrics for each entity, computed only from the records whose member
/// reference matches that entity.
pub fn per_entity_metrics<E, A, D>(entities: &[E], assets: &[A], debts: &[D]) -> Vec<EntityMetrics>
where
    E: Identified,
    A: Measured + MemberScoped,
    D: Measured + MemberScoped,
{
    entities
        .iter()
        .map(|entity| {
            let id = entity.id();
            let owned_assets: Vec<&A> = assets
                .iter()
                .filter(|asset| asset.family_member_id() == id)
                .collect();
            let owned_debts: Vec<&D> = debts
                .iter()
                .filter(|debt| debt.family_member_id() == id)
                .collect();

            let total_assets: f64 = owned_assets
                .iter()
                .map(|asset| amount(*asset, Measure::Value))
                .sum();
            let total_debts: f64 = owned_debts
                .iter()
                .map(|debt| amount(*debt, Measure::Balance))
                .sum();
            let last_modified = owned_assets
                .iter()
                .map(|asset| latest_change(*asset))
                .chain(owned_debts.iter().map(|debt| latest_change(*debt)))
                .max();

            EntityMetrics {
                entity_id: id.to_string(),
                total_assets,
                total_debts,
                net_worth: total_assets - total_debts,
                asset_count: owned_assets.len(),
                debt_count: owned_debts.len(),
                last_modified,
            }
        })
        .collect()
}

/// Twelve month-of-year buckets, January first. Records from different years
/// land in the same bucket; see `monthly_series` for a per-year series.
/// Months are read in UTC, so a record stamped near midnight at a month
/// boundary may land in the neighbouring month of the viewer's local calendar.
pub fn monthly_buckets<R: Measured>(records: &[R], field: DateField, measure: Measure) -> [f64; 12] {
    let mut buckets = [0.0; 12];
    for record in records {
        let month = record.date(field).month0() as usize;
        buckets[month] += amount(record, measure);
    }
    buckets
}

/// Sums keyed by `(year, month)` with months numbered 1 to 12.
pub fn monthly_series<R: Measured>(
    records: &[R],
    field: DateField,
    measure: Measure,
) -> BTreeMap<(i32, u32), f64> {
    let mut series = BTreeMap::new();
    for record in records {
        let date = record.date(field);
        *series.entry((date.year(), date.month())).or_insert(0.0) += amount(record, measure);
    }
    series
}

pub fn average_value<R: Measured>(records: &[R], measure: Measure) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    total_value(records, measure) / records.len() as f64
}

pub fn max_value<R: Measured>(records: &[R], measure: Measure) -> f64 {
    records
        .iter()
        .map(|record| amount(record, measure))
        .fold(None, |max: Option<f64>, value| {
            Some(max.map_or(value, |max| max.max(value)))
        })
        .unwrap_or(0.0)
}

/// Latest `updated_at` across the records.
pub fn last_modified<R: Measured>(records: &[R]) -> Option<DateTime<Utc>> {
    records
        .iter()
        .map(latest_change)
        .max()
}

fn latest_change<R: Measured>(record: &R) -> DateTime<Utc> {
    record.date(DateField::UpdatedAt).max(record.date(DateField::CreatedAt))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub total_assets: f64,
    pub total_debts: f64,
    pub net_worth: f64,
    pub asset_count: usize,
    pub debt_count: usize,
    pub total_principal: f64,
    pub average_asset_value: f64,
    pub highest_asset_value: f64,
    pub asset_breakdown: Vec<BreakdownEntry>,
    pub debt_breakdown: Vec<BreakdownEntry>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FinancialSummary {
    pub fn compute<A: Measured, D: Measured>(assets: &[A], debts: &[D]) -> Self {
        let total_assets = total_value(assets, Measure::Value);
        let total_debts = total_value(debts, Measure::Balance);

        FinancialSummary {
            total_assets,
            total_debts,
            net_worth: total_assets - total_debts,
            asset_count: assets.len(),
            debt_count: debts.len(),
            total_principal: total_value(debts, Measure::Principal),
            average_asset_value: average_value(assets, Measure::Value),
            highest_asset_value: max_value(assets, Measure::Value),
            asset_breakdown: sorted_by_value(&breakdown_by_type(
                assets,
                Grouping::Kind,
                Measure::Value,
            )),
            debt_breakdown: sorted_by_value(&breakdown_by_type(
                debts,
                Grouping::Kind,
                Measure::Balance,
            )),
            last_modified: last_modified(assets).max(last_modified(debts)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FamilyOverview {
    pub total_assets: f64,
    pub total_debts: f64,
    pub net_worth: f64,
    pub members: Vec<EntityMetrics>,
    /// Members with a positive net worth, the feed for the comparison chart.
    pub contributing_members: Vec<EntityMetrics>,
    pub asset_breakdown: Vec<BreakdownEntry>,
    pub debt_breakdown: Vec<BreakdownEntry>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FamilyOverview {
    pub fn compute<E, A, D>(members: &[E], assets: &[A], debts: &[D]) -> Self
    where
        E: Identified + Measured,
        A: Measured + MemberScoped,
        D: Measured + MemberScoped,
    {
        let metrics = per_entity_metrics(members, assets, debts);
        let contributing_members = metrics
            .iter()
            .filter(|member| member.net_worth > 0.0)
            .cloned()
            .collect();
        let last_modified = last_modified(members)
            .max(last_modified(assets))
            .max(last_modified(debts));

        FamilyOverview {
            total_assets: total_value(assets, Measure::Value),
            total_debts: total_value(debts, Measure::Balance),
            net_worth: net_worth(assets, debts),
            members: metrics,
            contributing_members,
            asset_breakdown: sorted_by_value(&breakdown_by_type(
                assets,
                Grouping::Kind,
                Measure::Value,
            )),
            debt_breakdown: sorted_by_value(&breakdown_by_type(
                debts,
                Grouping::Kind,
                Measure::Balance,
            )),
            last_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Row {
        id: &'static str,
        member: &'static str,
        kind: &'static str,
        value: Option<f64>,
        balance: Option<f64>,
        at: DateTime<Utc>,
    }

    impl Measured for Row {
        fn measure(&self, measure: Measure) -> Option<f64> {
            match measure {
                Measure::Value => self.value,
                Measure::Balance => self.balance,
                _ => None,
            }
        }

        fn group_key(&self, grouping: Grouping) -> Option<&str> {
            match grouping {
                Grouping::Kind => Some(self.kind),
                _ => None,
            }
        }

        fn date(&self, _field: DateField) -> DateTime<Utc> {
            self.at
        }
    }

    impl Identified for Row {
        fn id(&self) -> &str {
            self.id
        }

        fn user_id(&self) -> &str {
            "u1"
        }
    }

    impl MemberScoped for Row {
        fn family_member_id(&self) -> &str {
            self.member
        }
    }

    fn at(year: i32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, 15, 12, 0, 0).unwrap()
    }

    fn asset(kind: &'static str, value: f64) -> Row {
        Row {
            id: "a",
            member: "",
            kind,
            value: Some(value),
            balance: None,
            at: at(2024, 1),
        }
    }

    fn debt(kind: &'static str, balance: f64) -> Row {
        Row {
            id: "d",
            member: "",
            kind,
            value: None,
            balance: Some(balance),
            at: at(2024, 1),
        }
    }

    fn owned(member: &'static str, value: Option<f64>, balance: Option<f64>) -> Row {
        Row {
            id: "x",
            member,
            kind: "cash",
            value,
            balance,
            at: at(2024, 1),
        }
    }

    fn entity(id: &'static str) -> Row {
        Row {
            id,
            member: "",
            kind: "member",
            value: None,
            balance: None,
            at: at(2024, 1),
        }
    }

    #[test]
    fn total_of_empty_list_is_zero() {
        let rows: Vec<Row> = Vec::new();
        assert_eq!(total_value(&rows, Measure::Value), 0.0);
    }

    #[test]
    fn total_ignores_order_and_missing_fields() {
        let mut rows = vec![asset("cash", 100.0), asset("stock", 250.5), asset("gold", 49.5)];
        rows.push(Row {
            value: None,
            ..asset("other", 0.0)
        });
        let forward = total_value(&rows, Measure::Value);
        rows.reverse();

        assert_eq!(forward, 400.0);
        assert_eq!(total_value(&rows, Measure::Value), forward);
    }

    #[test]
    fn net_worth_can_go_negative() {
        let assets = vec![asset("cash", 400.0), asset("stock", 600.0)];
        let debts = vec![debt("personal", 2000.0), debt("credit_card", 500.0)];

        assert_eq!(net_worth(&assets, &debts), -1500.0);
    }

    #[test]
    fn breakdown_keys_are_only_observed_types() {
        let assets = vec![asset("cash", 100.0), asset("stock", 200.0), asset("cash", 50.0)];
        let breakdown = breakdown_by_type(&assets, Grouping::Kind, Measure::Value);

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown["cash"], 150.0);
        assert_eq!(breakdown["stock"], 200.0);
    }

    #[test]
    fn breakdown_skips_records_without_the_key() {
        let assets = vec![asset("cash", 100.0)];
        assert!(breakdown_by_type(&assets, Grouping::Subtype, Measure::Value).is_empty());
    }

    #[test]
    fn breakdown_sorts_for_display() {
        let assets = vec![asset("cash", 100.0), asset("stock", 200.0), asset("gold", 100.0)];
        let breakdown = breakdown_by_type(&assets, Grouping::Kind, Measure::Value);

        let by_value: Vec<String> = sorted_by_value(&breakdown).into_iter().map(|e| e.key).collect();
        let by_name: Vec<String> = sorted_by_name(&breakdown).into_iter().map(|e| e.key).collect();

        assert_eq!(by_value, vec!["stock", "cash", "gold"]);
        assert_eq!(by_name, vec!["cash", "gold", "stock"]);
    }

    #[test]
    fn share_of_empty_total_is_zero() {
        assert_eq!(share_of_total(10.0, 0.0), 0.0);
        assert_eq!(share_of_total(25.0, 200.0), 12.5);
    }

    #[test]
    fn average_of_empty_list_is_zero() {
        let rows: Vec<Row> = Vec::new();
        assert_eq!(average_value(&rows, Measure::Value), 0.0);

        let rows = vec![asset("cash", 10.0), asset("cash", 20.0)];
        assert_eq!(average_value(&rows, Measure::Value), 15.0);
    }

    #[test]
    fn max_value_defaults_to_zero() {
        let rows: Vec<Row> = Vec::new();
        assert_eq!(max_value(&rows, Measure::Value), 0.0);

        let rows = vec![asset("cash", 5.0), asset("cash", 30.0), asset("cash", 12.0)];
        assert_eq!(max_value(&rows, Measure::Value), 30.0);
    }

    #[test]
    fn per_entity_metrics_isolate_members() {
        let members = vec![entity("A"), entity("B"), entity("C")];
        let assets = vec![
            owned("A", Some(1000.0), None),
            owned("B", Some(300.0), None),
            owned("A", Some(500.0), None),
        ];
        let debts = vec![owned("B", None, Some(800.0))];

        let metrics = per_entity_metrics(&members, &assets, &debts);

        assert_eq!(metrics[0].entity_id, "A");
        assert_eq!(metrics[0].total_assets, 1500.0);
        assert_eq!(metrics[0].asset_count, 2);
        assert_eq!(metrics[0].debt_count, 0);
        assert_eq!(metrics[1].total_assets, 300.0);
        assert_eq!(metrics[1].net_worth, -500.0);
        assert_eq!(metrics[2].net_worth, 0.0);
        assert_eq!(metrics[2].asset_count, 0);
    }

    #[test]
    fn member_last_modified_follows_their_own_records() {
        let members = vec![entity("A"), entity("B")];
        let assets = vec![
            Row {
                at: at(2024, 4),
                ..owned("A", Some(10.0), None)
            },
            Row {
                at: at(2024, 11),
                ..owned("B", Some(10.0), None)
            },
        ];
        let debts = vec![Row {
            at: at(2024, 6),
            ..owned("A", None, Some(5.0))
        }];

        let metrics = per_entity_metrics(&members, &assets, &debts);

        assert_eq!(metrics[0].last_modified, Some(at(2024, 6)));
        assert_eq!(metrics[1].last_modified, Some(at(2024, 11)));
        let idle = per_entity_metrics(&[entity("C")], &assets, &debts);
        assert_eq!(idle[0].last_modified, None);
    }

    #[test]
    fn monthly_buckets_use_the_utc_month() {
        let rows = vec![
            Row {
                at: Utc.with_ymd_and_hms(2024, 1, 31, 23, 30, 0).unwrap(),
                ..asset("cash", 40.0)
            },
            Row {
                at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 15, 0).unwrap(),
                ..asset("cash", 2.0)
            },
        ];

        let buckets = monthly_buckets(&rows, DateField::CreatedAt, Measure::Value);
        assert_eq!(buckets[0], 40.0);
        assert_eq!(buckets[1], 2.0);
    }

    #[test]
    fn monthly_buckets_collapse_years() {
        let rows = vec![
            Row {
                at: at(2023, 3),
                ..asset("cash", 100.0)
            },
            Row {
                at: at(2024, 3),
                ..asset("cash", 50.0)
            },
            Row {
                at: at(2024, 12),
                ..asset("cash", 7.0)
            },
        ];

        let buckets = monthly_buckets(&rows, DateField::CreatedAt, Measure::Value);
        assert_eq!(buckets.len(), MONTH_LABELS.len());
        assert_eq!(buckets[2], 150.0);
        assert_eq!(buckets[11], 7.0);
        assert_eq!(buckets.iter().sum::<f64>(), 157.0);

        let series = monthly_series(&rows, DateField::CreatedAt, Measure::Value);
        assert_eq!(series[&(2023, 3)], 100.0);
        assert_eq!(series[&(2024, 3)], 50.0);
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn last_modified_picks_latest_record() {
        let rows = vec![
            Row {
                at: at(2024, 2),
                ..asset("cash", 1.0)
            },
            Row {
                at: at(2024, 9),
                ..asset("cash", 1.0)
            },
        ];
        assert_eq!(last_modified(&rows), Some(at(2024, 9)));
        assert_eq!(last_modified::<Row>(&[]), None);
    }

    #[test]
    fn family_overview_lists_only_positive_members_for_comparison() {
        let members = vec![entity("A"), entity("B")];
        let assets = vec![owned("A", Some(900.0), None), owned("B", Some(100.0), None)];
        let debts = vec![owned("B", None, Some(400.0))];

        let overview = FamilyOverview::compute(&members, &assets, &debts);

        assert_eq!(overview.net_worth, 600.0);
        assert_eq!(overview.members.len(), 2);
        assert_eq!(overview.contributing_members.len(), 1);
        assert_eq!(overview.contributing_members[0].entity_id, "A");
    }
}
