// 🔎 Collection filters
//
// Savings: type -> institution -> search -> sort, each step optional.
// Payments: due-date window relative to today.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use crate::entities::institution::{Institution, InvestmentType};
use crate::entities::payment::CardPayment;
use crate::entities::savings::Savings;
use crate::period::MonthPeriod;

// ============================================================================
// SAVINGS FILTER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InvestmentFilter {
    #[default]
    All,
    Only(InvestmentType),
}

impl InvestmentFilter {
    pub fn accepts(&self, investment_type: Option<InvestmentType>) -> bool {
        match self {
            InvestmentFilter::All => true,
            InvestmentFilter::Only(wanted) => investment_type == Some(*wanted),
        }
    }
}

impl FromStr for InvestmentFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(InvestmentFilter::All),
            other => other.parse().map(InvestmentFilter::Only),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SavingsSort {
    ValueDesc,
    ValueAsc,
    #[default]
    DateDesc,
    DateAsc,
    NameAsc,
    NameDesc,
}

impl SavingsSort {
    pub const ALL: [SavingsSort; 6] = [
        SavingsSort::ValueDesc,
        SavingsSort::ValueAsc,
        SavingsSort::DateDesc,
        SavingsSort::DateAsc,
        SavingsSort::NameAsc,
        SavingsSort::NameDesc,
    ];

    /// Cycle to the next ordering (dashboard key binding)
    pub fn next(&self) -> Self {
        let idx = SavingsSort::ALL.iter().position(|s| s == self).unwrap_or(0);
        SavingsSort::ALL[(idx + 1) % SavingsSort::ALL.len()]
    }

    pub fn label(&self) -> &'static str {
        match self {
            SavingsSort::ValueDesc => "value ↓",
            SavingsSort::ValueAsc => "value ↑",
            SavingsSort::DateDesc => "date ↓",
            SavingsSort::DateAsc => "date ↑",
            SavingsSort::NameAsc => "name A-Z",
            SavingsSort::NameDesc => "name Z-A",
        }
    }
}

impl FromStr for SavingsSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "value-desc" => Ok(SavingsSort::ValueDesc),
            "value-asc" => Ok(SavingsSort::ValueAsc),
            "date-desc" => Ok(SavingsSort::DateDesc),
            "date-asc" => Ok(SavingsSort::DateAsc),
            "name-asc" => Ok(SavingsSort::NameAsc),
            "name-desc" => Ok(SavingsSort::NameDesc),
            other => Err(format!("unknown sort '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SavingsFilter {
    pub investment_type: InvestmentFilter,
    pub institution_id: Option<i64>,
    pub sort: SavingsSort,
    pub search: String,
}

impl SavingsFilter {
    pub fn apply(&self, savings: &[Savings], institutions: &[Institution]) -> Vec<Savings> {
        let by_id: HashMap<i64, &Institution> = institutions.iter().map(|i| (i.id, i)).collect();
        let type_of = |s: &Savings| by_id.get(&s.institution_id).map(|i| i.investment_type);

        let needle = self.search.trim().to_lowercase();

        let mut result: Vec<Savings> = savings
            .iter()
            .filter(|s| self.investment_type.accepts(type_of(*s)))
            .filter(|s| self.institution_id.map_or(true, |id| s.institution_id == id))
            .filter(|s| {
                if needle.is_empty() {
                    return true;
                }
                s.name.to_lowercase().contains(&needle)
                    || s
                        .description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
                    || by_id
                        .get(&s.institution_id)
                        .is_some_and(|i| i.name.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        // Unknown institution counts as value 0
        let value_of = |s: &Savings| {
            if by_id.contains_key(&s.institution_id) {
                s.current_value()
            } else {
                0.0
            }
        };
        let by_value = |a: &Savings, b: &Savings| {
            value_of(a).partial_cmp(&value_of(b)).unwrap_or(Ordering::Equal)
        };

        match self.sort {
            SavingsSort::ValueDesc => result.sort_by(|a, b| by_value(b, a)),
            SavingsSort::ValueAsc => result.sort_by(by_value),
            SavingsSort::DateDesc => result.sort_by(|a, b| b.created_on.cmp(&a.created_on)),
            SavingsSort::DateAsc => result.sort_by(|a, b| a.created_on.cmp(&b.created_on)),
            SavingsSort::NameAsc => result.sort_by(|a, b| a.name.cmp(&b.name)),
            SavingsSort::NameDesc => result.sort_by(|a, b| b.name.cmp(&a.name)),
        }

        result
    }
}

// ============================================================================
// PAYMENT DUE-DATE WINDOW
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DueDateFilter {
    #[default]
    Next3Weeks,
    ThisWeek,
    ThisMonth,
    All,
}

impl DueDateFilter {
    pub const ALL: [DueDateFilter; 4] = [
        DueDateFilter::Next3Weeks,
        DueDateFilter::ThisWeek,
        DueDateFilter::ThisMonth,
        DueDateFilter::All,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DueDateFilter::Next3Weeks => "3 weeks",
            DueDateFilter::ThisWeek => "This week",
            DueDateFilter::ThisMonth => "This month",
            DueDateFilter::All => "All",
        }
    }

    /// Overdue unpaid payments always stay visible
    pub fn accepts(&self, payment: &CardPayment, today: NaiveDate) -> bool {
        if *self == DueDateFilter::All {
            return true;
        }
        if payment.due_date < today {
            return !payment.is_paid;
        }

        match self {
            DueDateFilter::ThisWeek => payment.due_date <= today + Duration::days(7),
            DueDateFilter::Next3Weeks => payment.due_date <= today + Duration::days(21),
            DueDateFilter::ThisMonth => MonthPeriod::from_date(today).contains(payment.due_date),
            DueDateFilter::All => true,
        }
    }

    /// Filtered copy, due date ascending
    pub fn apply(&self, payments: &[CardPayment], today: NaiveDate) -> Vec<CardPayment> {
        let mut result: Vec<CardPayment> = payments
            .iter()
            .filter(|p| self.accepts(p, today))
            .cloned()
            .collect();
        result.sort_by_key(|p| p.due_date);
        result
    }
}

impl FromStr for DueDateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "next-3-weeks" | "3w" => Ok(DueDateFilter::Next3Weeks),
            "this-week" | "week" => Ok(DueDateFilter::ThisWeek),
            "this-month" | "month" => Ok(DueDateFilter::ThisMonth),
            "all" => Ok(DueDateFilter::All),
            other => Err(format!("unknown due-date window '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::payment::CREDIT;
    use crate::entities::savings::SavingsValue;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn institution(id: i64, name: &str, t: InvestmentType) -> Institution {
        let mut i = Institution::new(name, t);
        i.id = id;
        i
    }

    fn position(id: i64, inst: i64, name: &str, created: NaiveDate, value: SavingsValue) -> Savings {
        let mut s = Savings::new(inst, name, created, value);
        s.id = id;
        s
    }

    fn fixture() -> (Vec<Savings>, Vec<Institution>) {
        let institutions = vec![
            institution(1, "Nu", InvestmentType::Card),
            institution(2, "GBM", InvestmentType::Stocks),
            institution(3, "Bitso", InvestmentType::Crypto),
        ];
        let savings = vec![
            position(1, 1, "Emergencias", date(2025, 1, 10), SavingsValue::Card { amount: 5000.0 }),
            position(2, 2, "Apple", date(2025, 3, 5), SavingsValue::Stocks {
                quantity: 2.0,
                unit_price: 3500.0,
                ticker: Some("AAPL".into()),
            }),
            position(3, 3, "Bitcoin", date(2025, 2, 1), SavingsValue::Crypto {
                quantity: 0.01,
                unit_price: 900000.0,
                ticker: Some("BTC".into()),
            })
            .with_description("largo plazo"),
            position(4, 1, "Vacaciones", date(2025, 4, 20), SavingsValue::Card { amount: 1200.0 }),
        ];
        (savings, institutions)
    }

    fn ids(savings: &[Savings]) -> Vec<i64> {
        savings.iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_default_filter_sorts_newest_first() {
        let (savings, institutions) = fixture();
        let result = SavingsFilter::default().apply(&savings, &institutions);
        assert_eq!(ids(&result), vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_type_filter() {
        let (savings, institutions) = fixture();
        let filter = SavingsFilter {
            investment_type: InvestmentFilter::Only(InvestmentType::Card),
            sort: SavingsSort::ValueDesc,
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&savings, &institutions)), vec![1, 4]);
    }

    #[test]
    fn test_institution_filter() {
        let (savings, institutions) = fixture();
        let filter = SavingsFilter {
            institution_id: Some(3),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&savings, &institutions)), vec![3]);
    }

    #[test]
    fn test_search_matches_name_description_and_institution() {
        let (savings, institutions) = fixture();
        let search = |term: &str| {
            let filter = SavingsFilter {
                search: term.to_string(),
                sort: SavingsSort::NameAsc,
                ..Default::default()
            };
            ids(&filter.apply(&savings, &institutions))
        };

        assert_eq!(search("APPLE"), vec![2]);
        assert_eq!(search("plazo"), vec![3]);
        assert_eq!(search("nu"), vec![1, 4]);
        assert_eq!(search("   "), vec![2, 3, 1, 4]);
        assert!(search("zzz").is_empty());
    }

    #[test]
    fn test_filters_compose() {
        let (savings, institutions) = fixture();
        let filter = SavingsFilter {
            investment_type: InvestmentFilter::Only(InvestmentType::Card),
            institution_id: Some(1),
            search: "vaca".to_string(),
            sort: SavingsSort::DateAsc,
        };
        assert_eq!(ids(&filter.apply(&savings, &institutions)), vec![4]);

        let none = SavingsFilter {
            investment_type: InvestmentFilter::Only(InvestmentType::Cetes),
            ..Default::default()
        };
        assert!(none.apply(&savings, &institutions).is_empty());
    }

    #[test]
    fn test_every_sort_order() {
        let (savings, institutions) = fixture();
        let sorted = |sort| {
            ids(&SavingsFilter { sort, ..Default::default() }.apply(&savings, &institutions))
        };

        assert_eq!(sorted(SavingsSort::ValueDesc), vec![3, 1, 2, 4]);
        assert_eq!(sorted(SavingsSort::ValueAsc), vec![4, 2, 1, 3]);
        assert_eq!(sorted(SavingsSort::DateDesc), vec![4, 2, 3, 1]);
        assert_eq!(sorted(SavingsSort::DateAsc), vec![1, 3, 2, 4]);
        assert_eq!(sorted(SavingsSort::NameAsc), vec![2, 3, 1, 4]);
        assert_eq!(sorted(SavingsSort::NameDesc), vec![4, 1, 3, 2]);

        println!("✅ Savings sort test passed");
    }

    #[test]
    fn test_unknown_institution_values_zero() {
        let (mut savings, institutions) = fixture();
        savings.push(position(9, 42, "Huérfano", date(2025, 5, 1), SavingsValue::Card { amount: 1e9 }));

        let filter = SavingsFilter { sort: SavingsSort::ValueAsc, ..Default::default() };
        assert_eq!(ids(&filter.apply(&savings, &institutions))[0], 9);

        // Type filters never keep positions without an institution
        let typed = SavingsFilter {
            investment_type: InvestmentFilter::Only(InvestmentType::Card),
            ..Default::default()
        };
        assert!(!ids(&typed.apply(&savings, &institutions)).contains(&9));
    }

    #[test]
    fn test_sort_cycles() {
        let mut sort = SavingsSort::default();
        for _ in 0..SavingsSort::ALL.len() {
            sort = sort.next();
        }
        assert_eq!(sort, SavingsSort::default());
    }

    #[test]
    fn test_parse_filters() {
        assert_eq!("all".parse::<InvestmentFilter>().unwrap(), InvestmentFilter::All);
        assert_eq!(
            "cetes".parse::<InvestmentFilter>().unwrap(),
            InvestmentFilter::Only(InvestmentType::Cetes)
        );
        assert_eq!("name-desc".parse::<SavingsSort>().unwrap(), SavingsSort::NameDesc);
        assert_eq!("this-month".parse::<DueDateFilter>().unwrap(), DueDateFilter::ThisMonth);
        assert!("tomorrow".parse::<DueDateFilter>().is_err());
    }

    #[test]
    fn test_due_date_windows() {
        let today = date(2025, 11, 20);
        let mut overdue_paid = CardPayment::new(1, CREDIT, 10.0, date(2025, 11, 1));
        overdue_paid.is_paid = true;

        let payments = vec![
            CardPayment::new(1, CREDIT, 10.0, date(2025, 12, 15)), // +25 days
            CardPayment::new(1, CREDIT, 10.0, date(2025, 11, 25)), // +5
            CardPayment::new(1, CREDIT, 10.0, date(2025, 11, 15)), // overdue
            CardPayment::new(1, CREDIT, 10.0, date(2025, 12, 5)),  // +15
            overdue_paid,
        ];

        let dues = |filter: DueDateFilter| -> Vec<NaiveDate> {
            filter.apply(&payments, today).iter().map(|p| p.due_date).collect()
        };

        assert_eq!(
            dues(DueDateFilter::ThisWeek),
            vec![date(2025, 11, 15), date(2025, 11, 25)]
        );
        assert_eq!(
            dues(DueDateFilter::Next3Weeks),
            vec![date(2025, 11, 15), date(2025, 11, 25), date(2025, 12, 5)]
        );
        assert_eq!(
            dues(DueDateFilter::ThisMonth),
            vec![date(2025, 11, 15), date(2025, 11, 25)]
        );
        assert_eq!(dues(DueDateFilter::All).len(), 5);

        println!("✅ Due-date window test passed");
    }
}
