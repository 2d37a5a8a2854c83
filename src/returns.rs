// 📈 Return Projector - simple-interest yield estimates
//
//   yield(days) = principal * (rate / 100 / 365) * days
//
// 365-day year. Month = 30 days, week = 7 days; the annual figure is
// principal * rate / 100 (not 365 daily yields rounded).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::institution::Institution;
use crate::entities::savings::Savings;

pub const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnPeriod {
    Daily,
    Weekly,
    Monthly,
    Annual,
}

impl ReturnPeriod {
    pub const ALL: [ReturnPeriod; 4] = [
        ReturnPeriod::Daily,
        ReturnPeriod::Weekly,
        ReturnPeriod::Monthly,
        ReturnPeriod::Annual,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReturnPeriod::Daily => "daily",
            ReturnPeriod::Weekly => "weekly",
            ReturnPeriod::Monthly => "monthly",
            ReturnPeriod::Annual => "annual",
        }
    }
}

impl std::str::FromStr for ReturnPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(ReturnPeriod::Daily),
            "weekly" | "week" => Ok(ReturnPeriod::Weekly),
            "monthly" | "month" => Ok(ReturnPeriod::Monthly),
            "annual" | "year" | "yearly" => Ok(ReturnPeriod::Annual),
            other => Err(format!("unknown period '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReturnProjection {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub annual: f64,
}

impl ReturnProjection {
    pub fn for_period(&self, period: ReturnPeriod) -> f64 {
        match period {
            ReturnPeriod::Daily => self.daily,
            ReturnPeriod::Weekly => self.weekly,
            ReturnPeriod::Monthly => self.monthly,
            ReturnPeriod::Annual => self.annual,
        }
    }
}

/// Principal and rate must both be finite and positive to earn anything
fn earns(principal: f64, annual_rate: f64) -> bool {
    principal.is_finite() && annual_rate.is_finite() && principal > 0.0 && annual_rate > 0.0
}

/// Yield over `days` days; zero unless principal and rate are positive
pub fn project_yield(principal: f64, annual_rate: f64, days: u32) -> f64 {
    if !earns(principal, annual_rate) {
        return 0.0;
    }
    principal * (annual_rate / 100.0 / DAYS_PER_YEAR) * days as f64
}

pub fn project_returns(principal: f64, annual_rate: f64) -> ReturnProjection {
    if !earns(principal, annual_rate) {
        return ReturnProjection::default();
    }

    ReturnProjection {
        daily: project_yield(principal, annual_rate, 1),
        weekly: project_yield(principal, annual_rate, 7),
        monthly: project_yield(principal, annual_rate, 30),
        annual: principal * (annual_rate / 100.0),
    }
}

// ============================================================================
// SAVINGS WITH RETURNS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SavingsReturn {
    pub savings: Savings,
    pub institution: Institution,
    /// Principal the projection is based on
    pub amount: f64,
    pub annual_rate: f64,
    pub returns: ReturnProjection,
}

/// Positions that earn a configured yield: Card or CETES institutions with an
/// annual rate, and a positive amount. Everything else is skipped.
pub fn savings_with_returns(savings: &[Savings], institutions: &[Institution]) -> Vec<SavingsReturn> {
    let by_id: HashMap<i64, &Institution> = institutions.iter().map(|i| (i.id, i)).collect();

    savings
        .iter()
        .filter_map(|s| {
            let institution = by_id.get(&s.institution_id)?;
            let annual_rate = institution.annual_yield?;
            if !institution.investment_type.has_yield() {
                return None;
            }

            let amount = s.value.yield_principal()?;
            if amount <= 0.0 {
                return None;
            }

            Some(SavingsReturn {
                savings: s.clone(),
                institution: (*institution).clone(),
                amount,
                annual_rate,
                returns: project_returns(amount, annual_rate),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReturnsSummary {
    pub period: ReturnPeriod,
    pub total_invested: f64,
    pub total_yield: f64,
    /// Largest single yield for the period (for scaling bars)
    pub max_yield: f64,
}

impl ReturnsSummary {
    pub fn from_returns(returns: &[SavingsReturn], period: ReturnPeriod) -> Self {
        let yields = returns.iter().map(|r| r.returns.for_period(period));

        ReturnsSummary {
            period,
            total_invested: returns.iter().map(|r| r.amount).sum(),
            total_yield: yields.clone().sum(),
            max_yield: yields.fold(0.0, f64::max),
        }
    }
}
