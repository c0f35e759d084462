use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// One savings or investment vehicle. The caller owns the list; the engine
/// simulates on its own working copy and never mutates these.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: u32,
    pub name: String,
    pub balance: f64,
    /// Expected annual return in percent, e.g. 7 for 7%.
    pub annual_return_rate_percent: f64,
    pub monthly_contribution: f64,
}

/// Which condition flips the run into retirement. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetirementTrigger {
    AgeBased { retirement_age: u32 },
    GoalBased { target_net_worth: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoastingConfig {
    pub enabled: bool,
    /// Simulated years worked at full contributions before coasting starts.
    pub years_before_coasting: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PensionConfig {
    pub monthly_amount: f64,
    pub start_age: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    pub current_age: u32,
    pub retirement_trigger: RetirementTrigger,
    pub inflation_rate_percent: f64,
    /// Desired retirement spend per month in today's dollars.
    pub monthly_retirement_spend: f64,
    pub coasting: CoastingConfig,
    pub pension: PensionConfig,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum WorkStatus {
    Working,
    Coasting,
    Retired,
}

/// One simulated year. Computed once, never mutated afterwards.
///
/// Per-account balances are tracked for the expected scenario only; the
/// reduced-return scenarios exist purely as aggregate totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyProjection {
    pub year_index: u32,
    pub age: u32,
    pub status: WorkStatus,
    pub balances: BTreeMap<u32, f64>,
    pub opening_balance: f64,
    pub yearly_return: f64,
    pub yearly_return_low: f64,
    pub yearly_return_very_low: f64,
    pub contributions_this_year: f64,
    pub pension_income_this_year: f64,
    /// Retirement spend net of pension income, floored at zero.
    pub spend_this_year: f64,
    pub year_end_balance: f64,
    pub year_end_balance_low: f64,
    pub year_end_balance_very_low: f64,
    pub inflation_adjusted_total: f64,
    pub inflation_adjusted_total_low: f64,
    pub inflation_adjusted_total_very_low: f64,
    pub is_retirement_triggered_this_year: bool,
    pub is_risky: bool,
    pub cumulative_contributions: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub years: Vec<YearlyProjection>,
    pub total_initial_balance: f64,
    pub total_monthly_contributions: f64,
    /// 1-based index of the year retirement triggered, if it did within the horizon.
    pub retirement_year: Option<u32>,
    pub final_year: YearlyProjection,
    /// Final expected-scenario working copy of the accounts.
    pub accounts: Vec<Account>,
}

/// The only recoverable failure mode: bad input. Anything else is a defect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("at least one account is required")]
    NoAccounts,
    #[error("duplicate account id {0}")]
    DuplicateAccountId(u32),
    #[error("account `{name}` has a non-finite {field}")]
    NonFiniteAccountField { name: String, field: &'static str },
    #[error("{0} must be finite")]
    NonFiniteParameter(&'static str),
}
