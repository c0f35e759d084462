use std::collections::{BTreeMap, HashSet};

use super::types::{
    Account, ProjectionResult, RetirementTrigger, SimulationParameters, ValidationError,
    WorkStatus, YearlyProjection,
};

/// Hard cap on simulated years; the projection never runs past this.
pub const MAX_PROJECTION_YEARS: u32 = 60;

/// Runs the yearly projection over a working copy of `accounts`.
///
/// Three return scenarios are simulated in lockstep: the stated rate, the
/// rate reduced by 10%, and the rate reduced by 20% (relative reductions).
/// Per-account balances are carried for the expected scenario only; the
/// reduced scenarios are aggregate totals. Deterministic and side-effect
/// free: the caller's slice is never mutated.
pub fn project(
    accounts: &[Account],
    params: &SimulationParameters,
) -> Result<ProjectionResult, ValidationError> {
    validate(accounts, params)?;

    let mut working: Vec<Account> = accounts.to_vec();
    let total_initial_balance: f64 = working.iter().map(|a| a.balance).sum();
    let total_monthly_contributions: f64 = working.iter().map(|a| a.monthly_contribution).sum();

    let mut total = total_initial_balance;
    let mut total_low = total;
    let mut total_very_low = total;
    let mut cumulative_contributions = total;

    let mut goal_reached = match params.retirement_trigger {
        RetirementTrigger::AgeBased { retirement_age } => params.current_age >= retirement_age,
        RetirementTrigger::GoalBased { target_net_worth } => total >= target_net_worth,
    };
    let mut retirement_year: Option<u32> = None;
    let mut years: Vec<YearlyProjection> = Vec::new();

    for year_index in 1..=MAX_PROJECTION_YEARS {
        let age = params.current_age + year_index;

        // Already retired at t=0 is reported on year 1.
        let mut triggered_this_year = goal_reached && year_index == 1;

        // The age condition is known before the year plays out, so the
        // trigger year itself is simulated as retired: contributions stop
        // and retirement spend starts immediately.
        if !goal_reached {
            if let RetirementTrigger::AgeBased { retirement_age } = params.retirement_trigger {
                if age >= retirement_age {
                    goal_reached = true;
                    triggered_this_year = true;
                }
            }
        }

        let status = if goal_reached {
            WorkStatus::Retired
        } else if params.coasting.enabled && year_index > params.coasting.years_before_coasting {
            WorkStatus::Coasting
        } else {
            WorkStatus::Working
        };

        // Compounds from year 0: the first simulated year already carries a
        // full year of inflation.
        let inflation_factor =
            (1.0 + params.inflation_rate_percent / 100.0).powi(year_index as i32);
        let opening_balance = total;

        let mut yearly_return = 0.0;
        let mut yearly_return_low = 0.0;
        let mut yearly_return_very_low = 0.0;
        let mut contributions_this_year = 0.0;

        for account in &mut working {
            let account_return = account.balance * account.annual_return_rate_percent / 100.0;
            yearly_return += account_return;
            yearly_return_low += account.balance * account.annual_return_rate_percent * 0.9 / 100.0;
            yearly_return_very_low +=
                account.balance * account.annual_return_rate_percent * 0.8 / 100.0;

            let contribution = if status == WorkStatus::Working {
                account.monthly_contribution * 12.0
            } else {
                0.0
            };
            contributions_this_year += contribution;
            account.balance += account_return + contribution;
        }

        let pension_income_this_year = if age >= params.pension.start_age {
            params.pension.monthly_amount * 12.0 * inflation_factor
        } else {
            0.0
        };

        let mut spend_this_year = 0.0;
        if goal_reached {
            let gross_spend = params.monthly_retirement_spend * 12.0 * inflation_factor;
            spend_this_year = (gross_spend - pension_income_this_year).max(0.0);
            draw_down(&mut working, spend_this_year);
        }

        total = working.iter().map(|a| a.balance).sum();
        total_low += yearly_return_low + contributions_this_year - spend_this_year;
        total_very_low += yearly_return_very_low + contributions_this_year - spend_this_year;

        let inflation_adjusted_total = total / inflation_factor;

        // Goal-based detection needs this year's totals.
        if !goal_reached {
            if let RetirementTrigger::GoalBased { target_net_worth } = params.retirement_trigger {
                if inflation_adjusted_total >= target_net_worth {
                    goal_reached = true;
                    triggered_this_year = true;
                }
            }
        }
        if triggered_this_year && retirement_year.is_none() {
            retirement_year = Some(year_index);
        }

        cumulative_contributions += contributions_this_year;

        let balances: BTreeMap<u32, f64> = working.iter().map(|a| (a.id, a.balance)).collect();

        years.push(YearlyProjection {
            year_index,
            age,
            status,
            balances,
            opening_balance,
            yearly_return,
            yearly_return_low,
            yearly_return_very_low,
            contributions_this_year,
            pension_income_this_year,
            spend_this_year,
            year_end_balance: total,
            year_end_balance_low: total_low.max(0.0),
            year_end_balance_very_low: total_very_low.max(0.0),
            inflation_adjusted_total,
            // Adjusted figures divide the unfloored running aggregates so a
            // depleted scenario keeps its negative signal.
            inflation_adjusted_total_low: total_low / inflation_factor,
            inflation_adjusted_total_very_low: total_very_low / inflation_factor,
            is_retirement_triggered_this_year: triggered_this_year,
            is_risky: total <= 0.0 || total_low <= 0.0 || total_very_low <= 0.0,
            cumulative_contributions,
        });

        if total <= 0.0 && total_low <= 0.0 && total_very_low <= 0.0 {
            break;
        }
    }

    let final_year = years.last().cloned().expect("at least one simulated year");

    Ok(ProjectionResult {
        years,
        total_initial_balance,
        total_monthly_contributions,
        retirement_year,
        final_year,
        accounts: working,
    })
}

/// Ordered drawdown: each account absorbs spend up to its balance before the
/// next one is touched. Balances never go negative; any remainder after the
/// last account is dropped, so a shortfall shows up only as depletion.
fn draw_down(accounts: &mut [Account], amount: f64) {
    let mut remaining = amount;
    for account in accounts.iter_mut() {
        if remaining <= 0.0 {
            break;
        }
        if account.balance >= remaining {
            account.balance -= remaining;
            remaining = 0.0;
        } else {
            remaining -= account.balance;
            account.balance = 0.0;
        }
    }
}

fn validate(accounts: &[Account], params: &SimulationParameters) -> Result<(), ValidationError> {
    if accounts.is_empty() {
        return Err(ValidationError::NoAccounts);
    }

    let mut seen = HashSet::new();
    for account in accounts {
        if !seen.insert(account.id) {
            return Err(ValidationError::DuplicateAccountId(account.id));
        }
        for (field, value) in [
            ("balance", account.balance),
            ("return rate", account.annual_return_rate_percent),
            ("monthly contribution", account.monthly_contribution),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteAccountField {
                    name: account.name.clone(),
                    field,
                });
            }
        }
    }

    if !params.inflation_rate_percent.is_finite() {
        return Err(ValidationError::NonFiniteParameter("inflation rate"));
    }
    if !params.monthly_retirement_spend.is_finite() {
        return Err(ValidationError::NonFiniteParameter(
            "monthly retirement spend",
        ));
    }
    if !params.pension.monthly_amount.is_finite() {
        return Err(ValidationError::NonFiniteParameter("pension monthly amount"));
    }
    if let RetirementTrigger::GoalBased { target_net_worth } = params.retirement_trigger {
        if !target_net_worth.is_finite() {
            return Err(ValidationError::NonFiniteParameter("target net worth"));
        }
    }

    Ok(())
}
