use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    Account, CoastingConfig, PensionConfig, ProjectionResult, RetirementTrigger,
    SimulationParameters, WorkStatus, YearlyProjection, project,
};
use crate::export::{CsvOptions, write_csv};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRetirementTrigger {
    AgeBased,
    GoalBased,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiRetirementTrigger {
    #[serde(alias = "age", alias = "ageBased", alias = "age_based")]
    AgeBased,
    #[serde(alias = "goal", alias = "goalBased", alias = "goal_based")]
    GoalBased,
}

impl From<ApiRetirementTrigger> for CliRetirementTrigger {
    fn from(value: ApiRetirementTrigger) -> Self {
        match value {
            ApiRetirementTrigger::AgeBased => CliRetirementTrigger::AgeBased,
            ApiRetirementTrigger::GoalBased => CliRetirementTrigger::GoalBased,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AccountPayload {
    id: Option<u32>,
    name: Option<String>,
    balance: f64,
    #[serde(alias = "annualReturnRate")]
    return_rate: f64,
    #[serde(alias = "monthlySavings")]
    monthly_contribution: f64,
}

impl Default for AccountPayload {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            balance: 0.0,
            return_rate: 0.0,
            monthly_contribution: 0.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    current_age: Option<u32>,
    retirement_trigger: Option<ApiRetirementTrigger>,
    retirement_age: Option<u32>,
    retirement_goal: Option<f64>,
    inflation_rate: Option<f64>,
    monthly_retirement_spend: Option<f64>,
    coasting_enabled: Option<bool>,
    coasting_years: Option<u32>,
    pension_monthly_amount: Option<f64>,
    pension_start_age: Option<u32>,
    accounts: Option<Vec<AccountPayload>>,

    show_investment_details: Option<bool>,
    show_inflation_adjusted: Option<bool>,
    show_lower_return_scenarios: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Retirement projection calculator (multi-account, three return scenarios)"
)]
struct Cli {
    #[arg(long, default_value_t = 43)]
    current_age: u32,
    #[arg(
        long,
        value_enum,
        default_value_t = CliRetirementTrigger::AgeBased,
        help = "Retirement trigger: a target age or a target net worth"
    )]
    retirement_trigger: CliRetirementTrigger,
    #[arg(long, default_value_t = 55, help = "Retirement age for the age-based trigger")]
    retirement_age: u32,
    #[arg(
        long,
        default_value_t = 1_800_000.0,
        help = "Target net worth in today's dollars for the goal-based trigger"
    )]
    retirement_goal: f64,
    #[arg(long, default_value_t = 2.0, help = "Expected annual inflation in percent")]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 5_000.0,
        help = "Desired monthly retirement spend in today's dollars"
    )]
    monthly_retirement_spend: f64,
    #[arg(long, default_value_t = false, help = "Stop contributing before retirement")]
    coasting_enabled: bool,
    #[arg(
        long,
        default_value_t = 0,
        help = "Years of full contributions before coasting starts"
    )]
    coasting_years: u32,
    #[arg(long, default_value_t = 0.0, help = "Monthly pension income in today's dollars")]
    pension_monthly_amount: f64,
    #[arg(long, default_value_t = 65, help = "Age pension income starts")]
    pension_start_age: u32,
    #[arg(
        long = "account",
        value_name = "NAME:BALANCE:RATE:MONTHLY",
        help = "Account spec, repeatable; defaults to one 600000 balance account at 7% with 4000/month"
    )]
    accounts: Vec<String>,
}

#[derive(Debug)]
struct ApiRequest {
    accounts: Vec<Account>,
    params: SimulationParameters,
    csv_options: CsvOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionSummary {
    current_age: u32,
    retirement_age: Option<u32>,
    total_saved: f64,
    total_spent: f64,
    working_phase_returns: f64,
    retirement_phase_returns: f64,
    depletion_age: Option<u32>,
    depletion_age_low: Option<u32>,
    depletion_age_very_low: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    summary: ProjectionSummary,
    #[serde(flatten)]
    result: ProjectionResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_account_spec(spec: &str, position: usize) -> Result<Account, String> {
    let parts: Vec<&str> = spec.rsplitn(4, ':').collect();
    if parts.len() != 4 {
        return Err(format!(
            "--account `{spec}` must look like NAME:BALANCE:RATE:MONTHLY"
        ));
    }
    // rsplitn yields fields in reverse order.
    let (monthly, rate, balance, name) = (parts[0], parts[1], parts[2], parts[3]);
    let balance: f64 = balance
        .parse()
        .map_err(|_| format!("--account `{spec}`: invalid balance"))?;
    let rate: f64 = rate
        .parse()
        .map_err(|_| format!("--account `{spec}`: invalid return rate"))?;
    let monthly: f64 = monthly
        .parse()
        .map_err(|_| format!("--account `{spec}`: invalid monthly contribution"))?;

    Ok(Account {
        id: position as u32 + 1,
        name: name.to_string(),
        balance,
        annual_return_rate_percent: rate,
        monthly_contribution: monthly,
    })
}

fn default_accounts() -> Vec<Account> {
    vec![Account {
        id: 1,
        name: "Investment 1".to_string(),
        balance: 600_000.0,
        annual_return_rate_percent: 7.0,
        monthly_contribution: 4_000.0,
    }]
}

fn build_simulation(cli: Cli) -> Result<(Vec<Account>, SimulationParameters), String> {
    let mut accounts = if cli.accounts.is_empty() {
        default_accounts()
    } else {
        cli.accounts
            .iter()
            .enumerate()
            .map(|(i, spec)| parse_account_spec(spec, i))
            .collect::<Result<Vec<_>, _>>()?
    };

    for account in &mut accounts {
        if !account.balance.is_finite() {
            return Err(format!("account `{}`: balance must be finite", account.name));
        }
        if !account.monthly_contribution.is_finite() {
            return Err(format!(
                "account `{}`: monthly contribution must be finite",
                account.name
            ));
        }
        if !account.annual_return_rate_percent.is_finite() {
            return Err(format!(
                "account `{}`: return rate must be finite",
                account.name
            ));
        }
        // Rates are clamped at the boundary; the engine assumes [0, 100].
        account.annual_return_rate_percent = account.annual_return_rate_percent.clamp(0.0, 100.0);
    }

    if !cli.inflation_rate.is_finite() || cli.inflation_rate < 0.0 {
        return Err("--inflation-rate must be >= 0".to_string());
    }

    if !cli.monthly_retirement_spend.is_finite() || cli.monthly_retirement_spend < 0.0 {
        return Err("--monthly-retirement-spend must be >= 0".to_string());
    }

    if !cli.retirement_goal.is_finite() || cli.retirement_goal < 0.0 {
        return Err("--retirement-goal must be >= 0".to_string());
    }

    if !cli.pension_monthly_amount.is_finite() || cli.pension_monthly_amount < 0.0 {
        return Err("--pension-monthly-amount must be >= 0".to_string());
    }

    let retirement_trigger = match cli.retirement_trigger {
        CliRetirementTrigger::AgeBased => RetirementTrigger::AgeBased {
            retirement_age: cli.retirement_age,
        },
        CliRetirementTrigger::GoalBased => RetirementTrigger::GoalBased {
            target_net_worth: cli.retirement_goal,
        },
    };

    let params = SimulationParameters {
        current_age: cli.current_age,
        retirement_trigger,
        inflation_rate_percent: cli.inflation_rate,
        monthly_retirement_spend: cli.monthly_retirement_spend,
        coasting: CoastingConfig {
            enabled: cli.coasting_enabled,
            years_before_coasting: cli.coasting_years,
        },
        pension: PensionConfig {
            monthly_amount: cli.pension_monthly_amount,
            start_age: cli.pension_start_age,
        },
    };

    Ok((accounts, params))
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 43,
        retirement_trigger: CliRetirementTrigger::AgeBased,
        retirement_age: 55,
        retirement_goal: 1_800_000.0,
        inflation_rate: 2.0,
        monthly_retirement_spend: 5_000.0,
        coasting_enabled: false,
        coasting_years: 0,
        pension_monthly_amount: 0.0,
        pension_start_age: 65,
        accounts: Vec::new(),
    }
}

fn api_request_from_payload(payload: ProjectPayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_trigger {
        cli.retirement_trigger = v.into();
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.retirement_goal {
        cli.retirement_goal = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.monthly_retirement_spend {
        cli.monthly_retirement_spend = v;
    }
    if let Some(v) = payload.coasting_enabled {
        cli.coasting_enabled = v;
    }
    if let Some(v) = payload.coasting_years {
        cli.coasting_years = v;
    }
    if let Some(v) = payload.pension_monthly_amount {
        cli.pension_monthly_amount = v;
    }
    if let Some(v) = payload.pension_start_age {
        cli.pension_start_age = v;
    }

    let (mut accounts, params) = build_simulation(cli)?;
    if let Some(list) = payload.accounts {
        if list.is_empty() {
            return Err("accounts must not be empty".to_string());
        }
        accounts = list
            .into_iter()
            .enumerate()
            .map(|(i, p)| Account {
                id: p.id.unwrap_or(i as u32 + 1),
                name: p.name.unwrap_or_else(|| format!("Investment {}", i + 1)),
                balance: p.balance,
                annual_return_rate_percent: p.return_rate.clamp(0.0, 100.0),
                monthly_contribution: p.monthly_contribution,
            })
            .collect();
    }

    let csv_options = CsvOptions {
        investment_details: payload.show_investment_details.unwrap_or(false),
        inflation_adjusted: payload.show_inflation_adjusted.unwrap_or(false),
        lower_scenarios: payload.show_lower_return_scenarios.unwrap_or(false),
    };

    Ok(ApiRequest {
        accounts,
        params,
        csv_options,
    })
}

fn summarize(result: &ProjectionResult, current_age: u32) -> ProjectionSummary {
    let total_saved: f64 = result.years.iter().map(|y| y.contributions_this_year).sum();
    let total_spent: f64 = result.years.iter().map(|y| y.spend_this_year).sum();
    let working_phase_returns: f64 = result
        .years
        .iter()
        .filter(|y| y.status != WorkStatus::Retired)
        .map(|y| y.yearly_return)
        .sum();
    let retirement_phase_returns: f64 = result
        .years
        .iter()
        .filter(|y| y.status == WorkStatus::Retired)
        .map(|y| y.yearly_return)
        .sum();

    let depletion_age = |positive: fn(&YearlyProjection) -> bool| {
        result.years.iter().rev().find(|y| positive(y)).map(|y| y.age)
    };

    ProjectionSummary {
        current_age,
        retirement_age: result.retirement_year.map(|y| current_age + y),
        total_saved,
        total_spent,
        working_phase_returns,
        retirement_phase_returns,
        depletion_age: depletion_age(|y| y.year_end_balance > 0.0),
        depletion_age_low: depletion_age(|y| y.year_end_balance_low > 0.0),
        depletion_age_very_low: depletion_age(|y| y.year_end_balance_very_low > 0.0),
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route(
            "/api/project.csv",
            get(project_csv_get_handler).post(project_csv_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("projection API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_csv_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_csv_handler_impl(payload).await
}

async fn project_csv_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_csv_handler_impl(payload).await
}

async fn project_handler_impl(payload: ProjectPayload) -> Response {
    let (request, result) = match run_projection(payload) {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let response = ProjectResponse {
        summary: summarize(&result, request.params.current_age),
        result,
    };
    json_response(StatusCode::OK, response)
}

async fn project_csv_handler_impl(payload: ProjectPayload) -> Response {
    let (request, result) = match run_projection(payload) {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    match write_csv(&result, &request.csv_options) {
        Ok(body) => with_cache_control((
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            body,
        )),
        Err(e) => {
            warn!("csv export failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "CSV export failed")
        }
    }
}

fn run_projection(payload: ProjectPayload) -> Result<(ApiRequest, ProjectionResult), Response> {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!("rejected projection request: {msg}");
            return Err(error_response(StatusCode::BAD_REQUEST, &msg));
        }
    };

    match project(&request.accounts, &request.params) {
        Ok(result) => Ok((request, result)),
        Err(e) => {
            warn!("rejected projection request: {e}");
            Err(error_response(StatusCode::BAD_REQUEST, &e.to_string()))
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
