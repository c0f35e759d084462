use csv::Writer;

use crate::core::{ProjectionResult, WorkStatus, YearlyProjection};

/// Column toggles for the CSV export. Each group is independently includable;
/// the inflation-adjusted low/very-low columns appear only when both the
/// inflation-adjusted and lower-scenario groups are on.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvOptions {
    pub investment_details: bool,
    pub inflation_adjusted: bool,
    pub lower_scenarios: bool,
}

/// Serializes a projection row-wise as comma-delimited text with a header
/// row, for clipboard/file export.
pub fn write_csv(result: &ProjectionResult, options: &CsvOptions) -> Result<String, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());

    let mut header: Vec<String> = vec!["Year".into(), "Age".into(), "Status".into()];
    if options.investment_details {
        header.extend(result.accounts.iter().map(|a| a.name.clone()));
    }
    header.extend([
        "Opening Balance".into(),
        "Yearly Spend".into(),
        "Amount Invested".into(),
        "Year End Balance".into(),
    ]);
    if options.lower_scenarios {
        header.push("Year End Balance (10% Lower)".into());
        header.push("Year End Balance (20% Lower)".into());
    }
    if options.inflation_adjusted {
        header.push("Inflation Adjusted Total".into());
        if options.lower_scenarios {
            header.push("Inflation Adjusted (10% Lower)".into());
            header.push("Inflation Adjusted (20% Lower)".into());
        }
    }
    writer.write_record(&header)?;

    for year in &result.years {
        writer.write_record(&row(result, year, options))?;
    }

    writer.flush()?;
    let data = writer.into_inner().expect("flushed csv writer");
    Ok(String::from_utf8(data).expect("csv output is utf-8"))
}

fn row(result: &ProjectionResult, year: &YearlyProjection, options: &CsvOptions) -> Vec<String> {
    let mut record: Vec<String> = vec![
        year.year_index.to_string(),
        year.age.to_string(),
        status_label(year.status).to_string(),
    ];
    if options.investment_details {
        record.extend(
            result
                .accounts
                .iter()
                .map(|a| year.balances.get(&a.id).copied().unwrap_or(0.0).to_string()),
        );
    }
    record.push(year.opening_balance.to_string());
    // A zero spend prints as a dash, matching the tabular view.
    record.push(if year.spend_this_year > 0.0 {
        year.spend_this_year.to_string()
    } else {
        "-".to_string()
    });
    record.push((year.yearly_return + year.contributions_this_year).to_string());
    record.push(year.year_end_balance.to_string());
    if options.lower_scenarios {
        record.push(year.year_end_balance_low.to_string());
        record.push(year.year_end_balance_very_low.to_string());
    }
    if options.inflation_adjusted {
        record.push(year.inflation_adjusted_total.to_string());
        if options.lower_scenarios {
            record.push(year.inflation_adjusted_total_low.to_string());
            record.push(year.inflation_adjusted_total_very_low.to_string());
        }
    }
    record
}

fn status_label(status: WorkStatus) -> &'static str {
    match status {
        WorkStatus::Working => "Working",
        WorkStatus::Coasting => "Coasting",
        WorkStatus::Retired => "Retired",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Account, CoastingConfig, PensionConfig, RetirementTrigger, SimulationParameters, project,
    };

    fn sample_result() -> ProjectionResult {
        let accounts = vec![
            Account {
                id: 1,
                name: "Brokerage".to_string(),
                balance: 600_000.0,
                annual_return_rate_percent: 7.0,
                monthly_contribution: 4_000.0,
            },
            Account {
                id: 2,
                name: "401k".to_string(),
                balance: 150_000.0,
                annual_return_rate_percent: 6.0,
                monthly_contribution: 1_000.0,
            },
        ];
        let params = SimulationParameters {
            current_age: 43,
            retirement_trigger: RetirementTrigger::AgeBased { retirement_age: 55 },
            inflation_rate_percent: 2.0,
            monthly_retirement_spend: 5_000.0,
            coasting: CoastingConfig {
                enabled: false,
                years_before_coasting: 0,
            },
            pension: PensionConfig {
                monthly_amount: 0.0,
                start_age: 65,
            },
        };
        project(&accounts, &params).expect("valid inputs")
    }

    #[test]
    fn base_export_has_fixed_columns_and_one_row_per_year() {
        let result = sample_result();
        let csv = write_csv(&result, &CsvOptions::default()).expect("export succeeds");

        let mut lines = csv.lines();
        let header = lines.next().expect("header row");
        assert_eq!(
            header,
            "Year,Age,Status,Opening Balance,Yearly Spend,Amount Invested,Year End Balance"
        );
        assert_eq!(lines.count(), result.years.len());
    }

    #[test]
    fn working_years_print_a_dash_for_spend() {
        let result = sample_result();
        let csv = write_csv(&result, &CsvOptions::default()).expect("export succeeds");

        let first_row = csv.lines().nth(1).expect("first data row");
        let fields: Vec<&str> = first_row.split(',').collect();
        assert_eq!(fields[2], "Working");
        assert_eq!(fields[4], "-");
    }

    #[test]
    fn investment_details_add_one_column_per_account() {
        let result = sample_result();
        let options = CsvOptions {
            investment_details: true,
            ..CsvOptions::default()
        };
        let csv = write_csv(&result, &options).expect("export succeeds");

        let header = csv.lines().next().expect("header row");
        assert!(header.contains("Brokerage,401k"));
    }

    #[test]
    fn scenario_and_inflation_toggles_compose() {
        let result = sample_result();
        let options = CsvOptions {
            investment_details: false,
            inflation_adjusted: true,
            lower_scenarios: true,
        };
        let csv = write_csv(&result, &options).expect("export succeeds");

        let header = csv.lines().next().expect("header row");
        assert!(header.ends_with(
            "Year End Balance,Year End Balance (10% Lower),Year End Balance (20% Lower),\
             Inflation Adjusted Total,Inflation Adjusted (10% Lower),Inflation Adjusted (20% Lower)"
        ));
    }

    #[test]
    fn inflation_toggle_alone_skips_lower_scenario_columns() {
        let result = sample_result();
        let options = CsvOptions {
            investment_details: false,
            inflation_adjusted: true,
            lower_scenarios: false,
        };
        let csv = write_csv(&result, &options).expect("export succeeds");

        let header = csv.lines().next().expect("header row");
        assert!(header.ends_with("Year End Balance,Inflation Adjusted Total"));
        assert!(!header.contains("10% Lower"));
    }
}
