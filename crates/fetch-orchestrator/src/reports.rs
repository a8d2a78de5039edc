use chrono::{Datelike, NaiveDate};
use provider_core::{FinancialRecord, PricePoint, ProviderError, ReportSet, TabularResult};

// Column names as the upstream tables spell them.
const COL_DATE: &str = "日期";
const COL_CLOSE: &str = "收盘";
const COL_EPS: &str = "摊薄每股收益(元)";
const COL_BPS: &str = "每股净资产_调整前(元)";
const COL_CASHFLOW_PS: &str = "每股经营性现金流(元)";
const COL_WEIGHTED_EPS: &str = "加权每股收益(元)";
const COL_DEDUCTED_EPS: &str = "扣除非经常性损益后的每股收益(元)";
const COL_ADJUSTED_BPS: &str = "每股净资产_调整后(元)";
const COL_CAPITAL_RESERVE_PS: &str = "每股资本公积金(元)";
const COL_UNDISTRIBUTED_PS: &str = "每股未分配利润(元)";
const COL_GROWTH_RATE: &str = "净利润增长率(%)";
const COL_ROE: &str = "净资产收益率(%)";

/// Extract the daily close series from a history table. Rows with an
/// unparsable date or a non-positive close are skipped, not errors; the
/// upstream occasionally pads suspension days with zeros.
pub fn parse_price_series(table: &TabularResult) -> Result<Vec<PricePoint>, ProviderError> {
    for column in [COL_DATE, COL_CLOSE] {
        if table.column_index(column).is_none() {
            return Err(ProviderError::InvalidData(format!(
                "price table is missing the '{column}' column"
            )));
        }
    }

    let mut points = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let Some(date) = table.text(row, COL_DATE).and_then(parse_date) else {
            continue;
        };
        let Some(close) = table.numeric(row, COL_CLOSE) else {
            continue;
        };
        if close <= 0.0 {
            continue;
        }
        points.push(PricePoint { date, close });
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
}

/// Reduce a financial-indicator table to annual reports: keep only the
/// December 31st rows at or after `start_year`, keyed by fiscal year.
/// Quarterly and interim rows are deliberately dropped.
pub fn parse_report_set(
    table: &TabularResult,
    start_year: i32,
) -> Result<ReportSet, ProviderError> {
    if table.column_index(COL_DATE).is_none() {
        return Err(ProviderError::InvalidData(format!(
            "financial table is missing the '{COL_DATE}' column"
        )));
    }

    let mut reports = ReportSet::new();
    for row in 0..table.len() {
        let Some(date) = table.text(row, COL_DATE).and_then(parse_date) else {
            continue;
        };
        if date.month() != 12 || date.day() != 31 || date.year() < start_year {
            continue;
        }
        let record = FinancialRecord {
            report_date: date,
            eps: table.numeric(row, COL_EPS),
            bps: table.numeric(row, COL_BPS),
            cashflow_ps: table.numeric(row, COL_CASHFLOW_PS),
            weighted_eps: table.numeric(row, COL_WEIGHTED_EPS),
            deducted_eps: table.numeric(row, COL_DEDUCTED_EPS),
            adjusted_bps: table.numeric(row, COL_ADJUSTED_BPS),
            capital_reserve_ps: table.numeric(row, COL_CAPITAL_RESERVE_PS),
            undistributed_profit_ps: table.numeric(row, COL_UNDISTRIBUTED_PS),
            growth_rate: table.numeric(row, COL_GROWTH_RATE),
            roe: table.numeric(row, COL_ROE),
        };
        reports.insert(date.year(), record);
    }
    Ok(reports)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y%m%d"))
        .ok()
}
