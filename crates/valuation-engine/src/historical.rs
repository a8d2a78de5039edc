use chrono::NaiveDate;
use provider_core::{PricePoint, ReportSet};
use serde::Serialize;

use crate::asof::align_as_of;
use crate::ratios::{compute_ratios, ValuationRatios};

/// One day of the valuation series: the close, which report backed it,
/// and the derived ratios. Days without a prior report still appear,
/// with every ratio unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationPoint {
    pub trade_date: NaiveDate,
    pub close: f64,
    pub report_year: Option<i32>,
    pub report_date: Option<NaiveDate>,
    pub ratios: ValuationRatios,
}

/// Derive the full valuation series for a price history against a set
/// of annual reports. Output order and length match the input prices.
pub fn historical_valuation(prices: &[PricePoint], reports: &ReportSet) -> Vec<ValuationPoint> {
    align_as_of(prices, reports)
        .into_iter()
        .map(|aligned| {
            let ratios = match &aligned.record {
                Some(record) => compute_ratios(aligned.close, record),
                None => ValuationRatios::unavailable(),
            };
            ValuationPoint {
                trade_date: aligned.trade_date,
                close: aligned.close,
                report_year: aligned.report_year,
                report_date: aligned.record.map(|r| r.report_date),
                ratios,
            }
        })
        .collect()
}
