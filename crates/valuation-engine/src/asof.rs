use chrono::Datelike;
use provider_core::{AlignedPoint, PricePoint, ReportSet};

/// Attach to each daily close the most recent annual report from a year
/// strictly before the trade year. A trade in 2023 sees the 2022 report
/// at the latest; the 2023 report did not exist yet on any 2023 trading
/// day, so using it would look into the future.
pub fn align_as_of(prices: &[PricePoint], reports: &ReportSet) -> Vec<AlignedPoint> {
    prices
        .iter()
        .map(|point| {
            let prior = reports.range(..point.date.year()).next_back();
            AlignedPoint {
                trade_date: point.date,
                close: point.close,
                report_year: prior.map(|(year, _)| *year),
                record: prior.map(|(_, record)| record.clone()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use provider_core::FinancialRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reports_for(years: &[i32]) -> ReportSet {
        years
            .iter()
            .map(|&y| (y, FinancialRecord::empty(date(y, 12, 31))))
            .collect()
    }

    #[test]
    fn test_strictly_prior_year_wins() {
        let prices = vec![
            PricePoint { date: date(2021, 1, 1), close: 10.0 },
            PricePoint { date: date(2022, 6, 1), close: 11.0 },
            PricePoint { date: date(2023, 12, 31), close: 12.0 },
        ];
        let reports = reports_for(&[2019, 2021]);

        let aligned = align_as_of(&prices, &reports);
        assert_eq!(aligned.len(), 3);
        // 2021 trade: 2021 report excluded, 2019 is the latest prior
        assert_eq!(aligned[0].report_year, Some(2019));
        assert_eq!(aligned[1].report_year, Some(2019));
        assert_eq!(aligned[2].report_year, Some(2021));
    }

    #[test]
    fn test_no_prior_report_leaves_financials_absent() {
        let prices = vec![PricePoint { date: date(2018, 3, 1), close: 9.0 }];
        let aligned = align_as_of(&prices, &reports_for(&[2019, 2020]));
        assert_eq!(aligned[0].report_year, None);
        assert!(aligned[0].record.is_none());
        assert_eq!(aligned[0].close, 9.0);
    }

    #[test]
    fn test_empty_report_set() {
        let prices = vec![PricePoint { date: date(2023, 1, 5), close: 20.0 }];
        let aligned = align_as_of(&prices, &ReportSet::new());
        assert_eq!(aligned.len(), 1);
        assert!(aligned[0].record.is_none());
    }

    #[test]
    fn test_same_year_report_never_attached() {
        let prices = vec![PricePoint { date: date(2022, 12, 31), close: 15.0 }];
        let aligned = align_as_of(&prices, &reports_for(&[2022]));
        assert_eq!(aligned[0].report_year, None);
    }
}
