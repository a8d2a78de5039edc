use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard ceiling on any single call, user override included.
pub const SYSTEM_MAX_TIMEOUT: Duration = Duration::from_secs(1800);

/// Named timeout budgets. Categories reflect how heavy the upstream
/// endpoints are, not how important the caller thinks they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutCategory {
    /// Full-market realtime snapshots move a lot of rows.
    RealtimeMarket,
    /// Complex financial-statement queries.
    FinancialData,
    /// Financial-ratio analysis tables.
    FinancialAnalysis,
    /// Bulk per-entity datasets.
    DataIntensive,
    /// Historical daily series.
    HistoricalData,
    /// Everything else.
    Basic,
}

impl TimeoutCategory {
    pub fn budget(self) -> Duration {
        match self {
            TimeoutCategory::RealtimeMarket => Duration::from_secs(900),
            TimeoutCategory::FinancialData => Duration::from_secs(600),
            TimeoutCategory::FinancialAnalysis => Duration::from_secs(300),
            TimeoutCategory::DataIntensive => Duration::from_secs(300),
            TimeoutCategory::HistoricalData => Duration::from_secs(300),
            TimeoutCategory::Basic => Duration::from_secs(120),
        }
    }
}

/// Ordered endpoint-name → category table. Scanned top to bottom; the
/// first category whose member list holds an exact or prefix match wins,
/// otherwise the basic budget applies.
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    categories: Vec<(TimeoutCategory, Vec<&'static str>)>,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutPolicy {
    pub fn new() -> Self {
        Self {
            categories: vec![
                (
                    TimeoutCategory::RealtimeMarket,
                    vec![
                        "stock_zh_a_spot_em",
                        "stock_sh_a_spot_em",
                        "stock_sz_a_spot_em",
                        "stock_bj_a_spot_em",
                        "stock_new_a_spot_em",
                        "stock_cy_a_spot_em",
                        "stock_kc_a_spot_em",
                        "stock_hk_spot_em",
                        "stock_hk_main_board_spot_em",
                        "stock_zh_ah_spot_em",
                        "stock_zh_ab_comparison_em",
                        "stock_zh_a_new",
                        "stock_zh_a_new_em",
                        "stock_xgsr_ths",
                        "stock_hsgt_sh_hk_spot_em",
                    ],
                ),
                (
                    TimeoutCategory::FinancialData,
                    vec![
                        "stock_balance_sheet_by_report_em",
                        "stock_financial_abstract",
                        "stock_research_report_em",
                    ],
                ),
                (
                    TimeoutCategory::FinancialAnalysis,
                    vec![
                        "stock_lrb_em",
                        "stock_xjll_em",
                        "stock_zcfz_em",
                        "stock_zcfz_bj_em",
                        "stock_financial_debt_ths",
                        "stock_financial_benefit_ths",
                        "stock_financial_cash_ths",
                        "stock_financial_abstract_ths",
                        "stock_financial_analysis_indicator",
                    ],
                ),
                (
                    TimeoutCategory::DataIntensive,
                    vec![
                        "stock_gpzy_profile_em",
                        "stock_account_statistics_em",
                        "stock_comment_em",
                        "stock_hsgt_board_rank_em",
                        "stock_hsgt_hist_em",
                        "stock_hsgt_individual_em",
                    ],
                ),
                (
                    TimeoutCategory::HistoricalData,
                    vec!["stock_zh_a_hist", "stock_hist_quotations", "stock_hsgt_fund_min_em"],
                ),
            ],
        }
    }

    pub fn category_for(&self, endpoint: &str) -> TimeoutCategory {
        for (category, members) in &self.categories {
            if members
                .iter()
                .any(|m| endpoint == *m || endpoint.starts_with(m))
            {
                return *category;
            }
        }
        TimeoutCategory::Basic
    }

    /// Timeout budget for one call. A user override always wins but is
    /// clamped to [`SYSTEM_MAX_TIMEOUT`].
    pub fn budget_for(&self, endpoint: &str, user_override: Option<Duration>) -> Duration {
        if let Some(user) = user_override {
            return user.min(SYSTEM_MAX_TIMEOUT);
        }
        self.category_for(endpoint).budget()
    }
}
