use crate::models::metrics::{DividendProjection, PortfolioMetrics};
use crate::models::stock::{DividendFrequency, StockHolding};

/// Pure portfolio calculations: value, change, and dividend projections.
///
/// No I/O, no clock — identical inputs always produce identical outputs.
/// The "current month" for the this-month reading is an explicit parameter,
/// never an implicit `now()`.
pub struct MetricsService;

impl MetricsService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compute portfolio value and change from the holdings list.
    ///
    /// Value is `Σ quantity × current_price`; cost basis is
    /// `Σ quantity × purchase_price`; change is their difference. The
    /// percentage is formatted to 2 decimals, with `"0.00"` when the cost
    /// basis is zero. Empty input yields all zeros.
    #[must_use]
    pub fn compute_metrics(&self, holdings: &[StockHolding]) -> PortfolioMetrics {
        let mut current_value = 0.0;
        let mut purchase_value = 0.0;

        for stock in holdings {
            current_value += stock.quantity * stock.current_price;
            purchase_value += stock.quantity * stock.purchase_price;
        }

        let change = current_value - purchase_value;
        let change_percent = if purchase_value > 0.0 {
            format!("{:.2}", (change / purchase_value) * 100.0)
        } else {
            "0.00".to_string()
        };

        PortfolioMetrics {
            value: current_value,
            change,
            change_percent,
        }
    }

    /// Distribute each holding's annual dividend across the 12-month
    /// projection according to its payout frequency.
    ///
    /// Holdings with no yield (or yield ≤ 0) are skipped. An absent
    /// frequency — including unrecognized persisted values, which the
    /// row coercion already reduced to absent — falls through to the
    /// annual default: the full amount in December.
    #[must_use]
    pub fn compute_dividend_projection(&self, holdings: &[StockHolding]) -> DividendProjection {
        let mut monthly = [0.0f64; 12];
        let mut annual_total = 0.0;

        for stock in holdings {
            let amount = stock.annual_dividend_amount();
            if amount <= 0.0 {
                continue;
            }
            annual_total += amount;

            match stock.dividend_frequency {
                Some(DividendFrequency::Monthly) => {
                    for slot in &mut monthly {
                        *slot += amount / 12.0;
                    }
                }
                Some(DividendFrequency::Quarterly) => {
                    // Mar / Jun / Sep / Dec
                    for idx in [2, 5, 8, 11] {
                        monthly[idx] += amount / 4.0;
                    }
                }
                Some(DividendFrequency::SemiAnnual) => {
                    // Jun / Dec
                    monthly[5] += amount / 2.0;
                    monthly[11] += amount / 2.0;
                }
                Some(DividendFrequency::Annual) => {
                    monthly[11] += amount;
                }
                None => {
                    log::debug!(
                        "Holding {} has a yield but no payout frequency, projecting as annual",
                        stock.ticker
                    );
                    monthly[11] += amount;
                }
            }
        }

        DividendProjection {
            monthly,
            annual_total,
            monthly_average: annual_total / 12.0,
        }
    }

    /// Progress toward the annual goal as a whole percentage, clamped to
    /// [0, 100] and rounded to the nearest integer.
    ///
    /// A non-positive goal yields 0. Goals are validated positive at entry,
    /// so this path only guards against bad persisted data.
    #[must_use]
    pub fn goal_progress(&self, annual_total: f64, goal: f64) -> u8 {
        if goal <= 0.0 || annual_total <= 0.0 {
            return 0;
        }
        let pct = (annual_total / goal) * 100.0;
        pct.round().clamp(0.0, 100.0) as u8
    }

    /// The projected dividend for one month of the projection.
    /// `month_index` is 0-based (0 = January); out-of-range yields 0.
    #[must_use]
    pub fn expected_for_month(&self, projection: &DividendProjection, month_index: usize) -> f64 {
        projection.monthly.get(month_index).copied().unwrap_or(0.0)
    }
}

impl Default for MetricsService {
    fn default() -> Self {
        Self::new()
    }
}
