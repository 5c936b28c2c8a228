//! Loan and yield math over exact 18-digit fixed-point decimals.
//!
//! Every helper multiplies the raw (10^18-scaled) values into a 512-bit
//! product and divides once at the end, so the only rounding is that final
//! division truncating to 18 fractional digits. `None` means a zero divisor
//! or a result that does not fit.

use ethers::types::{U256, U512};

use crate::domain_types::FixedDecimal;

/// Maintenance margin of 15%, expressed as 115%
pub const DEFAULT_MAINTENANCE_RATIO: u64 = 115;

/// Days per year used by the daily-interest APR
pub const DAYS_PER_YEAR: u64 = 365;

const HUNDRED: u64 = 100;

fn final_division(numerator: U512, denominator: U512) -> Option<FixedDecimal> {
    if denominator.is_zero() {
        return None;
    }
    U256::try_from(numerator / denominator)
        .ok()
        .map(FixedDecimal::from_raw)
}

/// Price of the collateral at which the loan becomes liquidatable:
/// `borrowed * (maintenance_ratio / 100) / collateral`
pub fn liquidation_price(
    borrowed: FixedDecimal,
    collateral: FixedDecimal,
    maintenance_ratio: FixedDecimal,
) -> Option<FixedDecimal> {
    // (b * 10^18)(r * 10^18) / (100 * c * 10^18) is the result scaled by 10^18
    let numerator = borrowed.raw().full_mul(maintenance_ratio.raw());
    let denominator = collateral.raw().full_mul(U256::from(HUNDRED));
    final_division(numerator, denominator)
}

/// Annual percentage rate: `interest_per_period * periods_per_year / principal * 100`
pub fn apr(
    interest_per_period: FixedDecimal,
    principal: FixedDecimal,
    periods_per_year: FixedDecimal,
) -> Option<FixedDecimal> {
    let numerator = interest_per_period
        .raw()
        .full_mul(periods_per_year.raw())
        .checked_mul(U512::from(HUNDRED))?;
    final_division(numerator, U512::from(principal.raw()))
}

/// APR of a loan from the interest it accrues per day
pub fn apr_from_daily_interest(
    interest_per_day: FixedDecimal,
    collateral: FixedDecimal,
) -> Option<FixedDecimal> {
    apr(
        interest_per_day,
        collateral,
        FixedDecimal::from_integer(DAYS_PER_YEAR),
    )
}

/// Source of protocol risk parameters.
///
/// The maintenance ratio lives on-chain in principle; this seam lets it be
/// read from there instead of configuration.
pub trait RiskParameterSource: Send + Sync {
    fn maintenance_ratio(&self) -> FixedDecimal;
}

/// Fixed risk parameters (from configuration)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRiskParameters {
    pub maintenance_ratio: FixedDecimal,
}

impl Default for StaticRiskParameters {
    fn default() -> Self {
        Self {
            maintenance_ratio: FixedDecimal::from_integer(DEFAULT_MAINTENANCE_RATIO),
        }
    }
}

impl RiskParameterSource for StaticRiskParameters {
    fn maintenance_ratio(&self) -> FixedDecimal {
        self.maintenance_ratio
    }
}

/// Loan math bound to an injected maintenance ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanMath {
    maintenance_ratio: FixedDecimal,
}

impl LoanMath {
    pub fn new(maintenance_ratio: FixedDecimal) -> Self {
        Self { maintenance_ratio }
    }

    pub fn from_source(source: &dyn RiskParameterSource) -> Self {
        Self::new(source.maintenance_ratio())
    }

    pub fn maintenance_ratio(&self) -> FixedDecimal {
        self.maintenance_ratio
    }

    pub fn liquidation_price(
        &self,
        borrowed: FixedDecimal,
        collateral: FixedDecimal,
    ) -> Option<FixedDecimal> {
        liquidation_price(borrowed, collateral, self.maintenance_ratio)
    }
}

impl Default for LoanMath {
    fn default() -> Self {
        Self::from_source(&StaticRiskParameters::default())
    }
}
