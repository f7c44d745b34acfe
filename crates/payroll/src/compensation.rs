use serde::{Deserialize, Serialize};

use hrims_core::{DomainError, DomainResult};

/// Standard divisor for converting a monthly basic salary to an hourly
/// rate (52 weeks x 40 hours / 12 months ~ 173 hours).
const MONTHLY_HOURS: f64 = 173.0;

/// Computed repayment terms for an amortized loan.
///
/// The identities `total_payment == monthly_payment * months` and
/// `total_interest == total_payment - principal` hold exactly: the
/// monthly payment is the only rounded figure, totals are derived from
/// it by integer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentTerms {
    /// Monthly payment in cents, rounded to the nearest cent.
    pub monthly_payment: u64,
    /// `monthly_payment * months`.
    pub total_payment: u64,
    /// `total_payment - principal` (0 for zero-rate loans that round down).
    pub total_interest: u64,
}

/// Gross salary = basic + house + car + travel allowances.
pub fn gross_salary(basic: u64, house: u64, car: u64, travel: u64) -> DomainResult<u64> {
    basic
        .checked_add(house)
        .and_then(|v| v.checked_add(car))
        .and_then(|v| v.checked_add(travel))
        .ok_or_else(|| DomainError::validation("gross salary overflows"))
}

/// Amortize a loan: `P*r*(1+r)^n / ((1+r)^n - 1)` with
/// `r = annual_rate_pct / 100 / 12` and `n = months`.
///
/// Zero-rate loans split the principal evenly.
pub fn amortize(principal: u64, annual_rate_pct: f64, months: u32) -> DomainResult<RepaymentTerms> {
    if principal == 0 {
        return Err(DomainError::validation("loan principal must be positive"));
    }
    if months == 0 {
        return Err(DomainError::validation("loan term must be at least one month"));
    }
    if !annual_rate_pct.is_finite() || annual_rate_pct < 0.0 {
        return Err(DomainError::validation("annual rate must be a non-negative number"));
    }

    let n = months as f64;
    let p = principal as f64;
    let r = annual_rate_pct / 100.0 / 12.0;

    let monthly = if r == 0.0 {
        (p / n).round()
    } else {
        let factor = (1.0 + r).powi(months as i32);
        (p * r * factor / (factor - 1.0)).round()
    };

    if !monthly.is_finite() || monthly < 0.0 || monthly > u64::MAX as f64 {
        return Err(DomainError::validation("repayment amount out of range"));
    }

    let monthly_payment = monthly as u64;
    let total_payment = monthly_payment
        .checked_mul(months as u64)
        .ok_or_else(|| DomainError::validation("total repayment overflows"))?;
    let total_interest = total_payment.saturating_sub(principal);

    Ok(RepaymentTerms {
        monthly_payment,
        total_payment,
        total_interest,
    })
}

/// Overtime pay from the grade's overtime multiplier (percent).
///
/// Hourly rate is derived from the monthly basic salary; the result is
/// rounded to the nearest cent.
pub fn overtime_pay(basic_monthly: u64, multiplier_pct: u32, hours: f64) -> DomainResult<u64> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(DomainError::validation("overtime hours must be non-negative"));
    }

    let hourly = basic_monthly as f64 / MONTHLY_HOURS;
    let pay = (hourly * (multiplier_pct as f64 / 100.0) * hours).round();

    if pay > u64::MAX as f64 {
        return Err(DomainError::validation("overtime pay out of range"));
    }

    Ok(pay as u64)
}
