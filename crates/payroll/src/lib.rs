//! `hrims-payroll` — pure compensation arithmetic.
//!
//! No state, no IO: gross salary composition, loan amortization, and
//! overtime pay. All amounts are integer cents.

pub mod compensation;

pub use compensation::{RepaymentTerms, amortize, gross_salary, overtime_pay};
