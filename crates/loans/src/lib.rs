//! `hrims-loans` — the LoanApplication aggregate.
//!
//! Repayment terms are computed once when an application is opened and
//! carried on events; every later transition only moves the status.

pub mod application;

pub use application::{
    ApplicationApproved, ApplicationCancelled, ApplicationOpened, ApplicationRejected,
    ApplicationSubmitted, ApproveApplication, CancelApplication, DisburseLoan, LoanApplication,
    LoanApplicationId, LoanCommand, LoanDefaulted, LoanDisbursed, LoanEvent, LoanStatus,
    MarkDefaulted, OpenApplication, RejectApplication, ReviewStarted, StartReview,
    SubmitApplication,
};
