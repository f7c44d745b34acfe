//! `hrims-people` — the Employee aggregate.
//!
//! Covers the full employee lifecycle: registration, system-access
//! activation, profile verification, contact updates and termination.

pub mod employee;

pub use employee::{
    ActivateSystemAccess, ContactInfo, ContactUpdated, ContractType, Employee, EmployeeCommand,
    EmployeeEvent, EmployeeId, EmployeeRegistered, EmployeeStatus, EmployeeTerminated,
    ProfileVerified, RegisterEmployee, RegistrationStatus, SystemAccessActivated,
    TerminateEmployee, UpdateContact, VerifyProfile,
};
