//! `hrims-org` — organizational structure aggregates.
//!
//! Departments (hierarchy), positions (headcount capacity) and grades
//! (compensation bands and loan limits).

pub mod department;
pub mod grade;
pub mod position;

pub use department::{
    CreateDepartment, DeactivateDepartment, Department, DepartmentCommand, DepartmentCreated,
    DepartmentDeactivated, DepartmentEvent, DepartmentId, DepartmentReparented, DepartmentUpdated,
    ReparentDepartment, UpdateDepartment,
};
pub use grade::{
    CompensationStructure, CompensationUpdated, CreateGrade, Grade, GradeBand, GradeCommand,
    GradeCreated, GradeEvent, GradeId, GradeLimits, LimitsUpdated, UpdateCompensation,
    UpdateLimits,
};
pub use position::{
    CreatePosition, FillPosition, Position, PositionCommand, PositionCreated, PositionEvent,
    PositionFilled, PositionId, PositionResized, PositionUpdated, PositionVacated, ResizePosition,
    RoleFlags, UpdatePosition, VacatePosition,
};
