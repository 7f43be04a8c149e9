//! Domain Layer
//!
//! Typed records for the internship program.

pub mod application;
pub mod claims;
pub mod document;
pub mod payment;
pub mod student;

pub use application::{ApplicantDetails, Application, ApplicationStatus, StatusChange};
pub use claims::UserClaims;
pub use document::{Document, DocumentCategory};
pub use payment::{Payment, PaymentStatus, Quote};
pub use student::{
    InternshipStatus, ProgressSteps, Student, StudentPaymentStatus, StudentProfile, StudentStatus,
};
