//! Service Layer
//!
//! Business rules for the internship program: identity and admin resolution,
//! the application and payment workflows, documents and retention.

pub mod applications;
pub mod auth;
pub mod authorization;
pub mod claims;
pub mod documents;
pub mod gateway;
pub mod invoice;
pub mod payments;
pub mod retention;
pub mod signature;
pub mod storage;
pub mod students;

pub use applications::{ApplicationService, ApplicationUpdate};
pub use auth::{extract_bearer_token, AuthService, IdentityClaims};
pub use authorization::{checks, AuthContext, AuthorizationService};
pub use claims::{ClaimService, UserClaimsView};
pub use documents::{DocumentService, DocumentUpload};
pub use gateway::{GatewayOrder, LocalGateway, OrderRequest, PaymentGateway, RazorpayGateway};
pub use payments::{CouponCheck, OrderCreated, PaymentService, VerifyPayment};
pub use retention::{RetentionService, RetentionSweeper};
pub use storage::DocumentStorage;
pub use students::{AdminStudentUpdate, ProfileUpdate, StudentService};
