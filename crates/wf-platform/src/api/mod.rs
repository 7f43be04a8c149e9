//! API Layer
//!
//! REST endpoints under `/api`, the file route and the health check.

pub mod admin;
pub mod applications;
pub mod common;
pub mod documents;
pub mod health;
pub mod middleware;
pub mod openapi;
pub mod payments;
pub mod students;

use std::sync::Arc;

use axum::{Extension, Router};

pub use admin::{admin_router, AdminState};
pub use applications::{applications_router, ApplicationsState};
pub use common::*;
pub use documents::{documents_router, files_router, DocumentsState};
pub use health::{health_router, HealthState};
pub use middleware::{AppState, Authenticated};
pub use openapi::ApiDoc;
pub use payments::{payments_router, PaymentsState};
pub use students::{students_router, StudentsState};

use crate::config::PlatformConfig;
use crate::error::Result;
use crate::repository::{
    ApplicationRepository, ClaimRepository, DocumentRepository, PaymentRepository, StudentRepository,
    UnitOfWork,
};
use crate::service::invoice::InvoiceGenerator;
use crate::service::{
    ApplicationService, AuthService, AuthorizationService, ClaimService, DocumentService,
    DocumentStorage, PaymentGateway, PaymentService, RetentionService, StudentService,
};

/// Every service behind the HTTP surface, wired over one store.
#[derive(Clone)]
pub struct PlatformServices {
    pub auth: AppState,
    pub applications: Arc<ApplicationService>,
    pub students: Arc<StudentService>,
    pub payments: Arc<PaymentService>,
    pub documents: Arc<DocumentService>,
    pub claims: Arc<ClaimService>,
    pub retention: Arc<RetentionService>,
    pub environment: String,
}

impl PlatformServices {
    pub fn build<S>(
        store: Arc<S>,
        config: &PlatformConfig,
        gateway: Arc<dyn PaymentGateway>,
        storage: DocumentStorage,
    ) -> Result<Self>
    where
        S: ApplicationRepository
            + StudentRepository
            + PaymentRepository
            + DocumentRepository
            + ClaimRepository
            + UnitOfWork
            + 'static,
    {
        let applications_repo: Arc<dyn ApplicationRepository> = store.clone();
        let students_repo: Arc<dyn StudentRepository> = store.clone();
        let payments_repo: Arc<dyn PaymentRepository> = store.clone();
        let documents_repo: Arc<dyn DocumentRepository> = store.clone();
        let claims_repo: Arc<dyn ClaimRepository> = store.clone();
        let unit_of_work: Arc<dyn UnitOfWork> = store;

        let auth = AppState {
            auth_service: Arc::new(AuthService::new(&config.auth)?),
            authz_service: Arc::new(AuthorizationService::new(claims_repo.clone())),
        };

        let documents = Arc::new(DocumentService::new(
            documents_repo,
            students_repo.clone(),
            storage,
            config.storage.max_upload_bytes,
        ));
        let invoices = Arc::new(InvoiceGenerator::new(documents.clone()));

        let payments = PaymentService::new(
            payments_repo,
            students_repo.clone(),
            unit_of_work.clone(),
            gateway,
            config.pricing.clone(),
        )
        .with_invoices(invoices);

        Ok(Self {
            auth,
            applications: Arc::new(ApplicationService::new(
                applications_repo.clone(),
                unit_of_work,
                config.pricing.clone(),
            )),
            students: Arc::new(StudentService::new(students_repo.clone())),
            payments: Arc::new(payments),
            documents,
            claims: Arc::new(ClaimService::new(claims_repo, applications_repo.clone(), students_repo)),
            retention: Arc::new(RetentionService::new(applications_repo, config.retention.clone())),
            environment: config.environment.clone(),
        })
    }
}

/// Routes under `/api`, `/files` and `/health`, with the authentication
/// services installed for the [`Authenticated`] extractor.
pub fn platform_router(services: &PlatformServices) -> Router {
    let documents_state = DocumentsState {
        service: services.documents.clone(),
    };

    let api = Router::new()
        .nest(
            "/applications",
            applications_router(ApplicationsState {
                service: services.applications.clone(),
            }),
        )
        .nest(
            "/students",
            students_router(StudentsState {
                service: services.students.clone(),
            }),
        )
        .nest(
            "/payments",
            payments_router(PaymentsState {
                service: services.payments.clone(),
            }),
        )
        .nest("/documents", documents_router(documents_state.clone()))
        .nest(
            "/admin",
            admin_router(AdminState {
                service: services.claims.clone(),
            }),
        );

    Router::new()
        .nest("/api", api)
        .nest("/files", files_router(documents_state))
        .merge(health_router(HealthState {
            environment: services.environment.clone(),
        }))
        .layer(Extension(services.auth.clone()))
}
