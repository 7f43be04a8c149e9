//! OpenAPI Documentation

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Platform API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wyffle Platform API",
        version = "1.0.0",
        description = "Internship applications, student progress, payments and documents"
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development")
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "applications", description = "Internship applications"),
        (name = "students", description = "Student records and progress"),
        (name = "payments", description = "Course fee payments"),
        (name = "documents", description = "Student documents"),
        (name = "admin", description = "Administrator claims"),
        (name = "monitoring", description = "Health")
    ),
    paths(
        super::applications::submit_application,
        super::applications::my_application,
        super::applications::list_applications,
        super::applications::get_application,
        super::applications::update_application,
        super::applications::update_application_status,
        super::students::get_profile,
        super::students::update_profile,
        super::students::list_students,
        super::students::get_student,
        super::students::update_student,
        super::students::update_student_status,
        super::students::update_payment_status,
        super::students::update_progress,
        super::students::update_progress_step,
        super::payments::create_order,
        super::payments::verify_payment,
        super::payments::payment_history,
        super::payments::apply_coupon,
        super::documents::upload_document,
        super::documents::my_documents,
        super::documents::student_documents,
        super::documents::set_document_enabled,
        super::documents::delete_document,
        super::documents::download_file,
        super::admin::set_admin,
        super::admin::remove_admin,
        super::admin::user_claims,
        super::health::health,
    ),
    components(
        schemas(
            super::common::ApiError,
            super::common::SuccessResponse,
        )
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
