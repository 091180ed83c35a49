//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{devices, health, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Atelier Loans API",
        version = "0.1.0",
        description = "Workshop equipment booking REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Devices
        devices::list_devices,
        devices::get_device,
        devices::create_device,
        devices::update_device,
        devices::delete_device,
        devices::list_device_loans,
        devices::list_groups,
        devices::create_group,
        devices::update_group,
        devices::delete_group,
        // Loans
        loans::create_loan,
        loans::get_loan,
        loans::update_loan_end,
        loans::set_loan_status,
        loans::cancel_loan,
        loans::delete_loan,
        loans::get_my_loans,
        loans::sweep_loans,
    ),
    components(
        schemas(
            // Devices
            crate::models::device::Device,
            crate::models::device::CreateDevice,
            crate::models::device::UpdateDevice,
            crate::models::device::DeviceGroup,
            crate::models::device::DeviceGroupInput,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanScope,
            crate::models::loan::CreateLoan,
            crate::models::loan::UpdateLoanEnd,
            crate::models::loan::UpdateLoanStatus,
            crate::models::loan::SweepReport,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "devices", description = "Device and device group management"),
        (name = "loans", description = "Loan booking and lifecycle")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
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
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
