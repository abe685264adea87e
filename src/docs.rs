use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use crate::{attributes, handlers, models};

#[derive(OpenApi)]
#[openapi(
    info(title = "Hubspace Light Control API", description = "API for controlling Hubspace smart lights"),
    paths(
        handlers::root,
        handlers::list_lights,
        handlers::control_lights,
        handlers::health,
    ),
    components(
        schemas(
            models::ApiInfo,
            models::ControlRequest,
            models::ControlResponse,
            models::DeviceResult,
            models::LightSummary,
            models::LightsResponse,
            models::HealthResponse,
            attributes::Power,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
