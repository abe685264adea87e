//! Shared fixtures: an app wired to an in-memory Hubspace account.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use hubspace_lights::{
    AppState, ControlService,
    attributes::{BRIGHTNESS_ATTR, COLOR_ATTR, POWER_ATTR},
    commands::Dispatcher,
    devices::{MemoryClient, SimulatedLamp},
    models::Credentials,
    router,
};
use serde_json::Value;

pub const TOKEN: &str = "test-token";

/// Three lights and a fan.
pub fn household() -> MemoryClient {
    MemoryClient::new()
        .with_lamp(
            SimulatedLamp::light("dev-porch", "Porch")
                .with_attribute(POWER_ATTR, "0")
                .with_attribute(BRIGHTNESS_ATTR, "64")
                .with_attribute(COLOR_ATTR, "FFFFFF"),
        )
        .with_lamp(
            SimulatedLamp::light("dev-desk", "Desk Lamp")
                .with_attribute(POWER_ATTR, "1")
                .with_attribute(BRIGHTNESS_ATTR, "32"),
        )
        .with_lamp(SimulatedLamp::light("dev-hall", "Hallway"))
        .with_lamp(SimulatedLamp::new("dev-fan", "Ceiling Fan", "fan"))
}

pub fn app(client: Arc<MemoryClient>) -> Router {
    let dispatcher = Dispatcher::with_limits(client.clone(), Duration::from_secs(2), 8);
    let service = ControlService::with_dispatcher(
        client,
        Credentials {
            email: "me@example.com".into(),
            password: "pw".into(),
        },
        dispatcher,
    );
    router(AppState::new(service, TOKEN))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn control(body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/control")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
