//! HTTP API tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use irrigation_backend::config::{Config, ModelConfig, ServerConfig, TrainingConfig};
use irrigation_backend::ml::{LinearParams, Pipeline, RegressorParams};
use irrigation_backend::services::{ModelArtifact, PredictionService};
use irrigation_backend::{create_app, AppState};
use serde_json::{json, Value};
use shared::{noiseless_target, FeatureSet, Observation, CROP_BASE_WATER};
use tower::ServiceExt;

fn config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        model: ModelConfig {
            artifact_path: "models/test.bin".to_string(),
        },
        training: TrainingConfig::default(),
    }
}

/// Linear model fitted on noiseless targets; reproduces the formula closely
fn artifact() -> ModelArtifact {
    linear_artifact(FeatureSet::Standard)
}

fn linear_artifact(feature_set: FeatureSet) -> ModelArtifact {
    let observations: Vec<Observation> = (0..140)
        .map(|i| {
            let (crop, _) = CROP_BASE_WATER[i % CROP_BASE_WATER.len()];
            Observation::new(
                crop,
                30.0 + 4.0 * (i % 10) as f64,
                15.0 + (i % 13) as f64,
                40.0 + 5.0 * (i % 11) as f64,
                (i % 9) as f64,
            )
        })
        .collect();
    let targets: Vec<f64> = observations.iter().map(noiseless_target).collect();
    let pipeline = Pipeline::fit(
        &RegressorParams::Linear(LinearParams::default()),
        feature_set,
        &observations,
        &targets,
    )
    .unwrap();
    ModelArtifact::new(pipeline, None, observations.len(), 0)
}

fn app_with(predictor: PredictionService) -> Router {
    create_app(AppState {
        config: Arc::new(config()),
        predictor: Arc::new(predictor),
    })
}

fn ready_app() -> Router {
    app_with(PredictionService::ready(artifact()))
}

fn unavailable_app() -> Router {
    app_with(PredictionService::unavailable("artifact missing"))
}

fn rice_request() -> Value {
    json!({
        "crop_type": "rice",
        "soil_moisture_percent": 50,
        "temperature_celsius": 25,
        "humidity_percent": 70,
        "rainfall_mm": 2,
        "crop_water_base": 6500
    })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// Health And Crop Table
// ============================================================================

mod info_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_model() {
        let (status, body) = send(ready_app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_loaded"], json!(true));
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["environment"], json!("test"));

        let (status, body) = send(unavailable_app(), get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_loaded"], json!(false));
        assert_eq!(body["status"], json!("degraded"));
    }

    #[tokio::test]
    async fn test_crop_info_lists_table() {
        let (status, body) = send(unavailable_app(), get("/crop-info")).await;
        assert_eq!(status, StatusCode::OK);
        let table = body.as_object().unwrap();
        assert_eq!(table.len(), 7);
        assert_eq!(table["rice"], json!(6500.0));
        assert_eq!(table["papaya"], json!(4850.0));
    }
}

// ============================================================================
// Prediction Endpoint
// ============================================================================

mod predict_tests {
    use super::*;

    #[tokio::test]
    async fn test_predict_rice_reference() {
        for uri in ["/predict", "/api/v1/predict"] {
            let (status, body) = send(ready_app(), post_json(uri, &rice_request().to_string())).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], json!(true));
            assert_eq!(body["input_data"], rice_request());
            let prediction = body["water_requirement_liters_per_hectare"].as_f64().unwrap();
            assert!((prediction - 6475.0).abs() < 5.0, "predicted {prediction}");
        }
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let mut request = rice_request();
        request.as_object_mut().unwrap().remove("rainfall_mm");
        let (status, body) = send(ready_app(), post_json("/predict", &request.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
        assert_eq!(body["error"]["fields"], json!(["rainfall_mm"]));
    }

    #[tokio::test]
    async fn test_mismatched_base_is_bad_request() {
        let mut request = rice_request();
        request["crop_water_base"] = json!(4000);
        let (status, body) = send(ready_app(), post_json("/predict", &request.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["fields"], json!(["crop_water_base"]));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (status, body) = send(ready_app(), post_json("/predict", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
    }

    #[tokio::test]
    async fn test_overflowing_inputs_are_bad_request() {
        let app = app_with(PredictionService::ready(linear_artifact(FeatureSet::Extended)));
        let mut request = rice_request();
        request["soil_moisture_percent"] = json!(1e300);
        request["temperature_celsius"] = json!(1e300);

        let (status, body) = send(app, post_json("/predict", &request.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
        assert_eq!(
            body["error"]["fields"],
            json!(["soil_moisture_percent", "temperature_celsius"])
        );
    }

    #[tokio::test]
    async fn test_no_model_is_service_unavailable() {
        let (status, body) =
            send(unavailable_app(), post_json("/predict", &rice_request().to_string())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], json!("MODEL_NOT_LOADED"));

        // Availability is reported before the body is looked at
        let (status, _) = send(unavailable_app(), post_json("/predict", "{}")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
