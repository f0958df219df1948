use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppError;
use crate::models::request::DeliveryRequest;
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_delivery_time: f64,
}

/// The body is read raw so that validation can report every bad field, not
/// just the first one serde trips over.
pub async fn predict_delivery_time(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, AppError> {
    let request = DeliveryRequest::from_slice(&body)?;
    let predicted = state.predictor.predict(&request)?;

    tracing::debug!(order_id = %request.id, predicted, "Scored delivery");

    Ok(Json(PredictionResponse {
        predicted_delivery_time: predicted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CleaningError, PipelineError, RegressionError, SchemaMismatchError};
    use crate::pipeline::MockPredictor;
    use crate::router::create_router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn body() -> Value {
        json!({
            "ID": "0xcdcd",
            "Delivery_person_ID": "DEHRES17DEL01",
            "Delivery_person_Age": "36",
            "Delivery_person_Ratings": "4.2",
            "Restaurant_latitude": 30.327968,
            "Restaurant_longitude": 78.046106,
            "Delivery_location_latitude": 30.397968,
            "Delivery_location_longitude": 78.116106,
            "Order_Date": "12-02-2022",
            "Time_Orderd": "21:55",
            "Time_Order_picked": "22:10",
            "Weatherconditions": "conditions Fog",
            "Road_traffic_density": "Jam ",
            "Vehicle_condition": 2,
            "Type_of_order": "Snack ",
            "Type_of_vehicle": "motorcycle ",
            "multiple_deliveries": "3",
            "Festival": "No ",
            "City": "Metropolitian "
        })
    }

    async fn post(predictor: MockPredictor, payload: String) -> (StatusCode, Value) {
        let app = create_router(Arc::new(AppState::new(Arc::new(predictor))));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/predict")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_prediction_returned() {
        let mut predictor = MockPredictor::new();
        predictor
            .expect_predict()
            .withf(|request| request.id == "0xcdcd" && request.vehicle_condition == 2)
            .times(1)
            .returning(|_| Ok(31.5));

        let (status, json) = post(predictor, body().to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "predicted_delivery_time": 31.5 }));
    }

    #[tokio::test]
    async fn test_invalid_body_never_reaches_predictor() {
        let mut predictor = MockPredictor::new();
        predictor.expect_predict().never();

        let mut payload = body();
        payload.as_object_mut().unwrap().remove("City");

        let (status, json) = post(predictor, payload.to_string()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["detail"][0]["loc"], json!(["body", "City"]));
        assert_eq!(json["detail"][0]["type"], "missing");
    }

    #[tokio::test]
    async fn test_cleaning_error_is_client_error() {
        let mut predictor = MockPredictor::new();
        predictor.expect_predict().returning(|_| {
            Err(PipelineError::Cleaning(CleaningError::InvalidValue {
                column: "Order_Date".into(),
                value: "yesterday".into(),
                reason: "expected a dd-mm-yyyy date".into(),
            }))
        });

        let (status, json) = post(predictor, body().to_string()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["detail"].as_str().unwrap().contains("Order_Date"));
    }

    #[tokio::test]
    async fn test_internal_failures_hide_details() {
        let failures = [
            PipelineError::SchemaMismatch(SchemaMismatchError::MissingColumn("distance".into())),
            PipelineError::Regression(RegressionError::NonFinite(f64::INFINITY)),
        ];

        for failure in failures {
            let mut predictor = MockPredictor::new();
            predictor
                .expect_predict()
                .returning(move |_| Err(failure.clone()));

            let (status, json) = post(predictor, body().to_string()).await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json, json!({ "detail": "Internal Server Error" }));
        }
    }
}
