use axum::Json;
use serde::Serialize;

pub const WELCOME_MESSAGE: &str = "Welcome to Zomato-Swiggy Delivery Time Prediction App";

#[derive(Serialize)]
pub struct HomeResponse {
    pub message: &'static str,
}

pub async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        message: WELCOME_MESSAGE,
    })
}
