use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;

use super::bad_request;
use crate::clients::GeocodingClient;
use crate::error::GeocodeError;
use crate::models::ApiResponse;

const MIN_QUERY_LEN: usize = 3;

#[derive(Deserialize)]
pub struct PlaceQuery {
    pub q: String,
}

#[get("/geocode/search")]
pub async fn search_places(
    geocoder: web::Data<GeocodingClient>,
    query: web::Query<PlaceQuery>,
) -> impl Responder {
    let q = query.q.trim();
    if q.chars().count() < MIN_QUERY_LEN {
        return bad_request("Search text must be longer than 2 characters");
    }

    match geocoder.search(q).await {
        Ok(places) => HttpResponse::Ok().json(ApiResponse::success(places)),
        Err(GeocodeError::NotConfigured) => HttpResponse::ServiceUnavailable()
            .json(ApiResponse::<()>::error("Address search is not configured".into())),
        Err(err) => {
            log::error!("Failed to search places: {err:?}");
            HttpResponse::BadGateway()
                .json(ApiResponse::<()>::error("Could not fetch location suggestions".into()))
        }
    }
}
