use std::sync::Arc;

use actix_web::{http::header, http::StatusCode, test, web, App};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use local_market_service::auth::ACTOR_ID_HEADER;
use local_market_service::clients::GeocodingClient;
use local_market_service::config::AppConfig;
use local_market_service::handlers;
use local_market_service::models::UserRole;
use local_market_service::store::{MarketStore, MemoryStore};

macro_rules! test_app {
    ($store:expr) => {{
        let shared: Arc<dyn MarketStore> = $store.clone();
        test::init_service(
            App::new()
                .app_data(web::Data::from(shared))
                .app_data(web::Data::new(AppConfig::default()))
                .app_data(web::Data::new(GeocodingClient::new(
                    "http://127.0.0.1:9".into(),
                    None,
                )))
                .configure(handlers::configure),
        )
        .await
    }};
}

fn as_user(req: test::TestRequest, user: Uuid) -> test::TestRequest {
    req.insert_header((ACTOR_ID_HEADER, user.to_string()))
}

fn signup_body(name: &str) -> Value {
    json!({
        "business_name": name,
        "business_category": "food-drink",
        "description": "Small batch goods from the East Bay",
        "website": "https://example.com",
        "instagram": "@example",
        "address": "12 Grand Ave",
        "city": "Oakland",
        "zip_code": "94612",
        "terms_accepted": true
    })
}

fn event_body(name: &str, city: &str) -> Value {
    json!({
        "name": name,
        "description": "Street food, crafts and live music",
        "date": "2026-11-07",
        "start_time": "10:00:00",
        "end_time": "16:00:00",
        "location": "Town Square",
        "address": "472 Water St",
        "city": city
    })
}

fn id_of(body: &Value, pointer: &str) -> Uuid {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(|| panic!("no uuid at {pointer} in {body}"))
}

#[actix_rt::test]
async fn vendor_signup_writes_one_row_per_table() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);
    let vendor = Uuid::new_v4();

    let req = as_user(test::TestRequest::post().uri("/api/v1/vendors/signup"), vendor)
        .set_json(signup_body("Bay Honey"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(id_of(&body, "/data/vendor/id"), vendor);
    assert_eq!(
        id_of(&body, "/data/vendor/business_id"),
        id_of(&body, "/data/business/id")
    );

    let counts = store.row_counts().await;
    assert_eq!(
        (counts.businesses, counts.vendors, counts.vendor_locations),
        (1, 1, 1)
    );

    let req = as_user(test::TestRequest::post().uri("/api/v1/vendors/signup"), vendor)
        .set_json(signup_body("Bay Honey Again"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(store.row_counts().await, counts);
}

#[actix_rt::test]
async fn signup_without_terms_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let mut body = signup_body("Bay Honey");
    body["terms_accepted"] = json!(false);
    let req = as_user(test::TestRequest::post().uri("/api/v1/vendors/signup"), Uuid::new_v4())
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.row_counts().await.businesses, 0);
}

#[actix_rt::test]
async fn event_search_by_city_is_exact() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);
    let organizer = Uuid::new_v4();

    for (name, city) in [
        ("Lakeside Market", "Oakland"),
        ("Campus Fair", "Berkeley"),
        ("Harbor Night Market", "Oakland"),
    ] {
        let req = as_user(test::TestRequest::post().uri("/api/v1/events"), organizer)
            .set_json(event_body(name, city))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/events?city=Oakland")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e["city"] == "Oakland"));

    let req = test::TestRequest::get()
        .uri("/api/v1/events?city=%20Oakland&q=%20night%20")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["name"], "Harbor Night Market");
}

#[actix_rt::test]
async fn event_must_end_after_it_starts() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let mut body = event_body("Backwards Market", "Oakland");
    body["end_time"] = json!("09:00:00");
    let req = as_user(test::TestRequest::post().uri("/api/v1/events"), Uuid::new_v4())
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn protected_routes_redirect_to_auth_page() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let requests = vec![
        test::TestRequest::get().uri("/api/v1/admin/vendors").to_request(),
        test::TestRequest::get().uri("/api/v1/profiles/me").to_request(),
        test::TestRequest::post()
            .uri("/api/v1/events")
            .set_json(event_body("Lakeside Market", "Oakland"))
            .to_request(),
    ];

    for req in requests {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/auth");
    }
    assert_eq!(store.row_counts().await.events, 0);
}

#[actix_rt::test]
async fn admin_can_re_review_a_rejected_vendor() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);
    let admin = Uuid::new_v4();
    let vendor = Uuid::new_v4();
    store.set_profile_role(admin, UserRole::Admin).await.unwrap();

    let req = as_user(test::TestRequest::post().uri("/api/v1/vendors/signup"), vendor)
        .set_json(signup_body("Bay Honey"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let uri = format!("/api/v1/admin/vendors/{vendor}/status");
    for status in ["rejected", "approved"] {
        let req = as_user(test::TestRequest::put().uri(&uri), admin)
            .set_json(json!({ "status": status }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], status);
    }

    let req = as_user(test::TestRequest::put().uri(&uri), admin)
        .set_json(json!({ "status": "pending" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = as_user(test::TestRequest::put().uri(&uri), vendor)
        .set_json(json!({ "status": "rejected" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn invitation_answer_and_interest_toggle() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);
    let organizer = Uuid::new_v4();
    let vendor = Uuid::new_v4();
    let shopper = Uuid::new_v4();

    let req = as_user(test::TestRequest::post().uri("/api/v1/vendors/signup"), vendor)
        .set_json(signup_body("Bay Honey"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let business_id = id_of(&body, "/data/business/id");

    let req = as_user(test::TestRequest::post().uri("/api/v1/events"), organizer)
        .set_json(event_body("Lakeside Market", "Oakland"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let event_id = id_of(&body, "/data/id");

    let req = as_user(
        test::TestRequest::post().uri(&format!("/api/v1/businesses/{business_id}/products")),
        vendor,
    )
    .set_json(json!({ "name": "Wildflower Honey", "price": 12.0 }))
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let product_id = id_of(&body, "/data/id");

    let selection_uri = format!("/api/v1/events/{event_id}/businesses/{business_id}/products");
    let req = as_user(test::TestRequest::put().uri(&selection_uri), vendor)
        .set_json(json!({ "product_ids": [product_id] }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = as_user(
        test::TestRequest::post().uri(&format!("/api/v1/events/{event_id}/vendors")),
        organizer,
    )
    .set_json(json!({ "business_id": business_id }))
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let invitation_id = id_of(&body, "/data/id");

    let req = as_user(
        test::TestRequest::post().uri(&format!("/api/v1/events/{event_id}/vendors")),
        organizer,
    )
    .set_json(json!({ "business_id": business_id }))
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let status_uri = format!("/api/v1/event-vendors/{invitation_id}/status");
    let req = as_user(test::TestRequest::put().uri(&status_uri), vendor)
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["status"], "accepted");

    let req = as_user(test::TestRequest::put().uri(&status_uri), vendor)
        .set_json(json!({ "status": "accepted" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = as_user(test::TestRequest::put().uri(&selection_uri), vendor)
        .set_json(json!({ "product_ids": [product_id] }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let toggle_uri = format!("/api/v1/events/{event_id}/products/{product_id}/interest");
    let req = as_user(test::TestRequest::post().uri(&toggle_uri), shopper).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], json!({ "interested": true, "interest_count": 1 }));

    let req = as_user(
        test::TestRequest::get().uri(&format!("/api/v1/events/{event_id}/products")),
        shopper,
    )
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["interest_count"], 1);
    assert_eq!(body["data"][0]["interested"], true);
    assert_eq!(body["data"][0]["business_name"], "Bay Honey");

    let req = as_user(test::TestRequest::post().uri(&toggle_uri), shopper).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], json!({ "interested": false, "interest_count": 0 }));
    assert_eq!(store.row_counts().await.interests, 0);
}

#[actix_rt::test]
async fn expired_invite_code_is_gone() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);
    let owner = Uuid::new_v4();

    let req = as_user(test::TestRequest::post().uri("/api/v1/businesses"), owner)
        .set_json(json!({ "name": "Bay Honey" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let business_id = id_of(&body, "/data/id");

    let req = as_user(
        test::TestRequest::post().uri(&format!("/api/v1/businesses/{business_id}/invites")),
        owner,
    )
    .set_json(json!({}))
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let code = body["data"]["code"].as_str().unwrap().to_string();

    store
        .set_invite_expiry(&code, Utc::now() - Duration::hours(1))
        .await
        .unwrap();

    let req = as_user(test::TestRequest::post().uri("/api/v1/invites/redeem"), Uuid::new_v4())
        .set_json(json!({ "code": code }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::GONE);
    assert_eq!(store.row_counts().await.members, 0);
}

#[actix_rt::test]
async fn invite_code_grants_membership() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);
    let owner = Uuid::new_v4();
    let joiner = Uuid::new_v4();

    let req = as_user(test::TestRequest::post().uri("/api/v1/vendors/signup"), owner)
        .set_json(signup_body("Bay Honey"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let business_id = id_of(&body, "/data/business/id");

    let req = as_user(
        test::TestRequest::post().uri(&format!("/api/v1/businesses/{business_id}/invites")),
        owner,
    )
    .set_json(json!({}))
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let req = as_user(
        test::TestRequest::post().uri(&format!("/api/v1/businesses/{business_id}/invites")),
        joiner,
    )
    .set_json(json!({}))
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = as_user(test::TestRequest::post().uri("/api/v1/invites/redeem"), joiner)
        .set_json(json!({ "code": code }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(id_of(&body, "/data/business_id"), business_id);
    assert_eq!(body["data"]["member"]["role"], "member");
    assert_eq!(body["data"]["vendor"]["status"], "approved");

    let check = |user_id: Uuid| {
        test::TestRequest::post()
            .uri("/api/v1/functions/check_business_access")
            .set_json(json!({ "user_id": user_id, "business_id": business_id }))
            .to_request()
    };

    let body: Value = test::call_and_read_body_json(&app, check(owner)).await;
    assert_eq!(body["data"], json!({ "has_access": true, "role": "owner" }));

    let body: Value = test::call_and_read_body_json(&app, check(joiner)).await;
    assert_eq!(body["data"], json!({ "has_access": true, "role": "member" }));

    let body: Value = test::call_and_read_body_json(&app, check(Uuid::new_v4())).await;
    assert_eq!(body["data"], json!({ "has_access": false }));
}

#[actix_rt::test]
async fn redeeming_a_code_for_your_own_team_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);
    let admin = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let joiner = Uuid::new_v4();
    store.set_profile_role(admin, UserRole::Admin).await.unwrap();

    let req = as_user(test::TestRequest::post().uri("/api/v1/vendors/signup"), owner)
        .set_json(signup_body("Bay Honey"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let business_id = id_of(&body, "/data/business/id");

    let req = as_user(
        test::TestRequest::put().uri(&format!("/api/v1/admin/vendors/{owner}/status")),
        admin,
    )
    .set_json(json!({ "status": "rejected" }))
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = as_user(
        test::TestRequest::post().uri(&format!("/api/v1/businesses/{business_id}/invites")),
        owner,
    )
    .set_json(json!({}))
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let redeem = |user_id: Uuid| {
        as_user(test::TestRequest::post().uri("/api/v1/invites/redeem"), user_id)
            .set_json(json!({ "code": code }))
            .to_request()
    };

    let body: Value = test::call_and_read_body_json(&app, redeem(owner)).await;
    assert_eq!(body["data"]["already_member"], true);
    assert!(body["data"].get("member").is_none());
    assert_eq!(body["data"]["vendor"]["status"], "rejected");
    assert_eq!(store.row_counts().await.members, 0);

    let body: Value = test::call_and_read_body_json(&app, redeem(joiner)).await;
    assert_eq!(body["data"]["already_member"], false);
    let body: Value = test::call_and_read_body_json(&app, redeem(joiner)).await;
    assert_eq!(body["data"]["already_member"], true);
    assert_eq!(body["data"]["member"]["role"], "member");
    assert_eq!(store.row_counts().await.members, 1);

    let vendor = store.get_vendor(owner).await.unwrap().unwrap();
    assert_eq!(vendor.status.to_string(), "rejected");
}

#[actix_rt::test]
async fn create_business_function_is_idempotent_per_creator() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);
    let user = Uuid::new_v4();

    let call = |name: &str| {
        test::TestRequest::post()
            .uri("/api/v1/functions/create_business_function")
            .set_json(json!({ "name": name, "description": null, "user_id": user }))
            .to_request()
    };

    let resp = test::call_service(&app, call("Bay Honey")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first: Value = test::read_body_json(resp).await;
    assert_eq!(first["data"]["existing"], false);

    let resp = test::call_service(&app, call("Bay Honey Two")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let second: Value = test::read_body_json(resp).await;
    assert_eq!(second["data"]["existing"], true);
    assert_eq!(first["data"]["id"], second["data"]["id"]);
    assert_eq!(store.row_counts().await.businesses, 1);
}

#[actix_rt::test]
async fn business_search_needs_three_characters() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let req = as_user(test::TestRequest::post().uri("/api/v1/businesses"), Uuid::new_v4())
        .set_json(json!({ "name": "Bay Honey" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/v1/businesses/search?q=ba")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/businesses/search?q=honey")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["name"], "Bay Honey");
}

#[actix_rt::test]
async fn geocoder_without_key_is_unavailable() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let req = test::TestRequest::get()
        .uri("/api/v1/geocode/search?q=Lake%20Merritt")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}
