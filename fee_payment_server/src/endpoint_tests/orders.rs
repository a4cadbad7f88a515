use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::{signed, TestServer, SHIPPER, TRUCKER};

#[actix_web::test]
async fn contract_registration_quotes_the_fee() {
    let server = TestServer::new().await;
    let contract = server.register_contract("bid_100", 1_000_000).await;
    assert_eq!(contract["platform_fee"], 50_000);
    assert_eq!(contract["platform_fee_payer_id"], TRUCKER);
    assert_eq!(contract["reused"], false);

    let body = json!({
        "bid_id": "bid_100",
        "listing_type": "cargo",
        "listing_owner_id": SHIPPER,
        "bidder_id": TRUCKER,
        "agreed_price": 1_000_000,
    });
    let req = signed(TestRequest::post().uri("/api/contracts"), "bidding_service", "service").set_json(body);
    let (status, again) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["contract_id"], contract["contract_id"]);
    assert_eq!(again["reused"], true);

    let body = json!({
        "bid_id": "bid_101",
        "listing_type": "cargo",
        "listing_owner_id": SHIPPER,
        "bidder_id": SHIPPER,
        "agreed_price": 1_000_000,
    });
    let req = signed(TestRequest::post().uri("/api/contracts"), "bidding_service", "service").set_json(body);
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn payer_opens_and_reads_an_order() {
    let server = TestServer::new().await;
    server.register_contract("bid_200", 1_000_000).await;
    let body = json!({ "bid_id": "bid_200", "idempotency_key": "retry-me" });

    let req = signed(TestRequest::post().uri("/api/orders"), TRUCKER, "user").set_json(body.clone());
    let (status, order) = server.send_json(req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["amount"], 50_000);
    assert_eq!(order["reused"], false);
    let order_id = order["order_id"].as_str().unwrap().to_string();

    let req = signed(TestRequest::post().uri("/api/orders"), TRUCKER, "user").set_json(body);
    let (status, again) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["order_id"], order_id.as_str());
    assert_eq!(again["reused"], true);

    let req = signed(TestRequest::get().uri(&format!("/api/orders/{order_id}")), TRUCKER, "user");
    let (status, fetched) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "pending");
    assert_eq!(fetched["payer_id"], TRUCKER);

    let req = signed(TestRequest::get().uri("/api/orders/pending"), TRUCKER, "user");
    let (status, pending) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["order_id"], order_id.as_str());
}

#[actix_web::test]
async fn orders_belong_to_the_fee_payer() {
    let server = TestServer::new().await;
    server.register_contract("bid_300", 1_000_000).await;
    let order_id = server.open_order("bid_300").await;

    let req = signed(TestRequest::get().uri(&format!("/api/orders/{order_id}")), SHIPPER, "user");
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let body = json!({ "bid_id": "bid_300", "idempotency_key": "shipper-key" });
    let req = signed(TestRequest::post().uri("/api/orders"), SHIPPER, "user").set_json(body);
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let body = json!({ "bid_id": "bid_missing", "idempotency_key": "k" });
    let req = signed(TestRequest::post().uri("/api/orders"), TRUCKER, "user").set_json(body);
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = signed(TestRequest::get().uri("/api/orders/ord_nope"), TRUCKER, "user");
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("ord_nope"), "{body}");
}
