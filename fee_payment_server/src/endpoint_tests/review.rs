use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use super::helpers::{receipt, signed, TestServer, ADMIN, SHIPPER, TRUCKER};

const EXTRACTOR: &str = "ocr_worker";

fn extraction(submission_id: &str, user_id: &str, roles: &str, result: Value) -> TestRequest {
    let uri = format!("/api/submissions/{submission_id}/extraction");
    signed(TestRequest::post().uri(&uri), user_id, roles).set_json(result)
}

#[actix_web::test]
async fn clean_receipt_activates_the_contract() {
    let server = TestServer::new().await;
    server.register_contract("bid_400", 1_000_000).await;
    let order_id = server.open_order("bid_400").await;
    let submission_id = server.submit_evidence(&order_id, "uploads/bid_400.png").await;

    let req = extraction(&submission_id, EXTRACTOR, "extractor", receipt(50_000, "GC-4001-7788"));
    let (status, result) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK, "{result}");
    assert_eq!(result["route"], "auto_approve");
    assert_eq!(result["resolved"], true);
    assert_eq!(result["fraud_score"], 0);
    assert_eq!(result["submission"]["status"], "approved");

    let req = signed(TestRequest::get().uri(&format!("/api/orders/{order_id}")), TRUCKER, "user");
    let (_, order) = server.send_json(req).await;
    assert_eq!(order["status"], "verified");
    assert_eq!(order["verified_submission_id"], submission_id.as_str());

    // Results arriving twice are refused
    let req = extraction(&submission_id, EXTRACTOR, "extractor", receipt(50_000, "GC-4001-7788"));
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn payers_cannot_deliver_their_own_extraction() {
    let server = TestServer::new().await;
    server.register_contract("bid_450", 1_000_000).await;
    let order_id = server.open_order("bid_450").await;
    let submission_id = server.submit_evidence(&order_id, "uploads/bid_450.png").await;
    let req = extraction(&submission_id, TRUCKER, "user", receipt(50_000, "GC-4501-0001"));
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn admin_works_through_the_review_queue() {
    let server = TestServer::new().await;
    server.register_contract("bid_500", 1_000_000).await;
    let order_id = server.open_order("bid_500").await;
    let submission_id = server.submit_evidence(&order_id, "uploads/bid_500.png").await;

    let req = extraction(&submission_id, EXTRACTOR, "extractor", receipt(45_000, "GC-5001-1234"));
    let (status, result) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK, "{result}");
    assert_eq!(result["route"], "manual_review");
    assert_eq!(result["resolved"], false);
    assert_eq!(result["fraud_flags"][0]["rule"], "AMOUNT_MISMATCH");

    let req = signed(TestRequest::get().uri("/api/admin/review_queue"), ADMIN, "admin");
    let (status, queue) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);
    assert_eq!(queue[0]["submission_id"], submission_id.as_str());

    let resolve_uri = format!("/api/admin/submissions/{submission_id}/resolve");
    let req = signed(TestRequest::post().uri(&resolve_uri), ADMIN, "admin").set_json(json!({ "decision": "reject" }));
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("reason"), "{body}");

    let req = signed(TestRequest::post().uri(&resolve_uri), ADMIN, "admin")
        .set_json(json!({ "decision": "reject", "reason": "amount_mismatch", "notes": "short by 50 pesos" }));
    let (status, resolved) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK, "{resolved}");
    assert_eq!(resolved["success"], true);
    assert_eq!(resolved["submission"]["status"], "rejected");
    assert_eq!(resolved["submission"]["rejection_reason"], "amount_mismatch");
    assert_eq!(resolved["order"]["status"], "rejected");

    let req = signed(TestRequest::post().uri(&resolve_uri), ADMIN, "admin").set_json(json!({ "decision": "approve" }));
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = signed(TestRequest::get().uri("/api/admin/review_queue"), ADMIN, "admin");
    let (_, queue) = server.send_json(req).await;
    assert!(queue.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn admin_runs_billing_on_demand() {
    let server = TestServer::new().await;
    let started = Utc::now() - Duration::days(4);
    let body = json!({
        "bid_id": "bid_600",
        "listing_type": "truck",
        "listing_owner_id": TRUCKER,
        "bidder_id": SHIPPER,
        "agreed_price": 200_000,
        "billing_started_at": started,
    });
    let req = signed(TestRequest::post().uri("/api/contracts"), "bidding_service", "service").set_json(body);
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::CREATED);

    let req = signed(TestRequest::post().uri("/api/admin/billing/run"), ADMIN, "admin");
    let (status, report) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["examined"], 1);
    assert_eq!(report["suspended"], 1);

    // Billing is idempotent for a given moment
    let req = signed(TestRequest::post().uri("/api/admin/billing/run"), ADMIN, "admin")
        .set_json(json!({ "now": Utc::now() + Duration::minutes(1) }));
    let (status, report) = server.send_json(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["suspended"], 0);
}
