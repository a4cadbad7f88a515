use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, App};
use fee_payment_engine::{events::EventProducers, test_utils::prepare_env::prepare_test_env, SqliteDatabase};
use fpe_common::Secret;
use log::debug;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::{
    config::ServerConfig,
    helpers::{calculate_signature, ROLES_HEADER, SIGNATURE_HEADER, USER_ID_HEADER},
    server::configure_app,
};

// DO NOT re-use this key anywhere.
pub const GATEWAY_SECRET: &str = "5e1f0a9e2c7d4b3a8f6e0d1c2b3a4f5e";
pub const SHIPPER: &str = "shipper_sam";
pub const TRUCKER: &str = "trucker_tom";
pub const ADMIN: &str = "admin_ana";

/// A migrated database in a temporary directory, and the configuration to serve it with.
pub struct TestServer {
    db: SqliteDatabase,
    config: ServerConfig,
    _dir: TempDir,
}

impl TestServer {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Could not create temp dir");
        let url = format!("sqlite://{}/fps_test.db", dir.path().display());
        let db = prepare_test_env(&url).await;
        let config = ServerConfig { gateway_secret: Secret::new(GATEWAY_SECRET.to_string()), ..Default::default() };
        Self { db, config, _dir: dir }
    }

    /// Sends `req` to a fresh app instance. Errors raised by middleware are rendered the same way actix would.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let app = App::new().configure(configure_app(&self.config, self.db.clone(), EventProducers::default()));
        let service = test::init_service(app).await;
        debug!("Making request");
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            Err(e) => {
                let res = e.error_response();
                let status = res.status();
                let body = res.into_body().try_into_bytes().unwrap_or_default();
                (status, String::from_utf8_lossy(&body).into_owned())
            },
        }
    }

    pub async fn send_json(&self, req: TestRequest) -> (StatusCode, Value) {
        let (status, body) = self.send(req).await;
        let value = serde_json::from_str(&body).unwrap_or_else(|_| panic!("Expected JSON, got {body}"));
        (status, value)
    }

    /// Registers a cargo contract between the test shipper and trucker. The trucker owes the fee.
    pub async fn register_contract(&self, bid_id: &str, agreed_price: i64) -> Value {
        let body = json!({
            "bid_id": bid_id,
            "listing_type": "cargo",
            "listing_owner_id": SHIPPER,
            "bidder_id": TRUCKER,
            "agreed_price": agreed_price,
        });
        let req = signed(TestRequest::post().uri("/api/contracts"), "bidding_service", "service").set_json(body);
        let (status, contract) = self.send_json(req).await;
        assert_eq!(status, StatusCode::CREATED, "{contract}");
        contract
    }

    /// Opens the fee order for `bid_id` as the trucker and returns its id.
    pub async fn open_order(&self, bid_id: &str) -> String {
        let body = json!({ "bid_id": bid_id, "idempotency_key": format!("key-{bid_id}") });
        let req = signed(TestRequest::post().uri("/api/orders"), TRUCKER, "user").set_json(body);
        let (status, order) = self.send_json(req).await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        order["order_id"].as_str().expect("order_id missing").to_string()
    }

    /// Submits evidence for `order_id` as the trucker and returns the submission id.
    pub async fn submit_evidence(&self, order_id: &str, evidence_ref: &str) -> String {
        let req = signed(TestRequest::post().uri(&format!("/api/orders/{order_id}/submissions")), TRUCKER, "user")
            .set_json(json!({ "evidence_ref": evidence_ref }));
        let (status, submission) = self.send_json(req).await;
        assert_eq!(status, StatusCode::CREATED, "{submission}");
        submission["submission_id"].as_str().expect("submission_id missing").to_string()
    }
}

/// Adds the identity headers the gateway would forward, signed with the test secret.
pub fn signed(req: TestRequest, user_id: &str, roles: &str) -> TestRequest {
    let signature = calculate_signature(GATEWAY_SECRET, user_id, roles);
    req.insert_header((USER_ID_HEADER, user_id))
        .insert_header((ROLES_HEADER, roles))
        .insert_header((SIGNATURE_HEADER, signature))
}

/// An extraction result for a receipt paying `amount` centavos to the platform. Each reference gets its own image.
pub fn receipt(amount: i64, reference: &str) -> Value {
    let image_hash = hex::encode(&Sha256::digest(reference.as_bytes())[..8]);
    json!({
        "status": "completed",
        "data": {
            "reference_number": reference,
            "amount": amount,
            "receiver_name": "TRUCKLINK PLATFORM SERVICES",
            "timestamp_text": chrono::Utc::now().to_rfc3339(),
            "confidence": 96,
        },
        "image": {
            "image_hash": image_hash,
            "width": 1080,
            "height": 2340,
            "has_exif_metadata": true,
        },
    })
}
