use actix_web::{http::StatusCode, test::TestRequest};

use super::helpers::{signed, TestServer, ADMIN, TRUCKER};
use crate::helpers::{ROLES_HEADER, SIGNATURE_HEADER, USER_ID_HEADER};

#[actix_web::test]
async fn health_needs_no_identity() {
    let server = TestServer::new().await;
    let (status, body) = server.send(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn requests_without_identity_are_refused() {
    let server = TestServer::new().await;
    let (status, body) = server.send(TestRequest::get().uri("/api/orders/pending")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("fps-user-id"), "{body}");
}

#[actix_web::test]
async fn forged_signatures_are_refused() {
    let server = TestServer::new().await;
    // Signed for a plain user, then promoted to admin on the way in
    let req = signed(TestRequest::get().uri("/api/admin/review_queue"), ADMIN, "user")
        .insert_header((ROLES_HEADER, "user,admin"));
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::get()
        .uri("/api/orders/pending")
        .insert_header((USER_ID_HEADER, TRUCKER))
        .insert_header((ROLES_HEADER, "user"))
        .insert_header((SIGNATURE_HEADER, "00ff"));
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("signature"), "{body}");
}

#[actix_web::test]
async fn unknown_roles_are_a_bad_request() {
    let server = TestServer::new().await;
    let req = signed(TestRequest::get().uri("/api/orders/pending"), TRUCKER, "user,superuser");
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("superuser"), "{body}");
}

#[actix_web::test]
async fn routes_check_roles() {
    let server = TestServer::new().await;
    let req = signed(TestRequest::get().uri("/api/admin/review_queue"), TRUCKER, "user");
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Requires admin"), "{body}");

    let req = signed(TestRequest::post().uri("/api/admin/billing/run"), TRUCKER, "user");
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Only the bidding flow registers contracts
    let req = signed(TestRequest::post().uri("/api/contracts"), ADMIN, "admin").set_json(serde_json::json!({}));
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = signed(TestRequest::get().uri("/api/admin/review_queue"), ADMIN, "admin");
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}
