//! Rentals, uploads and messages through the full router.

mod common;

use axum::http::StatusCode;
use common::{app, app_with, body_bytes, body_json, get, json_request, multipart_request};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0, 0, 0];

const EMPTY: &[u8] = &[];

const FIELDS: &[(&str, &str)] = &[
    ("name", "Sea view loft"),
    ("surface", "42"),
    ("price", "950"),
    ("description", "Close to the beach"),
];

fn upload_count(app: &common::TestApp) -> usize {
    std::fs::read_dir(app.uploads.path()).unwrap().count()
}

#[tokio::test]
async fn create_list_and_serve_picture() {
    let app = app();
    let token = app.register("owner@example.com", "Secret123!").await;

    let resp = app
        .send(multipart_request(
            "POST",
            "/rentals",
            Some(&token),
            FIELDS,
            Some(("flat.png", "image/png", PNG)),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["message"], "Rental created !");

    let resp = app.send(get("/rentals", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let list = body_json(resp).await;
    let rentals = list["rentals"].as_array().unwrap();
    assert_eq!(rentals.len(), 1);
    let rental = &rentals[0];
    assert_eq!(rental["name"], "Sea view loft");
    assert_eq!(rental["surface"], 42.0);

    let picture = rental["picture"].as_str().unwrap();
    let path = picture.strip_prefix("http://localhost:3001").unwrap();
    assert!(path.starts_with("/uploads/"));
    assert!(path.ends_with(".png"));
    assert!(!path.contains("flat"));

    // uploads are public
    let resp = app.send(get(path, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, PNG);

    let id = rental["id"].as_i64().unwrap();
    let resp = app.send(get(&format!("/rentals/{id}"), Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["owner_id"], rental["owner_id"]);
}

#[tokio::test]
async fn rejected_uploads_are_bad_request() {
    let app = app();
    let token = app.register("owner@example.com", "Secret123!").await;

    let cases: &[(Option<common::FilePart<'_>>, &str)] = &[
        (None, "No file was provided"),
        (Some(("flat.png", "image/png", EMPTY)), "empty"),
        (Some(("../../etc/flat.png", "image/png", PNG)), "invalid characters"),
        (Some(("flat.exe", "image/png", PNG)), "Unsupported file format"),
        (Some(("flat.png", "text/html", PNG)), "Unsupported file type"),
    ];

    for (picture, reason) in cases {
        let resp = app
            .send(multipart_request("POST", "/rentals", Some(&token), FIELDS, *picture))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{reason}");
        let body = body_json(resp).await;
        assert_eq!(body["error"], "invalid_upload");
        assert!(body["message"].as_str().unwrap().contains(reason), "{body}");
    }

    assert_eq!(upload_count(&app), 0);
}

#[tokio::test]
async fn oversized_upload_is_bad_request() {
    let app = app_with(|c| c.max_upload_bytes = 8);
    let token = app.register("owner@example.com", "Secret123!").await;

    let resp = app
        .send(multipart_request(
            "POST",
            "/rentals",
            Some(&token),
            FIELDS,
            Some(("flat.png", "image/png", PNG)),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json(resp).await["message"]
            .as_str()
            .unwrap()
            .contains("maximum allowed size")
    );
    assert_eq!(upload_count(&app), 0);
}

#[tokio::test]
async fn body_over_request_limit_reports_upload_ceiling() {
    let app = app();
    let token = app.register("owner@example.com", "Secret123!").await;

    let huge = vec![0u8; 11 * 1024 * 1024];
    let resp = app
        .send(multipart_request(
            "POST",
            "/rentals",
            Some(&token),
            FIELDS,
            Some(("flat.png", "image/png", huge.as_slice())),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "invalid_upload");
    assert_eq!(
        body["message"],
        "The file exceeds the maximum allowed size of 10485760 bytes."
    );
    assert_eq!(upload_count(&app), 0);
}

#[tokio::test]
async fn update_rental_fields() {
    let app = app();
    let token = app.register("owner@example.com", "Secret123!").await;
    app.send(multipart_request(
        "POST",
        "/rentals",
        Some(&token),
        FIELDS,
        Some(("flat.png", "image/png", PNG)),
    ))
    .await;

    let resp = app
        .send(multipart_request(
            "PUT",
            "/rentals/1",
            Some(&token),
            &[("price", "1100")],
            None,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["message"], "Rental updated !");

    let rental = body_json(app.send(get("/rentals/1", Some(&token))).await).await;
    assert_eq!(rental["price"], 1100.0);
    assert_eq!(rental["name"], "Sea view loft");

    let resp = app
        .send(multipart_request("PUT", "/rentals/1", Some(&token), &[], None))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .send(multipart_request(
            "PUT",
            "/rentals/42",
            Some(&token),
            &[("name", "Ghost")],
            None,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn messages_need_existing_rental() {
    let app = app();
    let token = app.register("guest@example.com", "Secret123!").await;
    app.send(multipart_request(
        "POST",
        "/rentals",
        Some(&token),
        FIELDS,
        Some(("flat.jpg", "image/jpeg", PNG)),
    ))
    .await;

    let resp = app
        .send(json_request(
            "POST",
            "/messages",
            Some(&token),
            serde_json::json!({ "rental_id": 1, "user_id": 1, "message": "Still available?" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["message"], "Message send with success");

    let resp = app
        .send(json_request(
            "POST",
            "/messages",
            Some(&token),
            serde_json::json!({ "rental_id": 9, "user_id": 1, "message": "Hello" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .send(json_request(
            "POST",
            "/messages",
            Some(&token),
            serde_json::json!({ "rental_id": 1, "user_id": 1, "message": "  " }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .send(json_request(
            "POST",
            "/messages",
            None,
            serde_json::json!({ "rental_id": 1, "user_id": 1, "message": "Hi" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
