//! Integration tests for pdffill-api

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use http_body_util::BodyExt;
use pdffill::fixtures::{FixtureField, FormFixture, FIXTURE_USER_PASSWORD};
use pdffill_api::{app, ErrorResponse};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::util::ServiceExt;

const BOUNDARY: &str = "----pdffillBoundary7MA4YWxkTrZu0gW";

enum Part<'a> {
    File(&'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

/// Helper function to create a multipart request
fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File(name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"form.pdf\"\r\n\
                         Content-Type: application/pdf\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .uri(uri)
        .method("POST")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn sample_form() -> Vec<u8> {
    FormFixture::new()
        .field(FixtureField::text("name").rect([50.0, 700.0, 250.0, 720.0]))
        .field(FixtureField::checkbox("agree"))
        .to_bytes()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn error_body(response: axum::response::Response) -> ErrorResponse {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn fields_of(pdf: &[u8]) -> Value {
    let response = app()
        .oneshot(multipart_request("/api/fields", &[Part::File("pdf", pdf)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Serve `pdf` under `/form.pdf` and a 404 elsewhere on an ephemeral port
async fn spawn_upstream(pdf: Vec<u8>) -> String {
    let upstream = Router::new().route("/form.pdf", get(move || async move { pdf }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });
    format!("http://{address}")
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "pdffill API");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_fields_endpoint_describes_fields() {
    let json = fields_of(&sample_form()).await;

    assert_eq!(
        json[0],
        json!({
            "name": "name",
            "type": "/Tx",
            "value": null,
            "options": null,
            "page": 1,
            "rect": [50.0, 700.0, 250.0, 720.0],
            "readOnly": false,
            "required": false,
        })
    );
    assert_eq!(json[1]["name"], "agree");
    assert_eq!(json[1]["type"], "/Btn");
    assert_eq!(json[1]["value"], "Off");
}

#[tokio::test]
async fn test_fields_endpoint_without_form() {
    let pdf = FormFixture::new().without_acro_form().to_bytes();
    assert_eq!(fields_of(&pdf).await, json!([]));
}

#[tokio::test]
async fn test_fields_endpoint_requires_source() {
    let response = app()
        .oneshot(multipart_request("/api/fields", &[Part::Text("other", "x")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await.error, "bad_request");
}

#[tokio::test]
async fn test_fields_endpoint_rejects_non_pdf() {
    let response = app()
        .oneshot(multipart_request(
            "/api/fields",
            &[Part::File("pdf", b"This is not a PDF file")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = error_body(response).await;
    assert_eq!(error.error, "bad_request");
    assert!(error.message.contains("not a PDF"));
}

#[tokio::test]
async fn test_fields_endpoint_corrupted_pdf() {
    let response = app()
        .oneshot(multipart_request(
            "/api/fields",
            &[Part::File("pdf", b"%PDF-1.7\ngarbage without xref")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_body(response).await.error, "open_failed");
}

#[tokio::test]
async fn test_fields_endpoint_encrypted_without_password() {
    let pdf = FormFixture::new()
        .field(FixtureField::text("a"))
        .encrypted()
        .to_bytes();
    let response = app()
        .oneshot(multipart_request("/api/fields", &[Part::File("pdf", &pdf)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_body(response).await.error, "open_failed");
}

#[tokio::test]
async fn test_fields_endpoint_encrypted_with_password() {
    let pdf = FormFixture::new()
        .field(FixtureField::text("applicant").value("Jane"))
        .encrypted()
        .to_bytes();
    let response = app()
        .oneshot(multipart_request(
            "/api/fields",
            &[
                Part::File("pdf", &pdf),
                Part::Text("password", FIXTURE_USER_PASSWORD),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json[0]["name"], "applicant");
    assert_eq!(json[0]["value"], "Jane");
}

#[tokio::test]
async fn test_fields_endpoint_encrypted_with_wrong_password() {
    let pdf = FormFixture::new()
        .field(FixtureField::text("a"))
        .encrypted()
        .to_bytes();
    let response = app()
        .oneshot(multipart_request(
            "/api/fields",
            &[Part::File("pdf", &pdf), Part::Text("password", "wrong")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_body(response).await.error, "open_failed");
}

#[tokio::test]
async fn test_non_multipart_body_is_rejected() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/fields")
                .method("POST")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await.error, "bad_request");
}

#[tokio::test]
async fn test_fill_endpoint_without_flatten() {
    let pdf = sample_form();
    let response = app()
        .oneshot(multipart_request(
            "/api/fill",
            &[
                Part::File("pdf", &pdf),
                Part::Text("fields", r#"{"name": "Jane Doe", "agree": "true", "missing": "x"}"#),
                Part::Text("flatten", "false"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"filled.pdf\""
    );

    let filled = body_bytes(response).await;
    assert!(filled.starts_with(b"%PDF"));

    let json = fields_of(&filled).await;
    assert_eq!(json[0]["value"], "Jane Doe");
    assert_eq!(json[1]["value"], "Yes");
}

#[tokio::test]
async fn test_fill_endpoint_flattens_by_default() {
    let pdf = sample_form();
    let response = app()
        .oneshot(multipart_request(
            "/api/fill",
            &[
                Part::File("pdf", &pdf),
                Part::Text("fields", r#"{"name": "Jane"}"#),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let filled = body_bytes(response).await;
    assert_eq!(fields_of(&filled).await, json!([]));
}

#[tokio::test]
async fn test_fill_endpoint_validation_errors() {
    let pdf = sample_form();
    let cases: Vec<Vec<Part>> = vec![
        vec![Part::File("pdf", &pdf)],
        vec![Part::File("pdf", &pdf), Part::Text("fields", "  ")],
        vec![Part::File("pdf", &pdf), Part::Text("fields", "{not json")],
        vec![Part::File("pdf", &pdf), Part::Text("fields", r#"["a"]"#)],
        vec![
            Part::File("pdf", &pdf),
            Part::Text("fields", r#"{"name": "x"}"#),
            Part::Text("flatten", "sometimes"),
        ],
        vec![Part::Text("fields", r#"{"name": "x"}"#)],
    ];

    for parts in cases {
        let response = app()
            .oneshot(multipart_request("/api/fill", &parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_body(response).await.error, "bad_request");
    }
}

#[tokio::test]
async fn test_fields_endpoint_from_url() {
    let base = spawn_upstream(sample_form()).await;
    let url = format!("{base}/form.pdf");

    let response = app()
        .oneshot(multipart_request(
            "/api/fields",
            &[
                Part::File("pdf", b"ignored because the URL wins"),
                Part::Text("pdfUrl", &url),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_download_failure_is_bad_gateway() {
    let base = spawn_upstream(sample_form()).await;
    let url = format!("{base}/missing.pdf");

    let response = app()
        .oneshot(multipart_request("/api/fields", &[Part::Text("pdfUrl", &url)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error = error_body(response).await;
    assert_eq!(error.error, "download_failed");
    assert!(error.message.contains("404"));
}
