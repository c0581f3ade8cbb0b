#![cfg(feature = "web")]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use data_explorer::app::{AppState, router};
use data_explorer::config::Config;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "XEXPLORERBOUNDARY";

fn app() -> Router {
    router(Arc::new(AppState::new(Config::default()).unwrap()))
}

fn multipart(file_name: &str, content_type: &str, bytes: &[u8]) -> Body {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, cookie, body.to_vec())
}

fn upload(file_name: &str, content_type: &str, bytes: &[u8], cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(multipart(file_name, content_type, bytes)).unwrap()
}

fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn time_value_csv() -> Vec<u8> {
    let mut csv = String::from("time,value\n");
    for i in 1..=10 {
        csv.push_str(&format!("{},{}\n", i, i * 2));
    }
    csv.into_bytes()
}

fn chart_request() -> Value {
    json!({
        "x_column": "time",
        "series": [{ "column": "value", "color": "#FF0000", "dash": "dash" }]
    })
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn test_health_and_index() {
    let app = app();

    let (status, _, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");

    let (status, _, body) = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("Data Explorer"));
    assert!(page.contains("value=\"step25\""));
    assert!(page.contains("\"longdashdot\""));

    // The grid color picker is toggled by the grid checkbox.
    assert!(page.contains("id=\"grid-color-row\""));
    assert!(page.contains("el(\"grid-color-row\").classList.toggle(\"hidden\", !el(\"show-grid\").checked)"));
    // Preview cells are shown as received, only statistics are rounded.
    assert!(page.contains("inspection.preview.map((row, i) => [i, ...row]), rawCell)"));
}

#[tokio::test]
async fn test_preview_keeps_full_precision() {
    let app = app();
    let csv = b"x,y\n1,0.123456789\n2,2.5\n";

    let (status, _, body) = send(&app, upload("p.csv", "text/csv", csv, None)).await;
    assert_eq!(status, StatusCode::OK);
    let preview = &json_body(&body)["inspection"]["preview"];
    assert_eq!(preview[0][1], 0.123456789);
    assert_eq!(preview[1][1], 2.5);
}

#[tokio::test]
async fn test_cached_bytes_with_unsupported_type_are_rejected() {
    let app = app();
    let csv = time_value_csv();

    let (status, cookie, _) = send(&app, upload("a.csv", "text/csv", &csv, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&app, upload("a.json", "application/json", &csv, cookie.as_deref())).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json_body(&body)["status"], "error");
}

#[tokio::test]
async fn test_chart_before_upload_is_idle() {
    let app = app();

    let (status, cookie, body) = send(&app, post_json("/api/chart", chart_request(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.unwrap().starts_with("session="));
    assert_eq!(json_body(&body)["state"], "no_table");

    let (status, _, _) = send(&app, post_json("/api/chart.svg", chart_request(), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_csv_upload_then_chart() {
    let app = app();

    let (status, cookie, body) = send(&app, upload("series.csv", "text/csv", &time_value_csv(), None)).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();

    let upload = json_body(&body);
    assert_eq!(upload["state"], "table");
    assert_eq!(upload["file_name"], "series.csv");
    assert_eq!(upload["cached"], false);
    assert_eq!(upload["inspection"]["row_count"], 10);
    assert_eq!(upload["inspection"]["preview"].as_array().unwrap().len(), 5);
    assert_eq!(upload["inspection"]["stats"][1]["max"], 20.0);

    let (status, _, body) = send(&app, post_json("/api/chart", chart_request(), Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    let chart = json_body(&body);
    assert_eq!(chart["state"], "chart");
    assert_eq!(chart["figure"]["data"][0]["name"], "value");
    assert_eq!(chart["figure"]["data"][0]["line"]["color"], "#FF0000");
    assert_eq!(chart["figure"]["data"][0]["y"].as_array().unwrap().len(), 10);

    let no_series = json!({ "x_column": "time", "series": [] });
    let (_, _, body) = send(&app, post_json("/api/chart", no_series, Some(&cookie))).await;
    assert_eq!(json_body(&body)["state"], "no_series");

    let request = Request::post("/api/chart.svg")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &cookie)
        .body(Body::from(chart_request().to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
}

#[tokio::test]
async fn test_reupload_hits_cache() {
    let app = app();
    let csv = time_value_csv();

    let (_, cookie, _) = send(&app, upload("a.csv", "text/csv", &csv, None)).await;
    let (status, _, body) = send(&app, upload("a.csv", "text/csv", &csv, cookie.as_deref())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["cached"], true);
}

#[tokio::test]
async fn test_upload_errors() {
    let app = app();

    let (status, _, body) = send(&app, upload("notes.txt", "text/plain", b"hello", None)).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let error = json_body(&body);
    assert_eq!(error["status"], "error");
    assert!(error["message"].as_str().unwrap().contains("text/plain"));

    let (status, _, body) = send(&app, upload("bad.csv", "text/csv", b"a,b\n1,2,3\n", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["status"], "error");
}

#[tokio::test]
async fn test_unknown_column_and_chart_type() {
    let app = app();
    let (_, cookie, _) = send(&app, upload("series.csv", "text/csv", &time_value_csv(), None)).await;
    let cookie = cookie.unwrap();

    let unknown = json!({ "x_column": "nope", "series": [{ "column": "value" }] });
    let (status, _, body) = send(&app, post_json("/api/chart", unknown, Some(&cookie))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["message"], "Unknown column: nope");

    let bars = json!({ "chart_type": "bars", "x_column": "time", "series": [{ "column": "value" }] });
    let (status, _, body) = send(&app, post_json("/api/chart", bars, Some(&cookie))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["message"].as_str().unwrap().contains("not supported"));

    let bad_color = json!({ "x_column": "time", "series": [{ "column": "value", "color": "red" }] });
    let (status, _, body) = send(&app, post_json("/api/chart", bad_color, Some(&cookie))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["status"], "error");
}

#[tokio::test]
async fn test_workbook_upload_and_sheet_selection() {
    let mut book = rust_xlsxwriter::Workbook::new();
    let first = book.add_worksheet();
    first.set_name("Sales").unwrap();
    first.write_string(0, 0, "month").unwrap();
    first.write_number(1, 0, 1.0).unwrap();
    let second = book.add_worksheet();
    second.set_name("Costs").unwrap();
    second.write_string(0, 0, "item").unwrap();
    second.write_string(0, 1, "amount").unwrap();
    second.write_string(1, 0, "rent").unwrap();
    second.write_number(1, 1, 900.0).unwrap();
    let bytes = book.save_to_buffer().unwrap();

    let app = app();
    let (status, cookie, body) = send(
        &app,
        upload("book.xlsx", "application/octet-stream", &bytes, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();

    let upload = json_body(&body);
    assert_eq!(upload["sheets"], json!(["Sales", "Costs"]));
    assert_eq!(upload["selected_sheet"], "Sales");
    assert_eq!(upload["inspection"]["columns"][0]["name"], "month");

    let (status, _, body) = send(&app, post_json("/api/sheet", json!({ "name": "Costs" }), Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    let selected = json_body(&body);
    assert_eq!(selected["selected_sheet"], "Costs");
    assert_eq!(selected["inspection"]["columns"][1]["kind"], "numeric");

    let (status, _, body) = send(&app, post_json("/api/sheet", json!({ "name": "Nope" }), Some(&cookie))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["message"], "Unknown sheet: Nope");

    let request = Request::get("/api/table")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (_, _, body) = send(&app, request).await;
    assert_eq!(json_body(&body)["selected_sheet"], "Costs");
}

#[tokio::test]
async fn test_sheet_selection_without_workbook() {
    let app = app();
    let (status, _, body) = send(&app, post_json("/api/sheet", json!({ "name": "Sheet1" }), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["message"], "No workbook uploaded");
}
