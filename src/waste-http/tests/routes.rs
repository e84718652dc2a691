use std::io::Cursor;

use hyper::header::{
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD,
    CONTENT_LENGTH, CONTENT_TYPE, ORIGIN,
};
use hyper::{Body, Method, Request, Response, StatusCode};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use serde_json::{json, Value};
use tower::ServiceExt;
use waste_http::{app, AppState, Settings};
use waste_serve::{ClassifierError, ClassifierOptions, ImageTensor, InferenceModel, WasteClassifier};

const BOUNDARY: &str = "waste-test-boundary";

/// Bright images score as `Kardus`, dark ones as `Baterai`.
struct BrightnessModel;

impl InferenceModel for BrightnessModel {
    fn name(&self) -> &str {
        "brightness"
    }

    fn predict(&self, input: &ImageTensor) -> waste_serve::Result<Vec<f32>> {
        let values = input.as_slice();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        Ok(vec![mean, 1.0 - mean])
    }

    fn output_shape(&self) -> Option<Vec<Option<u64>>> {
        Some(vec![None, Some(2)])
    }

    fn parameter_count(&self) -> Option<u64> {
        Some(1234)
    }

    fn class_names(&self) -> Option<Vec<String>> {
        Some(vec!["Kardus".to_owned(), "Baterai".to_owned()])
    }
}

struct FailingModel;

impl InferenceModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn predict(&self, _input: &ImageTensor) -> waste_serve::Result<Vec<f32>> {
        Err(ClassifierError::Inference("out of memory".to_owned()))
    }

    fn output_shape(&self) -> Option<Vec<Option<u64>>> {
        Some(vec![None, Some(3)])
    }
}

struct PanickingModel;

impl InferenceModel for PanickingModel {
    fn name(&self) -> &str {
        "panicking"
    }

    fn predict(&self, _input: &ImageTensor) -> waste_serve::Result<Vec<f32>> {
        panic!("runtime aborted");
    }
}

fn state_with(model: Box<dyn InferenceModel>, extra_args: &[&str]) -> AppState {
    let mut args = vec!["waste-http", "--cors-origins", "http://localhost:3000"];
    args.extend_from_slice(extra_args);
    let settings = Settings::from_args_iter(args);
    let classifier = WasteClassifier::with_model(model, ClassifierOptions::square(32));
    AppState::new(classifier, settings)
}

fn state() -> AppState {
    state_with(Box::new(BrightnessModel), &[])
}

fn gray_png(level: u8) -> Vec<u8> {
    let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 25, Luma([level])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// One multipart part; `file_name: None` leaves the filename parameter out.
fn part(name: &str, file_name: Option<&str>, content: &[u8]) -> Vec<u8> {
    let disposition = match file_name {
        Some(file_name) => format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/png\r\n",
            name, file_name
        ),
        None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", name),
    };

    let mut bytes = format!("--{}\r\n{}\r\n", BOUNDARY, disposition).into_bytes();
    bytes.extend_from_slice(content);
    bytes.extend_from_slice(b"\r\n");
    bytes
}

fn multipart_body(parts: &[Vec<u8>]) -> Vec<u8> {
    let mut body: Vec<u8> = parts.concat();
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Multipart POST without a declared length, as a chunked upload arrives.
fn streamed_multipart_request(uri: &str, parts: &[Vec<u8>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn multipart_request(uri: &str, parts: &[Vec<u8>]) -> Request<Body> {
    let mut req = streamed_multipart_request(uri, parts);
    let length = hyper::body::HttpBody::size_hint(req.body())
        .exact()
        .unwrap_or_default();
    req.headers_mut().insert(CONTENT_LENGTH, length.into());
    req
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(state: &AppState, req: Request<Body>) -> Response<Body> {
    app(state.clone()).oneshot(req).await.unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_static() {
    let response = send(&state_with(Box::new(FailingModel), &[]), get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "status": "healthy",
            "service": "ML Classification Service",
            "version": "1.0.0"
        })
    );
}

#[tokio::test]
async fn api_health_reports_time() {
    let response = send(&state(), get("/api/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["time"].is_string());
}

#[tokio::test]
async fn classify_bright_image() {
    let req = multipart_request(
        "/api/classify",
        &[part("image", Some("box.png"), &gray_png(255))],
    );
    let response = send(&state(), req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );

    assert_eq!(
        json_body(response).await,
        json!({
            "success": true,
            "data": {
                "subcategory": "Kardus",
                "main_category": "Inorganic",
                "confidence": 1.0
            }
        })
    );
}

#[tokio::test]
async fn classify_dark_image_is_hazardous() {
    let req = multipart_request(
        "/api/classify?lang=id",
        &[part("image", Some("cell.png"), &gray_png(0))],
    );
    let body = json_body(send(&state(), req).await).await;

    assert_eq!(body["data"]["subcategory"], "Baterai");
    assert_eq!(body["data"]["main_category"], "Hazardous");
}

#[tokio::test]
async fn image_field_is_found_among_others() {
    let req = multipart_request(
        "/api/classify",
        &[
            part("note", None, b"kitchen bin"),
            part("image", Some("box.png"), &gray_png(250)),
        ],
    );
    let response = send(&state(), req).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_image_field() {
    let req = multipart_request(
        "/api/classify",
        &[part("photo", Some("box.png"), &gray_png(255))],
    );
    let response = send(&state(), req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "error": "No image file provided"})
    );
}

#[tokio::test]
async fn non_multipart_request_has_no_image() {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/classify")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = send(&state(), req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No image file provided");
}

#[tokio::test]
async fn empty_filename() {
    let req = multipart_request("/api/classify", &[part("image", Some(""), &gray_png(255))]);
    let response = send(&state(), req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "error": "No selected file"})
    );
}

#[tokio::test]
async fn image_part_without_filename_is_not_a_file() {
    let req = multipart_request("/api/classify", &[part("image", None, &gray_png(255))]);
    let response = send(&state(), req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "error": "No image file provided"})
    );
}

#[tokio::test]
async fn empty_content() {
    let req = multipart_request("/api/classify", &[part("image", Some("empty.png"), b"")]);
    let response = send(&state(), req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Empty image content");
}

#[tokio::test]
async fn unsupported_language_behaves_like_english() {
    let state = state();
    let image = gray_png(180);

    let english = send(
        &state,
        multipart_request("/api/classify?lang=en", &[part("image", Some("a.png"), &image)]),
    )
    .await;
    let french = send(
        &state,
        multipart_request("/api/classify?lang=fr", &[part("image", Some("a.png"), &image)]),
    )
    .await;

    assert_eq!(english.status(), french.status());
    assert_eq!(json_body(english).await, json_body(french).await);
}

#[tokio::test]
async fn undecodable_image_is_a_bad_request() {
    let req = multipart_request(
        "/api/classify",
        &[part("image", Some("notes.png"), b"plain text, not pixels")],
    );
    let response = send(&state(), req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Error preprocessing image:"));
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn inference_error_is_passed_through() {
    let state = state_with(Box::new(FailingModel), &[]);
    let req = multipart_request("/api/classify", &[part("image", Some("a.png"), &gray_png(9))]);
    let response = send(&state, req).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "error": "Inference failed: out of memory"})
    );
}

#[tokio::test]
async fn inference_panic_is_an_internal_error() {
    let state = state_with(Box::new(PanickingModel), &[]);
    let req = multipart_request("/api/classify", &[part("image", Some("a.png"), &gray_png(9))]);
    let response = send(&state, req).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let state = state_with(Box::new(BrightnessModel), &["--max-content-length", "64"]);
    let req = multipart_request(
        "/api/classify",
        &[part("image", Some("big.png"), &gray_png(255))],
    );
    let response = send(&state, req).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["success"], false);
}

#[tokio::test]
async fn oversized_upload_without_length_is_rejected() {
    let state = state_with(Box::new(BrightnessModel), &["--max-content-length", "64"]);
    let req = streamed_multipart_request(
        "/api/classify",
        &[part("image", Some("big.png"), &gray_png(255))],
    );
    assert!(req.headers().get(CONTENT_LENGTH).is_none());

    let response = send(&state, req).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "error": "File too large (limit 64 bytes)"})
    );
}

#[tokio::test]
async fn model_info_lists_categories() {
    let response = send(&state(), get("/api/model-info")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["model_info"]["model_file"], "brightness");
    assert_eq!(body["model_info"]["using_fallback"], false);
    assert_eq!(body["model_info"]["label_source"], "model_attribute");
    assert_eq!(body["model_info"]["target_size"], json!([32, 32]));
    assert_eq!(body["model_info"]["output_shape"], json!([null, 2]));
    assert_eq!(body["model_info"]["total_parameters"], 1234);
    assert_eq!(body["model_info"]["num_classes"], 2);
    assert_eq!(
        body["model_info"]["model_type"],
        "2-class waste classification model"
    );
    assert_eq!(body["categories"]["total"], 2);
    assert_eq!(body["categories"]["list"], json!(["Kardus", "Baterai"]));
    assert_eq!(
        body["categories"]["details"][1],
        json!({
            "index": 1,
            "name": "Baterai",
            "name_id": "Baterai",
            "type": "Hazardous",
            "disposal": "Limbah berbahaya"
        })
    );
}

#[tokio::test]
async fn model_info_with_generic_labels() {
    let response = send(&state_with(Box::new(FailingModel), &[]), get("/api/model-info")).await;
    let body = json_body(response).await;

    assert_eq!(body["model_info"]["using_fallback"], true);
    assert_eq!(body["model_info"]["total_parameters"], "Unknown");
    assert_eq!(
        body["categories"]["list"],
        json!(["class_0", "class_1", "class_2"])
    );
    assert_eq!(
        body["categories"]["details"][0],
        json!({
            "index": 0,
            "name": "class_0",
            "name_id": "Class_0",
            "type": "Unknown",
            "disposal": "Cek manual"
        })
    );
}

#[tokio::test]
async fn unknown_path_and_wrong_method() {
    let state = state();

    let response = send(&state, get("/api/nothing")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "error": "Not found"})
    );

    let response = send(&state, get("/api/classify")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn cors_headers_for_allowed_origin_only() {
    let state = state();

    let allowed = Request::builder()
        .uri("/health")
        .header(ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = send(&state, allowed).await;
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );

    let foreign = Request::builder()
        .uri("/health")
        .header(ORIGIN, "http://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let response = send(&state, foreign).await;
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn preflight_is_answered() {
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/classify")
        .header(ORIGIN, "http://localhost:3000")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = send(&state(), req).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_METHODS));
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn wildcard_origin_allows_anyone() {
    let settings = Settings::from_args_iter(vec!["waste-http", "--cors-origins", "*"]);
    let classifier = WasteClassifier::with_model(Box::new(BrightnessModel), ClassifierOptions::square(32));
    let state = AppState::new(classifier, settings);
    let req = Request::builder()
        .uri("/health")
        .header(ORIGIN, "http://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let response = send(&state, req).await;

    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}
