use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use chrono::Local;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use waste_serve::labels::{self, DisplayDetails};
use waste_serve::{LabelSource, Prediction};

use crate::upload::{self, UploadError};
use crate::AppState;

const SERVICE_NAME: &str = "ML Classification Service";
const SERVICE_VERSION: &str = "1.0.0";

const KNOWN_PATHS: &[&str] = &["/health", "/api/health", "/api/classify", "/api/model-info"];

/// Failures that escape a handler; answered with a 500.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("{0}")]
    Http(#[from] hyper::http::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("Classification task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Response language requested through `?lang=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    Id,
}

impl Language {
    /// Pick `lang` from a query string; missing or unsupported values mean English.
    pub fn from_query(query: Option<&str>) -> Self {
        let requested = query.and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "lang")
                .map(|(_, value)| value.into_owned())
        });

        match requested.as_deref() {
            Some("id") => Language::Id,
            _ => Language::En,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::En => "en",
            Language::Id => "id",
        })
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
}

#[derive(Serialize)]
struct ClassifyBody<'a> {
    success: bool,
    data: &'a Prediction,
}

#[derive(Serialize)]
struct CategoryDetail<'a> {
    index: usize,
    name: &'a str,
    #[serde(flatten)]
    details: DisplayDetails,
}

#[derive(Serialize)]
struct ModelInfo<'a> {
    model_file: &'a str,
    using_fallback: bool,
    label_source: LabelSource,
    target_size: [u32; 2],
    output_shape: Option<Vec<Option<u64>>>,
    total_parameters: Value,
    num_classes: usize,
    model_type: String,
}

#[derive(Serialize)]
struct Categories<'a> {
    total: usize,
    list: &'a [String],
    details: Vec<CategoryDetail<'a>>,
}

#[derive(Serialize)]
struct ModelInfoBody<'a> {
    success: bool,
    model_info: ModelInfo<'a>,
    categories: Categories<'a>,
}

/// Entry point for every request.
///
/// Handler errors become `{success: false, error}` with a 500.
pub async fn handle(req: Request<Body>, state: AppState) -> Result<Response<Body>, Infallible> {
    let response = match route(req, &state).await {
        Ok(response) => response,
        Err(err) => {
            error!("Error processing request: {}", err);
            internal_error(&err.to_string())
        }
    };

    Ok(response)
}

async fn route(req: Request<Body>, state: &AppState) -> Result<Response<Body>, RouteError> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => health(),
        (&Method::GET, "/api/health") => api_health(),
        (&Method::POST, "/api/classify") => classify(req, state).await,
        (&Method::GET, "/api/model-info") => model_info(state),
        (_, path) if KNOWN_PATHS.contains(&path) => {
            failure(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        _ => failure(StatusCode::NOT_FOUND, "Not found"),
    }
}

fn health() -> Result<Response<Body>, RouteError> {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "service": SERVICE_NAME,
            "version": SERVICE_VERSION,
        }),
    )
}

fn api_health() -> Result<Response<Body>, RouteError> {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "time": Local::now().to_rfc3339(),
        }),
    )
}

async fn classify(req: Request<Body>, state: &AppState) -> Result<Response<Body>, RouteError> {
    let lang = Language::from_query(req.uri().query());

    let upload = match upload::read_image(req, state.settings.max_content_length).await {
        Ok(upload) => upload,
        Err(err) => return upload_failure(err),
    };

    info!(
        "Processing classification request: filename={}, lang={}",
        upload.file_name, lang
    );

    let classifier = Arc::clone(&state.classifier);
    let result = tokio::task::spawn_blocking(move || classifier.predict(&upload.bytes)).await?;

    match &result.prediction {
        Some(prediction) if result.success => {
            info!(
                "Classification successful: subcategory={}, main_category={}, confidence={:.2} ({} msec)",
                prediction.subcategory,
                prediction.main_category,
                prediction.confidence,
                prediction.timings.total()
            );
            json_response(
                StatusCode::OK,
                &ClassifyBody {
                    success: true,
                    data: prediction,
                },
            )
        }
        _ => {
            error!(
                "Classification failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
            json_response(StatusCode::BAD_REQUEST, &result)
        }
    }
}

fn model_info(state: &AppState) -> Result<Response<Body>, RouteError> {
    let classifier = &state.classifier;
    let model = classifier.model();
    let classes = classifier.classes();
    let (width, height) = classifier.target_size();

    let details = classes
        .iter()
        .enumerate()
        .map(|(index, name)| CategoryDetail {
            index,
            name,
            details: labels::display_details(name),
        })
        .collect();

    let body = ModelInfoBody {
        success: true,
        model_info: ModelInfo {
            model_file: model.name(),
            using_fallback: classifier.using_fallback(),
            label_source: classifier.label_source(),
            target_size: [width, height],
            output_shape: model.output_shape(),
            total_parameters: model
                .parameter_count()
                .map_or_else(|| json!("Unknown"), |count| json!(count)),
            num_classes: classes.len(),
            model_type: format!("{}-class waste classification model", classes.len()),
        },
        categories: Categories {
            total: classes.len(),
            list: classes,
            details,
        },
    };

    info!(
        "Model info requested - {} categories available",
        classes.len()
    );

    json_response(StatusCode::OK, &body)
}

fn upload_failure(err: UploadError) -> Result<Response<Body>, RouteError> {
    warn!("Rejected upload: {}", err);
    failure(err.status(), &err.to_string())
}

fn failure(status: StatusCode, message: &str) -> Result<Response<Body>, RouteError> {
    json_response(
        status,
        &ErrorBody {
            success: false,
            error: message,
        },
    )
}

fn json_response<T: Serialize + ?Sized>(
    status: StatusCode,
    body: &T,
) -> Result<Response<Body>, RouteError> {
    let body = serde_json::to_vec(body)?;

    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))?)
}

/// Last-resort 500 that cannot itself fail.
fn internal_error(message: &str) -> Response<Body> {
    let body = json!({ "success": false, "error": message }).to_string();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
