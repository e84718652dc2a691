//! HTTP front end of the waste classifier.

pub mod config;
pub mod routes;
pub mod upload;

use std::convert::Infallible;
use std::sync::Arc;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response};
use log::warn;
use tower::util::BoxCloneService;
use tower::{service_fn, ServiceBuilder, ServiceExt};
use tower_http::cors::{AllowOrigin, CorsLayer};
use waste_serve::WasteClassifier;

pub use config::Settings;

/// State shared by every connection; cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<WasteClassifier>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(classifier: WasteClassifier, settings: Settings) -> Self {
        AppState {
            classifier: Arc::new(classifier),
            settings: Arc::new(settings),
        }
    }
}

pub type AppService = BoxCloneService<Request<Body>, Response<Body>, Infallible>;

/// The routes behind the CORS layer, ready to hand to hyper per connection.
pub fn app(state: AppState) -> AppService {
    let cors = cors_layer(&state.settings);

    ServiceBuilder::new()
        .layer(cors)
        .service(service_fn(move |req| routes::handle(req, state.clone())))
        .boxed_clone()
}

/// Allow the configured origins, or any origin when the list holds `*`.
pub fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins = if settings.allows_any_origin() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(settings.cors_origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| warn!("Ignoring invalid CORS origin {:?}", origin))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
}
