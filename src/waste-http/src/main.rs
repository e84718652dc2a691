use std::convert::Infallible;
use std::error::Error;

use hyper::server::conn::AddrStream;
use hyper::service::make_service_fn;
use hyper::Server;
use log::{error, info, warn};
use waste_http::{app, AppState, Settings};
use waste_serve::WasteClassifier;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Ignoring .env file: {}", err);
        }
    }

    let settings = Settings::from_args();

    env_logger::Builder::new()
        .parse_filters(&settings.log_filter())
        .format_timestamp_millis()
        .init();

    if let Err(err) = run(settings).await {
        error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> Result<(), Box<dyn Error + Send + Sync>> {
    let classifier = WasteClassifier::load(&settings.model_path, settings.classifier_options())?;
    info!(
        "Classifier ready with {} classes from {}",
        classifier.classes().len(),
        classifier.label_source()
    );

    let addr = settings.bind_addr()?;
    let state = AppState::new(classifier, settings);
    let service = app(state.clone());

    let make_service = make_service_fn(move |_conn: &AddrStream| {
        let service = service.clone();

        async move { Ok::<_, Infallible>(service) }
    });

    let server = Server::try_bind(&addr)?
        .serve(make_service)
        .with_graceful_shutdown(shutdown_signal());

    info!("Listening on http://{}", addr);
    server.await?;

    drop(state);
    info!("Server stopped, classifier released");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
