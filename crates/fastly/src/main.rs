use fastly::http::Method;
use fastly::{Error, Request, Response};
use log_fastly::Logger;

use adplus_common::registry::ModuleRegistry;
use adplus_common::settings::Settings;
use adplus_common::settings_data::get_settings;

mod backend;
mod error;
mod routes;
mod transport;

use crate::error::to_error_response;
use crate::routes::{
    build_registry, handle_bid_request, handle_bid_won_event, handle_id_request,
    handle_timeout_event,
};

#[fastly::main]
fn main(req: Request) -> Result<Response, Error> {
    init_logger();

    let settings = match get_settings() {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to load settings: {:?}", e);
            return Ok(to_error_response(e));
        }
    };
    let registry = build_registry(&settings);

    futures::executor::block_on(route_request(&settings, &registry, req))
}

/// Routes incoming requests to the adapter handlers.
async fn route_request(
    settings: &Settings,
    registry: &ModuleRegistry,
    req: Request,
) -> Result<Response, Error> {
    log::info!(
        "FASTLY_SERVICE_VERSION: {}",
        ::std::env::var("FASTLY_SERVICE_VERSION").unwrap_or_else(|_| String::new())
    );

    let path = req.get_path().to_string();
    let method = req.get_method().clone();

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/adplus/id") => handle_id_request(settings, registry, req).await,
        (&Method::POST, "/adplus/bid") => handle_bid_request(registry, req).await,
        (&Method::POST, "/adplus/events/timeout") => handle_timeout_event(registry, req),
        (&Method::POST, "/adplus/events/won") => handle_bid_won_event(registry, req),
        _ => {
            log::info!("No route matched for {} {}", method, path);
            return Ok(Response::from_status(fastly::http::StatusCode::NOT_FOUND));
        }
    };

    Ok(result.unwrap_or_else(to_error_response))
}

fn init_logger() {
    let logger = Logger::builder()
        .default_endpoint("adplus_log")
        .max_level(log::LevelFilter::Debug)
        .build()
        .expect("Failed to build Logger");

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .chain(Box::new(logger) as Box<dyn log::Log>)
        .apply()
        .expect("Failed to initialize logger");
}
