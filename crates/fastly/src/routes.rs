//! HTTP handlers exposing the Ad+ adapters at the edge.

use std::sync::Arc;

use error_stack::{Report, ResultExt};
use fastly::http::request::{select, PendingRequest};
use fastly::http::{header, Method, StatusCode};
use fastly::{Request, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use adplus_common::bidder::{
    parse_bid_request, primary_language, AdplusBidAdapter, AdResponse, PageContext, BIDDER_CODE,
};
use adplus_common::error::AdplusError;
use adplus_common::identity::{
    AdplusIdSystem, CookieBackend, CookieProbe, IdResolution, IdResponse, IdentityStorage,
    MemoryBackend, StorageBackend, SystemClock, MODULE_NAME,
};
use adplus_common::registry::{BidderSpec, ModuleRegistry};
use adplus_common::settings::Settings;

use crate::backend::ensure_backend_from_url;
use crate::transport::FastlyIdentityTransport;

/// Registry of the modules served by this service.
#[must_use]
pub fn build_registry(settings: &Settings) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register_bidder(Arc::new(AdplusBidAdapter::new(settings.bidder.clone())));
    registry
}

/// Body accepted by `POST /adplus/bid`.
#[derive(Debug, Default, Deserialize)]
struct BidEnvelope {
    #[serde(default)]
    bids: Vec<Value>,
    #[serde(default)]
    page: PageContext,
}

fn json_response(status: StatusCode, body: &Value) -> Response {
    Response::from_status(status)
        .with_header(header::CONTENT_TYPE, "application/json")
        .with_body(body.to_string())
}

fn bidder(registry: &ModuleRegistry) -> Result<Arc<dyn BidderSpec>, Report<AdplusError>> {
    registry.bidder(BIDDER_CODE).ok_or_else(|| {
        Report::new(AdplusError::Configuration {
            message: format!("bidder '{}' is not registered", BIDDER_CODE),
        })
    })
}

fn take_json_body(req: &mut Request) -> Result<Value, Report<AdplusError>> {
    req.take_body_json::<Value>()
        .change_context(AdplusError::InvalidRequest {
            message: "request body is not valid JSON".to_string(),
        })
}

/// `GET /adplus/id`: resolve the caller's identifier.
///
/// The cookie jar comes from the request; there is no durable device store
/// at the edge, so the local backend reports itself unavailable. Cookies
/// count as working only once the browser sends the test cookie back.
///
/// # Errors
///
/// Returns [`AdplusError::Identity`] if the submodule cannot be registered,
/// and [`AdplusError::Storage`] if the accumulated cookies cannot be read.
pub async fn handle_id_request(
    settings: &Settings,
    registry: &ModuleRegistry,
    req: Request,
) -> Result<Response, Report<AdplusError>> {
    let identity = &settings.identity;
    let cookie_header = req.get_header_str(header::COOKIE).map(str::to_string);

    let cookies = Arc::new(
        CookieBackend::from_cookie_header(
            cookie_header.as_deref().unwrap_or_default(),
            identity.test_cookie_name.clone(),
        )
        .with_probe(CookieProbe::Returned)
        .with_path(identity.cookie_path.clone())
        .with_domain(identity.cookie_domain.clone()),
    );
    let backends: Vec<Arc<dyn StorageBackend>> = vec![
        Arc::new(MemoryBackend::new(false)),
        Arc::clone(&cookies) as Arc<dyn StorageBackend>,
    ];

    // The submodule is bound to this request's cookies.
    let mut registry = registry.clone();
    registry.register_submodule(Arc::new(AdplusIdSystem::new(
        identity.clone(),
        IdentityStorage::new(identity.storage_key.clone(), backends),
        Arc::new(FastlyIdentityTransport::new(cookie_header)),
        Arc::new(SystemClock),
    )));
    let submodule = registry.submodule(MODULE_NAME).ok_or_else(|| {
        Report::new(AdplusError::Identity {
            message: format!("submodule '{}' is not registered", MODULE_NAME),
        })
    })?;

    let stored = match submodule.get_id() {
        IdResolution::Cached(record) => Some(record.to_value()),
        IdResolution::Deferred(handle) => handle.fetch().await.as_ref().map(IdResponse::to_value),
    };

    let decoded = stored.as_ref().and_then(|value| submodule.decode(value));
    let eids = registry.eids_for(stored.as_slice());

    let mut response = json_response(
        StatusCode::OK,
        &json!({ "userId": decoded, "eids": eids }),
    );
    for set_cookie in cookies.set_cookie_headers()? {
        response.append_header(header::SET_COOKIE, set_cookie);
    }
    Ok(response)
}

/// `POST /adplus/bid`: run the bid adapter against the partner endpoint.
///
/// # Errors
///
/// Returns [`AdplusError::InvalidRequest`] for a malformed body, and
/// [`AdplusError::Transport`] when a partner request cannot be launched.
pub async fn handle_bid_request(
    registry: &ModuleRegistry,
    mut req: Request,
) -> Result<Response, Report<AdplusError>> {
    let bidder = bidder(registry)?;

    let language = req
        .get_header_str(header::ACCEPT_LANGUAGE)
        .and_then(primary_language);
    let referrer = req.get_header_str(header::REFERER).map(str::to_string);
    let request_url = req.get_url_str().to_string();

    let envelope: BidEnvelope =
        serde_json::from_value(take_json_body(&mut req)?).change_context(
            AdplusError::InvalidRequest {
                message: "expected {\"bids\": [...], \"page\": {...}}".to_string(),
            },
        )?;
    let page = envelope
        .page
        .with_fallbacks(Some(request_url), referrer, language);

    let valid: Vec<_> = envelope
        .bids
        .iter()
        .filter_map(parse_bid_request)
        .filter(|bid| bidder.is_bid_request_valid(bid))
        .collect();
    log::info!(
        "adplus: {} of {} bids passed validation",
        valid.len(),
        envelope.bids.len()
    );

    let mut pending: Vec<PendingRequest> = Vec::new();
    for outbound in bidder.build_requests(&valid, &page) {
        let backend = ensure_backend_from_url(&outbound.url)?;
        let method = Method::from_bytes(outbound.method.as_str().as_bytes()).change_context(
            AdplusError::Bidder {
                message: format!("unsupported method {}", outbound.method),
            },
        )?;

        let mut partner_req = Request::new(method, &outbound.url);
        partner_req
            .set_body_json(&outbound.data)
            .change_context(AdplusError::Bidder {
                message: "failed to serialize bid request".to_string(),
            })?;
        pending.push(
            partner_req
                .send_async(backend)
                .change_context(AdplusError::Transport {
                    message: format!("failed to send bid request to {}", outbound.url),
                })?,
        );
    }

    let mut bids: Vec<AdResponse> = Vec::new();
    let mut remaining = pending;
    while !remaining.is_empty() {
        let (result, rest) = select(remaining);
        remaining = rest;

        match result {
            Ok(mut resp) => {
                if !resp.get_status().is_success() {
                    log::warn!("adplus: endpoint answered {}", resp.get_status());
                    continue;
                }
                let body: Option<Value> = serde_json::from_slice(&resp.take_body_bytes()).ok();
                bids.extend(bidder.interpret_response(body.as_ref()));
            }
            Err(e) => log::warn!("adplus: bid request failed: {:?}", e),
        }
    }

    let body = serde_json::to_value(&bids).change_context(AdplusError::Bidder {
        message: "failed to serialize bids".to_string(),
    })?;
    Ok(json_response(StatusCode::OK, &body))
}

/// `POST /adplus/events/timeout`.
///
/// # Errors
///
/// Returns [`AdplusError::InvalidRequest`] for a malformed body.
pub fn handle_timeout_event(
    registry: &ModuleRegistry,
    mut req: Request,
) -> Result<Response, Report<AdplusError>> {
    let bidder = bidder(registry)?;
    bidder.on_timeout(&take_json_body(&mut req)?);
    Ok(Response::from_status(StatusCode::NO_CONTENT))
}

/// `POST /adplus/events/won`.
///
/// # Errors
///
/// Returns [`AdplusError::InvalidRequest`] for a malformed body.
pub fn handle_bid_won_event(
    registry: &ModuleRegistry,
    mut req: Request,
) -> Result<Response, Report<AdplusError>> {
    let bidder = bidder(registry)?;
    bidder.on_bid_won(&take_json_body(&mut req)?);
    Ok(Response::from_status(StatusCode::NO_CONTENT))
}
