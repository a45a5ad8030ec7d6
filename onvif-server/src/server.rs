//! HTTP transport
//!
//! One POST route per service endpoint. The body namespace picks the
//! service when it names one; the path segment is the fallback. Replies
//! use the SOAP version of the request.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{Fault, FaultCode, OnvifError};
use crate::registry::Service;
use crate::soap::{self, ReplyContext, SoapVersion};

/// Build the ONVIF router around a dispatcher
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/onvif/{service}", post(handle_service))
        .with_state(dispatcher)
}

/// Start the ONVIF HTTP server
pub async fn run_onvif_server(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let app = router(dispatcher);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("ONVIF server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_service(
    Path(endpoint): Path<String>,
    State(dispatcher): State<Arc<Dispatcher>>,
    body: String,
) -> impl IntoResponse {
    let request = match soap::parse_request(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "Malformed SOAP request");
            let reply = ReplyContext {
                version: SoapVersion::sniff(&body),
                relates_to: None,
            };
            return fault_response(&reply, &e.fault());
        }
    };
    let reply = request.reply();

    let service = request
        .namespace
        .as_deref()
        .and_then(Service::from_namespace)
        .or_else(|| Service::from_path(&endpoint));

    let result = match service {
        Some(service) => dispatcher.dispatch(service, &request.method, &request.args),
        None => {
            warn!(endpoint = %endpoint, method = %request.method, "No service for endpoint");
            Err(OnvifError::UnknownAction {
                service: endpoint.clone(),
                method: request.method.clone(),
            })
        }
    };

    match result {
        Ok(fragment) => {
            debug!(endpoint = %endpoint, method = %request.method, "Request served");
            (
                StatusCode::OK,
                [("Content-Type", reply.version.content_type())],
                soap::envelope(&reply, &fragment),
            )
        }
        Err(e) => fault_response(&reply, &e.fault()),
    }
}

fn fault_response(
    reply: &ReplyContext,
    fault: &Fault,
) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    let status = match fault.code {
        FaultCode::Sender => StatusCode::BAD_REQUEST,
        FaultCode::Receiver => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        [("Content-Type", reply.version.content_type())],
        soap::fault_envelope(reply, fault),
    )
}
