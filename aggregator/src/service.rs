use crate::errors::AggregatorError;
use crate::handler::AggregateHandler;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::protocol::ErrorResponse;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, HeaderMap,
    HeaderValue,
};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use shared::http::make_boxed_error_response;
use shared::{gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub type ServiceBody = BoxBody<Bytes, AggregatorError>;

/// Headers browser clients need to call the aggregator cross-origin.
const CORS_ALLOW_ORIGIN: &str = "*";
const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Request bodies are a coordinate pair and a selector; anything this large is rejected.
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

fn add_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(CORS_ALLOW_ORIGIN),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOW_HEADERS),
    );
}

/// Answers a CORS pre-flight: 200, empty body, CORS headers only.
fn preflight_response() -> Response<ServiceBody> {
    let mut response = Response::new(Empty::new().map_err(|e| match e {}).boxed());
    add_cors_headers(response.headers_mut());
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<ServiceBody> {
    let mut response = match serde_json::to_vec(value) {
        Ok(bytes) => {
            let mut response =
                Response::new(Full::new(Bytes::from(bytes)).map_err(|e| match e {}).boxed());
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            let error = AggregatorError::ResponseSerializationError(e.to_string());
            tracing::error!(error = %error, "Failed to serialize response");
            make_boxed_error_response(error.status_code())
        }
    };
    add_cors_headers(response.headers_mut());
    response
}

/// Tracks one in-flight request.
///
/// The gauge is released and the duration recorded on drop, so a request
/// whose future is dropped when the client disconnects is still accounted for
/// under the `cancelled` status.
struct RequestMetrics {
    start: Instant,
    status: Option<StatusCode>,
}

impl RequestMetrics {
    fn start() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        RequestMetrics {
            start: Instant::now(),
            status: None,
        }
    }

    fn finish(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        let status = match self.status {
            Some(status) => status.as_str().to_owned(),
            None => "cancelled".to_owned(),
        };
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
        histogram!(REQUEST_DURATION, "status" => status)
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// The public aggregation endpoint.
///
/// `OPTIONS` on any path is a pre-flight. `POST` on any path is an
/// aggregation request, since the hosting platform decides the mount point.
pub struct AggregatorService {
    handler: Arc<AggregateHandler>,
}

impl AggregatorService {
    pub fn new(handler: Arc<AggregateHandler>) -> Self {
        Self { handler }
    }
}

async fn handle<B>(
    handler: &AggregateHandler,
    req: Request<B>,
) -> Result<Response<ServiceBody>, AggregatorError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if req.method() != Method::POST {
        return Err(AggregatorError::MethodNotAllowed(req.method().to_string()));
    }

    let body = Limited::new(req.into_body(), MAX_REQUEST_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| match e.downcast_ref::<LengthLimitError>() {
            Some(_) => AggregatorError::PayloadTooLarge(MAX_REQUEST_BODY_BYTES),
            None => AggregatorError::RequestBodyError(e.to_string()),
        })?
        .to_bytes();

    let response = handler.aggregate(&body).await?;
    Ok(json_response(StatusCode::OK, &response))
}

impl<B> Service<Request<B>> for AggregatorService
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<ServiceBody>;
    type Error = AggregatorError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let handler = self.handler.clone();

        Box::pin(async move {
            // Pre-flight is answered before anything else, whatever the configuration
            if req.method() == Method::OPTIONS {
                return Ok(preflight_response());
            }

            let mut request_metrics = RequestMetrics::start();

            let response = match handle(&handler, req).await {
                Ok(response) => response,
                Err(e) => {
                    let status = e.status_code();
                    if status.is_server_error() {
                        tracing::error!(error = %e, "Aggregation request failed");
                    } else {
                        tracing::info!(error = %e, "Rejected aggregation request");
                    }
                    json_response(status, &ErrorResponse::from(&e))
                }
            };

            request_metrics.finish(response.status());
            Ok(response)
        })
    }
}
