//! HTTP transport
//!
//! Plain hyper accept loop and path dispatch. Every endpoint is a POST
//! carrying an `Auth`-wrapped JSON body, and every response body, success
//! or error, is signed with the server key before it leaves.

use crate::{flows, AppState};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};
use zeta_core::envelope::Auth;
use zeta_core::protocol::ErrorResponse;
use zeta_core::{ErrorKind, ZetaError};

type BoxBody = Full<Bytes>;

/// Accept connections forever, one task per connection
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!("zeta server listening on {}", listener.local_addr()?);

    loop {
        let (stream, remote_addr) = listener.accept().await?;
        debug!("new connection from {}", remote_addr);

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, state).await {
                error!("connection error from {}: {}", remote_addr, err);
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, state: AppState) -> hyper::Result<()> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request| {
        let state = state.clone();
        async move { handle_request(request, state).await }
    });

    hyper::server::conn::http1::Builder::new()
        .serve_connection(io, service)
        .await
}

async fn handle_request(
    request: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody>, Infallible> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    debug!("handling {} {}", method, path);

    let body = match request.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/create") => endpoint(state, &body, flows::create).await,
        (&Method::POST, "/search") => endpoint(state, &body, flows::search).await,
        (&Method::POST, "/register") => endpoint(state, &body, flows::register).await,
        (&Method::POST, "/transfer") => endpoint(state, &body, flows::transfer).await,
        (&Method::POST, "/redeem") => endpoint(state, &body, flows::redeem).await,
        (&Method::POST, "/validate") => endpoint(state, &body, flows::validate).await,
        (&Method::POST, "/cancel") => endpoint(state, &body, flows::cancel).await,
        (&Method::POST, "/flag") => endpoint(state, &body, flows::flag).await,
        (&Method::POST, "/permissions") => endpoint(state, &body, flows::update_permissions).await,
        (&Method::POST, "/delete") => endpoint(state, &body, flows::delete).await,
        _ => failure(&state, &ZetaError::not_found("unknown endpoint")),
    };

    info!("{} {} -> {}", method, path, response.status());
    Ok(response)
}

/// Decode the envelope, run the flow, sign whatever comes back
async fn endpoint<Req, Resp, Fut>(
    state: AppState,
    body: &Bytes,
    flow: fn(AppState, Auth<Req>) -> Fut,
) -> Response<BoxBody>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    Fut: Future<Output = zeta_core::Result<Resp>>,
{
    let auth: Auth<Req> = match serde_json::from_slice(body) {
        Ok(auth) => auth,
        Err(_) => return failure(&state, &ZetaError::validation("malformed request")),
    };

    match flow(state.clone(), auth).await {
        Ok(response) => signed_response(&state, StatusCode::OK, response),
        Err(err) => failure(&state, &err),
    }
}

fn failure(state: &AppState, err: &ZetaError) -> Response<BoxBody> {
    if err.kind() == ErrorKind::Internal {
        error!("internal error: {}", err);
    }

    let body = ErrorResponse {
        error: true,
        detail: err.detail().to_string(),
    };
    signed_response(state, status_code(err.kind()), body)
}

fn signed_response<T: Serialize>(
    state: &AppState,
    status: StatusCode,
    content: T,
) -> Response<BoxBody> {
    let body = Auth::seal(content, &state.signer)
        .and_then(|auth| serde_json::to_vec(&auth).map_err(Into::into));

    match body {
        Ok(body) => Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap(),
        Err(err) => {
            error!("failed to sign response: {}", err);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("content-type", "application/json")
                .body(Full::new(Bytes::from_static(
                    br#"{"error":true,"detail":"internal error"}"#,
                )))
                .unwrap()
        }
    }
}

/// Error-kind to HTTP status table
fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
