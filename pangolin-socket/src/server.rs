use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, header};
use hyper_util::rt::TokioIo;
use pangolin_core::{EXIT_PATH, STATUS_PATH};
use serde::Serialize;
use tokio::net::UnixStream;

/// A request as seen by a control handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRoute {
    Status,
    Exit,
    Other { method: Method, path: String },
}

impl ControlRoute {
    fn from_request(method: &Method, path: &str) -> Self {
        match (method, path) {
            (&Method::GET, STATUS_PATH) => Self::Status,
            (&Method::POST, EXIT_PATH) => Self::Exit,
            _ => Self::Other {
                method: method.clone(),
                path: path.to_string(),
            },
        }
    }
}

/// Response produced by a control handler.
#[derive(Debug, Clone)]
pub struct ControlReply {
    pub status: StatusCode,
    pub body: String,
}

impl ControlReply {
    pub fn json(value: &impl Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body,
            },
            Err(e) => Self::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: message.into(),
        }
    }

    pub fn raw(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, "not found")
    }
}

/// Serve control requests on one accepted connection until the peer hangs up.
///
/// Server side of the protocol spoken by [`crate::ControlClient`].
pub async fn serve_control_connection<F, Fut>(
    stream: UnixStream,
    handler: F,
) -> Result<(), hyper::Error>
where
    F: Fn(ControlRoute) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ControlReply> + Send + 'static,
{
    let handler = Arc::new(handler);
    let service = service_fn(move |req: Request<Incoming>| {
        let handler = handler.clone();
        async move {
            let route = ControlRoute::from_request(req.method(), req.uri().path());
            tracing::debug!(?route, "control request");
            let reply = handler(route).await;
            let mut resp = Response::new(Full::new(Bytes::from(reply.body)));
            *resp.status_mut() = reply.status;
            resp.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            );
            Ok::<_, Infallible>(resp)
        }
    });

    http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
}
