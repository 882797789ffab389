//! Plain HTTP query endpoints served next to the JSON-RPC methods.

use crate::{QueryError, QueryKind, QueryRpc};
use companion_rpc::RpcEnvelope;
use companion_storage::BlockStorage;
use http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE};
use jsonrpsee::server::{HttpBody, HttpRequest, HttpResponse};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Path of the block query endpoint.
pub const BLOCK_PATH: &str = "/v1/block";

/// Path of the header query endpoint.
pub const HEADER_PATH: &str = "/v1/header";

/// A tower layer that answers `GET /v1/block?height=H` and `GET /v1/header?height=H` from the
/// store and passes every other request through to the JSON-RPC server.
#[derive(Debug)]
pub struct HeightQueryLayer<St> {
    query: QueryRpc<St>,
}

impl<St> Clone for HeightQueryLayer<St> {
    fn clone(&self) -> Self {
        Self { query: self.query.clone() }
    }
}

impl<St> HeightQueryLayer<St> {
    /// Constructs a new [`HeightQueryLayer`].
    pub const fn new(query: QueryRpc<St>) -> Self {
        Self { query }
    }
}

impl<S, St> Layer<S> for HeightQueryLayer<St> {
    type Service = HeightQueryMiddleware<S, St>;

    fn layer(&self, inner: S) -> Self::Service {
        HeightQueryMiddleware { inner, query: self.query.clone() }
    }
}

/// The middleware service created by [`HeightQueryLayer`].
#[derive(Debug)]
pub struct HeightQueryMiddleware<S, St> {
    inner: S,
    query: QueryRpc<St>,
}

impl<S: Clone, St> Clone for HeightQueryMiddleware<S, St> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), query: self.query.clone() }
    }
}

impl<S, St, ReqBody> Service<HttpRequest<ReqBody>> for HeightQueryMiddleware<S, St>
where
    S: Service<HttpRequest<ReqBody>, Response = HttpResponse> + Clone + Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    S::Future: Send,
    St: BlockStorage + 'static,
    ReqBody: Send + 'static,
{
    type Response = HttpResponse;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: HttpRequest<ReqBody>) -> Self::Future {
        let kind = match req.uri().path() {
            BLOCK_PATH => QueryKind::Block,
            HEADER_PATH => QueryKind::Header,
            _ => {
                let fut = self.inner.call(req);
                return Box::pin(fut);
            }
        };

        let query = self.query.clone();
        let method = req.method().clone();
        let params = req.uri().query().map(str::to_owned);
        Box::pin(async move {
            let response = match answer(&query, kind, &method, params.as_deref()).await {
                Ok(body) => {
                    debug!(target: "companion::http", %kind, "Served query");
                    response(StatusCode::OK, "application/json", body)
                }
                Err(err) => {
                    warn!(target: "companion::http", %kind, %err, "Query failed");
                    response(err.status(), "text/plain", err.to_string())
                }
            };
            Ok(response)
        })
    }
}

async fn answer<St>(
    query: &QueryRpc<St>,
    kind: QueryKind,
    method: &Method,
    params: Option<&str>,
) -> Result<String, QueryError>
where
    St: BlockStorage + 'static,
{
    if method != Method::GET {
        return Err(QueryError::MethodNotAllowed(method.to_string()));
    }
    let height = parse_height(params)?;
    let body = match kind {
        QueryKind::Block => {
            serde_json::to_string(&RpcEnvelope::success(query.block_at(height).await?))?
        }
        QueryKind::Header => {
            serde_json::to_string(&RpcEnvelope::success(query.header_at(height).await?))?
        }
    };
    Ok(body)
}

/// Extracts the `height` parameter from a url query string.
pub fn parse_height(params: Option<&str>) -> Result<i64, QueryError> {
    let (_, value) = url::form_urlencoded::parse(params.unwrap_or_default().as_bytes())
        .find(|(key, _)| key == "height")
        .ok_or(QueryError::MissingHeight)?;
    value.trim().parse().map_err(|_| QueryError::InvalidHeight(value.into_owned()))
}

fn response(status: StatusCode, content_type: &'static str, body: String) -> HttpResponse {
    let mut response = HttpResponse::new(HttpBody::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain(Some("height=10"), 10)]
    #[case::among_others(Some("pretty=true&height=42"), 42)]
    #[case::negative(Some("height=-1"), -1)]
    #[case::padded(Some("height=%2012"), 12)]
    fn test_parse_height(#[case] params: Option<&str>, #[case] expected: i64) {
        assert_eq!(parse_height(params).unwrap(), expected);
    }

    #[rstest]
    #[case::no_query(None)]
    #[case::other_params(Some("h=1"))]
    fn test_parse_missing_height(#[case] params: Option<&str>) {
        assert!(matches!(parse_height(params), Err(QueryError::MissingHeight)));
    }

    #[rstest]
    #[case::word(Some("height=ten"), "ten")]
    #[case::empty(Some("height="), "")]
    #[case::overflow(Some("height=9223372036854775808"), "9223372036854775808")]
    fn test_parse_invalid_height(#[case] params: Option<&str>, #[case] raw: &str) {
        assert!(matches!(parse_height(params), Err(QueryError::InvalidHeight(value)) if value == raw));
    }
}
