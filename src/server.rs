//! The HTTP server exposing a registry to Prometheus.

use crate::config::ServerConfig;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Serve `registry` until the server fails.
pub async fn run(registry: Registry, config: &ServerConfig) -> Result<(), Error> {
    let address = config.bind_address();
    let endpoint = config.endpoint();

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|source| Error::Bind {
            address: address.clone(),
            source,
        })?;
    log::info!("serving metrics at http://{}{}", address, endpoint);

    axum::serve(listener, router(registry, &endpoint))
        .await
        .map_err(Error::Serve)
}

/// Routes serving `registry` at `endpoint`, with a landing page at `/` unless that's the endpoint.
pub fn router(registry: Registry, endpoint: &str) -> Router {
    let mut router = Router::new().route(endpoint, get(metrics));

    if endpoint != "/" {
        let page = landing_page(endpoint);
        router = router.route(
            "/",
            get(move || {
                let page = page.clone();
                async move { Html(page) }
            }),
        );
    }

    router.with_state(registry)
}

async fn metrics(State(registry): State<Registry>) -> Response {
    // Gathering runs a discovery cycle, which blocks
    match tokio::task::spawn_blocking(move || encode(&registry)).await {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Ok(Err(e)) => {
            log::error!("failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            log::error!("metrics task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn encode(registry: &Registry) -> prometheus::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

fn landing_page(endpoint: &str) -> String {
    format!(
        concat!(
            "<html>\n",
            "<head><title>HomePlug Exporter</title></head>\n",
            "<body>\n",
            "<h1>HomePlug Exporter</h1>\n",
            "<p>Prometheus HomePlug Exporter, version {}</p>\n",
            "<ul><li><a href=\"{}\">Metrics</a></li></ul>\n",
            "</body>\n",
            "</html>\n"
        ),
        env!("CARGO_PKG_VERSION"),
        endpoint
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::IntGauge;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn serve(router: Router) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        addr
    }

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        let gauge = IntGauge::new("homeplug_test_value", "A test value").unwrap();
        gauge.set(42);
        registry.register(Box::new(gauge)).unwrap();
        registry
    }

    #[tokio::test]
    async fn metrics_and_landing_page() {
        let addr = serve(router(registry(), "/metrics")).await;

        let response = get(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.contains("text/plain; version=0.0.4"), "{}", response);
        assert!(response.contains("homeplug_test_value 42"), "{}", response);

        let response = get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.contains("<a href=\"/metrics\">Metrics</a>"), "{}", response);

        let response = get(addr, "/elsewhere").await;
        assert!(response.starts_with("HTTP/1.1 404"), "{}", response);
    }

    #[tokio::test]
    async fn metrics_at_root() {
        let addr = serve(router(registry(), "/")).await;

        let response = get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.contains("homeplug_test_value 42"), "{}", response);
    }
}
