//! REST surface: warp routes over [`ContainerGateway`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::config::GatewayConfig;
use crate::daemon::{DaemonTransport, UnixSocketTransport};
use crate::error::{GatewayError, Result};
use crate::gateway::{ContainerGateway, Envelope, SOMETHING_WENT_WRONG};
use crate::monitoring::log_api_request;

pub mod home;

pub use home::{ServerInfo, VersionData};

/// Request bodies over this size are refused
#[derive(Debug)]
pub struct BodyTooLarge {
    pub limit: u64,
}

impl warp::reject::Reject for BodyTooLarge {}

/// The client connection failed mid-body
#[derive(Debug)]
pub struct BodyReadFailed(pub String);

impl warp::reject::Reject for BodyReadFailed {}

/// Knobs that shape the route table
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub prefix: Vec<String>,
    pub max_body_bytes: u64,
}

impl RouteOptions {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            prefix: config.prefix_segments(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Build the complete filter: routes, CORS, rejection mapping and access log
pub fn routes(
    gateway: ContainerGateway,
    info: ServerInfo,
    options: RouteOptions,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let max_body = options.max_body_bytes;

    let home = warp::path::end()
        .and(warp::get())
        .and(warp::any().map(move || info.clone()))
        .and_then(home_handler);

    let containers_list = warp::path!("containers" / "list")
        .and(warp::get())
        .and(with_gateway(gateway.clone()))
        .and_then(list_handler);

    let containers_create = warp::path!("containers" / "create")
        .and(warp::post())
        .and(with_gateway(gateway.clone()))
        .and(optional_body(max_body))
        .and_then(create_handler);

    let containers_stop_all = warp::path!("containers" / "stopall")
        .and(warp::post())
        .and(with_gateway(gateway.clone()))
        .and_then(stop_all_handler);

    let containers_prune = warp::path!("containers" / "prune")
        .and(warp::post())
        .and(with_gateway(gateway.clone()))
        .and(optional_body(max_body))
        .and_then(prune_handler);

    let containers_inspect = warp::path!("containers" / String / "json")
        .and(warp::get())
        .and(with_gateway(gateway.clone()))
        .and_then(inspect_handler);

    let containers_top = warp::path!("containers" / String / "top")
        .and(warp::get())
        .and(with_gateway(gateway.clone()))
        .and_then(top_handler);

    let containers_start = warp::path!("containers" / String / "start")
        .and(warp::post())
        .and(with_gateway(gateway.clone()))
        .and(optional_body(max_body))
        .and_then(start_handler);

    let containers_stop = warp::path!("containers" / String / "stop")
        .and(warp::post())
        .and(with_gateway(gateway))
        .and(optional_body(max_body))
        .and_then(stop_handler);

    let api_routes = home
        .or(containers_list)
        .or(containers_create)
        .or(containers_stop_all)
        .or(containers_prune)
        .or(containers_inspect)
        .or(containers_top)
        .or(containers_start)
        .or(containers_stop);

    prefix_filter(&options.prefix)
        .and(api_routes)
        .with(
            warp::cors()
                .allow_any_origin()
                .allow_methods(vec!["GET", "POST"])
                .allow_headers(vec!["content-type"]),
        )
        .recover(handle_rejection)
        .with(warp::log::custom(|info| {
            let remote = info.remote_addr().map(|addr| addr.to_string());
            log_api_request(
                info.method().as_str(),
                info.path(),
                info.status().as_u16(),
                info.elapsed(),
                remote.as_deref(),
            );
        }))
}

/// Match each prefix segment in turn; no segments matches everything
fn prefix_filter(segments: &[String]) -> BoxedFilter<()> {
    segments
        .iter()
        .fold(warp::any().boxed(), |filter, segment| {
            filter.and(warp::path(segment.clone())).boxed()
        })
}

fn with_gateway(
    gateway: ContainerGateway,
) -> impl Filter<Extract = (ContainerGateway,), Error = Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}

/// The raw request body, `None` when empty.
///
/// A declared length over `limit` is refused before any of the body is read;
/// otherwise the stream is read only until it passes `limit`.
fn optional_body(limit: u64) -> impl Filter<Extract = (Option<Bytes>,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and(warp::body::stream())
        .and_then(move |declared: Option<u64>, body| async move {
            if declared.is_some_and(|len| len > limit) {
                return Err(warp::reject::custom(BodyTooLarge { limit }));
            }
            read_limited(body, limit).await
        })
}

async fn read_limited<S, B>(body: S, limit: u64) -> std::result::Result<Option<Bytes>, Rejection>
where
    S: Stream<Item = std::result::Result<B, warp::Error>>,
    B: Buf,
{
    futures_util::pin_mut!(body);

    let mut collected = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| warp::reject::custom(BodyReadFailed(e.to_string())))?;
        if (collected.len() + chunk.remaining()) as u64 > limit {
            return Err(warp::reject::custom(BodyTooLarge { limit }));
        }
        collected.put(chunk);
    }

    Ok((!collected.is_empty()).then(|| collected.freeze()))
}

async fn home_handler(info: ServerInfo) -> std::result::Result<Envelope, Rejection> {
    Ok(Envelope::ok(StatusCode::OK, &info.snapshot()))
}

async fn list_handler(gateway: ContainerGateway) -> std::result::Result<Envelope, Rejection> {
    Ok(gateway.list_containers().await)
}

async fn create_handler(
    gateway: ContainerGateway,
    body: Option<Bytes>,
) -> std::result::Result<Envelope, Rejection> {
    Ok(gateway.create_container(body).await)
}

async fn stop_all_handler(gateway: ContainerGateway) -> std::result::Result<Envelope, Rejection> {
    Ok(gateway.stop_all_containers().await)
}

async fn prune_handler(
    gateway: ContainerGateway,
    filters: Option<Bytes>,
) -> std::result::Result<Envelope, Rejection> {
    Ok(gateway.prune_containers(filters).await)
}

async fn inspect_handler(
    id: String,
    gateway: ContainerGateway,
) -> std::result::Result<Envelope, Rejection> {
    Ok(gateway.inspect_container(&id).await)
}

async fn top_handler(
    id: String,
    gateway: ContainerGateway,
) -> std::result::Result<Envelope, Rejection> {
    Ok(gateway.container_processes(&id).await)
}

async fn start_handler(
    id: String,
    gateway: ContainerGateway,
    body: Option<Bytes>,
) -> std::result::Result<Envelope, Rejection> {
    Ok(gateway.start_container(&id, body).await)
}

async fn stop_handler(
    id: String,
    gateway: ContainerGateway,
    body: Option<Bytes>,
) -> std::result::Result<Envelope, Rejection> {
    Ok(gateway.stop_container(&id, body).await)
}

/// Turn warp rejections into `{"error": ...}` envelopes
pub async fn handle_rejection(err: Rejection) -> std::result::Result<Envelope, Infallible> {
    let envelope = if err.is_not_found() {
        Envelope::error(StatusCode::NOT_FOUND, "Not found")
    } else if let Some(too_large) = err.find::<BodyTooLarge>() {
        Envelope::error(
            StatusCode::BAD_REQUEST,
            format!("request body exceeds {} bytes", too_large.limit),
        )
    } else if let Some(failed) = err.find::<BodyReadFailed>() {
        Envelope::error(
            StatusCode::BAD_REQUEST,
            format!("failed to read request body: {}", failed.0),
        )
    } else if let Some(forbidden) = err.find::<warp::cors::CorsForbidden>() {
        Envelope::error(StatusCode::FORBIDDEN, forbidden.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        Envelope::error(StatusCode::BAD_REQUEST, "Method not allowed")
    } else if err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::LengthRequired>().is_some()
        || err.find::<warp::reject::PayloadTooLarge>().is_some()
    {
        Envelope::error(StatusCode::BAD_REQUEST, "Malformed request")
    } else {
        error!("unhandled rejection: {:?}", err);
        Envelope::error(StatusCode::INTERNAL_SERVER_ERROR, SOMETHING_WENT_WRONG)
    };

    Ok(envelope)
}

/// The gateway process: configuration, shared gateway and host facts
pub struct GatewayServer {
    config: GatewayConfig,
    gateway: ContainerGateway,
    info: ServerInfo,
}

impl GatewayServer {
    /// Wire the Unix socket transport described by `config`
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let mut transport = UnixSocketTransport::new(&config.docker_socket);
        if let Some(version) = &config.daemon_api_version {
            transport = transport.with_api_version(version.as_str());
        }
        if let Some(timeout) = config.request_timeout() {
            transport = transport.with_timeout(timeout);
        }

        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn new(config: GatewayConfig, transport: Arc<dyn DaemonTransport>) -> Self {
        let info = ServerInfo::new(config.listen_addr.clone(), &config.docker_socket);
        Self {
            gateway: ContainerGateway::new(transport),
            info,
            config,
        }
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, then drain in-flight requests
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr()?;

        if !self.config.docker_socket.exists() {
            warn!(
                "Daemon socket {} does not exist yet; container calls will fail until it does",
                self.config.docker_socket.display()
            );
        }

        let routes = routes(
            self.gateway,
            self.info,
            RouteOptions::from_config(&self.config),
        );

        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, signal)
            .map_err(|e| GatewayError::Other(e.into()))?;

        info!(
            "dockrelay listening on http://{} (daemon socket {}, prefix '/{}')",
            bound,
            self.config.docker_socket.display(),
            self.config.prefix_segments().join("/")
        );

        server.await;
        info!("dockrelay stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining connections"),
        Err(e) => {
            warn!("Unable to listen for Ctrl-C, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
