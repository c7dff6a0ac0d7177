use std::net::{SocketAddr, ToSocketAddrs};

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Proxy, Request};
use tracing::{debug, error, warn};
use url::{Host, Url};

use crate::args::DEFAULT_USER_AGENT;
use crate::config::RunConfig;
use crate::error::{AppError, AppResult, HttpError, ValidationError};

/// Builds the one client every worker shares.
///
/// The idle pool per host is sized to the concurrency, which together with the
/// worker count bounds open connections. Without a proxy the target host is
/// resolved once here and pinned for the whole run.
pub(super) fn build_client(config: &RunConfig) -> AppResult<Client> {
    let mut client_builder = Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(config.concurrency.get())
        .tcp_nodelay(true)
        .user_agent(DEFAULT_USER_AGENT);

    if let Some(proxy_url) = config.proxy.as_ref() {
        let proxy = Proxy::all(proxy_url.as_str()).map_err(|err| {
            error!("Invalid proxy URL '{}': {}", proxy_url, err);
            AppError::validation(ValidationError::InvalidProxyUrl {
                url: proxy_url.to_string(),
                source: err,
            })
        })?;
        client_builder = client_builder.proxy(proxy);
    } else {
        client_builder = client_builder.no_proxy();
        if let Some((host, port)) = resolvable_host(&config.url) {
            match resolve_addrs(&host, port) {
                Ok(addrs) => {
                    debug!("Pinned {}:{} to {:?}", host, port, addrs);
                    client_builder = client_builder.resolve_to_addrs(&host, &addrs);
                }
                Err(err) => warn!("DNS pre-resolution failed, resolving per connection: {}", err),
            }
        }
    }

    client_builder
        .build()
        .map_err(|err| AppError::http(HttpError::BuildClientFailed { source: err }))
}

/// Builds the request cloned for every attempt.
pub(super) fn build_request_template(client: &Client, config: &RunConfig) -> AppResult<Request> {
    let mut request_builder = client.request(config.method.to_reqwest(), config.url.clone());

    for (key, value) in &config.headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            AppError::validation(ValidationError::InvalidHeaderName {
                header: key.clone(),
                source: err,
            })
        })?;
        let value = HeaderValue::from_str(value).map_err(|err| {
            AppError::validation(ValidationError::InvalidHeaderValue {
                header: key.clone(),
                source: err,
            })
        })?;
        request_builder = request_builder.header(name, value);
    }

    if let Some(body) = config.body.as_ref() {
        request_builder = request_builder.body(body.clone());
    }

    request_builder
        .build()
        .map_err(|err| AppError::http(HttpError::BuildRequestFailed { source: err }))
}

fn resolvable_host(url: &Url) -> Option<(String, u16)> {
    match url.host()? {
        Host::Domain(domain) => Some((domain.to_owned(), url.port_or_known_default()?)),
        Host::Ipv4(_) | Host::Ipv6(_) => None,
    }
}

fn resolve_addrs(host: &str, port: u16) -> AppResult<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|err| {
            AppError::http(HttpError::ResolveHost {
                host: host.to_owned(),
                port,
                source: err,
            })
        })?
        .collect();
    if addrs.is_empty() {
        return Err(AppError::http(HttpError::NoAddressesResolved {
            host: host.to_owned(),
        }));
    }
    Ok(addrs)
}
