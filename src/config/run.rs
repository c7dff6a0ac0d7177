use std::time::Duration;

use url::Url;

use crate::args::{
    DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_REQUESTS,
    HttpMethod, PositiveU64, PositiveUsize, TesterArgs,
};
use crate::error::{AppError, AppResult, ValidationError};
use crate::http::RetryPolicy;

/// Fully validated settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub url: Url,
    pub num_requests: PositiveU64,
    pub concurrency: PositiveUsize,
    pub method: HttpMethod,
    /// Unique by case-insensitive name, in first-seen order.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub proxy: Option<Url>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
}

impl RunConfig {
    /// Creates a configuration with default settings for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is not an absolute http(s) URL with a host.
    pub fn new(url: &str) -> AppResult<Self> {
        let url = parse_target_url(url)?;
        let num_requests = PositiveU64::try_from(DEFAULT_REQUESTS)?;
        let concurrency = PositiveUsize::try_from(DEFAULT_CONCURRENCY)?;
        Ok(Self {
            url,
            num_requests,
            concurrency,
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
            proxy: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    /// Validates parsed CLI arguments (after config merging).
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is missing or invalid or the proxy URL
    /// cannot be parsed.
    pub fn from_args(args: &TesterArgs) -> AppResult<Self> {
        let url = args
            .url
            .as_deref()
            .ok_or_else(|| AppError::validation(ValidationError::MissingUrl))?;
        let mut config = Self::new(url)?
            .with_requests(args.num_requests)
            .with_concurrency(args.concurrency)
            .with_method(args.method)
            .with_request_timeout(args.request_timeout)
            .with_connect_timeout(args.connect_timeout);
        for (key, value) in &args.headers {
            config = config.with_header(key, value);
        }
        if let Some(body) = args.data.as_ref() {
            config = config.with_body(body.clone());
        }
        if let Some(proxy) = args.proxy.as_deref() {
            config = config.with_proxy(proxy)?;
        }
        Ok(config)
    }

    #[must_use]
    pub const fn with_requests(mut self, num_requests: PositiveU64) -> Self {
        self.num_requests = num_requests;
        self
    }

    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: PositiveUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Adds a header; a later header with the same name (any case) replaces
    /// the earlier value.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(existing_key, _)| existing_key.eq_ignore_ascii_case(key))
        {
            existing.1 = value.to_owned();
        } else {
            self.headers.push((key.to_owned(), value.to_owned()));
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Routes every request through `proxy`. A missing scheme means `http://`.
    ///
    /// # Errors
    ///
    /// Returns an error when the proxy URL cannot be parsed or has no host.
    pub fn with_proxy(mut self, proxy: &str) -> AppResult<Self> {
        self.proxy = Some(parse_proxy_url(proxy)?);
        Ok(self)
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Proxy URL with any password replaced by `***`, for display.
    #[must_use]
    pub fn masked_proxy(&self) -> Option<String> {
        self.proxy.as_ref().map(|proxy| {
            let mut masked = proxy.clone();
            if masked.password().is_some() && masked.set_password(Some("***")).is_err() {
                return "<proxy>".to_owned();
            }
            masked.to_string()
        })
    }
}

fn parse_target_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw.trim()).map_err(|err| ValidationError::InvalidUrl {
        url: raw.to_owned(),
        source: err,
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::UrlMissingHost);
    }
    Ok(url)
}

fn parse_proxy_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("http://{}", trimmed)
    };
    let url = Url::parse(&candidate).map_err(|err| ValidationError::ProxyUrlParse {
        url: raw.to_owned(),
        source: err,
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::ProxyMissingHost {
            url: raw.to_owned(),
        });
    }
    Ok(url)
}
