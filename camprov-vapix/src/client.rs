//! Single-device VAPIX HTTP client: digest authentication plus the
//! uniform attempt/classify/retry loop every call runs through.

use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;

use camprov_common::{CamError, Transport};
use tracing::{debug, warn};

use crate::classify::{classify_transport_error, Outcome};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_SPACING: Duration = Duration::from_secs(2);

/// An HTTP client scoped to a single device address, carrying the
/// retry/timeout policy every VAPIX call shares.
pub struct VapixClient {
    http: reqwest::Client,
    address: Ipv4Addr,
    transport: Transport,
    port: Option<u16>,
    retry_count: u32,
    retry_spacing: Duration,
}

impl VapixClient {
    pub fn new(address: Ipv4Addr, transport: Transport) -> Result<Self, CamError> {
        Self::with_policy(address, transport, DEFAULT_TIMEOUT, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_SPACING)
    }

    pub fn with_policy(
        address: Ipv4Addr,
        transport: Transport,
        timeout: Duration,
        retry_count: u32,
        retry_spacing: Duration,
    ) -> Result<Self, CamError> {
        Self::with_port(address, transport, None, timeout, retry_count, retry_spacing)
    }

    /// Same as [`Self::with_policy`] but against a non-default port —
    /// the device's scheme-default port otherwise. Exists for test
    /// harnesses that stub a device behind an ephemeral port; production
    /// callers always go through `with_policy`.
    pub fn with_port(
        address: Ipv4Addr,
        transport: Transport,
        port: Option<u16>,
        timeout: Duration,
        retry_count: u32,
        retry_spacing: Duration,
    ) -> Result<Self, CamError> {
        // Self-signed device certificates are the norm on this segment;
        // TLS verification is unconditionally disabled, scoped to this
        // provisioning client only.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| CamError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            address,
            transport,
            port,
            retry_count,
            retry_spacing,
        })
    }

    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.transport.scheme(), self.address, port),
            None => format!("{}://{}", self.transport.scheme(), self.address),
        }
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Run the uniform attempt/classify/retry loop. `attempt` is called
    /// once per try (1-indexed) and returns the classified outcome of
    /// that try; transient outcomes sleep `retry_spacing` and retry,
    /// everything else returns immediately.
    pub async fn retrying<F, Fut>(&self, mut attempt: F) -> (bool, String)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let mut last = String::new();
        for n in 1..=self.retry_count {
            match attempt(n).await {
                Outcome::Success(msg) | Outcome::DeviceState(msg) => return (true, msg),
                Outcome::Auth(msg) | Outcome::Protocol(msg) | Outcome::Failure(msg) => return (false, msg),
                Outcome::Transient(msg) => {
                    debug!("transient failure on attempt {}/{}: {}", n, self.retry_count, msg);
                    last = msg;
                    if n < self.retry_count {
                        tokio::time::sleep(self.retry_spacing).await;
                    }
                }
            }
        }
        warn!("exhausted {} attempts against {}: {}", self.retry_count, self.address, last);
        (false, format!("after {} attempts: {}", self.retry_count, last))
    }

    /// An unauthenticated GET, returning (status, body) or a transport
    /// error already classified as transient.
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<(u16, String), Outcome> {
        let url = format!("{}{}", self.base_url(), path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| classify_transport_error(&e))?;
        Ok((status, body))
    }

    /// A digest-authenticated GET (RFC 7616). Issues an unauthenticated
    /// probe first; on a 401 with a `WWW-Authenticate: Digest` challenge,
    /// computes the response and retries once with the `Authorization`
    /// header set.
    pub async fn digest_get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        user: &str,
        password: &str,
    ) -> Result<(u16, String), Outcome> {
        let url = format!("{}{}", self.base_url(), path);

        let first = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if first.status().as_u16() != 401 {
            let status = first.status().as_u16();
            let body = first.text().await.map_err(|e| classify_transport_error(&e))?;
            return Ok((status, body));
        }

        let challenge = first
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let Some(challenge) = challenge else {
            let body = first.text().await.map_err(|e| classify_transport_error(&e))?;
            return Ok((401, body));
        };

        let mut prompt = digest_auth::parse(&challenge)
            .map_err(|e| Outcome::Protocol(format!("unparseable digest challenge: {e}")))?;

        let full_path = if query.is_empty() {
            path.to_string()
        } else {
            let qs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{path}?{}", qs.join("&"))
        };

        let context = digest_auth::AuthContext::new(user, password, full_path.as_str());
        let answer = prompt
            .respond(&context)
            .map_err(|e| Outcome::Protocol(format!("failed to compute digest response: {e}")))?;

        let authed = self
            .http
            .get(&url)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, answer.to_header_string())
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = authed.status().as_u16();
        let body = authed.text().await.map_err(|e| classify_transport_error(&e))?;
        Ok((status, body))
    }

    /// A digest-authenticated POST with a JSON body.
    pub async fn digest_post_json(
        &self,
        path: &str,
        json: &serde_json::Value,
        user: &str,
        password: &str,
    ) -> Result<(u16, String), Outcome> {
        let url = format!("{}{}", self.base_url(), path);

        let first = self
            .http
            .post(&url)
            .json(json)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if first.status().as_u16() != 401 {
            let status = first.status().as_u16();
            let body = first.text().await.map_err(|e| classify_transport_error(&e))?;
            return Ok((status, body));
        }

        let challenge = first
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let Some(challenge) = challenge else {
            let body = first.text().await.map_err(|e| classify_transport_error(&e))?;
            return Ok((401, body));
        };

        let mut prompt = digest_auth::parse(&challenge)
            .map_err(|e| Outcome::Protocol(format!("unparseable digest challenge: {e}")))?;
        // A2 = MD5(method:uri); this request is a POST, so the context
        // must say so or the device rejects the computed response.
        let mut context = digest_auth::AuthContext::new(user, password, path);
        context.method = digest_auth::HttpMethod::POST;
        let answer = prompt
            .respond(&context)
            .map_err(|e| Outcome::Protocol(format!("failed to compute digest response: {e}")))?;

        let authed = self
            .http
            .post(&url)
            .json(json)
            .header(reqwest::header::AUTHORIZATION, answer.to_header_string())
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = authed.status().as_u16();
        let body = authed.text().await.map_err(|e| classify_transport_error(&e))?;
        Ok((status, body))
    }
}
