//! Reachability waiter: block until an address answers an authenticated
//! probe, or time out.
//!
//! Grounded in `network_utils.py::wait_for_camera_online`: on each poll,
//! link probe then TCP port probe then an authenticated GET of a trivial
//! CGI endpoint, generalized to the digest auth every later call needs
//! (the original used `HTTPDigestAuth` from `requests` directly).

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use camprov_common::Transport;

const LIVENESS_PATH: &str = "/axis-cgi/usergroup.cgi";

pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The distinguishable outcomes of a reachability wait. A device that is
/// up but rejects the supplied password is reported distinctly from one
/// that never answered at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityOutcome {
    Reachable,
    AuthFailed,
    TimedOut,
}

/// Block until `addr` answers an authenticated probe, or `max_wait`
/// elapses. Returns the outcome and the elapsed time.
pub async fn wait_for_reachable(
    addr: Ipv4Addr,
    user: &str,
    password: &str,
    transport: Transport,
    max_wait: Duration,
    poll_interval: Duration,
) -> (ReachabilityOutcome, Duration) {
    wait_for_reachable_on_port(addr, None, user, password, transport, max_wait, poll_interval).await
}

/// Same as [`wait_for_reachable`] but against a non-default port — the
/// transport's scheme-default port when `None`. Exists for test
/// harnesses stubbing a device behind an ephemeral port.
pub async fn wait_for_reachable_on_port(
    addr: Ipv4Addr,
    port: Option<u16>,
    user: &str,
    password: &str,
    transport: Transport,
    max_wait: Duration,
    poll_interval: Duration,
) -> (ReachabilityOutcome, Duration) {
    let port = port.unwrap_or_else(|| transport.default_port());
    info!(%addr, max_wait_secs = max_wait.as_secs(), "waiting for device to become reachable");

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .danger_accept_invalid_certs(true)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!(%addr, error = %e, "failed to build reachability http client");
            return (ReachabilityOutcome::TimedOut, Duration::ZERO);
        }
    };

    let start = Instant::now();

    while start.elapsed() < max_wait {
        let pingable = link_probe(addr).await;
        debug!(%addr, pingable, "link probe (logging only)");

        if tcp_port_open(addr, port).await {
            let url = format!("{}://{}:{}{}", transport.scheme(), addr, port, LIVENESS_PATH);

            let first = client.get(&url).send().await;
            match first {
                Ok(resp) if resp.status().as_u16() == 200 => {
                    info!(%addr, elapsed_secs = start.elapsed().as_secs(), "device reachable and answering unauthenticated");
                    return (ReachabilityOutcome::Reachable, start.elapsed());
                }
                Ok(resp) if resp.status().as_u16() == 401 => {
                    if let Some(outcome) = digest_probe(&client, &url, user, password, resp).await {
                        if outcome == ReachabilityOutcome::Reachable {
                            info!(%addr, elapsed_secs = start.elapsed().as_secs(), "device reachable, authentication succeeded");
                        } else {
                            warn!(%addr, "device reachable but authentication failed");
                        }
                        return (outcome, start.elapsed());
                    }
                }
                Ok(_) => {}
                Err(e) if is_tls_failure(&e) => {
                    // The web stack answered even if its certificate is
                    // self-signed or otherwise untrusted.
                    info!(%addr, "TLS negotiation failure treated as reachable");
                    return (ReachabilityOutcome::Reachable, start.elapsed());
                }
                Err(e) => {
                    debug!(%addr, error = %e, "reachability probe attempt failed");
                }
            }
        }

        tokio::time::sleep(poll_interval).await;
    }

    warn!(%addr, "timed out waiting for device to become reachable");
    (ReachabilityOutcome::TimedOut, start.elapsed())
}

/// Having received a 401 with a digest challenge, compute and send the
/// authenticated retry. Returns `None` if the challenge couldn't be
/// parsed, in which case the caller keeps polling.
async fn digest_probe(
    client: &reqwest::Client,
    url: &str,
    user: &str,
    password: &str,
    challenge_resp: reqwest::Response,
) -> Option<ReachabilityOutcome> {
    let challenge = challenge_resp
        .headers()
        .get(reqwest::header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())?
        .to_owned();

    let mut prompt = digest_auth::parse(&challenge).ok()?;
    let context = digest_auth::AuthContext::new(user, password, LIVENESS_PATH);
    let answer = prompt.respond(&context).ok()?;

    let authed = client
        .get(url)
        .header(reqwest::header::AUTHORIZATION, answer.to_header_string())
        .send()
        .await
        .ok()?;

    if authed.status().as_u16() == 200 {
        Some(ReachabilityOutcome::Reachable)
    } else if authed.status().as_u16() == 401 {
        Some(ReachabilityOutcome::AuthFailed)
    } else {
        None
    }
}

fn is_tls_failure(err: &reqwest::Error) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("certificate") || msg.contains("tls") || msg.contains("ssl")
}

async fn tcp_port_open(addr: Ipv4Addr, port: u16) -> bool {
    tokio::time::timeout(
        Duration::from_secs(2),
        tokio::net::TcpStream::connect((addr, port)),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false)
}

async fn link_probe(addr: Ipv4Addr) -> bool {
    let output = tokio::process::Command::new("ping")
        .args(["-c", "1", "-W", "2", &addr.to_string()])
        .output()
        .await;

    match output {
        Ok(o) => o.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_failure_detection_matches_common_messages() {
        assert!("certificate has expired".to_ascii_lowercase().contains("certificate"));
    }
}
