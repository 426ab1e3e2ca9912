//! Best-effort connectivity diagnostics
//!
//! Run before a network clone to make failures easier to interpret. Every
//! probe is bounded and purely informational: the result is a list of
//! human-readable lines, never an error, and nothing here gates the clone.

use std::process::Stdio;
use std::time::Duration;
use tokio::time::timeout;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Extract the host portion of a repository URL.
///
/// Understands `http://`/`https://` URLs and `git@host:path` scp syntax.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    if let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        let authority = rest.split('/').next()?;
        // Strip userinfo and port
        let host = authority.rsplit('@').next()?;
        let host = host.split(':').next()?;
        return (!host.is_empty()).then(|| host.to_string());
    }
    if let Some(rest) = url.strip_prefix("git@") {
        let host = rest.split(':').next()?;
        return (!host.is_empty()).then(|| host.to_string());
    }
    None
}

/// Platform-specific one-shot ping invocation
fn ping_argv(host: &str, timeout_secs: u64) -> Vec<String> {
    if cfg!(windows) {
        vec![
            "ping".to_string(),
            "-n".to_string(),
            "1".to_string(),
            "-w".to_string(),
            (timeout_secs * 1000).to_string(),
            host.to_string(),
        ]
    } else {
        vec![
            "ping".to_string(),
            "-c".to_string(),
            "1".to_string(),
            "-W".to_string(),
            timeout_secs.to_string(),
            host.to_string(),
        ]
    }
}

async fn probe_ping(host: &str) -> String {
    let argv = ping_argv(host, 5);
    let mut command = tokio::process::Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match timeout(PROBE_TIMEOUT, command.status()).await {
        Ok(Ok(status)) if status.success() => {
            format!("✓ Network connectivity to {host} is working")
        }
        Ok(Ok(_)) => format!("✗ Cannot reach {host} - network connectivity issue"),
        Ok(Err(_)) => "! Ping command not available for connectivity testing".to_string(),
        Err(_elapsed) => format!("✗ Ping to {host} timed out"),
    }
}

async fn probe_dns(host: &str) -> String {
    match timeout(PROBE_TIMEOUT, tokio::net::lookup_host((host, 443))).await {
        Ok(Ok(mut addrs)) => {
            if addrs.next().is_some() {
                format!("✓ DNS resolution for {host} is working")
            } else {
                format!("✗ DNS resolution failed for {host}")
            }
        }
        Ok(Err(_)) => format!("✗ DNS resolution failed for {host}"),
        Err(_elapsed) => format!("✗ DNS resolution for {host} timed out"),
    }
}

async fn probe_tls_port(host: &str) -> String {
    match timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect((host, 443))).await {
        Ok(Ok(_stream)) => format!("✓ TLS endpoint {host}:443 is reachable"),
        Ok(Err(err)) => format!("✗ Cannot reach TLS endpoint {host}:443: {err}"),
        Err(_elapsed) => format!("✗ Connection to {host}:443 timed out"),
    }
}

/// Probe connectivity towards the host of `url`.
///
/// Returns diagnostic lines (ping, DNS, and TLS-port reachability for https
/// URLs). Local or unparsable URLs produce a single informational line.
pub async fn diagnose_connectivity(url: &str) -> Vec<String> {
    let Some(host) = host_of(url) else {
        return vec![format!(
            "! Could not determine a remote host for {url}, skipping diagnostics"
        )];
    };

    let mut lines = vec![probe_ping(&host).await, probe_dns(&host).await];
    if url.starts_with("https://") {
        lines.push(probe_tls_port(&host).await);
    }
    lines
}
