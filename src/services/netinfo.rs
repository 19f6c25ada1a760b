//! Primary outbound IP detection for bot bootstrap (spec §4.5), grounded in
//! `original_source/services/system_service.py`. No pure-Rust cross-platform
//! "default route" lookup exists in the teacher's or pack's dependency
//! stack, so this shells out the same way the original does.

use tokio::process::Command;
use tracing::debug;

/// `ip route get 1` on Linux, falling back to the macOS `route -n get
/// default` + interface-address dance, falling back to `0.0.0.0`.
pub async fn detect_primary_ip() -> String {
    if let Some(ip) = detect_with_ip_route().await {
        return ip;
    }
    if let Some(ip) = detect_with_route_get().await {
        return ip;
    }
    debug!("falling back to 0.0.0.0 for primary IP detection");
    "0.0.0.0".to_string()
}

async fn detect_with_ip_route() -> Option<String> {
    let output = run(&["ip", "route", "get", "1"]).await?;
    parse_src_field(&output)
}

fn parse_src_field(stdout: &str) -> Option<String> {
    let idx = stdout.find("src ")?;
    let rest = &stdout[idx + 4..];
    let ip = rest.split_whitespace().next()?.to_string();
    if ip.is_empty() || ip.starts_with("127.") {
        None
    } else {
        Some(ip)
    }
}

async fn detect_with_route_get() -> Option<String> {
    if !cfg!(target_os = "macos") {
        return None;
    }
    let output = run(&["route", "-n", "get", "default"]).await?;
    let idx = output.find("interface: ")?;
    let rest = &output[idx + "interface: ".len()..];
    let interface = rest.split_whitespace().next()?;

    if let Some(output) = run(&["ipconfig", "getifaddr", interface]).await {
        let ip = output.trim();
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }
    None
}

async fn run(args: &[&str]) -> Option<String> {
    let output = Command::new(args[0]).args(&args[1..]).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_src_field_from_ip_route_output() {
        let stdout = "1.0.0.0 via 10.0.0.1 dev eth0 src 10.0.0.42 uid 1000\n";
        assert_eq!(parse_src_field(stdout), Some("10.0.0.42".to_string()));
    }

    #[test]
    fn rejects_loopback_src() {
        let stdout = "1.0.0.0 via 127.0.0.1 dev lo src 127.0.0.1\n";
        assert_eq!(parse_src_field(stdout), None);
    }
}
