use anyhow::Result;

/// Parsed `--url` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerUrl {
    pub host: String,
    pub port: Option<u16>,
    /// `user@` prefix if one was given in the URL.
    pub user: Option<String>,
}

/// Accepts `host`, `host:port`, `user@host[:port]`, each optionally prefixed
/// with `sftp://` or `ssh://`, and a bracketed IPv6 literal (`[::1]:2222`).
pub fn parse_server_url(input: &str) -> Result<ServerUrl> {
    let s = input.trim();
    let s = s
        .strip_prefix("sftp://")
        .or_else(|| s.strip_prefix("ssh://"))
        .unwrap_or(s)
        .trim_end_matches('/');
    if s.is_empty() {
        return Err(anyhow::anyhow!("server url is empty"));
    }

    let (user, host_port) = match s.rfind('@') {
        Some(at) => {
            let (u, rest) = s.split_at(at);
            if u.is_empty() {
                return Err(anyhow::anyhow!("empty user name in url: {}", input));
            }
            (Some(u.to_string()), &rest[1..])
        }
        None => (None, s),
    };

    // bracketed IPv6 and host:port
    let (host, port_str) = if let Some(rest) = host_port.strip_prefix('[') {
        let close = rest.find(']').ok_or_else(|| anyhow::anyhow!("unclosed '[' in url: {}", input))?;
        let host = &rest[..close];
        let after = &rest[close + 1..];
        let port = match after.strip_prefix(':') {
            Some(p) => Some(p),
            None if after.is_empty() => None,
            None => return Err(anyhow::anyhow!("unexpected text after ']': {}", input)),
        };
        (host, port)
    } else if host_port.matches(':').count() == 1 {
        let (h, p) = host_port.split_at(host_port.rfind(':').unwrap_or(host_port.len()));
        (h, Some(&p[1..]))
    } else {
        // bare IPv6 without brackets, or a plain host
        (host_port, None)
    };
    if host.is_empty() {
        return Err(anyhow::anyhow!("empty host in url: {}", input));
    }
    let port = match port_str {
        Some(p) => Some(p.parse::<u16>().map_err(|_| anyhow::anyhow!("invalid port: {}", p))?),
        None => None,
    };
    Ok(ServerUrl { host: host.to_string(), port, user })
}
