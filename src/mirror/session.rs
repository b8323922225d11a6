use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::remote::Ssh2Remote;
use crate::MirrorError;

/// Where and as whom to connect. No Debug: it carries the password.
#[derive(Clone)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl ConnectTarget {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One authenticated SSH session with its SFTP channel. Dropping it closes
/// the channel and then the session, on every exit path.
pub struct Connection {
    sftp: Option<Ssh2Remote>,
    session: ssh2::Session,
}

impl Connection {
    pub fn remote(&self) -> Option<&Ssh2Remote> {
        self.sftp.as_ref()
    }

    /// Resolve `~` or a leading `~/` against the remote `$HOME`. Other paths,
    /// `~user` forms included, pass through.
    pub fn expand_remote_tilde(&self, path: &str) -> Result<String, MirrorError> {
        if path != "~" && !path.starts_with("~/") {
            return Ok(path.to_string());
        }
        let exec_err = |e: ssh2::Error| MirrorError::Connection(format!("resolve remote $HOME: {}", e));
        let mut channel = self.session.channel_session().map_err(exec_err)?;
        channel.exec("printf '%s' \"$HOME\"").map_err(exec_err)?;
        let mut out = String::new();
        channel
            .read_to_string(&mut out)
            .map_err(|e| MirrorError::Connection(format!("resolve remote $HOME: {}", e)))?;
        channel.wait_close().map_err(exec_err)?;
        let expanded = join_remote_home(&out, path)?;
        tracing::debug!("expanded remote path {} -> {}", path, expanded);
        Ok(expanded)
    }
}

// Replace the leading `~` of `path` with the home directory printed by the
// server. Anything that is not an absolute path counts as a failed lookup.
fn join_remote_home(output: &str, path: &str) -> Result<String, MirrorError> {
    let home = output.lines().next().unwrap_or("").trim();
    if !home.starts_with('/') {
        return Err(MirrorError::Connection(format!(
            "cannot resolve remote home directory for {} (got {:?})",
            path, home
        )));
    }
    let tail = path.trim_start_matches('~').trim_start_matches('/');
    Ok(if tail.is_empty() {
        home.to_string()
    } else {
        format!("{}/{}", home.trim_end_matches('/'), tail)
    })
}

impl Drop for Connection {
    fn drop(&mut self) {
        drop(self.sftp.take());
        if let Err(e) = self.session.disconnect(None, "mirror finished", None) {
            tracing::debug!("ssh disconnect: {}", e);
        }
        tracing::debug!("connection closed");
    }
}

fn create_tcp_connection(target: &ConnectTarget) -> Result<TcpStream, MirrorError> {
    let addr = target.addr();
    let mut addrs =
        addr.to_socket_addrs().map_err(|_| MirrorError::NoAddress(addr.clone()))?;
    let sock = addrs.next().ok_or_else(|| MirrorError::NoAddress(addr.clone()))?;
    let tcp = TcpStream::connect_timeout(&sock, target.connect_timeout)
        .map_err(|e| MirrorError::ConnectFailed { addr: addr.clone(), msg: e.to_string() })?;
    let _ = tcp.set_read_timeout(Some(target.io_timeout));
    let _ = tcp.set_write_timeout(Some(target.io_timeout));
    Ok(tcp)
}

/// Connect, handshake, authenticate with the password and open SFTP.
pub fn connect(target: &ConnectTarget) -> Result<Connection, MirrorError> {
    let addr = target.addr();
    let tcp = create_tcp_connection(target)?;
    let mut session =
        ssh2::Session::new().map_err(|_| MirrorError::SessionCreateFailed(addr.clone()))?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|_| MirrorError::HandshakeFailed(addr.clone()))?;

    if let Err(e) = session.userauth_password(&target.username, &target.password) {
        tracing::debug!("password auth failed for {}@{}: {}", target.username, addr, e);
    }
    if !session.authenticated() {
        return Err(MirrorError::AuthenticationFailed {
            addr,
            user: target.username.clone(),
        });
    }
    let sftp = session
        .sftp()
        .map_err(|e| MirrorError::Connection(format!("SFTP subsystem: {}", e)))?;
    tracing::info!("connected to {} as {}", addr, target.username);
    Ok(Connection { sftp: Some(Ssh2Remote(sftp)), session })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: &str, port: u16) -> ConnectTarget {
        ConnectTarget {
            host: host.to_string(),
            port,
            username: "nobody".into(),
            password: "secret".into(),
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn refused_port_fails_before_transfer() {
        // bind then drop to get a port with nothing listening
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let err = connect(&target("127.0.0.1", port)).err().unwrap();
        assert!(matches!(err, MirrorError::ConnectFailed { .. }), "got {:?}", err);
        assert!(err.is_connection_stage());
    }

    #[test]
    fn remote_home_is_joined_with_the_tail() {
        assert_eq!(join_remote_home("/home/ana\n", "~").unwrap(), "/home/ana");
        assert_eq!(join_remote_home("/home/ana", "~/data/set").unwrap(), "/home/ana/data/set");
        assert_eq!(join_remote_home("/", "~/x").unwrap(), "/x");
    }

    #[test]
    fn unusable_remote_home_is_an_error() {
        for out in ["", "~", "\n", "relative/home"] {
            let err = join_remote_home(out, "~/data").unwrap_err();
            assert!(matches!(err, MirrorError::Connection(_)), "{:?} gave {:?}", out, err);
        }
    }

    #[test]
    fn unresolvable_host_is_no_address() {
        let err = connect(&target("no-such-host.invalid", 22)).err().unwrap();
        assert!(matches!(err, MirrorError::NoAddress(_)), "got {:?}", err);
    }
}
