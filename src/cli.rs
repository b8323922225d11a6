use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::config::{Config, expand_local_tilde};
use crate::mirror::session::ConnectTarget;
use crate::mirror::{MirrorArgs, SkipPolicy, SyncOptions};

/// Largest accepted copy buffer, in KiB (64 MiB).
pub const MAX_BUF_KIB: usize = 64 * 1024;

#[derive(Parser)]
#[clap(author, version, about = "Mirror a remote SFTP directory tree to a local directory", long_about = None)]
pub struct Cli {
    #[clap(long, help = "SFTP server, host[:port] (sftp:// prefix allowed)", display_order = 1)]
    pub url: String,
    #[clap(long, help = "SFTP username", display_order = 2)]
    pub username: String,
    #[clap(long, help = "SFTP password", display_order = 3)]
    pub password: String,
    #[clap(long = "remote-dir", help = "Remote directory to download from", display_order = 4)]
    pub remote_dir: String,
    #[clap(long = "local-dir", help = "Local directory to download to", display_order = 5)]
    pub local_dir: String,

    #[clap(short = 'p', long, help = "SSH port, overrides a port given in --url (default 22)")]
    pub port: Option<u16>,
    #[clap(long = "skip-policy", value_enum, help = "When an existing local file counts as done")]
    pub skip_policy: Option<SkipPolicyArg>,
    #[clap(long, help = "Process entries in name order instead of server listing order")]
    pub sort: bool,
    #[clap(long, help = "Fail when the local file count differs from the remote one")]
    pub strict: bool,
    #[clap(long = "max-depth", help = "Abort when the remote tree is deeper than this")]
    pub max_depth: Option<usize>,
    #[clap(long = "buf-kib", help = "Copy buffer size in KiB (default 256)")]
    pub buf_kib: Option<usize>,
    #[clap(long, help = "Config file (default ~/.sftp-mirror/config.json)")]
    pub config: Option<PathBuf>,
    #[clap(short, long, help = "Write debug logs to the log directory")]
    pub verbose: bool,
    #[clap(short, long, help = "Only print the final summary")]
    pub quiet: bool,
    #[clap(long, help = "Print the summary as one JSON line")]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SkipPolicyArg {
    /// skip any file that exists locally
    Exists,
    /// skip only when the local size equals the remote size
    Size,
}

impl From<SkipPolicyArg> for SkipPolicy {
    fn from(a: SkipPolicyArg) -> Self {
        match a {
            SkipPolicyArg::Exists => SkipPolicy::Exists,
            SkipPolicyArg::Size => SkipPolicy::Size,
        }
    }
}

impl Cli {
    /// Merge flags over file defaults into the arguments for one run.
    pub fn into_args(self, config: &Config) -> Result<MirrorArgs> {
        let url = crate::parse::parse_server_url(&self.url)?;
        if let Some(u) = url.user.as_deref()
            && u != self.username
        {
            tracing::warn!("user '{}' in --url ignored, using --username '{}'", u, self.username);
        }
        let buf_size = match self.buf_kib {
            Some(k) if k == 0 || k > MAX_BUF_KIB => {
                return Err(anyhow::anyhow!("--buf-kib must be between 1 and {}", MAX_BUF_KIB));
            }
            Some(k) => k * 1024,
            None if config.buf_size == 0 || config.buf_size > MAX_BUF_KIB * 1024 => {
                return Err(anyhow::anyhow!(
                    "buf_size in config must be between 1 and {} bytes",
                    MAX_BUF_KIB * 1024
                ));
            }
            None => config.buf_size,
        };
        if self.remote_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("--remote-dir is empty"));
        }
        let target = ConnectTarget {
            host: url.host,
            port: self.port.or(url.port).unwrap_or(22),
            username: self.username,
            password: self.password,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs.max(1)),
            io_timeout: Duration::from_secs(config.io_timeout_secs.max(1)),
        };
        Ok(MirrorArgs {
            target,
            remote_dir: self.remote_dir,
            local_dir: expand_local_tilde(&self.local_dir),
            options: SyncOptions {
                skip_policy: self.skip_policy.map(Into::into).unwrap_or(config.skip_policy),
                sort_entries: self.sort || config.sort_entries,
                max_depth: self.max_depth.or(config.max_depth),
                buf_size,
            },
            strict: self.strict || config.strict_counts,
            quiet: self.quiet,
            json: self.json,
        })
    }
}
