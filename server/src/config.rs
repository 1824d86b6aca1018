//! Command line and environment configuration.

use std::net::SocketAddr;

use anyhow::{bail, Context};
use clap::Parser;
use url::Url;

use radio_ipc::RelayConfig;

/// Real-time audio relay: reads PCM from a pipe, encodes it to Opus and
/// serves it to browsers over WebRTC.
///
/// Unset options fall back to built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "radio-relay", version, about)]
pub struct Cli {
    /// HTTP listen address [default: 0.0.0.0:8080].
    #[arg(long, env = "RADIO_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// FIFO the producer writes s16le stereo PCM into [default: /tmp/audio_pipe].
    #[arg(long, env = "RADIO_PIPE_PATH")]
    pub pipe_path: Option<String>,

    /// File the producer polls for genre changes [default: /tmp/genre_request.txt].
    #[arg(long, env = "RADIO_SIGNAL_PATH")]
    pub signal_path: Option<String>,

    /// Token written before the genre name [default: SMOOTH:].
    #[arg(long, env = "RADIO_SIGNAL_PREFIX")]
    pub signal_prefix: Option<String>,

    /// Genre reported at startup [default: lofi hip hop].
    #[arg(long, env = "RADIO_DEFAULT_GENRE")]
    pub default_genre: Option<String>,

    /// STUN/TURN server URL, repeatable or comma separated.
    #[arg(long = "ice-server", env = "RADIO_ICE_SERVERS", value_delimiter = ',')]
    pub ice_servers: Option<Vec<String>>,

    /// Use no ICE servers (host candidates only).
    #[arg(long, conflicts_with = "ice_servers")]
    pub no_ice_servers: bool,

    /// Delay between producer open attempts in milliseconds [default: 2000].
    #[arg(long, env = "RADIO_RECONNECT_DELAY_MS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Opus bitrate in kbps [default: 128].
    #[arg(long, env = "RADIO_BITRATE_KBPS")]
    pub bitrate_kbps: Option<u32>,

    /// Opus complexity 0-10 [default: 8].
    #[arg(long, env = "RADIO_COMPLEXITY", value_parser = clap::value_parser!(u8).range(0..=10))]
    pub complexity: Option<u8>,

    /// Disable Opus in-band forward error correction.
    #[arg(long, env = "RADIO_NO_FEC")]
    pub no_fec: bool,

    /// Expected packet loss percentage [default: 5].
    #[arg(long, env = "RADIO_PACKET_LOSS_PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub packet_loss_percent: Option<u8>,

    /// Packets buffered per session before it is dropped [default: 50].
    #[arg(long, env = "RADIO_SESSION_QUEUE")]
    pub session_queue: Option<usize>,

    /// Notifications buffered per subscriber before it is dropped [default: 10].
    #[arg(long, env = "RADIO_NOTIFICATION_QUEUE")]
    pub notification_queue: Option<usize>,

    /// Upper bound on ICE gathering in milliseconds [default: 10000].
    #[arg(long, env = "RADIO_GATHER_TIMEOUT_MS")]
    pub gather_timeout_ms: Option<u64>,
}

impl Cli {
    /// Merge the arguments over the defaults and validate the result.
    pub fn into_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = RelayConfig::default();

        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(path) = self.pipe_path {
            config.pipe_path = path;
        }
        if let Some(path) = self.signal_path {
            config.signal_path = path;
        }
        if let Some(prefix) = self.signal_prefix {
            config.signal_prefix = prefix;
        }
        if let Some(genre) = self.default_genre {
            config.default_genre = genre;
        }
        if self.no_ice_servers {
            config.ice_servers.clear();
        } else if let Some(servers) = self.ice_servers {
            config.ice_servers = servers
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(delay) = self.reconnect_delay_ms {
            config.reconnect_delay_ms = delay;
        }
        if let Some(bitrate) = self.bitrate_kbps {
            config.bitrate_kbps = bitrate;
        }
        if let Some(complexity) = self.complexity {
            config.complexity = complexity;
        }
        if self.no_fec {
            config.inband_fec = false;
        }
        if let Some(loss) = self.packet_loss_percent {
            config.packet_loss_percent = loss;
        }
        if let Some(capacity) = self.session_queue {
            config.session_queue_capacity = capacity;
        }
        if let Some(capacity) = self.notification_queue {
            config.notification_queue_capacity = capacity;
        }
        if let Some(timeout) = self.gather_timeout_ms {
            config.gather_timeout_ms = timeout;
        }

        for server in &config.ice_servers {
            validate_ice_server(server)?;
        }
        if config.session_queue_capacity == 0 || config.notification_queue_capacity == 0 {
            bail!("queue capacities must be at least 1");
        }
        if config.reconnect_delay_ms == 0 {
            bail!("reconnect delay must be positive");
        }

        Ok(config)
    }
}

/// Check that `server` is a STUN or TURN URL.
pub fn validate_ice_server(server: &str) -> anyhow::Result<()> {
    let url = Url::parse(server).with_context(|| format!("invalid ICE server URL {server:?}"))?;

    match url.scheme() {
        "stun" | "stuns" | "turn" | "turns" => Ok(()),
        other => bail!("unsupported ICE server scheme {other:?} in {server:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_arguments() {
        let cli = Cli::try_parse_from(["radio-relay"]).unwrap();
        let config = cli.into_config().unwrap();

        assert_eq!(config.pipe_path, "/tmp/audio_pipe");
        assert_eq!(config.ice_servers, vec!["stun:stun.l.google.com:19302"]);
        assert!(config.inband_fec);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "radio-relay",
            "--listen",
            "127.0.0.1:9000",
            "--ice-server",
            "stun:a.example:3478,turn:b.example:3478",
            "--complexity",
            "5",
            "--no-fec",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();

        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.ice_servers.len(), 2);
        assert_eq!(config.complexity, 5);
        assert!(!config.inband_fec);
    }

    #[test]
    fn test_rejects_out_of_range_complexity() {
        assert!(Cli::try_parse_from(["radio-relay", "--complexity", "11"]).is_err());
    }

    #[test]
    fn test_ice_server_schemes() {
        assert!(validate_ice_server("stun:stun.l.google.com:19302").is_ok());
        assert!(validate_ice_server("turns:relay.example:443?transport=tcp").is_ok());
        assert!(validate_ice_server("http://example.com").is_err());
        assert!(validate_ice_server("not a url").is_err());
    }

    #[test]
    fn test_no_ice_servers() {
        let cli = Cli::try_parse_from(["radio-relay", "--no-ice-servers"]).unwrap();
        assert!(cli.into_config().unwrap().ice_servers.is_empty());
    }
}
