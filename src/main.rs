use clap::Parser;
use serverless_webrtc::{DescriptorFormat, ServerConfig, SessionConfig};

/// Connect to a friend without a signaling server: swap descriptors by hand, then chat.
#[derive(Parser, Debug)]
#[command(name = "serverless-webrtc", version, about, long_about = None)]
struct CliArgs {
    /// Use STUN/TURN servers (default public STUN pair unless --ice-server is given)
    #[arg(long, env = "SSC_USE_RELAY")]
    relay: bool,

    /// ICE server url, repeatable (stun:host:port or turn:host:port)
    #[arg(long = "ice-server", value_name = "URL", env = "SSC_ICE_SERVERS", value_delimiter = ',')]
    ice_servers: Vec<String>,

    /// Username for TURN servers
    #[arg(long, env = "SSC_TURN_USERNAME")]
    turn_username: Option<String>,

    /// Credential for TURN servers
    #[arg(long, env = "SSC_TURN_CREDENTIAL")]
    turn_credential: Option<String>,

    /// Print descriptors gzip+base64 encoded (QR friendly)
    #[arg(long, env = "SSC_COMPACT")]
    compact: bool,

    /// Also offer loopback candidates (both peers on one machine)
    #[arg(long, env = "SSC_INCLUDE_LOOPBACK")]
    include_loopback: bool,
}

impl CliArgs {
    fn into_config(self) -> SessionConfig {
        let ice_servers = self
            .ice_servers
            .into_iter()
            .enumerate()
            .map(|(i, url)| {
                let is_turn = url.starts_with("turn:") || url.starts_with("turns:");
                ServerConfig {
                    id: format!("cli-{i}"),
                    r#type: if is_turn { "turn" } else { "stun" }.into(),
                    url,
                    username: is_turn.then(|| self.turn_username.clone()).flatten(),
                    credential: is_turn.then(|| self.turn_credential.clone()).flatten(),
                }
            })
            .collect();

        SessionConfig {
            use_relay_server: self.relay,
            ice_servers,
            descriptor_format: if self.compact {
                DescriptorFormat::Compact
            } else {
                DescriptorFormat::Json
            },
            include_loopback_candidates: self.include_loopback,
            ..SessionConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    serverless_webrtc::run(args.into_config()).await
}
