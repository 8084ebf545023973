use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kelimelik::prelude::*;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "proxy",
    version,
    about = "Relay Kelimelik traffic and print every packet in both directions"
)]
struct Cli {
    /// Address to accept game clients on.
    #[arg(default_value = "0.0.0.0:443")]
    listen: String,
    /// Upstream server host.
    #[arg(long, default_value = Endpoint::GAME_SERVER_HOST)]
    host: String,
    /// Upstream server port.
    #[arg(long, default_value_t = Endpoint::GAME_SERVER_PORT)]
    port: u16,
    /// Show -100 coins in the client, to check that traffic really goes
    /// through the proxy. The server validates purchases, so this changes
    /// nothing but the display.
    #[arg(long)]
    rewrite_coins: bool,
}

/// Which end of the relay a packet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Client,
    Server,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "Client"),
            Self::Server => write!(f, "Server"),
        }
    }
}

#[derive(Debug, Clone)]
struct Relay {
    config: ClientConfig,
    rewrite_coins: bool,
}

// ---------------------------------------------------------------------------
// Packet rewriting
// ---------------------------------------------------------------------------

const PURCHASE_DATA: &str = "GameModule_userPurchaseData";
const COINS_SLOT: usize = 7;

/// Sets the coin balance in a purchase-data packet to -100 (as the client
/// reads it). Returns `false` and leaves the packet alone if it does not
/// have the expected shape.
fn rewrite_coins(packet: &mut Packet) -> Result<bool> {
    if !packet.is(PURCHASE_DATA) {
        return Ok(false);
    }
    if packet.slot_count() != 8 || packet.u32_at(COINS_SLOT).is_none() {
        tracing::warn!("unexpected {PURCHASE_DATA} layout, forwarding unchanged");
        return Ok(false);
    }
    packet.set(COINS_SLOT, (-100i32) as u32)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

impl Relay {
    async fn handle_client(self: Arc<Self>, client: TcpConnection) -> Result<()> {
        let upstream = kelimelik::transport::connect(&self.config.endpoint)
            .await
            .with_context(|| format!("connect to {}", self.config.endpoint))?
            .with_read_buffer_len(self.config.read_buffer_len);

        let client = Arc::new(client);
        let upstream = Arc::new(upstream);

        let to_server = tokio::spawn(Arc::clone(&self).pump(
            Arc::clone(&client),
            Arc::clone(&upstream),
            Side::Client,
        ));
        let to_client = tokio::spawn(Arc::clone(&self).pump(upstream, client, Side::Server));

        let (a, b) = tokio::join!(to_server, to_client);
        a??;
        b??;
        Ok(())
    }

    /// Forwards packets from `from` to `to` until `from` closes or fails.
    ///
    /// `to` is closed on every exit path so the opposite pump sees the
    /// shutdown and the pair winds down together.
    async fn pump(
        self: Arc<Self>,
        from: Arc<TcpConnection>,
        to: Arc<TcpConnection>,
        side: Side,
    ) -> Result<()> {
        let mut parser = StreamParser::with_config(self.config.parser.clone());

        let relayed = async {
            while let Some(bytes) = from.recv().await? {
                for mut packet in parser.feed(&bytes) {
                    println!("[{side}] [{}] Received: {packet}", from.id());
                    if self.rewrite_coins && side == Side::Server && rewrite_coins(&mut packet)? {
                        tracing::info!(id = %from.id(), "rewrote coin balance");
                    }
                    to.send(&encode(&packet)?).await?;
                    println!("Transmitted this data to {}.\n", to.id());
                }
            }
            Ok::<(), anyhow::Error>(())
        }
        .await;

        let stats = parser.stats();
        tracing::info!(
            id = %from.id(),
            %side,
            frames = stats.frames_decoded,
            rejected = stats.frames_rejected,
            failed = relayed.is_err(),
            "disconnected, closing peer {}",
            to.id()
        );
        if let Err(e) = to.close().await {
            tracing::debug!(id = %to.id(), error = %e, "peer already gone");
        }
        relayed
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let relay = Arc::new(Relay {
        config: ClientConfig::for_endpoint(Endpoint::new(cli.host, cli.port)),
        rewrite_coins: cli.rewrite_coins,
    });
    let mut transport = TcpTransport::bind(&cli.listen).await?;

    loop {
        let client = transport.accept().await?;
        tracing::info!(id = %client.id(), peer = %client.peer_addr(), "new connection");
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            let id = client.id();
            if let Err(e) = relay.handle_client(client).await {
                tracing::warn!(%id, error = %e, "relay ended with an error");
            }
        });
    }
}
