use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use kelimelik::prelude::*;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "account-info",
    version,
    about = "Log in to Kelimelik and print the account's profile"
)]
struct Cli {
    /// Numeric user id.
    uid: u32,
    /// Account password.
    password: String,
    /// Optional client config JSON (endpoint, parser limits).
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Client version the login request announces.
const CLIENT_VERSION: u32 = 238;

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq)]
struct Profile {
    username: String,
    email_address: String,
    win_ratio: u32,
    won: u32,
    total: u32,
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Done,
}

impl Profile {
    /// Folds one server packet into the profile.
    fn apply(&mut self, packet: &Packet) -> Result<Step> {
        match packet.header().to_string_lossy().as_ref() {
            "GameModule_loginRefused" => bail!("login refused"),
            "GameModule_loginAccepted" => {
                self.username = text_at(packet, 1)?;
                self.email_address = text_at(packet, 3)?;
            }
            "GameModule_userProfile" => {
                self.total = u32_at(packet, 1)?;
                self.won = u32_at(packet, 2)?;
                self.win_ratio = u32_at(packet, 5)?;
            }
            // The server sends this last.
            "GameModule_userPurchaseData" => return Ok(Step::Done),
            other => tracing::debug!(header = other, "ignoring packet"),
        }
        Ok(Step::Continue)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Username ........ {}", self.username)?;
        writeln!(f, "Email address ... {}", self.email_address)?;
        writeln!(f, "Win ratio ....... {}%", self.win_ratio)?;
        writeln!(f, "Completed games . {}", self.total)?;
        writeln!(f, "Won games ....... {}", self.won)?;
        write!(f, "Lost games ...... {}", self.total.saturating_sub(self.won))
    }
}

fn text_at(packet: &Packet, index: usize) -> Result<String> {
    packet
        .str_at(index)
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("{}: slot {index} is not a string", packet.header()))
}

fn u32_at(packet: &Packet, index: usize) -> Result<u32> {
    packet
        .u32_at(index)
        .ok_or_else(|| anyhow!("{}: slot {index} is not a u32", packet.header()))
}

fn login_request(uid: u32, password: &str) -> Result<Packet, ProtocolError> {
    let mut packet = Packet::new("GameModule_requestLogin", 3)?;
    packet.set(0, uid)?;
    packet.set_str(1, password)?;
    packet.set(2, CLIENT_VERSION)?;
    Ok(packet)
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(ClientConfig::from_json(&json)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let mut conn = PacketConnection::connect(&config)
        .await
        .with_context(|| format!("connect to {}", config.endpoint))?;
    conn.send(&login_request(cli.uid, &cli.password)?).await?;

    let mut profile = Profile::default();
    loop {
        let Some(packet) = conn.next_packet().await? else {
            bail!("server closed the connection before sending the full profile");
        };
        tracing::trace!("received packet:\n{packet}");
        if profile.apply(&packet)? == Step::Done {
            break;
        }
    }

    println!("{profile}");
    Ok(())
}
