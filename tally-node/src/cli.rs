use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "tally-node")]
#[command(about = "Leaderless poll node")]
pub struct Args {
    /// Node config file, created with defaults if missing
    #[arg(long = "config", value_name = "FILE", default_value = "config.json")]
    pub config_path: String,

    /// Invite link or pzp:// URI to consume on start
    #[arg(long, value_name = "URI")]
    pub invite: Option<String>,

    /// Display name to publish, overriding the config
    #[arg(long)]
    pub name: Option<String>,
}
