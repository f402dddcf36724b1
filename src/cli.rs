//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::HardwareMode;

#[derive(Debug, Parser)]
#[command(name = "edge-agent")]
#[command(version)]
#[command(about = "Edge agent bridging local sensors and valves to a backend", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "EDGE_AGENT_CONFIG", default_value = "edge-agent.toml")]
    pub config: PathBuf,

    /// Override the hardware mode from the configuration
    #[arg(short, long, value_parser = parse_mode)]
    pub mode: Option<HardwareMode>,

    /// Log filter, e.g. `info` or `edge_agent=debug` (defaults to RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check: bool,
}

fn parse_mode(s: &str) -> Result<HardwareMode, String> {
    s.parse().map_err(|e: crate::error::ConfigError| e.to_string())
}
