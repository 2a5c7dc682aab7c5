//! Command line arguments

use clap::Parser;
use std::path::PathBuf;

use crate::config::{Config, DEFAULT_CONFIG_FILE};

#[derive(Debug, Parser)]
#[command(name = "ezbox")]
#[command(about = "Watch GPIO pins and broadcast their changes over WebSocket")]
#[command(version)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Override the configured HTTP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Use simulated GPIO regardless of the configuration
    #[arg(long)]
    pub simulate: bool,
}

impl Cli {
    /// Apply command line overrides on top of the file configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.simulate {
            config.simulated_gpio_enabled = true;
        }
    }
}
