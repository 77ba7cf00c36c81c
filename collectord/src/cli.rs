//! Component I: command-line flags, kept close to the original collector's
//! `getopt` surface (`-c -g -d -h`) so existing invocations keep working.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "collectord", about = "SNMP/system telemetry collector")]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Accepted for config-file compatibility with the original daemonize flag;
    /// this process never forks, so the flag is otherwise inert.
    #[arg(short = 'g', long = "daemonize", default_value_t = false)]
    pub daemonize: bool,

    /// Overrides the config file's `debug` verbosity threshold.
    #[arg(short = 'd', long = "debug")]
    pub debug: Option<u8>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
