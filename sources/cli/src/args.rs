use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};

pub mod opts {
    /// Milliseconds a path lookup may take before the source counts as unavailable
    pub const LOCATE_TIMEOUT: &str = "locate.timeout";
    /// trace, debug, info, warn or error
    pub const LOG_LEVEL: &str = "log.level";
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long("cp"), global = true)]
    /// A list of paths to add to the application class path
    pub classpath: Vec<PathBuf>,

    #[arg(long, global = true)]
    /// A list of paths to add to the platform class path
    pub platform_path: Vec<PathBuf>,

    #[arg(long("boot"), value_parser = parse_pair::<PathBuf>, global = true)]
    /// Extra built-in classes, given as NAME=FILE
    pub boot: Vec<(String, PathBuf)>,

    #[arg(short('D'), value_parser = parse_pair::<String>, global = true)]
    /// Options, given as key=value
    pub options: Vec<(String, String)>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve classes through the application loader and report which loader defined them
    Resolve {
        /// The classes to resolve, in binary (a.b.C) or internal (a/b/C) form
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Describe every loader and its parent chain
    Chain,

    /// Print where every loader looks for classes
    Paths,
}

impl Cli {
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn locate_timeout(&self) -> anyhow::Result<Option<Duration>> {
        self.option(opts::LOCATE_TIMEOUT)
            .map(|ms| {
                ms.parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| anyhow::anyhow!("invalid {} {:?}: {}", opts::LOCATE_TIMEOUT, ms, e))
            })
            .transpose()
    }
}

fn parse_pair<T: From<String>>(raw: &str) -> Result<(String, T), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))?;

    if key.is_empty() {
        return Err(format!("missing key in {:?}", raw));
    }

    Ok((key.to_string(), T::from(value.to_string())))
}
