use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about = "Network driven LED matrix board")]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Path of the configuration file
    #[clap(long, short)]
    pub config: camino::Utf8PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Start all listeners and drive the display
    Run,

    /// Load the configuration, report problems and exit
    VerifyConfig,
}
