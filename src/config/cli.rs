use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the latexml-render binary.
#[derive(Debug, Parser)]
#[command(
    name = "latexml-render",
    version,
    about = "Render TeX math to MathML through LaTeXML daemons"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "LATEXML_RENDER_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Convert one TeX expression and print the embeddable markup.
    Render(RenderArgs),
    /// Check that a MathML document is well-formed with an accepted root element.
    Validate(ValidateArgs),
    /// Print the form body that would be posted to the daemon.
    #[command(name = "post-data")]
    PostData(PostDataArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// TeX source of the expression.
    #[arg(value_name = "TEX")]
    pub tex: String,

    /// Pre-encoded LaTeXML options replacing the configured default.
    #[arg(long, value_name = "QUERY")]
    pub settings: Option<String>,

    /// Formula label; labelled output links to its formula page.
    #[arg(long, value_name = "LABEL")]
    pub label: Option<String>,

    /// Element id used for in-page references.
    #[arg(long = "tag-id", value_name = "ID")]
    pub tag_id: Option<String>,

    /// Skip the cache and always ask the daemon.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ValidateArgs {
    /// MathML file to check; reads standard input when omitted.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PostDataArgs {
    /// TeX source of the expression.
    #[arg(value_name = "TEX")]
    pub tex: String,

    /// Pre-encoded LaTeXML options replacing the configured default.
    #[arg(long, value_name = "QUERY")]
    pub settings: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the LaTeXML daemon URL; repeat to configure a pool.
    #[arg(long = "daemon-url", value_name = "URL", global = true)]
    pub daemon_urls: Vec<String>,

    /// Override the daemon request timeout.
    #[arg(long = "daemon-timeout-seconds", value_name = "SECONDS", global = true)]
    pub daemon_timeout_seconds: Option<u64>,

    /// Store conversions as JSON files in this directory.
    #[arg(
        long = "cache-dir",
        value_name = "PATH",
        value_hint = ValueHint::DirPath,
        global = true
    )]
    pub cache_dir: Option<PathBuf>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}
