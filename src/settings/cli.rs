use super::Parser;

#[derive(Parser, Debug)]
pub struct Cli {
    /// Path to a TOML settings file.
    #[arg(long)]
    pub settings: Option<String>,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long)]
    pub json_logs: bool,
}
