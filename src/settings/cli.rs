use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "session-guard", about = "Session security endpoints and maintenance")]
pub struct Cli {
    /// Path to a TOML settings file.
    #[arg(long)]
    pub settings: Option<String>,

    /// Run one maintenance sweep and exit instead of serving.
    #[arg(long, default_value_t = false)]
    pub sweep_once: bool,
}
