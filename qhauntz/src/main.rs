//! Qhauntz tabletop toolkit.
//!
//! A line-oriented terminal front end with four tabs: the character sheet,
//! the GM assistant, the dice roller and the rules reference.
//!
//! ```bash
//! cargo run -p qhauntz -- --rules house-rules.md --no-delay
//! ```

mod commands;
mod headless;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = headless::parse_config_from_args(&args);
    headless::run_headless(config).await.map_err(|e| e.into())
}

fn print_help() {
    println!("Qhauntz - tabletop toolkit");
    println!();
    println!("USAGE:");
    println!("    qhauntz [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --model <name>    Claude model for the GM assistant");
    println!("    --rules <path>    Read the rules reference from a markdown file");
    println!("    --no-delay        Show dice results without the rolling pause");
    println!("    -h, --help        Print this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    ANTHROPIC_API_KEY  Required for the GM tab (may be set in .env)");
    println!("    QHAUNTZ_MODEL      Default for --model");
    println!("    RUST_LOG           Log filter, logs go to stderr (default: warn)");
}
