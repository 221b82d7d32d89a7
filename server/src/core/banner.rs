//! Startup banner

use super::config::AppConfig;
use super::constants::APP_NAME;

/// Print the startup banner with the listen URL and mounted tables
pub fn print_banner(config: &AppConfig, data_dir: &str) {
    // Use localhost for display when binding to all interfaces
    let display_host = if config.server.host == "0.0.0.0" || config.server.host == "::" {
        "localhost"
    } else {
        config.server.host.as_str()
    };
    const W: usize = 10;

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m \x1b[36mhttp://{}:{}\x1b[0m",
        "Local:", display_host, config.server.port
    );

    let tables: Vec<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();
    if tables.is_empty() {
        println!("  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m none configured", "Tables:");
    } else {
        println!(
            "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
            "Tables:",
            tables.join(", ")
        );
    }

    match (config.ai.enabled, config.ai.url.as_deref()) {
        (true, Some(url)) => println!(
            "  \x1b[35m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
            "AI:", url
        ),
        _ => println!("  \x1b[90m➜  {:<W$} disabled\x1b[0m", "AI:"),
    }

    if config.ephemeral {
        println!("  \x1b[90m➜  {:<W$} in memory (--ephemeral)\x1b[0m", "Data:");
    } else {
        println!("  \x1b[90m➜  {:<W$} {}\x1b[0m", "Data:", data_dir);
    }
    println!();
}
