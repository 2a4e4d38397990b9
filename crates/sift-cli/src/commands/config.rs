//! Configuration command

use anyhow::Result;
use sift_core::config::default_config_path;
use sift_core::ClientConfig;

/// Print the resolved client configuration
pub fn cmd_config(config: &ClientConfig) -> Result<()> {
    println!("\n⚙️  Sift Configuration");
    println!("{}", "─".repeat(50));
    println!("  Server:          {}", config.base_url);
    println!("  Submit timeout:  {}s", config.submit_timeout.as_secs());
    println!("  Request timeout: {}s", config.request_timeout.as_secs());
    println!("  Upload chunk:    {} bytes", config.upload_chunk_size);

    let endpoints = &config.endpoints;
    println!("\n  Endpoints:");
    for (name, path) in [
        ("submit", &endpoints.submit),
        ("duplicate pair", &endpoints.duplicate_pair),
        ("receipt", &endpoints.receipt),
        ("list", &endpoints.list),
        ("approve", &endpoints.approve),
        ("reject", &endpoints.reject),
        ("insights", &endpoints.insights),
    ] {
        println!("    {:<15} {}", name, path);
    }

    println!();
    match &config.source {
        Some(path) => println!("  Loaded from:     {}", path.display()),
        None => println!("  Loaded from:     built-in defaults"),
    }
    if let Some(path) = default_config_path() {
        println!("  Override file:   {}", path.display());
    }
    println!();
    Ok(())
}
