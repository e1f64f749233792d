use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::info;
use server::config::CoordinatorConfig;
use server::dispatch;
use server::registry::Registry;
use tokio::net::TcpListener;

/// Main-method of the application.
/// Parses command-line arguments, then starts the game and allocation
/// listeners against one shared registry.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Address to bind both listeners on
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Port for the game wire protocol
        #[clap(short, long, default_value = "8090")]
        port: u16,
        /// Port for the out-of-band room allocation endpoint
        #[clap(short, long, default_value = "8091")]
        alloc_port: u16,
        /// Disconnect grace period in milliseconds
        #[clap(long, default_value = "10000")]
        grace_ms: u64,
        /// Points awarded per claimed word
        #[clap(long, default_value = "2")]
        points_per_word: u32,
    }

    env_logger::init();
    let args = Args::parse();

    let config = CoordinatorConfig {
        reconnect_grace: Duration::from_millis(args.grace_ms),
        points_per_word: args.points_per_word,
        ..CoordinatorConfig::default()
    };

    let registry = Arc::new(Registry::new());

    let game_listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    let alloc_listener = TcpListener::bind((args.host.as_str(), args.alloc_port)).await?;
    info!(
        "coordinator listening on {}:{} (allocation on port {})",
        args.host, args.port, args.alloc_port
    );

    let game_handle = {
        let registry = Arc::clone(&registry);
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatch::serve(game_listener, registry, config).await {
                eprintln!("game listener failed: {}", e);
            }
        })
    };

    let alloc_handle = {
        let registry = Arc::clone(&registry);
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatch::serve_allocator(alloc_listener, registry, config).await {
                eprintln!("allocation listener failed: {}", e);
            }
        })
    };

    // Handle shutdown gracefully
    tokio::select! {
        result = game_handle => {
            if let Err(e) = result {
                eprintln!("game task panicked: {}", e);
            }
        }
        result = alloc_handle => {
            if let Err(e) = result {
                eprintln!("allocation task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
