//! Waypoint - Route costs over a framed binary protocol
//!
//! A server that answers location listings and least-cost route queries,
//! and a client that asks for them.

mod config;
mod network;
mod protocol;
mod route;
mod service;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use network::{Client, MessageHandler, Server};
use protocol::{Message, MessageFactory, KNOWN_MESSAGE_IDS};
use route::{FileLocationSource, FileRouteSource, RoutePlanner};
use service::{ClientDriver, RouteService};

/// Waypoint - Least-cost routes between locations
#[derive(Parser)]
#[command(name = "waypoint")]
#[command(author = "Waypoint Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Serve and query least-cost routes between locations", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the route server
    Server {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(short, long)]
        bind: Option<String>,

        /// Locations CSV file
        #[arg(short, long)]
        locations: Option<PathBuf>,

        /// Routes CSV file
        #[arg(short, long)]
        routes: Option<PathBuf>,
    },

    /// List locations and optionally price a route
    Client {
        /// Server address to connect to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Start and end location names
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        route: Option<Vec<String>>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Write the generated or current config to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose || config.general.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Server {
            port,
            bind,
            locations,
            routes,
        } => {
            run_server(config, port, bind, locations, routes).await?;
        }
        Commands::Client { host, port, route } => {
            let route = route.and_then(|names| match <[String; 2]>::try_from(names) {
                Ok([start, end]) => Some((start, end)),
                Err(_) => None,
            });
            run_client(config, host, port, route).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else if let Some(path) = output {
                config.save(&path)?;
                println!("Configuration written to: {}", path.display());
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_protocol_info();
        }
    }

    Ok(())
}

/// Run the route server
async fn run_server(
    config: Config,
    port: Option<u16>,
    bind: Option<String>,
    locations: Option<PathBuf>,
    routes: Option<PathBuf>,
) -> anyhow::Result<()> {
    let locations = locations
        .or_else(|| config.data.locations.clone())
        .context("No locations file given; use --locations or set data.locations")?;
    let routes = routes
        .or_else(|| config.data.routes.clone())
        .context("No routes file given; use --routes or set data.routes")?;

    let mut planner = RoutePlanner::new(
        Box::new(FileLocationSource::new(&locations)),
        Box::new(FileRouteSource::new(&routes)),
    );
    let count = planner.setup_routes().len();
    if count == 0 {
        anyhow::bail!(
            "No locations loaded from {} and {}",
            locations.display(),
            routes.display()
        );
    }

    let mut net_config = config.net_config(port);
    if let Some(bind) = bind {
        net_config = net_config.with_bind_address(bind);
    }

    let service = Arc::new(RouteService::new(planner));
    let handler: MessageHandler = Arc::new(move |message: Message| service.handle(message));

    let server = Server::bind(net_config, Arc::new(MessageFactory::new()), handler).await?;
    let local_addr = server.local_addr()?;

    println!("\n========================================");
    println!("  Waypoint Server Running");
    println!("========================================");
    println!("  Address: {}", local_addr);
    println!("  Locations: {} ({})", locations.display(), count);
    println!("  Routes: {}", routes.display());
    println!("========================================");
    println!("\nPress Ctrl+C to stop.\n");

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Run the client
async fn run_client(
    config: Config,
    host: String,
    port: Option<u16>,
    route: Option<(String, String)>,
) -> anyhow::Result<()> {
    let net_config = config.net_config(port);

    // The client session uses blocking sockets
    let driver = tokio::task::spawn_blocking(move || -> anyhow::Result<ClientDriver> {
        let mut client = Client::new(net_config, Arc::new(MessageFactory::new()));
        let mut driver = ClientDriver::new(route);

        println!("Connecting to {}...", host);
        client.connect(&host)?;
        client.run(driver.initial_message(), |message| driver.handle(message))?;
        client.disconnect()?;

        Ok(driver)
    })
    .await??;

    println!("\nLocations:");
    for (i, name) in driver.locations().iter().enumerate() {
        println!("  {:>3}. {}", i + 1, name);
    }

    if let Some(cost) = driver.cost() {
        println!("\nRoute cost: {}", cost);
    }

    Ok(())
}

/// Print protocol information
fn print_protocol_info() {
    let factory = MessageFactory::new();

    println!("Waypoint Protocol Information");
    println!("=============================\n");

    println!("Default Port: {}", protocol::DEFAULT_PORT);
    println!("Header Size: {} bytes", protocol::HEADER_SIZE);
    println!("Max Message Size: {} bytes", factory.max_length());
    println!("Byte Order: big-endian\n");

    println!("Messages:");
    for id in KNOWN_MESSAGE_IDS {
        if let Some(message) = factory.create(id) {
            println!("  {:>4}  {:<18} {:>4} bytes", id, message_name(&message), message.length());
        }
    }
}

fn message_name(message: &Message) -> &'static str {
    use protocol::MessageBody;

    match message.body() {
        MessageBody::Header => "Header",
        MessageBody::StatusRequest => "StatusRequest",
        MessageBody::StatusResponse => "StatusResponse",
        MessageBody::LocationsRequest(_) => "LocationsRequest",
        MessageBody::LocationsResponse(_) => "LocationsResponse",
        MessageBody::RouteRequest(_) => "RouteRequest",
        MessageBody::RouteResponse(_) => "RouteResponse",
    }
}
