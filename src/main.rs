// partsgate CLI - Parts-catalog gateway server and one-shot lookups
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

// Macro for conditional printing based on quiet flag
macro_rules! qprintln {
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            println!($($arg)*);
        }
    };
}
use partsgate::{
    create_gateway, init_logging_with_level, spawn_cache_sweeper, start_server, with_trace_id,
    GatewayConfig,
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "partsgate - Gateway to an external parts/vehicle catalog",
    long_about = None,
    after_help = "EXAMPLES:
  # Look up the vehicle behind a registration plate
  partsgate plate EB34033

  # List compatible brake parts with detail enrichment
  partsgate parts 19942 100001 --enrich

  # Run the HTTP API
  CATALOG_API_KEY=... partsgate serve --port 8080"
)]
struct Cli {
    /// Enable verbose logging (DEBUG level). Default is WARN level.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// TOML configuration file; environment variables override it
    #[arg(short, long, global = true, env = "PARTSGATE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP REST API server
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Look up vehicles by registration plate
    Plate {
        /// Registration plate, whitespace and case are ignored
        plate: String,
    },

    /// List compatible parts for a vehicle and assembly group
    Parts {
        vehicle_id: u64,
        assembly_group_id: u64,

        /// Replace the first articles with their detail records
        #[arg(long)]
        enrich: bool,
    },

    /// Show article detail by article number and brand
    Article { number: String, brand_id: u64 },

    /// Show the assembly-group hierarchy for a vehicle
    Groups { vehicle_id: u64 },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ignore error if already initialized
    let _ = init_logging_with_level(cli.verbose, cli.quiet);

    let quiet = cli.quiet;

    with_trace_id("partsgate-cli", async move {
        let config = GatewayConfig::load(cli.config.as_deref())?;
        let gateway = create_gateway(&config).await?;

        match cli.command {
            Commands::Serve { port } => {
                let port = port.unwrap_or(config.server.port);
                let _sweeper = spawn_cache_sweeper(gateway.clone(), config.cache.sweep_interval);

                qprintln!(quiet, "🚀 Starting partsgate on {}:{}", config.server.host, port);
                qprintln!(quiet, "📄 API endpoints:");
                qprintln!(quiet, "   GET /health");
                qprintln!(quiet, "   GET /api/vehicles/plate/:plate");
                qprintln!(quiet, "   GET /api/parts?vehicle_id=&assembly_group_id=&enrich=");
                qprintln!(quiet, "   GET /api/articles/:number?brand_id=");
                qprintln!(quiet, "   GET /api/assembly-groups/:vehicle_id");
                qprintln!(quiet, "   GET /api/cache/stats");
                if gateway.mock_mode() {
                    qprintln!(quiet, "⚠️  Mock mode: upstream catalog will not be called");
                }

                start_server(gateway, &config.server.host, port, config.server.enable_cors)
                    .await?;
            }
            Commands::Plate { plate } => {
                let vehicles = gateway.lookup_vehicle_by_plate(&plate).await?;
                if vehicles.is_empty() && !quiet {
                    eprintln!("No vehicles registered under {plate}");
                }
                print_json(&vehicles)?;
            }
            Commands::Parts {
                vehicle_id,
                assembly_group_id,
                enrich,
            } => {
                let listing = gateway
                    .parts_for_display(vehicle_id, assembly_group_id, enrich)
                    .await?;
                if listing.partial && !quiet {
                    eprintln!(
                        "⚠️  Partial listing: {} of {} articles after {} pages",
                        listing.articles.len(),
                        listing.total_matching,
                        listing.pages_fetched
                    );
                }
                print_json(&listing)?;
            }
            Commands::Article { number, brand_id } => {
                match gateway.fetch_article_detail(&number, brand_id).await? {
                    Some(article) => print_json(&article)?,
                    None => anyhow::bail!("Article {number} from brand {brand_id} not found"),
                }
            }
            Commands::Groups { vehicle_id } => {
                let tree = gateway.fetch_assembly_groups(vehicle_id).await?;
                print_json(&tree)?;
            }
        }

        Ok::<(), anyhow::Error>(())
    })
    .await
}
