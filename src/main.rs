use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use agenti_core::{
    Catalog, Config, GeminiClient, GenerationClient, Listing, OllamaClient, Provider, Sector,
    SectorFilter,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::{format_price, App};
use tui::{EventHandler, TICK_RATE};

#[derive(Parser)]
#[command(name = "agenti")]
#[command(about = "Browse, buy and test-drive AI agents from the terminal")]
#[command(version)]
struct Cli {
    /// Load listings from a JSON file instead of the built-in catalog
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List marketplace agents
    List {
        /// Only show one sector, e.g. "Customer Support"
        #[arg(short, long)]
        sector: Option<String>,
        /// Case-insensitive match on name or description
        #[arg(short = 'q', long)]
        search: Option<String>,
    },
    /// Show one listing in full
    Show {
        id: String,
    },
    /// Send a single message to an agent's live demo
    Chat {
        id: String,
        message: String,
    },
    /// Draft a listing from a one-line idea
    Draft {
        idea: String,
    },
    /// List models for the configured provider
    Models {
        /// Save this model as the default
        #[arg(long = "use")]
        use_model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        None => init_file_logging()?,
        Some(_) => init_stderr_logging(),
    }

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read config, using defaults");
        Config::new()
    });

    let catalog = match &cli.catalog {
        Some(path) => Catalog::load_from_json(path)
            .await
            .with_context(|| format!("failed to load catalog from {}", path.display()))?,
        None => Catalog::builtin()?,
    };

    match cli.command {
        None => run_tui(catalog, &config).await,
        Some(Commands::List { sector, search }) => list_listings(&catalog, sector.as_deref(), search.as_deref()),
        Some(Commands::Show { id }) => show_listing(&catalog, &id),
        Some(Commands::Chat { id, message }) => chat_once(&catalog, &config, &id, &message).await,
        Some(Commands::Draft { idea }) => draft_once(&config, &idea).await,
        Some(Commands::Models { use_model }) => list_models(&config, use_model.as_deref()).await,
    }
}

/// The TUI owns the terminal, so its logs go to a file
fn init_file_logging() -> Result<()> {
    let dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find local data directory"))?
        .join("agenti");
    std::fs::create_dir_all(&dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("agenti.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

async fn run_tui(catalog: Catalog, config: &Config) -> Result<()> {
    let client = GenerationClient::from_config(config);
    let delay = Duration::from_millis(config.purchase_delay_ms());
    tracing::info!(
        listings = catalog.len(),
        provider = config.provider().as_str(),
        model = client.model(),
        "starting TUI"
    );

    let mut app = App::new(catalog, client, delay);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK_RATE);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

fn parse_sector(name: &str) -> Result<Sector> {
    Sector::from_label(name).ok_or_else(|| {
        let known: Vec<&str> = Sector::all().iter().map(|s| s.label()).collect();
        anyhow::anyhow!("Unknown sector '{}'. Expected one of: {}", name, known.join(", "))
    })
}

fn list_listings(catalog: &Catalog, sector: Option<&str>, search: Option<&str>) -> Result<()> {
    let filter = match sector {
        Some(name) => SectorFilter::Only(parse_sector(name)?),
        None => SectorFilter::All,
    };
    let listings = catalog.filter(&filter, search.unwrap_or(""));

    println!("\n{}", format!("AGENT-i Marketplace: {}", filter.label()).bold().blue());
    println!("{}", "=".repeat(40).dimmed());

    if listings.is_empty() {
        println!("{}", "No agents match.".yellow());
        return Ok(());
    }

    for listing in listings {
        println!(
            "  {:>3}  {}  {}  {}  {}",
            listing.id.dimmed(),
            listing.name.bold(),
            format!("[{}]", listing.sector).magenta(),
            format!("★{:.1}", listing.rating).yellow(),
            format!("${}/mo", format_price(listing.pricing.monthly)).green(),
        );
        println!("       {}", listing.tagline.dimmed());
    }
    Ok(())
}

fn print_listing(listing: &Listing) {
    println!("\n{}", listing.name.bold().green());
    println!("{}", listing.tagline.italic());
    println!(
        "{} · by {} · {} ({} reviews)",
        listing.sector.to_string().magenta(),
        listing.creator,
        format!("★{:.1}", listing.rating).yellow(),
        listing.reviews_count
    );
    println!("{}", "=".repeat(40).dimmed());
    println!("{}\n", listing.description);
    for capability in &listing.capabilities {
        println!("  • {}", capability);
    }
    println!(
        "\n{} ${}/mo or ${}/yr",
        "Pricing:".bold(),
        format_price(listing.pricing.monthly),
        format_price(listing.pricing.yearly)
    );
    if let Some(prompt) = &listing.demo_prompt {
        println!("{} {}", "Try asking:".bold(), prompt.cyan());
    }
}

fn show_listing(catalog: &Catalog, id: &str) -> Result<()> {
    match catalog.get(id) {
        Ok(listing) => print_listing(listing),
        Err(e) => println!("{}", e.to_string().red()),
    }
    Ok(())
}

async fn chat_once(catalog: &Catalog, config: &Config, id: &str, message: &str) -> Result<()> {
    let listing = catalog.get(id)?;
    let client = GenerationClient::from_config(config);

    println!("{} {}", "You:".bold().cyan(), message);
    println!("🤖 Asking {} ({})...\n", listing.name.bold().magenta(), client.model());

    let reply = client
        .converse(&listing.name, &listing.persona_summary(), &[], message)
        .await;
    println!("{} {}", format!("{}:", listing.name).bold().yellow(), reply);
    Ok(())
}

async fn draft_once(config: &Config, idea: &str) -> Result<()> {
    let client = GenerationClient::from_config(config);
    println!("🤖 Drafting a listing with {}...\n", client.model().bold().magenta());

    match client.draft_listing(idea).await {
        Some(draft) => {
            println!("{}", draft.name.bold().green());
            println!("{}\n", draft.tagline.italic());
            println!("{}\n", draft.description);
            if draft.capabilities.is_empty() {
                println!("{}", "(no capabilities suggested)".dimmed());
            }
            for capability in &draft.capabilities {
                println!("  • {}", capability);
            }
        }
        None => {
            println!("{}", "Could not draft a listing right now.".red());
            if !client.is_configured() {
                println!("Set an API key: {}", "export GEMINI_API_KEY=...".bold());
            }
        }
    }
    Ok(())
}

async fn list_models(config: &Config, use_model: Option<&str>) -> Result<()> {
    if let Some(model) = use_model {
        Config::save_default_model(model)?;
        println!("{} {}", "Default model set to".green(), model.bold());
        return Ok(());
    }

    let provider = config.provider();
    println!("\n{}", format!("🤖 {} models", provider.display_name()).bold().blue());
    println!("{}", "=".repeat(30).dimmed());

    let current = config.model();
    let models = match provider {
        Provider::Gemini => GeminiClient::list_models(),
        Provider::Ollama => {
            let ollama = OllamaClient::new(&config.ollama_url(), &current);
            match ollama.list_models().await {
                Ok(models) => models,
                Err(e) => {
                    println!("{}: {}", "Error connecting to Ollama".red(), e);
                    println!("Make sure Ollama is running: {}", "ollama serve".bold());
                    return Ok(());
                }
            }
        }
    };

    if models.is_empty() {
        println!("{}", "No models found. Pull a model with: ollama pull llama3.2".yellow());
    }
    for model in models {
        if model == current {
            println!("  • {} {}", model.green(), "(default)".dimmed());
        } else {
            println!("  • {}", model.green());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sector_is_case_insensitive() {
        assert_eq!(parse_sector("customer support").unwrap(), Sector::CustomerSupport);
        assert_eq!(parse_sector(" Legal ").unwrap(), Sector::Legal);
        assert!(parse_sector("Astrology").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["agenti", "list", "--sector", "Sales", "-q", "lead"]).unwrap();
        match cli.command {
            Some(Commands::List { sector, search }) => {
                assert_eq!(sector.as_deref(), Some("Sales"));
                assert_eq!(search.as_deref(), Some("lead"));
            }
            _ => panic!("expected list"),
        }

        let cli = Cli::try_parse_from(["agenti"]).unwrap();
        assert!(cli.command.is_none());
    }
}
