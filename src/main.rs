use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use threat_ai::api::{ApiClient, ExportFormat, Role, ThreatIntelApi};
use threat_ai::config::Config;
use threat_ai::history::HistorySearch;
use threat_ai::logging::init_logging;
use threat_ai::markup::sanitize_terminal;
use threat_ai::query::{QueryDesk, ResultCard};
use threat_ai::session::{FeedbackForm, SessionManager};

#[derive(Parser)]
#[command(name = "threat-ai")]
#[command(version)]
#[command(about = "Ask a threat intelligence service about actors, malware and techniques", long_about = None)]
struct Cli {
    /// Service base URL, overrides config and THREAT_AI_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Also download the answer as a report
        #[arg(long)]
        export: Option<ExportFormat>,
        /// Rate the answer from 1 to 5
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rate: Option<u8>,
    },
    /// Show service status
    Status,
    /// List sample questions
    Samples,
    /// List saved conversations
    Conversations,
    /// Print a saved conversation
    Show { id: String },
    /// List, search or clear query history
    History {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, conflicts_with = "search")]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    let _guard = init_logging(&config.logging, &config.log_dir());

    let api: Arc<dyn ThreatIntelApi> =
        Arc::new(ApiClient::new(&config).context("Failed to build HTTP client")?);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => threat_ai::ui::run_tui(&config, api).await,
        Commands::Ask {
            query,
            export,
            rate,
        } => ask(&config, api, &query.join(" "), export, rate).await,
        Commands::Status => status(api.as_ref()).await,
        Commands::Samples => {
            for sample in api.samples().await? {
                println!("  • {}", sanitize_terminal(&sample));
            }
            Ok(())
        }
        Commands::Conversations => conversations(api.as_ref()).await,
        Commands::Show { id } => show(&config, api, &id).await,
        Commands::History { search, clear } => history(api.as_ref(), search, clear).await,
    }
}

async fn ask(
    config: &Config,
    api: Arc<dyn ThreatIntelApi>,
    query: &str,
    export: Option<ExportFormat>,
    rate: Option<u8>,
) -> Result<()> {
    let mut desk = QueryDesk::new(api, config.resolved_download_dir());
    desk.submit(query).await?;
    if let Some(card) = desk.result_card() {
        print_card(&card);
    }

    if let Some(format) = export {
        let path = desk.export(format).await?;
        println!("\n📄 Report saved to {}", path.display());
    }
    if let Some(rating) = rate {
        desk.feedback(FeedbackForm::rating(rating)).await?;
        println!("\n👍 Feedback recorded ({}/5)", rating);
    }
    Ok(())
}

fn print_card(card: &ResultCard) {
    println!("❓ {}\n", sanitize_terminal(&card.query));
    println!("{}\n", sanitize_terminal(&card.answer));
    println!(
        "Confidence {} │ Evidence {} │ Model {} │ Trace {}",
        card.confidence_width, card.evidence_badge, card.model, card.trace_id
    );
    for row in &card.evidence {
        println!(
            "  • {} ({}, {}): {}",
            sanitize_terminal(&row.actor),
            sanitize_terminal(&row.source),
            row.score,
            sanitize_terminal(&row.text)
        );
    }
}

async fn status(api: &dyn ThreatIntelApi) -> Result<()> {
    let status = api.status().await?;
    let state = if status.initialized {
        "✅ ready"
    } else {
        "⏳ initializing"
    };
    println!("Status:   {}", state);
    println!("Model:    {}", status.model);
    println!("LLM mode: {}", status.llm_mode);
    if let Some(host) = status.host {
        println!("Host:     {}", host);
    }
    Ok(())
}

async fn conversations(api: &dyn ThreatIntelApi) -> Result<()> {
    let list = api.list_conversations().await?;
    if list.is_empty() {
        println!("📭 No conversations yet. Run 'threat-ai' to start one!");
        return Ok(());
    }
    for conversation in list {
        let count = conversation
            .message_count
            .map(|n| format!(" ({} messages)", n))
            .unwrap_or_default();
        println!(
            "  • {}  {}{}",
            conversation.id,
            sanitize_terminal(&conversation.title),
            count
        );
    }
    Ok(())
}

async fn show(config: &Config, api: Arc<dyn ThreatIntelApi>, id: &str) -> Result<()> {
    let mut session = SessionManager::new(api, config.resolved_download_dir());
    session
        .load_conversation(id)
        .await
        .with_context(|| format!("Failed to load conversation {}", id))?;

    println!("💬 {}\n", sanitize_terminal(&session.display_title()));
    for entry in session.transcript().entries() {
        let label = match entry.role {
            Role::User => "👤 You",
            Role::Assistant => "🤖 Assistant",
            Role::Error => "⚠️ Error",
        };
        println!("{} {}", label, entry.timestamp.format("%Y-%m-%d %H:%M"));
        println!("{}\n", sanitize_terminal(&entry.content));
    }
    Ok(())
}

async fn history(api: &dyn ThreatIntelApi, search: Option<String>, clear: bool) -> Result<()> {
    let mut view = HistorySearch::default();
    if clear {
        view.clear(api).await?;
        println!("🧹 Query history cleared");
        return Ok(());
    }

    view.refresh(api, search.as_deref().unwrap_or_default()).await?;
    if let Some(stats) = view.stats() {
        println!(
            "{} queries, {:.1} KB stored\n",
            stats.total_queries, stats.storage_size_kb
        );
    }
    if view.entries().is_empty() {
        println!("No queries found");
    }
    for entry in view.entries() {
        println!("  {}  {}", entry.timestamp, sanitize_terminal(&entry.query));
    }
    Ok(())
}
