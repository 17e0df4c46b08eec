//! delayable CLI: run the built-in delayables over text files.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use delayable_engine::config::Config;
use delayable_engine::delayable::DelayableRegistry;
use delayable_engine::delayables::{
    RangeArgs, SMART_HIGHLIGHT, SPELL_CHECK, SearchArgs, WordList, register_builtins,
};
use delayable_engine::document::{Buffer, Indicator, TextDocument};
use delayable_engine::engine::EngineRegistry;
use delayable_engine::host::{IntervalTicker, TickDriver};
use delayable_engine::model::{DocumentId, DocumentStore};
use delayable_engine::telemetry::{TelemetryConfig, init_telemetry};

const ENGINE: &str = "main";

#[derive(Parser)]
#[command(name = "delayable", about = "Incremental spell-check and highlighting over text files")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print engine events as JSON lines
    #[arg(long, global = true)]
    events: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Spell-check files and list unknown words
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Word list, one word per line
        #[arg(long)]
        words: PathBuf,
        /// Treat the first N files as hidden documents
        #[arg(long, default_value_t = 0)]
        hidden: usize,
    },
    /// Count whole-word occurrences of a term
    Highlight {
        /// Term to highlight
        term: String,
        /// Files to search
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Documents, their engine and the tick driver for one CLI run.
struct Session {
    documents: DocumentStore<Buffer>,
    engines: EngineRegistry<Buffer>,
    driver: TickDriver,
    ids: Vec<DocumentId>,
    print_events: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "delayable".to_string(),
        log_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Check {
            files,
            words,
            hidden,
        } => cmd_check(&config, &files, &words, hidden, cli.events).await,
        Command::Highlight { term, files } => {
            cmd_highlight(&config, &term, &files, cli.events).await
        }
    }
}

async fn cmd_check(
    config: &Config,
    files: &[PathBuf],
    words: &Path,
    hidden: usize,
    print_events: bool,
) -> anyhow::Result<()> {
    let dictionary = WordList::load(words)
        .with_context(|| format!("loading word list {}", words.display()))?;
    let mut session = open_session(config, files, dictionary, print_events)?;

    for id in session.ids.iter().take(hidden) {
        if let Some(buffer) = session.documents.get_mut(*id) {
            buffer.set_visible(false);
        }
    }

    let engine = session.engines.instance(ENGINE);
    engine.set_delayable_enabled(&mut session.documents, SPELL_CHECK, true)?;
    for id in &session.ids {
        if !engine.enqueue(&mut session.documents, *id, SPELL_CHECK, RangeArgs::all()) {
            bail!("spell check was not accepted for document {id}");
        }
    }

    session.run().await?;

    for id in &session.ids {
        let Some(buffer) = session.documents.get(*id) else {
            continue;
        };
        for range in buffer.indicators(Indicator::Misspelling) {
            let line = buffer.line_of(range.start);
            let column = buffer
                .line_range(line)
                .map_or(0, |line_range| range.start - line_range.start);
            println!(
                "{}:{}:{}: {}",
                buffer.name(),
                line + 1,
                column + 1,
                &buffer.text()[range.clone()]
            );
        }
    }
    session.print_stats();
    Ok(())
}

async fn cmd_highlight(
    config: &Config,
    term: &str,
    files: &[PathBuf],
    print_events: bool,
) -> anyhow::Result<()> {
    let mut session = open_session(config, files, WordList::new(), print_events)?;

    let engine = session.engines.instance(ENGINE);
    engine.set_delayable_enabled(&mut session.documents, SMART_HIGHLIGHT, true)?;
    for id in &session.ids {
        if !engine.enqueue(&mut session.documents, *id, SMART_HIGHLIGHT, SearchArgs::new(term)) {
            bail!("highlight was not accepted for document {id}");
        }
    }

    session.run().await?;

    for id in &session.ids {
        if let Some(buffer) = session.documents.get(*id) {
            let count = buffer.indicators(Indicator::SmartHighlight).len();
            println!("{}: {count}", buffer.name());
        }
    }
    session.print_stats();
    Ok(())
}

fn open_session(
    config: &Config,
    files: &[PathBuf],
    dictionary: WordList,
    print_events: bool,
) -> anyhow::Result<Session> {
    let mut delayables = DelayableRegistry::empty();
    register_builtins(&mut delayables, Rc::new(dictionary));

    let (ticker, driver) = IntervalTicker::new(config.tick_interval);
    let mut engines = EngineRegistry::new(delayables, config.engine_defaults())
        .with_tick_sources(move |_| ticker.clone());

    let mut documents = DocumentStore::new();
    let mut ids = Vec::with_capacity(files.len());
    for path in files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        ids.push(documents.insert(Buffer::new(path.display().to_string(), text)));
    }

    for id in &ids {
        engines.add_document(&mut documents, ENGINE, *id);
    }

    Ok(Session {
        documents,
        engines,
        driver,
        ids,
        print_events,
    })
}

impl Session {
    /// Tick the engine on the driver's cadence until it drains.
    async fn run(&mut self) -> anyhow::Result<()> {
        self.flush_events()?;
        loop {
            let running = self
                .engines
                .get(ENGINE)
                .is_some_and(|engine| engine.is_running());
            if !running || !self.driver.next_tick().await {
                break;
            }
            self.engines.tick_all(&mut self.documents);
            self.flush_events()?;
        }
        Ok(())
    }

    fn flush_events(&mut self) -> anyhow::Result<()> {
        let Some(engine) = self.engines.get_mut(ENGINE) else {
            return Ok(());
        };
        for event in engine.drain_events() {
            if self.print_events {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Ok(())
    }

    fn print_stats(&self) {
        if let Some(engine) = self.engines.get(ENGINE) {
            let stats = engine.run_stats();
            eprintln!(
                "{} steps in {} ticks ({} deferred, {} failed) over {:?}",
                stats.processed, stats.ticks, stats.skipped, stats.failures, stats.elapsed
            );
        }
    }
}
