//! tablescribe CLI - Generate table metadata and semantic models
//!
//! Usage:
//!   tablescribe generate <table> [--connection <name>] [--format json|yaml]
//!   tablescribe batch <table>... [--output-dir <dir>]
//!   tablescribe semantic <document>... --name <model> [--existing <model.json>]
//!   tablescribe cache stats|list|clear|clear-table <table>
//!
//! Examples:
//!   tablescribe generate sales.orders --sample-size 500 --format yaml
//!   tablescribe batch sales.orders sales.customers --output-dir docs/
//!   tablescribe semantic docs/*.json --name sales --derived-tables --output-dir lookml/

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tablescribe::cache::{CacheKey, DocumentCache, RequestFingerprint};
use tablescribe::config::{ConnectionSettings, Settings, TokenCounterKind};
use tablescribe::document::{InclusionConfig, MetadataDocument, SectionKey};
use tablescribe::llm::WorkerLlmProvider;
use tablescribe::metadata::{TableHandle, WorkerIntrospector};
use tablescribe::pipeline::{generate_semantic_model, MetadataPipeline, MetadataRequest, PipelineConfig};
use tablescribe::prompt::{HeuristicTokenCounter, TokenCounter, WorkerTokenCounter};
use tablescribe::semantic::{lookml, SemanticModel};
use tablescribe::worker::WorkerClient;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tablescribe")]
#[command(about = "tablescribe - Statistically grounded metadata for analytical tables")]
#[command(version)]
struct Cli {
    /// Path to tablescribe.toml (defaults to the usual lookup order)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct RunArgs {
    /// Connection name from the config file
    #[arg(short, long)]
    connection: Option<String>,

    /// Rows per sample query
    #[arg(long)]
    sample_size: Option<u64>,

    /// Sample queries per spec
    #[arg(long)]
    num_samples: Option<u32>,

    /// Most recent partitions to sample
    #[arg(long)]
    max_partitions: Option<usize>,

    /// Optional sections to include (comma separated; defaults to config)
    #[arg(long, value_delimiter = ',')]
    sections: Option<Vec<String>>,

    /// Extra instructions appended to every prompt
    #[arg(long)]
    instructions: Option<String>,

    /// Produce a schema-only document when sampling is unavailable
    #[arg(long)]
    allow_schema_only: bool,

    /// Skip the document cache
    #[arg(long)]
    no_cache: bool,

    /// Output format
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the metadata document for one table
    Generate {
        /// Table as database.schema.table, schema.table or table
        table: String,

        #[command(flatten)]
        run: RunArgs,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate documents for several tables
    Batch {
        /// Tables as database.schema.table, schema.table or table
        #[arg(required = true)]
        tables: Vec<String>,

        #[command(flatten)]
        run: RunArgs,

        /// Directory for one document per table
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Build a semantic model from metadata documents
    Semantic {
        /// Metadata documents (.json, .yaml or .yml)
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        /// Model name
        #[arg(short, long)]
        name: String,

        /// Emit rollup views over derived tables
        #[arg(long)]
        derived_tables: bool,

        /// Skip explores and joins
        #[arg(long)]
        no_explores: bool,

        /// Existing model JSON to append to
        #[arg(long)]
        existing: Option<PathBuf>,

        /// LookML connection name
        #[arg(long, default_value = "default")]
        lookml_connection: String,

        /// Directory for LookML files and the model JSON
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Inspect or clear the document cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts and size
    Stats,
    /// List cached entries
    List,
    /// Remove every entry
    Clear,
    /// Remove cached documents of one table
    ClearTable { table: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }

    fn render(self, document: &MetadataDocument) -> Result<String, String> {
        match self {
            OutputFormat::Json => document.to_json().map_err(|e| e.to_string()),
            OutputFormat::Yaml => document.to_yaml().map_err(|e| e.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TABLESCRIBE_LOG")
                .unwrap_or_else(|_| "tablescribe=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Generate { table, run, output } => {
            cmd_generate(&settings, &table, &run, output).await
        }
        Commands::Batch {
            tables,
            run,
            output_dir,
        } => cmd_batch(&settings, &tables, &run, &output_dir).await,
        Commands::Semantic {
            documents,
            name,
            derived_tables,
            no_explores,
            existing,
            lookml_connection,
            output_dir,
        } => cmd_semantic(
            &documents,
            &name,
            derived_tables,
            !no_explores,
            existing.as_deref(),
            &lookml_connection,
            &output_dir,
        ),
        Commands::Cache { action } => cmd_cache(&settings, action),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Connection, pipeline and cache context for one invocation.
struct Session {
    pipeline: MetadataPipeline,
    cache: Option<DocumentCache>,
    conn_hash: String,
    request: MetadataRequest,
    model: String,
}

impl Session {
    async fn start(settings: &Settings, run: &RunArgs) -> Result<Self, String> {
        let (name, connection) = resolve_connection(settings, run.connection.as_deref())?;
        let dialect = connection.sql_dialect().map_err(|e| e.to_string())?;
        let conn_str = connection
            .resolved_connection_string()
            .map_err(|e| e.to_string())?;
        info!(connection = name, driver = %connection.driver, "Using connection");

        let client = Arc::new(
            WorkerClient::spawn_with_settings(settings)
                .await
                .map_err(|e| e.to_string())?,
        );
        let introspector = WorkerIntrospector::new(client.clone(), &connection.driver, &conn_str)
            .with_query_timeout(settings.sampling.timeout_seconds);
        let counter: Arc<dyn TokenCounter> = match settings.llm.token_counter {
            TokenCounterKind::Worker => {
                Arc::new(WorkerTokenCounter::new(client.clone(), &settings.llm.model))
            }
            TokenCounterKind::Heuristic => Arc::new(HeuristicTokenCounter::default()),
        };
        let provider = Arc::new(WorkerLlmProvider::new(client, &settings.llm.model));

        let pipeline = MetadataPipeline::new(
            Arc::new(introspector),
            counter,
            provider,
            PipelineConfig::from_settings(settings, dialect),
        );

        let cache = if settings.cache.enabled && !run.no_cache {
            let opened = match settings.cache_path().map_err(|e| e.to_string())? {
                Some(path) => DocumentCache::open_at(&path),
                None => DocumentCache::open(),
            };
            match opened {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!(error = %e, "Document cache unavailable");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            pipeline,
            cache,
            conn_hash: CacheKey::hash_connection(&connection.driver, &conn_str)
                .map_err(|e| e.to_string())?,
            request: metadata_request(run)?,
            model: settings.llm.model.clone(),
        })
    }

    fn cache_key(&self, table: &TableHandle) -> Option<String> {
        let budget = self.pipeline.budget_for(&self.request);
        let fingerprint = RequestFingerprint {
            request: &self.request,
            budget: &budget,
            model: &self.model,
        };
        CacheKey::document(&self.conn_hash, table, &fingerprint).ok()
    }

    fn cached(&self, table: &TableHandle) -> Option<MetadataDocument> {
        let cache = self.cache.as_ref()?;
        let key = self.cache_key(table)?;
        match cache.get_document(&key) {
            Ok(Some(doc)) => {
                info!(table = %table, "Using cached document");
                Some(doc)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Cache read failed");
                None
            }
        }
    }

    fn store(&self, document: &MetadataDocument) {
        let (Some(cache), Some(key)) = (self.cache.as_ref(), self.cache_key(&document.table)) else {
            return;
        };
        if let Err(e) = cache.put_document(&key, document) {
            warn!(error = %e, "Cache write failed");
        }
    }
}

fn resolve_connection<'a>(
    settings: &'a Settings,
    name: Option<&'a str>,
) -> Result<(&'a str, &'a ConnectionSettings), String> {
    match name {
        Some(name) => settings
            .get_connection(name)
            .map(|c| (name, c))
            .map_err(|e| e.to_string()),
        None => settings
            .default_connection()
            .ok_or_else(|| "no connections configured".to_string()),
    }
}

fn metadata_request(run: &RunArgs) -> Result<MetadataRequest, String> {
    let inclusion = match &run.sections {
        Some(names) => {
            let keys = names
                .iter()
                .map(|n| {
                    SectionKey::from_str(n.trim()).ok_or_else(|| format!("unknown section '{}'", n))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Some(InclusionConfig::only(&keys))
        }
        None => None,
    };
    Ok(MetadataRequest {
        sample_size: run.sample_size,
        num_samples: run.num_samples,
        max_partitions: run.max_partitions,
        inclusion,
        custom_instructions: run.instructions.clone(),
        allow_schema_only: run.allow_schema_only.then_some(true),
    })
}

fn parse_table(name: &str) -> Result<TableHandle, String> {
    TableHandle::parse(name).ok_or_else(|| format!("invalid table name '{}'", name))
}

async fn cmd_generate(
    settings: &Settings,
    table: &str,
    run: &RunArgs,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let table = parse_table(table)?;
    let session = Session::start(settings, run).await?;

    let document = match session.cached(&table) {
        Some(doc) => doc,
        None => {
            let doc = session
                .pipeline
                .generate_metadata(&table, &session.request)
                .await
                .map_err(|e| e.to_string())?;
            session.store(&doc);
            doc
        }
    };

    let rendered = run.format.render(&document)?;
    match output {
        Some(path) => {
            fs::write(&path, rendered)
                .map_err(|e| format!("Error writing '{}': {}", path.display(), e))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

async fn cmd_batch(
    settings: &Settings,
    tables: &[String],
    run: &RunArgs,
    output_dir: &Path,
) -> Result<(), String> {
    let tables = tables
        .iter()
        .map(|t| parse_table(t))
        .collect::<Result<Vec<_>, _>>()?;
    let session = Session::start(settings, run).await?;
    fs::create_dir_all(output_dir)
        .map_err(|e| format!("Error creating '{}': {}", output_dir.display(), e))?;

    let mut documents: Vec<Option<MetadataDocument>> =
        tables.iter().map(|t| session.cached(t)).collect();
    let pending: Vec<TableHandle> = tables
        .iter()
        .zip(&documents)
        .filter(|(_, doc)| doc.is_none())
        .map(|(t, _)| t.clone())
        .collect();

    let mut results = session
        .pipeline
        .generate_metadata_batch(&pending, &session.request)
        .await
        .into_iter();

    let mut failures = 0;
    for (table, slot) in tables.iter().zip(documents.iter_mut()) {
        if slot.is_some() {
            continue;
        }
        match results.next() {
            Some(Ok(doc)) => {
                session.store(&doc);
                *slot = Some(doc);
            }
            Some(Err(e)) => {
                failures += 1;
                eprintln!("{}: {}", table, e);
            }
            None => {}
        }
    }

    for document in documents.iter().flatten() {
        let path = output_dir.join(format!(
            "{}.{}",
            document.table.qualified_name(),
            run.format.extension()
        ));
        fs::write(&path, run.format.render(document)?)
            .map_err(|e| format!("Error writing '{}': {}", path.display(), e))?;
        println!("Wrote {}", path.display());
    }

    if failures > 0 {
        return Err(format!("{} of {} tables failed", failures, tables.len()));
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<MetadataDocument, String> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => MetadataDocument::from_yaml(&source).map_err(|e| e.to_string()),
        _ => MetadataDocument::from_json(&source).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| format!("Error parsing '{}': {}", path.display(), e))
}

fn cmd_semantic(
    documents: &[PathBuf],
    name: &str,
    derived_tables: bool,
    include_explores: bool,
    existing: Option<&Path>,
    lookml_connection: &str,
    output_dir: &Path,
) -> Result<(), String> {
    let documents = documents
        .iter()
        .map(|p| read_document(p))
        .collect::<Result<Vec<_>, _>>()?;

    let existing = match existing {
        Some(path) => {
            let source = fs::read_to_string(path)
                .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
            Some(SemanticModel::from_json(&source).map_err(|e| e.to_string())?)
        }
        None => None,
    };

    let model = generate_semantic_model(&documents, name, derived_tables, include_explores, existing)
        .map_err(|e| e.to_string())?;

    fs::create_dir_all(output_dir)
        .map_err(|e| format!("Error creating '{}': {}", output_dir.display(), e))?;
    for file in lookml::render_files(&model, lookml_connection) {
        let path = output_dir.join(&file.path);
        fs::write(&path, file.contents)
            .map_err(|e| format!("Error writing '{}': {}", path.display(), e))?;
        println!("Wrote {}", path.display());
    }

    let json_path = output_dir.join(format!("{}.model.json", model.name));
    let json = model.to_json().map_err(|e| e.to_string())?;
    fs::write(&json_path, json)
        .map_err(|e| format!("Error writing '{}': {}", json_path.display(), e))?;
    println!("Wrote {}", json_path.display());
    Ok(())
}

fn cmd_cache(settings: &Settings, action: CacheAction) -> Result<(), String> {
    let cache = match settings.cache_path().map_err(|e| e.to_string())? {
        Some(path) => DocumentCache::open_at(&path),
        None => DocumentCache::open(),
    }
    .map_err(|e| e.to_string())?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats().map_err(|e| e.to_string())?;
            println!("Entries: {}", stats.entry_count);
            println!("Tables:  {}", stats.table_count);
            println!("Size:    {} bytes", stats.total_size_bytes);
        }
        CacheAction::List => {
            let entries = cache.entries().map_err(|e| e.to_string())?;
            if entries.is_empty() {
                println!("Cache is empty.");
            }
            for entry in entries {
                println!("{}  {} bytes  {}", entry.created_at, entry.size_bytes, entry.key);
            }
        }
        CacheAction::Clear => {
            cache.clear_all().map_err(|e| e.to_string())?;
            println!("Cache cleared.");
        }
        CacheAction::ClearTable { table } => {
            let removed = cache
                .clear_table(&parse_table(&table)?)
                .map_err(|e| e.to_string())?;
            println!("Removed {} entries for {}.", removed, table);
        }
    }
    Ok(())
}
