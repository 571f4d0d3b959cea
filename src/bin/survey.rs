#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{fmt, EnvFilter};

use brand_survey::catalog::{self, CatalogIndex, WeightingPolicy};
use brand_survey::clusters::ClusterMap;
use brand_survey::config::SurveyConfig;
use brand_survey::question::{BrandSnapshot, Choice, Question, QuestionGenerator};
use brand_survey::session::{Page, SurveySession};
use brand_survey::sink::{self, SinkKind, SqliteResponseSink};

#[derive(Parser)]
#[command(name = "survey", version, about = "Brand similarity survey CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SourceArgs {
    /// Survey config JSON (flags below override its values)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Price table CSV (Brand, Average Price)
    #[arg(long)]
    prices: Option<PathBuf>,
    /// Image table CSV (Brand, Category, Product image URL)
    #[arg(long)]
    images: Option<PathBuf>,
    /// Cluster map JSON ({"BRAND": id}); defaults to the built-in fashion clusters
    #[arg(long)]
    clusters: Option<PathBuf>,
    /// Ignore clusters entirely and ask fully random triples
    #[arg(long, conflicts_with = "clusters")]
    no_clusters: bool,
    #[arg(long, value_enum)]
    weighting: Option<CliWeighting>,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the catalog built from the price and image tables
    Catalog {
        #[command(flatten)]
        source: SourceArgs,
        /// Print stats as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List clusters and how many catalog brands each can draw from
    Clusters {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Generate a question batch as JSONL
    Generate {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        questions: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Run the survey in the terminal (reads choices from stdin)
    Run {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        questions: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Response sink path (default: $SURVEY_SINK_PATH or survey_responses.<ext>)
        #[arg(long)]
        sink: Option<PathBuf>,
        #[arg(long, value_enum)]
        sink_kind: Option<CliSinkKind>,
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Export a SQLite response store to JSONL
    Export {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
}

/// CLI-facing weighting policy (clap::ValueEnum).
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliWeighting {
    Subcategory,
    Uniform,
}

impl From<CliWeighting> for WeightingPolicy {
    fn from(w: CliWeighting) -> Self {
        match w {
            CliWeighting::Subcategory => WeightingPolicy::Subcategory,
            CliWeighting::Uniform => WeightingPolicy::Uniform,
        }
    }
}

/// CLI-facing sink kind (clap::ValueEnum).
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliSinkKind {
    Csv,
    Sqlite,
}

impl From<CliSinkKind> for SinkKind {
    fn from(k: CliSinkKind) -> Self {
        match k {
            CliSinkKind::Csv => SinkKind::Csv,
            CliSinkKind::Sqlite => SinkKind::Sqlite,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Catalog { source, json } => {
            let config = resolve_config(&source)?;
            let catalog = load_catalog(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(catalog.stats())?);
            } else {
                let stats = catalog.stats();
                println!(
                    "{} price rows ({} dropped), {} image rows ({} dropped)",
                    stats.price_rows,
                    stats.dropped_price_rows,
                    stats.image_rows,
                    stats.dropped_image_rows
                );
                println!(
                    "{} priced brands, {} brands with images, {} available",
                    stats.priced_brands, stats.imaged_brands, stats.available_brands
                );
                for entry in catalog.entries() {
                    println!(
                        "{}\t${}\t{} images",
                        entry.name,
                        entry.display_price(),
                        entry.images.len()
                    );
                }
            }
        }
        Commands::Clusters { source } => {
            let config = resolve_config(&source)?;
            let clusters = load_clusters(&source, &config)?;
            let catalog = if config.catalog.prices.is_some() && config.catalog.images.is_some() {
                Some(load_catalog(&config)?)
            } else {
                None
            };
            for id in clusters.cluster_ids() {
                let members: Vec<&str> = clusters
                    .assignments()
                    .filter(|(_, c)| *c == id)
                    .map(|(b, _)| b)
                    .collect();
                match &catalog {
                    Some(catalog) => {
                        let eligible = members.iter().filter(|b| catalog.contains(b)).count();
                        println!(
                            "{id}\t{eligible}/{} eligible\t{}",
                            members.len(),
                            members.join(", ")
                        );
                    }
                    None => println!("{id}\t{}", members.join(", ")),
                }
            }
        }
        Commands::Generate {
            source,
            questions,
            seed,
            out,
        } => {
            let mut config = resolve_config(&source)?;
            apply_generator_overrides(&mut config, questions, seed);
            let generator = build_generator(&source, &config)?;
            let mut rng = match config.generator.rng_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let batch = generator.generate_batch(&mut rng)?;
            let mut file = File::create(out)?;
            for question in &batch {
                let line = serde_json::to_string(question)?;
                writeln!(file, "{line}")?;
            }
        }
        Commands::Run {
            source,
            questions,
            seed,
            sink,
            sink_kind,
            max_retries,
        } => {
            let mut config = resolve_config(&source)?;
            apply_generator_overrides(&mut config, questions, seed);
            if let Some(kind) = sink_kind {
                config.sink.kind = kind.into();
            }
            if let Some(path) = sink {
                config.sink.path = Some(path);
            }
            if let Some(n) = max_retries {
                config.sink.retry.max_retries = n;
            }
            let generator = Arc::new(build_generator(&source, &config)?);
            run_survey(generator, &config).await?;
        }
        Commands::Export { db, out } => {
            let path = db.unwrap_or_else(|| SinkKind::Sqlite.default_path());
            let store = SqliteResponseSink::new(path)?;
            let _lock = store.lock_exclusive()?;
            let exported = store.export_jsonl(out).await?;
            println!("exported {exported} responses");
        }
    }

    Ok(())
}

fn resolve_config(source: &SourceArgs) -> Result<SurveyConfig, Box<dyn std::error::Error>> {
    let mut config = match &source.config {
        Some(path) => SurveyConfig::load_from_path(path)?,
        None => SurveyConfig::default(),
    };
    if let Some(path) = &source.prices {
        config.catalog.prices = Some(path.clone());
    }
    if let Some(path) = &source.images {
        config.catalog.images = Some(path.clone());
    }
    if let Some(path) = &source.clusters {
        config.catalog.clusters = Some(path.clone());
    }
    if let Some(weighting) = source.weighting {
        config.catalog.weighting = weighting.into();
    }
    Ok(config)
}

fn apply_generator_overrides(config: &mut SurveyConfig, questions: Option<usize>, seed: Option<u64>) {
    if let Some(n) = questions {
        config.generator.total_questions = n;
    }
    if seed.is_some() {
        config.generator.rng_seed = seed;
    }
}

fn load_catalog(config: &SurveyConfig) -> Result<CatalogIndex, Box<dyn std::error::Error>> {
    let (Some(prices), Some(images)) = (&config.catalog.prices, &config.catalog.images) else {
        return Err("--prices and --images are required (or set catalog.prices/images in --config)".into());
    };
    Ok(catalog::load_catalog(prices, images, config.catalog.weighting)?)
}

fn load_clusters(
    source: &SourceArgs,
    config: &SurveyConfig,
) -> Result<ClusterMap, Box<dyn std::error::Error>> {
    if source.no_clusters {
        return Ok(ClusterMap::empty());
    }
    Ok(match &config.catalog.clusters {
        Some(path) => ClusterMap::load_from_path(path)?,
        None => ClusterMap::fashion_default(),
    })
}

fn build_generator(
    source: &SourceArgs,
    config: &SurveyConfig,
) -> Result<QuestionGenerator, Box<dyn std::error::Error>> {
    let catalog = Arc::new(load_catalog(config)?);
    let clusters = Arc::new(load_clusters(source, config)?);
    Ok(QuestionGenerator::new(
        catalog,
        clusters,
        config.generator.clone(),
    )?)
}

async fn run_survey(
    generator: Arc<QuestionGenerator>,
    config: &SurveyConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let sink_path = config.sink.resolved_path();
    let sink = sink::open_sink(config.sink.kind, &sink_path, config.sink.retry)?;
    let mut session = SurveySession::new(generator);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();

    show_start_page(&mut stdout)?;
    if !read_begin(&mut lines, &mut stdout)? {
        return Err("input ended before the survey started".into());
    }
    session.begin_survey()?;

    while session.page() == Page::Survey {
        let (answered, total) = session.progress();
        let Some(question) = session.current_question() else {
            break;
        };
        show_question_page(&mut stdout, question, answered + 1, total)?;
        let Some(choice) = read_choice(&mut lines, &mut stdout)? else {
            return Err("input ended before the survey was complete".into());
        };
        session.answer(choice)?;
    }

    show_end_page(&mut stdout)?;
    match session.persist(sink.as_ref()).await {
        Ok(receipt) => {
            writeln!(
                stdout,
                "Saved {} responses to {}.",
                receipt.rows_written,
                sink_path.display()
            )?;
            Ok(())
        }
        Err(err) => {
            eprintln!(
                "failed to save responses to {}: {err}",
                sink_path.display()
            );
            for response in session.pending_responses() {
                eprintln!(
                    "unsaved: {}",
                    serde_json::to_string(response).unwrap_or_default()
                );
            }
            Err(err.into())
        }
    }
}

fn show_start_page(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Brand Similarity Survey")?;
    writeln!(out)?;
    writeln!(
        out,
        "You'll be shown a reference clothing brand and asked which of two other brands is more similar in style and price."
    )?;
    writeln!(out, "Each question includes sample images and average prices.")?;
    writeln!(out)?;
    write!(out, "Press Enter to start the survey. ")?;
    out.flush()
}

fn show_question_page(
    out: &mut impl Write,
    question: &Question,
    ordinal: usize,
    total: usize,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Question {ordinal} of {total}")?;
    writeln!(out, "----------------------------------------")?;
    write_snapshot(out, "Reference brand:", &question.reference)?;
    writeln!(out, "----------------------------------------")?;
    writeln!(out, "Which brand is more similar to the reference brand?")?;
    write_snapshot(out, "[1]", &question.candidate_a)?;
    write_snapshot(out, "[2]", &question.candidate_b)?;
    out.flush()
}

fn write_snapshot(out: &mut impl Write, label: &str, snapshot: &BrandSnapshot) -> io::Result<()> {
    writeln!(
        out,
        "{label} {}  (average price ${})",
        snapshot.brand, snapshot.price
    )?;
    for url in &snapshot.images {
        writeln!(out, "      {url}")?;
    }
    Ok(())
}

fn show_end_page(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Thank you!")?;
    writeln!(
        out,
        "You've completed the survey. Your responses help us match influencers to brands in the fashion space."
    )?;
    out.flush()
}

fn read_begin(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    out: &mut impl Write,
) -> io::Result<bool> {
    match lines.next() {
        Some(line) => {
            line?;
            writeln!(out)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn read_choice(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    out: &mut impl Write,
) -> io::Result<Option<Choice>> {
    loop {
        write!(out, "Select 1 or 2: ")?;
        out.flush()?;
        let Some(line) = lines.next() else {
            return Ok(None);
        };
        match line?.trim().to_ascii_lowercase().as_str() {
            "1" | "a" => return Ok(Some(Choice::A)),
            "2" | "b" => return Ok(Some(Choice::B)),
            _ => writeln!(out, "Please answer 1 or 2.")?,
        }
    }
}
