use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use product_classifier::{
    get_diversity_stats, load_feed_manifest, ClassifierConfig, FeedSource, FeedSpec,
    FileFeedReader, IndexPipeline, JsonFileWriter, NormalizeContext, PageConfig,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(
    name = "product-classifier",
    version,
    about = "Classify affiliate product feeds and build programmatic landing page indices"
)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the whole pipeline and write one JSON index per page
    Build(BuildArgs),
    /// Classify a single feed and print a facet summary
    Classify(ClassifyArgs),
    /// Check a classifier config (and optionally a page config) and exit
    ValidateConfig(ValidateArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Classifier config JSON; the built-in taxonomy when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Abort when more than this share of feed rows is malformed
    #[arg(long)]
    max_malformed_ratio: Option<f64>,

    /// AWIN publisher id used to build deep links from merchant URLs
    #[arg(long, env = "AWIN_AFFILIATE_ID")]
    awin_affiliate_id: Option<String>,

    /// Amazon associate tag used to build detail page links
    #[arg(long, env = "AMAZON_ASSOCIATE_TAG")]
    amazon_tag: Option<String>,
}

impl CommonArgs {
    fn context(&self) -> NormalizeContext {
        NormalizeContext {
            advertiser_id: None,
            awin_affiliate_id: self.awin_affiliate_id.clone(),
            amazon_tag: self.amazon_tag.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Feed manifest: JSON array of {path, source, advertiser_id}
    #[arg(long)]
    feeds: PathBuf,

    /// Page configs: JSON array
    #[arg(long)]
    pages: PathBuf,

    /// Directory receiving <slug>.json files
    #[arg(long, default_value = "public/programmatic")]
    out: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Feed file (.csv or .json)
    #[arg(long)]
    feed: PathBuf,

    /// awin, coolblue, bol, amazon or manual
    #[arg(long)]
    source: FeedSource,

    #[arg(long)]
    advertiser_id: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Classifier config JSON
    #[arg(long)]
    config: PathBuf,

    /// Page configs to validate alongside
    #[arg(long)]
    pages: Option<PathBuf>,
}

async fn load_config(path: Option<&Path>) -> Result<Option<ClassifierConfig>> {
    match path {
        Some(path) => {
            let config = ClassifierConfig::from_json_file(path)
                .await
                .with_context(|| format!("loading classifier config {}", path.display()))?;
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

async fn build(args: BuildArgs) -> Result<()> {
    let feeds = load_feed_manifest(&args.feeds)
        .await
        .with_context(|| format!("loading feed manifest {}", args.feeds.display()))?;
    let pages = PageConfig::load_all(&args.pages)
        .await
        .with_context(|| format!("loading page configs {}", args.pages.display()))?;
    let config = load_config(args.common.config.as_deref()).await?;

    let manifest_dir = args.feeds.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut builder = IndexPipeline::builder(
        FileFeedReader::with_base_dir(manifest_dir),
        JsonFileWriter::new(&args.out),
    )
    .feeds(feeds)
    .pages(pages)
    .context(args.common.context())
    .max_malformed_ratio(args.common.max_malformed_ratio);
    if let Some(config) = config {
        builder = builder.config(config);
    }

    let report = builder.build()?.run().await?;
    info!(
        "Done: {} rows, {} malformed, {} excluded, {} duplicates, {} pages in {}",
        report.rows_read,
        report.total_malformed(),
        report.excluded,
        report.duplicates_removed,
        report.pages_written.len(),
        args.out.display()
    );
    Ok(())
}

async fn classify(args: ClassifyArgs) -> Result<()> {
    let config = load_config(args.common.config.as_deref()).await?;
    let spec = FeedSpec {
        path: args.feed.display().to_string(),
        source: args.source,
        advertiser_id: args.advertiser_id.clone(),
    };

    let mut builder = IndexPipeline::builder(FileFeedReader::new(), ())
        .add_feed(spec)
        .context(args.common.context())
        .max_malformed_ratio(args.common.max_malformed_ratio);
    if let Some(config) = config {
        builder = builder.config(config);
    }

    let (pool, report) = builder.build()?.build_pool().await?;
    let stats = get_diversity_stats(&pool);

    println!("rows read:          {}", report.rows_read);
    println!("malformed:          {}", report.total_malformed());
    for (reason, count) in &report.drops {
        println!("  {:<16} {}", reason.to_string(), count);
    }
    println!("excluded:           {}", report.excluded);
    println!("duplicates removed: {}", report.duplicates_removed);
    println!("needs review:       {}", report.needs_review);
    println!("products:           {}", stats.total_products);
    println!("average confidence: {:.2}", stats.average_confidence);
    for (title, distribution) in [
        ("category", &stats.category_distribution),
        ("audience", &stats.audience_distribution),
        ("price bucket", &stats.price_bucket_distribution),
    ] {
        println!("{}:", title);
        for (value, count) in distribution {
            println!("  {:<16} {}", value, count);
        }
    }
    Ok(())
}

async fn validate_config(args: ValidateArgs) -> Result<()> {
    let config = ClassifierConfig::from_json_file(&args.config)
        .await
        .with_context(|| format!("validating {}", args.config.display()))?;
    println!(
        "{}: ok ({} category values, {} GPC entries, {} identifier overrides)",
        args.config.display(),
        config.keywords.category.values.len(),
        config.gpc_mapping.len(),
        config.overrides.identifiers.len()
    );

    if let Some(pages) = &args.pages {
        let pages = PageConfig::load_all(pages)
            .await
            .with_context(|| format!("validating {}", pages.display()))?;
        println!("{} pages: ok", pages.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let outcome = match cli.command {
        Command::Build(args) => build(args).await,
        Command::Classify(args) => classify(args).await,
        Command::ValidateConfig(args) => validate_config(args).await,
    };
    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}
