//! Invoicer CLI - export, translate and share bilingual invoices from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use invoicer_core::{
    AppConfig, AuthoringSession, BilingualResolver, ExportPipeline, Invoice,
    RenderOptions, Template, TemplateRegistry, TranslatorConfig, create_translator,
    create_uploader, open_store,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    /// Single-page PDF (raster capture)
    Pdf,
    /// Editable Word-compatible document
    Doc,
    /// WebP preview image
    Preview,
}

impl ExportFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => invoicer_core::export::DOC_EXTENSION,
            Self::Preview => "webp",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "invoicer")]
#[command(author, version, about = "Author, export and share bilingual GST invoices", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Cmd,

    /// OpenAI API base URL
    #[arg(long, global = true, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Model name for OpenAI-compatible API
    #[arg(long, global = true, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Keep translations in memory only
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Export an invoice (JSON) through a template
    Export {
        /// Invoice JSON file
        invoice: PathBuf,

        /// Template JSON file (default: built-in template)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pdf")]
        format: ExportFormat,

        /// Output file (default: <invoice>.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print numbers with Gujarati digits
        #[arg(long)]
        target_digits: bool,

        /// Leave translated descriptions out
        #[arg(long)]
        no_bilingual: bool,
    },

    /// Resolve a description into its canonical, translated and mixed-script forms
    Translate {
        /// Description text (English or Gujarati)
        text: String,
    },

    /// Fill in missing translations of an invoice's line items
    Fill {
        /// Invoice JSON file, updated in place unless --output is given
        invoice: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Suggest stored descriptions matching a query
    Suggest {
        query: String,

        /// Maximum number of suggestions
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Export to PDF, upload it and print a share link
    Share {
        invoice: PathBuf,

        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Message template with {{placeholders}}
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Remove every stored description
    ClearCache {
        /// Store directory (default: ~/.cache/invoicer/descriptions)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_template(path: Option<&Path>) -> Result<Template> {
    path.map_or_else(|| Ok(Template::default()), read_json)
}

fn default_output(input: &Path, extension: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("invoice");
    input.with_file_name(format!("{stem}.{extension}"))
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if args.api_base.is_some() || args.api_key.is_some() || args.model.is_some() {
        let current = config.translator.clone();
        config.translator = TranslatorConfig {
            retry_count: current.retry_count,
            retry_delay_ms: current.retry_delay_ms,
            timeout_secs: current.timeout_secs,
            ..TranslatorConfig::new(
                args.api_base.clone().unwrap_or(current.api_base),
                args.api_key.clone().or(current.api_key),
                args.model.clone().unwrap_or(current.model),
            )
        };
    }

    if args.no_cache {
        config.store.disk_enabled = false;
    }
}

fn resolver(config: &AppConfig) -> Result<BilingualResolver> {
    let translator =
        create_translator(&config.translator).context("Failed to initialize translator")?;
    let store = open_store(&config.store).context("Failed to open description store")?;
    Ok(BilingualResolver::new(translator, store, config))
}

// CLI output is intentional
#[allow(clippy::print_stdout)]
async fn run_export(
    config: &AppConfig,
    invoice_path: &Path,
    template: Option<&Path>,
    format: ExportFormat,
    output: Option<PathBuf>,
    options: RenderOptions,
) -> Result<()> {
    let invoice: Invoice = read_json(invoice_path)?;
    let template = load_template(template)?;
    let tree = invoicer_core::project(&invoice, &template, &options)
        .context("Failed to render invoice")?;

    let pipeline = ExportPipeline::new(config, None).context("Failed to set up export")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Exporting {}", invoice.invoice_number()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let bytes = match format {
        ExportFormat::Pdf => pipeline.export_pdf(&tree).await?.bytes,
        ExportFormat::Doc => pipeline.export_document(&tree)?.into_bytes(),
        ExportFormat::Preview => {
            pipeline
                .preview(&tree, invoicer_core::export::DEFAULT_PREVIEW_WIDTH)
                .await?
        }
    };
    spinner.finish_and_clear();

    let output = output.unwrap_or_else(|| default_output(invoice_path, format.extension()));
    std::fs::write(&output, bytes)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    println!("Exported to: {}", output.display());
    Ok(())
}

// CLI output is intentional
#[allow(clippy::print_stdout)]
async fn run_fill(config: &AppConfig, invoice_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let invoice: Invoice = read_json(invoice_path)?;
    let resolver = resolver(config)?;

    let pending: Vec<(usize, String)> = invoice
        .items()
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            !item.description.trim().is_empty() && item.translated_description.is_none()
        })
        .map(|(i, item)| (i, item.description.clone()))
        .collect();

    if pending.is_empty() {
        println!("Every line item already has a translation");
        return Ok(());
    }

    let mut session = AuthoringSession::new(invoice, TemplateRegistry::new());

    #[allow(clippy::cast_possible_truncation)]
    let pb = ProgressBar::new(pending.len() as u64);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut degraded = 0;
    for (index, description) in pending {
        pb.set_message(description.clone());
        let resolution = resolver
            .resolve_for_field(&description)
            .await
            .with_context(|| format!("Failed to resolve {description:?}"))?;

        if let Some(warning) = session.apply_resolution(index, &resolution, chrono::Utc::now())? {
            pb.println(format!("Item {}: {}", index + 1, warning));
            degraded += 1;
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let output = output.unwrap_or_else(|| invoice_path.to_path_buf());
    let json = serde_json::to_string_pretty(session.invoice())?;
    std::fs::write(&output, json)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    if degraded > 0 {
        warn!("{} descriptions still need a manual translation", degraded);
    }
    println!("Updated invoice saved to: {}", output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };
    apply_overrides(&mut config, &args);

    match &args.command {
        Cmd::Export {
            invoice,
            template,
            format,
            output,
            target_digits,
            no_bilingual,
        } => {
            let mut options = RenderOptions::from_config(&config.export)
                .generated_on(chrono::Local::now().date_naive());
            options.target_script_digits |= *target_digits;
            options.bilingual_descriptions &= !*no_bilingual;

            info!("Exporting {} as {:?}", invoice.display(), format);
            run_export(&config, invoice, template.as_deref(), *format, output.clone(), options)
                .await?;
        }

        Cmd::Translate { text } => {
            let variants = resolver(&config)?
                .resolve_all_variants(text)
                .await
                .context("Translation failed")?;

            #[allow(clippy::print_stdout)]
            {
                println!("English:  {}", variants.canonical);
                println!("Gujarati: {}", variants.translated);
                println!("Ginlish:  {}", variants.mixed_script.as_deref().unwrap_or("-"));
            }
        }

        Cmd::Fill { invoice, output } => run_fill(&config, invoice, output.clone()).await?,

        Cmd::Suggest { query, limit } => {
            let limit = limit.unwrap_or(config.store.suggestion_limit);
            let suggestions = resolver(&config)?.search_similar(query, limit).await?;

            #[allow(clippy::print_stdout)]
            {
                for entry in suggestions {
                    println!("{}\t{}", entry.canonical_text, entry.translated_text);
                }
            }
        }

        Cmd::Share {
            invoice: invoice_path,
            template,
            message,
        } => {
            let uploader = create_uploader(&config.upload)?
                .context("Uploads are disabled; set upload.mode in the config file")?;
            let pipeline = ExportPipeline::new(&config, Some(uploader))?;

            let invoice: Invoice = read_json(invoice_path)?;
            let template = load_template(template.as_deref())?;
            let options = RenderOptions::from_config(&config.export)
                .generated_on(chrono::Local::now().date_naive());
            let tree = invoicer_core::project(&invoice, &template, &options)?;

            let outcome = pipeline
                .share(&invoice, &tree, message.as_deref())
                .await
                .context("Failed to share invoice")?;

            #[allow(clippy::print_stdout)]
            {
                println!("Uploaded: {}", outcome.url);
                println!("\n{}\n", outcome.message);
                println!("WhatsApp: {}", outcome.whatsapp_url);
            }
        }

        Cmd::ClearCache { path } => {
            let path = path.clone().or_else(|| config.store.disk_path.clone());
            let removed = invoicer_core::clear_description_store(path)
                .context("Failed to clear description store")?;

            #[allow(clippy::print_stdout)]
            {
                println!("Removed {removed} stored descriptions");
            }
        }
    }

    Ok(())
}
