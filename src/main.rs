//! CLI entry point for `mboxpdf`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser};

use mboxpdf::config::{Config, DiscoveryConfig};
use mboxpdf::error::ConvertError;
use mboxpdf::pipeline::walker::discover_archives;
use mboxpdf::pipeline::{ConvertOptions, Converter, Mode};
use mboxpdf::render::{ChromiumRenderer, DocumentRenderer, LopdfOptimizer, NullRenderer};

/// Convert MBOX archives into one PDF per message, with attachments saved
/// next to each PDF.
#[derive(Parser)]
#[command(name = "mboxpdf", version, about, long_about = None)]
struct Cli {
    /// MBOX file, or directory searched recursively for archives.
    /// Defaults to the Thunderbird profile directory under $APPDATA.
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Root directory for the converted output
    #[arg(
        short,
        long,
        value_name = "DIR",
        required_unless_present_any = ["completions", "manpage"]
    )]
    output_dir: Option<PathBuf>,

    /// Convert one message at a time
    #[arg(long)]
    no_parallel: bool,

    /// Re-render messages whose PDF already exists
    #[arg(short, long)]
    force: bool,

    /// Decide and count what would be rendered, without writing anything
    #[arg(long = "dryrun", visible_alias = "dry-run")]
    dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Chromium/Chrome binary used for rendering
    #[arg(long, value_name = "PATH", env = "MBOXPDF_CHROME")]
    chrome: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<clap_complete::Shell>,

    /// Generate a man page and exit
    #[arg(long)]
    manpage: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        return cmd_completions(shell);
    }
    if cli.manpage {
        return cmd_manpage();
    }

    // Load configuration
    let mut config = mboxpdf::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    if let Some(chrome) = cli.chrome.clone() {
        config.render.chrome_path = Some(chrome);
    }
    cmd_convert(&cli, &config).await
}

/// Run the conversion and print the summary.
async fn cmd_convert(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let Some(output_dir) = cli.output_dir.as_deref() else {
        anyhow::bail!("--output-dir is required");
    };
    let input = resolve_input(cli.input.clone(), &config.discovery)?;

    let discovery = discover_archives(&input, output_dir, &config.discovery.skip_extensions);
    for (path, reason) in &discovery.unreadable {
        tracing::warn!(path = %path.display(), reason = %reason, "Skipped unreadable input");
    }
    if discovery.archives.is_empty() {
        tracing::warn!(input = %input.display(), "No archives found");
    }

    let renderer: Arc<dyn DocumentRenderer> = if cli.dry_run {
        Arc::new(NullRenderer)
    } else {
        Arc::new(ChromiumRenderer::discover(&config.render)?)
    };

    let mut options = ConvertOptions::from_config(config);
    options.force = cli.force;
    options.dry_run = cli.dry_run;
    options.show_progress = !cli.json;
    if cli.no_parallel {
        options.mode = Mode::Sequential;
    }

    let converter = Converter::new(options, renderer, Arc::new(LopdfOptimizer));
    let report = converter.run(&discovery.archives).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if cli.dry_run {
            println!("Dry run: nothing was written.");
        }
        print!("{report}");
    }
    Ok(())
}

/// The explicit input, or the mail profile directory under the
/// application-data root.
fn resolve_input(
    input: Option<PathBuf>,
    discovery: &DiscoveryConfig,
) -> Result<PathBuf, ConvertError> {
    if let Some(path) = input {
        return Ok(path);
    }
    match std::env::var_os(&discovery.app_data_env) {
        Some(root) if !root.is_empty() => Ok(PathBuf::from(root).join(&discovery.profile_subdir)),
        _ => Err(ConvertError::MissingEnv {
            var: discovery.app_data_env.clone(),
            purpose: "the default mail profile directory".to_string(),
        }),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = mboxpdf::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mboxpdf.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxpdf", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
