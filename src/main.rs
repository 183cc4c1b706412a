use clap::{Parser, Subcommand};
use foundation_site::favicon::HttpFetcher;
use foundation_site::pipeline::{self, BuildOptions, BuildPaths};
use foundation_site::{config, output};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Flags for the build command.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Wipe the favicon cache before building
    #[arg(long)]
    clean: bool,

    /// Re-fetch every favicon even when one is cached
    #[arg(long)]
    refetch: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("FOUNDATION_SITE_ON_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("FOUNDATION_SITE_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "foundation-site")]
#[command(about = "Static site builder for a foundation's giving portfolio")]
#[command(long_about = "\
Static site builder for a foundation's giving portfolio

Reads organizations from a CSV file, fetches each organization's favicon,
and renders the portfolio table into the site's index.html.

Inputs:

  data/organizations.csv     Org,Class,Reason,Amount,Why,Summary,Website,
                             EIN,CharityNavigator,GuideStar
  site/
  ├── config.toml            Optional settings (see gen-config)
  ├── index.html             Template; rows replace the portfolio-table tbody
  ├── styles.css             Copied as-is (built-in stylesheet when absent)
  └── images/                Copied to dist/images/

Favicons are tried in order: conventional paths (/favicon.ico, ...), the
homepage's <link rel=\"icon\"> tags, then a favicon-by-domain service. Found
icons are cached in the temp directory; use --refetch to ignore the cache.

Set RUST_LOG=debug to see every fetch attempt.")]
#[command(version = version_string())]
struct Cli {
    /// Organizations CSV
    #[arg(long, default_value = pipeline::DEFAULT_DATA, global = true)]
    data: PathBuf,

    /// Site source directory (template, stylesheet, images, config.toml)
    #[arg(long, default_value = pipeline::DEFAULT_SOURCE, global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = pipeline::DEFAULT_OUTPUT, global = true)]
    output: PathBuf,

    /// Directory for the favicon cache
    #[arg(long, default_value = pipeline::DEFAULT_TEMP_DIR, global = true)]
    temp_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn paths(&self) -> BuildPaths {
        BuildPaths {
            data: self.data.clone(),
            source: self.source.clone(),
            output: self.output.clone(),
            temp_dir: self.temp_dir.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: load → favicons → render → write
    Build(BuildArgs),
    /// Validate the CSV, config and template without building
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::Build(args) => {
            let site_config = config::load_config(&cli.source)?;
            let fetcher = HttpFetcher::new(&site_config.fetch)?;
            let options = BuildOptions {
                clean: args.clean,
                refetch: args.refetch,
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_build_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = pipeline::build(&cli.paths(), options, &site_config, &fetcher, Some(tx));
            printer.join().ok();
            let report = result?;
            output::print_build_report(&report);
        }
        Command::Check => {
            println!("==> Checking {}", cli.data.display());
            config::load_config(&cli.source)?;
            let report = pipeline::check(&cli.paths())?;
            output::print_check_output(&report, &cli.source);
            println!("==> Data is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so they never mix with the progress output.
/// `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
