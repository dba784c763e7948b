//! statpull command-line entry point.

mod params;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use statpull::{
    resolve_out_root, Config, DatasetRequest, Eurostat, HttpClient, Iea, IeaRequest, Ilo, ListCache,
    Lookup, PageLayout, RenderContext, Renderer, Table, WorldBank,
};

const EUROSTAT_DEFAULTS: &[(&str, &str)] = &[("format", "JSON")];
const ILO_DEFAULTS: &[(&str, &str)] = &[
    ("format", "jsondata"),
    ("startPeriod", "2014-01-01"),
    ("endPeriod", "2014-12-31"),
];
const WORLD_BANK_DEFAULTS: &[(&str, &str)] =
    &[("format", "JSON"), ("per_page", "30000"), ("freq", "Y")];

#[derive(Parser)]
#[command(
    name = "statpull",
    about = "Pull Eurostat, ILO, World Bank and IEA statistics into flat CSV tables",
    version
)]
struct Cli {
    /// Root directory for output files. Also reads STATPULL_OUT_DIR.
    #[arg(long, global = true)]
    out_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RestArgs {
    /// Extra query parameter. Repeat a key to send a list.
    #[arg(
        short = 'p',
        long = "param",
        value_name = "KEY=VALUE",
        value_parser = params::parse_pair
    )]
    params: Vec<(String, String)>,

    /// Fetch and reshape without writing the CSV.
    #[arg(long)]
    no_write: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull a Eurostat dataset.
    Eurostat {
        #[arg(default_value = "nama_10_gdp")]
        dataset: String,

        #[command(flatten)]
        args: RestArgs,
    },

    /// Pull an ILO SDMX dataflow.
    Ilo {
        #[arg(default_value = "EMP_TEMP_SEX_STE_OCU_NB")]
        dataset: String,

        /// Restrict to one reference area, e.g. AUT.
        #[arg(long)]
        country: Option<String>,

        #[command(flatten)]
        args: RestArgs,
    },

    /// Pull a World Bank indicator for all countries.
    WorldBank {
        #[arg(default_value = "NY.GDP.MKTP.KD")]
        indicator: String,

        #[command(flatten)]
        args: RestArgs,
    },

    /// Scrape the IEA energy statistics data browser.
    Iea {
        /// Show the browser window.
        #[arg(long, global = true)]
        headed: bool,

        /// JSON file overriding page selectors.
        #[arg(long, global = true)]
        layout: Option<PathBuf>,

        #[command(subcommand)]
        command: IeaCommands,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   statpull completions bash > ~/.local/share/bash-completion/completions/statpull
    ///   statpull completions zsh > ~/.zfunc/_statpull
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum IeaCommands {
    /// Scrape balances for every country x year.
    Data {
        #[arg(long = "country", required = true)]
        countries: Vec<String>,

        #[arg(long = "year", required = true)]
        years: Vec<String>,

        /// Keep only these fuels.
        #[arg(long = "fuel")]
        fuels: Vec<String>,

        #[arg(long)]
        no_write: bool,
    },
    /// List available countries.
    Countries {
        #[arg(long)]
        refresh: bool,
    },
    /// List available fuels.
    Fuels {
        #[arg(long)]
        refresh: bool,
    },
    /// List available years.
    Years {
        #[arg(long)]
        refresh: bool,
    },
}

/// What to do once the IEA page is open.
enum IeaJob {
    Data(IeaRequest),
    Lookup(Lookup, bool),
}

fn summarize(table: &Table, path: Option<PathBuf>) {
    println!("{} rows x {} columns", table.len(), table.columns().len());
    if let Some(path) = path {
        println!("  written to {}", path.display());
    }
}

async fn run_iea(
    config: &Config,
    headed: bool,
    layout: Option<PathBuf>,
    job: IeaJob,
) -> anyhow::Result<()> {
    let mut iea_config = config.iea.clone();
    iea_config.headless = !headed;
    if let Some(path) = layout {
        iea_config.layout = PageLayout::from_json_file(&path)?;
    }
    let iea = Iea::new(iea_config);

    // Cached lookups never need a browser
    if let IeaJob::Lookup(lookup, false) = job {
        let cache = ListCache::new(iea.config().lookup_path(lookup.name()), lookup.column());
        if let Some(values) = cache.load()? {
            values.iter().for_each(|v| println!("{v}"));
            return Ok(());
        }
    }

    let renderer = iea.launch().await?;
    let mut ctx = renderer.new_context().await?;
    let result = drive_iea(&iea, ctx.as_mut(), job).await;
    if let Err(e) = ctx.close().await {
        tracing::warn!("closing tab: {e}");
    }
    renderer.shutdown().await?;
    result
}

async fn drive_iea(iea: &Iea, ctx: &mut dyn RenderContext, job: IeaJob) -> anyhow::Result<()> {
    iea.open(ctx).await?;
    match job {
        IeaJob::Data(request) => {
            let table = iea.fetch(ctx, &request).await?;
            summarize(&table, request.write.then(|| iea.config().data_path()));
        }
        IeaJob::Lookup(lookup, refresh) => {
            for value in iea.lookup(ctx, lookup, refresh).await? {
                println!("{value}");
            }
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let root = resolve_out_root(cli.out_dir.as_deref());
    let config = Config::rooted_at(&root);
    tracing::debug!("output root: {}", root.display());

    match cli.command {
        Commands::Eurostat { dataset, args } => {
            let http = HttpClient::new(config.http_timeout_ms)?;
            let connector = Eurostat::new(http, config.eurostat.clone());
            let query = params::merge(EUROSTAT_DEFAULTS, &args.params);
            let request = DatasetRequest::new(&dataset, query).write(!args.no_write);
            let table = connector.fetch(&request).await?;
            summarize(&table, request.write.then(|| config.eurostat.output_path(&dataset)));
        }

        Commands::Ilo { dataset, country, args } => {
            let http = HttpClient::new(config.http_timeout_ms)?;
            let connector = Ilo::new(http, config.ilo.clone());
            let query = params::merge(ILO_DEFAULTS, &args.params);
            let request = DatasetRequest::new(&dataset, query).write(!args.no_write);
            let table = connector.fetch(&request, country.as_deref()).await?;
            summarize(&table, request.write.then(|| config.ilo.output_path(&dataset)));
        }

        Commands::WorldBank { indicator, args } => {
            let http = HttpClient::new(config.http_timeout_ms)?;
            let connector = WorldBank::new(http, config.world_bank.clone());
            let query = params::merge(WORLD_BANK_DEFAULTS, &args.params);
            let request = DatasetRequest::new(&indicator, query).write(!args.no_write);
            let table = connector.fetch(&request).await?;
            let path = config.world_bank.output_path(&indicator);
            summarize(&table, request.write.then_some(path));
        }

        Commands::Iea { headed, layout, command } => {
            let job = match command {
                IeaCommands::Data {
                    countries,
                    years,
                    fuels,
                    no_write,
                } => IeaJob::Data(IeaRequest {
                    countries,
                    years,
                    fuels,
                    write: !no_write,
                }),
                IeaCommands::Countries { refresh } => IeaJob::Lookup(Lookup::Countries, refresh),
                IeaCommands::Fuels { refresh } => IeaJob::Lookup(Lookup::Fuels, refresh),
                IeaCommands::Years { refresh } => IeaJob::Lookup(Lookup::Years, refresh),
            };
            run_iea(&config, headed, layout, job).await?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "statpull", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
