//! `frost`: download observations from a Frost server and turn them into station archives.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use frost_archive::{
    download_observations, parse_until, write_archive, write_mmd, write_parquet,
    AttributeTemplate, FrostClient, StationArchive, TimeRange, DEFAULT_ELEMENTS, DEFAULT_SERVER,
};
use log::{info, LevelFilter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "frost")]
#[command(about = "Process observations from a Frost server, generating station archives and metadata from them")]
struct Cli {
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    loglevel: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => LevelFilter::Error,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download data from a Frost server
    Download {
        /// Name of Frost server to connect to
        #[arg(long, env = "FROST_SERVER", default_value = DEFAULT_SERVER)]
        server: String,

        /// API key for Frost
        #[arg(long, env = "FROST_KEY", hide_env_values = true)]
        key: String,

        #[command(subcommand)]
        command: DownloadCommand,
    },

    /// Process data downloaded via `frost download` into various outputs
    Write {
        #[command(subcommand)]
        command: WriteCommand,
    },
}

#[derive(Subcommand)]
enum DownloadCommand {
    /// Store observations into monthly batch files and print their names
    Observations {
        /// Base folder to write files into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Elements to download; may be given several times
        #[arg(short, long = "element")]
        elements: Vec<String>,

        /// Stations to download, such as SN18700; may be given several times
        #[arg(short, long = "station", required = true)]
        stations: Vec<String>,

        /// Latest month to download, as YYYY-MM. Defaults to the current month
        #[arg(short = 't', long)]
        until: Option<String>,

        /// Months back in time to download
        #[arg(long)]
        duration: Option<u32>,
    },

    /// Print the Frost element catalog as JSON
    Elements,

    /// Print the source descriptor of a station as JSON
    Source {
        #[arg(short, long)]
        station: String,
    },
}

#[derive(Subcommand)]
enum WriteCommand {
    /// Write or append to a station archive
    Archive {
        /// Archive to write. Defaults to `<wigosId>.bin`
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Station source descriptor, as printed by `frost download source`
        #[arg(short, long)]
        source: PathBuf,

        /// Element catalog, as printed by `frost download elements`
        #[arg(short, long)]
        elements: Option<PathBuf>,

        /// Append to an existing archive instead of creating a new one
        #[arg(short, long)]
        append: bool,

        /// Replace an existing archive when creating
        #[arg(long, conflicts_with = "append")]
        force: bool,

        /// YAML template of global attributes
        #[arg(long)]
        attributes: Option<PathBuf>,

        /// Batch files written by `frost download observations`, oldest first
        inputs: Vec<PathBuf>,
    },

    /// Write MMD metadata documents, named by WIGOS id
    Mmd {
        /// Folder to write documents into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Announced OPeNDAP location of the data
        #[arg(short, long)]
        location: Option<String>,

        #[arg(required = true)]
        stores: Vec<PathBuf>,
    },

    /// Export an archive to a parquet file
    Parquet {
        #[arg(short, long)]
        output: PathBuf,

        store: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.loglevel.into())
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Download {
            server,
            key,
            command,
        } => {
            let client = FrostClient::new(&server, key);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(download(&client, command))
        }
        Commands::Write { command } => write(command),
    }
}

async fn download(client: &FrostClient, command: DownloadCommand) -> Result<()> {
    match command {
        DownloadCommand::Observations {
            output,
            elements,
            stations,
            until,
            duration,
        } => {
            let elements = if elements.is_empty() {
                DEFAULT_ELEMENTS.iter().map(|e| e.to_string()).collect()
            } else {
                elements
            };
            let until = until.as_deref().map(parse_until).transpose()?;
            let range = TimeRange::ending_at(until, duration, Utc::now().date_naive())?;

            let mut files = Vec::new();
            for station in &stations {
                info!("Reading station {}", station);
                let written = download_observations()
                    .client(client)
                    .station(station)
                    .elements(&elements)
                    .range(range)
                    .output(&output)
                    .call()
                    .await
                    .with_context(|| format!("Downloading observations for {}", station))?;
                files.extend(written);
            }
            let names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
            println!("{}", names.join(" "));
        }
        DownloadCommand::Elements => {
            let elements = client.get_elements().await?;
            println!("{}", serde_json::to_string(&elements)?);
        }
        DownloadCommand::Source { station } => {
            let source = client.get_source(&station).await?;
            println!("{}", serde_json::to_string(&source)?);
        }
    }
    Ok(())
}

fn write(command: WriteCommand) -> Result<()> {
    match command {
        WriteCommand::Archive {
            output,
            source,
            elements,
            append,
            force,
            attributes,
            inputs,
        } => {
            let template = attributes
                .as_deref()
                .map(AttributeTemplate::from_yaml_file)
                .transpose()?;
            let program_args = std::env::args().collect::<Vec<_>>().join(" ");
            let summary = write_archive()
                .station(&source)
                .maybe_catalog(elements.as_deref())
                .inputs(&inputs)
                .maybe_output(output.as_deref())
                .append(append)
                .overwrite(force)
                .maybe_template(template)
                .program_args(program_args)
                .call()?;
            info!(
                "Wrote {} values ({} new times) to {}",
                summary.written_values,
                summary.appended_times,
                summary.output.display()
            );
        }
        WriteCommand::Mmd {
            output,
            location,
            stores,
        } => {
            for store in &stores {
                let written = write_mmd(&output, store, location.as_deref())
                    .with_context(|| format!("Writing MMD for {}", store.display()))?;
                println!("{}", written.display());
            }
        }
        WriteCommand::Parquet { output, store } => {
            let archive = StationArchive::open(&store)?;
            let rows = write_parquet(&archive, &output)?;
            info!("Wrote {} rows to {}", rows, output.display());
        }
    }
    Ok(())
}
