use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dbcalc::calculator::Calculator;
use dbcalc::catalog::{Catalog, FamilyKind};
use dbcalc::config::Config;
use dbcalc::render::{self, Selector};
use dbcalc::server;
use dbcalc::types::{
    CalculationRequest, DimensionRequest, LoadTypeRequest, OutputFormat, ResponseMessage,
    Version,
};

#[derive(Debug, Parser)]
#[command(name = "dbcalc", version, about = "MySQL cluster sizing calculator")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "DBCALC_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve `/calculator` and `/supported` over HTTP.
    Serve {
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one calculation and print the answer.
    Calc {
        #[arg(long, default_value = "pxc")]
        dbtype: String,
        #[arg(long)]
        dimension: u32,
        #[arg(long)]
        load: u32,
        /// 0 searches for the largest supportable count.
        #[arg(long, default_value_t = 0)]
        connections: u32,
        #[arg(long = "mysql-version")]
        mysql_version: String,
        /// Milli-cores, open dimension (999) only.
        #[arg(long, default_value_t = 0)]
        cpu: u32,
        /// Memory such as "2.5G", open dimension (999) only.
        #[arg(long)]
        memory: Option<String>,
        #[arg(long)]
        output: Option<String>,
        /// Print one family only: mysql, proxy or monitor.
        #[arg(long, requires = "section")]
        family: Option<String>,
        /// mysqld, probes, resources or haproxyConfig.
        #[arg(long, requires = "family")]
        section: Option<String>,
        /// Answer an over-utilized explicit count as-is instead of walking it down.
        #[arg(long)]
        no_recalculate: bool,
    },
    /// Print the supported dimensions, loads and versions as JSON.
    Supported,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = Config::load(cli.config)?;

    match cli.command {
        Command::Serve { address, port } => {
            if let Some(address) = address {
                cfg.address = address;
            }
            if let Some(port) = port {
                cfg.port = port;
            }
            info!("starting dbcalc with config {:?}", cfg);
            let calculator = Calculator::new(Catalog::builtin()?, cfg.search());
            server::serve(&cfg, calculator).await
        }
        Command::Calc {
            dbtype,
            dimension,
            load,
            connections,
            mysql_version,
            cpu,
            memory,
            output,
            family,
            section,
            no_recalculate,
        } => {
            let mut search = cfg.search();
            if no_recalculate {
                search.recalculate_explicit = false;
            }
            let calculator = Calculator::new(Catalog::builtin()?, search);

            let format = match output.as_deref() {
                Some(raw) => raw.parse::<OutputFormat>()?,
                None => cfg.default_output,
            };
            let request = CalculationRequest {
                dbtype,
                dimension: DimensionRequest {
                    id: dimension,
                    cpu,
                    memory,
                    memory_bytes: 0.0,
                },
                loadtype: LoadTypeRequest { id: load },
                connections,
                output: Some(format.as_str().to_string()),
                mysqlversion: Some(mysql_version.parse::<Version>().context("invalid --mysql-version")?),
            };

            let calc = match calculator.calculate(&request) {
                Ok(calc) => calc,
                Err(err) if err.is_user_error() => {
                    let message = ResponseMessage::invalid_request(&err.to_string());
                    print!("{}", render::error_envelope(&message, format)?);
                    std::process::exit(2);
                }
                Err(err) => return Err(err.into()),
            };

            match (family, section) {
                (Some(family), Some(section)) => {
                    let kind = parse_family(&family)?;
                    let selector: Selector = section.parse()?;
                    print!("{}", render::family_section(&calc.answer, kind, selector, ""));
                }
                _ => println!("{}", render::render(&calc, format)?),
            }
            Ok(())
        }
        Command::Supported => {
            let catalog = Catalog::builtin()?;
            println!("{}", serde_json::to_string_pretty(&catalog.supported())?);
            Ok(())
        }
    }
}

fn parse_family(raw: &str) -> Result<FamilyKind> {
    FamilyKind::ALL
        .into_iter()
        .find(|k| k.key() == raw)
        .with_context(|| format!("unknown family {raw}; expected mysql, proxy or monitor"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
