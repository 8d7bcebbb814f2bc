//! Classifies a directory of CFDI XMLs into Nómina/Gasto/Vacíos and
//! packages the buckets as `XML_Clasificados.zip`.
//!
//! Prints `{"path": ..., "stats": {...}}` as the last line of stdout;
//! diagnostics go to stderr. Exit codes: 0 clean, 1 degraded, 2 fatal.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use comprobante::clasificador::clasificar_directorio;
use comprobante::core::{IssueTracker, ResumenEjecucion};

#[derive(Parser)]
#[command(name = "clasificador", about = "Clasifica XMLs CFDI en Nómina / Gasto / Vacíos")]
struct Args {
    /// Directorio de trabajo con los archivos XML
    directorio: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    if !args.directorio.is_dir() {
        eprintln!("ERROR: '{}' no es un directorio válido", args.directorio.display());
        return ExitCode::from(2);
    }

    let mut issues = IssueTracker::new();
    let resultado = clasificar_directorio(&args.directorio, &mut issues);

    issues.report("");

    if let Some(resultado) = resultado {
        println!("{}", ResumenEjecucion::new(&resultado.zip, resultado.stats).a_json());
    }

    ExitCode::from(issues.exit_code())
}
