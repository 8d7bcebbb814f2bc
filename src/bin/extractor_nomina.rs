//! Extracts payroll perception/deduction/subsidy data from a directory of
//! CFDI XMLs into `Percepciones_Deducciones_Subsidios.xlsx`.
//!
//! Prints the report path as the last line of stdout; diagnostics go to
//! stderr. Exit codes: 0 clean, 1 degraded, 2 fatal.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use comprobante::core::IssueTracker;
use comprobante::nomina::procesar_nomina;

#[derive(Parser)]
#[command(name = "extractor-nomina", about = "Extrae percepciones, deducciones y subsidios de recibos de nómina")]
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
    let resultado = procesar_nomina(&args.directorio, &mut issues);

    issues.report("Nómina");

    if let Some(resultado) = resultado {
        println!("{}", resultado.ruta.display());
    }

    ExitCode::from(issues.exit_code())
}
