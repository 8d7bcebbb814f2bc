//! Validates each CFDI in a directory against the SAT status service and
//! writes the color-coded `Validacion_CFDI.xlsx` report.
//!
//! Prints `{"path": ..., "stats": {...}}` as the last line of stdout;
//! diagnostics go to stderr. Exit codes: 0 clean, 1 degraded, 2 fatal.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use comprobante::core::{IssueTracker, ResumenEjecucion};
use comprobante::validacion::{ClienteSat, validar_directorio};

#[derive(Parser)]
#[command(name = "validador", about = "Valida el estatus fiscal de CFDIs contra el servicio del SAT")]
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
    let cliente = ClienteSat::new();
    let resultado = validar_directorio(&args.directorio, &cliente, &mut issues);

    issues.report("");

    if let Some(resultado) = resultado {
        println!("{}", ResumenEjecucion::new(&resultado.ruta, resultado.stats).a_json());
    }

    ExitCode::from(issues.exit_code())
}
