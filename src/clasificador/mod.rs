//! Classifies a working directory of XML files into Nómina / Gasto /
//! Vacíos buckets and packages the result as `XML_Clasificados.zip`.
//!
//! A payroll slip is also a structurally valid CFDI (a `Comprobante` root
//! with a nested nómina complement), so the payroll probe runs first;
//! probing for CFDI-ness first would misclassify every payslip as an
//! expense.

use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

use crate::core::{IssueTracker, listar_xml_o_abortar, nombre_archivo};
use crate::xml::{
    BINDINGS_CFDI_33, BINDINGS_CFDI_40, BINDINGS_NOMINA, XmlElement, buscar_primero,
    cargar_documento,
};

/// File name of the classification archive, created at the workdir root.
pub const NOMBRE_ZIP: &str = "XML_Clasificados.zip";

/// Semantic category of one document. Total and mutually exclusive:
/// classification always yields exactly one of the three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipoDocumento {
    /// Payroll receipt (CFDI with a nómina complement).
    Nomina,
    /// Expense invoice, credit note, payment receipt — any other CFDI.
    Gasto,
    /// Unparseable or unrecognized.
    Vacio,
}

impl TipoDocumento {
    /// Bucket subdirectory name under the working directory.
    pub fn carpeta(self) -> &'static str {
        match self {
            Self::Nomina => "Nomina",
            Self::Gasto => "Gasto",
            Self::Vacio => "Vacios",
        }
    }
}

/// Classification counters, serialized into the stdout summary.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EstadisticasClasificacion {
    pub nomina: usize,
    pub gasto: usize,
    pub vacios: usize,
    pub total: usize,
}

/// Result of a classification run.
#[derive(Debug)]
pub struct ResultadoClasificacion {
    /// Path of the produced ZIP archive.
    pub zip: PathBuf,
    pub stats: EstadisticasClasificacion,
}

/// Classify one loaded document. Ordered probes, first match wins.
pub fn detectar_tipo(
    documento: Option<&XmlElement>,
    path: &Path,
    issues: &mut IssueTracker,
) -> TipoDocumento {
    // Load failures were already recorded by the loader.
    let Some(root) = documento else {
        return TipoDocumento::Vacio;
    };

    if buscar_primero(root, "nomina12:Nomina", &BINDINGS_NOMINA).is_some() {
        return TipoDocumento::Nomina;
    }
    if buscar_primero(root, "cfdi:Comprobante", &BINDINGS_CFDI_40).is_some() {
        return TipoDocumento::Gasto;
    }
    if buscar_primero(root, "cfdi:Comprobante", &BINDINGS_CFDI_33).is_some() {
        return TipoDocumento::Gasto;
    }
    // Some stamping software omits the namespace declaration entirely.
    if root.nombre().contains("Comprobante") {
        return TipoDocumento::Gasto;
    }

    issues.warn(format!(
        "Archivo '{}' no reconocido como Nómina ni CFDI",
        nombre_archivo(path)
    ));
    TipoDocumento::Vacio
}

/// Classify every XML file under `workdir`: copy (never move) each file
/// into its bucket subdirectory and assemble the ZIP archive.
///
/// Returns `None` only when the run as a whole failed (no input files, or
/// the archive could not be written); per-file problems are recorded and
/// skipped.
pub fn clasificar_directorio(
    workdir: &Path,
    issues: &mut IssueTracker,
) -> Option<ResultadoClasificacion> {
    let archivos = listar_xml_o_abortar(workdir, issues)?;

    for tipo in [TipoDocumento::Nomina, TipoDocumento::Gasto, TipoDocumento::Vacio] {
        let carpeta = workdir.join(tipo.carpeta());
        if let Err(e) = std::fs::create_dir_all(&carpeta) {
            issues.abort(format!("No se pudo crear '{}': {e}", carpeta.display()));
            return None;
        }
    }

    tracing::info!("Clasificando {} archivo(s) XML...", archivos.len());

    let mut stats = EstadisticasClasificacion::default();
    for path in &archivos {
        let documento = cargar_documento(path, issues);
        let tipo = detectar_tipo(documento.as_ref(), path, issues);
        stats.total += 1;
        match tipo {
            TipoDocumento::Nomina => stats.nomina += 1,
            TipoDocumento::Gasto => stats.gasto += 1,
            TipoDocumento::Vacio => stats.vacios += 1,
        }

        let nombre = nombre_archivo(path);
        let destino = workdir.join(tipo.carpeta()).join(&nombre);
        match std::fs::copy(path, &destino) {
            Ok(_) => tracing::info!("✓ {nombre} → {}", tipo.carpeta()),
            Err(e) => issues.error(format!("No se pudo copiar '{nombre}': {e}")),
        }
    }

    tracing::info!(
        "Clasificación completada: Nómina {}, Gasto {}, Vacíos {}",
        stats.nomina,
        stats.gasto,
        stats.vacios
    );

    let zip = workdir.join(NOMBRE_ZIP);
    if let Err(e) = crear_zip(workdir, &zip) {
        issues.abort(format!("Error al crear ZIP: {e}"));
        return None;
    }
    tracing::info!("✓ ZIP creado: {NOMBRE_ZIP}");

    Some(ResultadoClasificacion { zip, stats })
}

fn crear_zip(workdir: &Path, destino: &Path) -> Result<(), crate::core::ComprobanteError> {
    let salida = File::create(destino)?;
    let mut zip = zip::ZipWriter::new(salida);
    let opciones =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for carpeta in ["Nomina", "Gasto", "Vacios"] {
        let ruta_carpeta = workdir.join(carpeta);
        let mut entradas: Vec<PathBuf> = std::fs::read_dir(&ruta_carpeta)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entradas.sort();

        if entradas.is_empty() {
            // Empty buckets still appear as explicit directory entries.
            zip.add_directory(format!("{carpeta}/"), opciones)?;
            continue;
        }
        for entrada in entradas {
            let nombre = nombre_archivo(&entrada);
            zip.start_file(format!("{carpeta}/{nombre}"), opciones)?;
            let contenido = std::fs::read(&entrada)?;
            zip.write_all(&contenido)?;
        }
    }

    zip.finish()?;
    Ok(())
}
