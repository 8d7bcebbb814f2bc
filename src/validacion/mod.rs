//! Fiscal-status validation: extract each invoice's identity tuple, query
//! the SAT lookup service, and write the color-coded
//! `Validacion_CFDI.xlsx` report.
//!
//! The network call lives behind the [`ConsultaEstatus`] trait so the
//! pipeline is testable without the service; [`sat::ClienteSat`] is the
//! real implementation. One document's lookup failure never aborts the
//! batch — it degrades to an "Error de conexión" row.

mod sat;

pub use sat::{ClienteSat, SAT_URL};

use rust_xlsxwriter::{Color, Workbook};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::{ComprobanteError, IssueTracker, listar_xml_o_abortar, nombre_archivo};
use crate::reportes::{
    AnchoColumnas, RELLENO_AMBAR, RELLENO_GRIS, RELLENO_ROJO, RELLENO_VERDE, formato_relleno,
};
use crate::xml::{
    BINDINGS_CFDI_33, BINDINGS_CFDI_40, NamespaceBindings, XmlElement, atributo_o, buscar_primero,
    buscar_primero_local, cargar_documento,
};

/// File name of the validation report, created at the workdir root.
pub const NOMBRE_REPORTE: &str = "Validacion_CFDI.xlsx";

/// Provider-contract response strings; matched byte-for-byte, never
/// redesigned into business logic.
pub const CODIGO_EXITO: &str = "S - Comprobante obtenido satisfactoriamente.";
pub const CODIGO_NO_ENCONTRADO: &str =
    "N - 601: La consulta del comprobante resultó No encontrado.";

/// Identity tuple needed to query the status service.
#[derive(Debug, Clone)]
pub struct DatosCfdi {
    pub archivo: String,
    pub uuid: String,
    pub rfc_emisor: String,
    pub nombre_emisor: String,
    pub rfc_receptor: String,
    pub nombre_receptor: String,
    pub total: String,
}

impl DatosCfdi {
    /// Query-string-shaped lookup expression the service expects.
    pub fn expresion(&self) -> String {
        format!(
            "?re={}&rr={}&tt={}&id={}",
            self.rfc_emisor, self.rfc_receptor, self.total, self.uuid
        )
    }
}

/// Raw fields of one service response.
#[derive(Debug, Clone)]
pub struct RespuestaSat {
    pub codigo_estatus: String,
    pub estado: String,
    pub es_cancelable: String,
    pub estatus_cancelacion: String,
}

/// Classified fiscal status of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstatusCfdi {
    Vigente,
    Cancelado,
    NoEncontrado,
    /// Transport or timeout failure talking to the service.
    ErrorConexion,
    /// The file itself could not be read or is not a CFDI.
    Error,
    /// Any other provider state, verbatim.
    Otro(String),
}

impl EstatusCfdi {
    pub fn etiqueta(&self) -> &str {
        match self {
            Self::Vigente => "Vigente",
            Self::Cancelado => "Cancelado",
            Self::NoEncontrado => "No encontrado",
            Self::ErrorConexion => "Error de conexión",
            Self::Error => "ERROR",
            Self::Otro(estado) => estado,
        }
    }

    /// Report row fill for this status.
    pub fn relleno(&self) -> Color {
        match self {
            Self::Vigente => RELLENO_VERDE,
            Self::Cancelado => RELLENO_ROJO,
            Self::NoEncontrado => RELLENO_AMBAR,
            _ => RELLENO_GRIS,
        }
    }
}

impl std::fmt::Display for EstatusCfdi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.etiqueta())
    }
}

/// Map a successful service response to exactly one status.
pub fn clasificar_respuesta(respuesta: &RespuestaSat) -> EstatusCfdi {
    if respuesta.codigo_estatus == CODIGO_EXITO || respuesta.estado.contains("Vigente") {
        EstatusCfdi::Vigente
    } else if respuesta.codigo_estatus == CODIGO_NO_ENCONTRADO {
        EstatusCfdi::NoEncontrado
    } else if respuesta.estado.contains("Cancelado") {
        EstatusCfdi::Cancelado
    } else {
        EstatusCfdi::Otro(respuesta.estado.clone())
    }
}

/// The status-lookup seam: implemented by [`ClienteSat`] for the real
/// service, and by in-memory fakes in tests.
pub trait ConsultaEstatus {
    fn consultar(&self, datos: &DatosCfdi) -> Result<RespuestaSat, ComprobanteError>;
}

/// Extract the validation identity tuple from one loaded document.
///
/// Comprobante resolution cascade: CFDI 4.0, then 3.3, then an unqualified
/// local-name match. A document without a `Comprobante` or without a UUID
/// is an error — validation is meaningless without the fiscal folio.
/// Missing RFCs or total degrade to a warning.
pub fn extraer_datos(
    root: &XmlElement,
    archivo: &str,
    issues: &mut IssueTracker,
) -> Option<DatosCfdi> {
    let (comprobante, bindings): (&XmlElement, &NamespaceBindings) =
        if let Some(c) = buscar_primero(root, "cfdi:Comprobante", &BINDINGS_CFDI_40) {
            (c, &BINDINGS_CFDI_40)
        } else if let Some(c) = buscar_primero(root, "cfdi:Comprobante", &BINDINGS_CFDI_33) {
            (c, &BINDINGS_CFDI_33)
        } else if let Some(c) = buscar_primero_local(root, "Comprobante") {
            (c, &BINDINGS_CFDI_40)
        } else {
            issues.error(format!(
                "'{archivo}' no es un CFDI válido (no se encontró Comprobante)"
            ));
            return None;
        };

    let total = atributo_o(Some(comprobante), "Total", "0.0").to_string();

    let emisor = buscar_primero(root, "cfdi:Emisor", bindings)
        .or_else(|| buscar_primero_local(root, "Emisor"));
    let receptor = buscar_primero(root, "cfdi:Receptor", bindings)
        .or_else(|| buscar_primero_local(root, "Receptor"));
    let tfd = buscar_primero(root, "tfd:TimbreFiscalDigital", bindings)
        .or_else(|| buscar_primero_local(root, "TimbreFiscalDigital"));

    let uuid = atributo_o(tfd, "UUID", "").to_string();
    if uuid.is_empty() {
        issues.error(format!("'{archivo}' no tiene UUID (TimbreFiscalDigital)"));
        return None;
    }

    let rfc_emisor = atributo_o(emisor, "Rfc", "").to_string();
    let rfc_receptor = atributo_o(receptor, "Rfc", "").to_string();
    if rfc_emisor.is_empty() || rfc_receptor.is_empty() || total.is_empty() {
        issues.warn(format!(
            "'{archivo}' tiene datos incompletos (RFC Emisor, Receptor o Total faltantes)"
        ));
    }

    Some(DatosCfdi {
        archivo: archivo.to_string(),
        uuid,
        rfc_emisor,
        nombre_emisor: atributo_o(emisor, "Nombre", "").to_string(),
        rfc_receptor,
        nombre_receptor: atributo_o(receptor, "Nombre", "").to_string(),
        total,
    })
}

/// One row of the validation report.
#[derive(Debug, Clone)]
pub struct FilaValidacion {
    pub archivo: String,
    pub estatus: EstatusCfdi,
    pub uuid: String,
    pub rfc_emisor: String,
    pub nombre_emisor: String,
    pub rfc_receptor: String,
    pub nombre_receptor: String,
    pub total: String,
    pub codigo_estatus: String,
    pub es_cancelable: String,
    pub estatus_cancelacion: String,
    pub fecha_validacion: String,
}

/// Validation counters, serialized into the stdout summary.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EstadisticasValidacion {
    pub vigente: usize,
    pub cancelado: usize,
    pub no_encontrado: usize,
    pub error: usize,
}

impl EstadisticasValidacion {
    fn contar(&mut self, estatus: &EstatusCfdi) {
        match estatus {
            EstatusCfdi::Vigente => self.vigente += 1,
            EstatusCfdi::Cancelado => self.cancelado += 1,
            EstatusCfdi::NoEncontrado => self.no_encontrado += 1,
            _ => self.error += 1,
        }
    }
}

/// Result of a validation run.
#[derive(Debug)]
pub struct ResultadoValidacion {
    pub filas: Vec<FilaValidacion>,
    pub stats: EstadisticasValidacion,
    pub ruta: PathBuf,
}

fn marca_de_tiempo() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn fila_error(archivo: &str, causa: &str) -> FilaValidacion {
    FilaValidacion {
        archivo: archivo.to_string(),
        estatus: EstatusCfdi::Error,
        uuid: "N/A".to_string(),
        rfc_emisor: "N/A".to_string(),
        nombre_emisor: "N/A".to_string(),
        rfc_receptor: "N/A".to_string(),
        nombre_receptor: "N/A".to_string(),
        total: "N/A".to_string(),
        codigo_estatus: causa.to_string(),
        es_cancelable: "N/A".to_string(),
        estatus_cancelacion: "N/A".to_string(),
        fecha_validacion: marca_de_tiempo(),
    }
}

/// Validate every XML file under `workdir` against the status service and
/// write the report.
pub fn validar_directorio(
    workdir: &Path,
    cliente: &dyn ConsultaEstatus,
    issues: &mut IssueTracker,
) -> Option<ResultadoValidacion> {
    let archivos = listar_xml_o_abortar(workdir, issues)?;

    tracing::info!("Validando {} archivo(s) XML con el SAT...", archivos.len());

    let mut filas = Vec::new();
    let mut stats = EstadisticasValidacion::default();

    for path in &archivos {
        let archivo = nombre_archivo(path);
        let datos = cargar_documento(path, issues)
            .and_then(|root| extraer_datos(&root, &archivo, issues));

        let Some(datos) = datos else {
            filas.push(fila_error(&archivo, "No se pudo leer el archivo"));
            stats.error += 1;
            continue;
        };

        let (estatus, respuesta) = match cliente.consultar(&datos) {
            Ok(respuesta) => (clasificar_respuesta(&respuesta), respuesta),
            Err(e) => {
                let uuid_corto: String = datos.uuid.chars().take(8).collect();
                issues.warn(format!("Error al validar UUID {uuid_corto}: {e}"));
                (
                    EstatusCfdi::ErrorConexion,
                    RespuestaSat {
                        codigo_estatus: e.to_string(),
                        estado: String::new(),
                        es_cancelable: "N/A".to_string(),
                        estatus_cancelacion: "N/A".to_string(),
                    },
                )
            }
        };

        stats.contar(&estatus);
        tracing::info!("✓ {archivo} → {estatus}");

        filas.push(FilaValidacion {
            archivo: datos.archivo,
            estatus,
            uuid: datos.uuid,
            rfc_emisor: datos.rfc_emisor,
            nombre_emisor: datos.nombre_emisor,
            rfc_receptor: datos.rfc_receptor,
            nombre_receptor: datos.nombre_receptor,
            total: datos.total,
            codigo_estatus: respuesta.codigo_estatus,
            es_cancelable: respuesta.es_cancelable,
            estatus_cancelacion: respuesta.estatus_cancelacion,
            fecha_validacion: marca_de_tiempo(),
        });
    }

    let ruta = workdir.join(NOMBRE_REPORTE);
    tracing::info!("Generando reporte Excel...");
    if let Err(e) = escribir_reporte(&ruta, &filas) {
        issues.abort(format!("Error al crear Excel: {e}"));
        return None;
    }

    tracing::info!(
        "Vigentes {}, Cancelados {}, No encontrados {}, Errores {}",
        stats.vigente,
        stats.cancelado,
        stats.no_encontrado,
        stats.error
    );

    Some(ResultadoValidacion { filas, stats, ruta })
}

const ENCABEZADOS: [&str; 12] = [
    "archivo",
    "estatus",
    "uuid",
    "rfc_emisor",
    "nombre_emisor",
    "rfc_receptor",
    "nombre_receptor",
    "total",
    "codigo_estatus",
    "es_cancelable",
    "estado_cancelacion",
    "fecha_validacion",
];

fn escribir_reporte(ruta: &Path, filas: &[FilaValidacion]) -> Result<(), ComprobanteError> {
    let mut libro = Workbook::new();
    let hoja = libro.add_worksheet().set_name("Validación")?;

    let mut anchos = AnchoColumnas::new();
    for (col, titulo) in ENCABEZADOS.iter().enumerate() {
        hoja.write_string(0, col as u16, *titulo)?;
        anchos.observar(col as u16, titulo);
    }

    for (i, fila) in filas.iter().enumerate() {
        let r = i as u32 + 1;
        let relleno = formato_relleno(fila.estatus.relleno());
        let celdas: [&str; 12] = [
            fila.archivo.as_str(),
            fila.estatus.etiqueta(),
            fila.uuid.as_str(),
            fila.rfc_emisor.as_str(),
            fila.nombre_emisor.as_str(),
            fila.rfc_receptor.as_str(),
            fila.nombre_receptor.as_str(),
            fila.total.as_str(),
            fila.codigo_estatus.as_str(),
            fila.es_cancelable.as_str(),
            fila.estatus_cancelacion.as_str(),
            fila.fecha_validacion.as_str(),
        ];
        for (col, valor) in celdas.iter().enumerate() {
            hoja.write_string_with_format(r, col as u16, *valor, &relleno)?;
            anchos.observar(col as u16, valor);
        }
    }

    anchos.aplicar(hoja)?;
    libro.save(ruta)?;
    Ok(())
}
