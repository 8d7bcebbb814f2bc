//! Payroll (nómina) extraction: perception, deduction, and subsidy
//! concepts flattened into `Percepciones_Deducciones_Subsidios.xlsx`.
//!
//! The summary sheet's column set is data-dependent — one column per
//! distinct (clave, concepto) pair observed anywhere in the batch — so the
//! extraction runs in two passes: the first builds the detail rows and the
//! deduplicated concept catalogs, the second emits one summary row per
//! payslip against the finalized column list.
//!
//! Column headers truncate clave/concepto to bound their length. Two
//! distinct pairs can collide after truncation; when they do, the later
//! catalog entry owns the column and each document's first matching amount
//! fills it. Known limitation, kept deliberately: the spreadsheet
//! consumers depend on this exact behavior.

use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, Workbook};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::core::{ComprobanteError, IssueTracker, listar_xml_o_abortar, nombre_archivo};
use crate::reportes::{
    AnchoColumnas, RELLENO_AZUL, RELLENO_ROJO, RELLENO_VERDE, escribir_decimal,
    formato_encabezado, formato_relleno,
};
use crate::xml::{
    BINDINGS_COMBINADO, XmlElement, a_decimal, atributo_o, buscar_primero, buscar_todos,
    buscar_todos_local, cargar_documento, resumen_namespaces,
};

/// File name of the payroll report, created at the workdir root.
pub const NOMBRE_REPORTE: &str = "Percepciones_Deducciones_Subsidios.xlsx";

/// `OtroPago` subtype that represents the employment subsidy; every other
/// subtype is ignored.
pub const TIPO_OTRO_PAGO_SUBSIDIO: &str = "002";

const TRUNCADO_CLAVE: usize = 15;
const TRUNCADO_CONCEPTO: usize = 20;

/// Kind of one payroll concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipoConcepto {
    Percepcion,
    Deduccion,
    Subsidio,
}

impl TipoConcepto {
    /// Spanish label used in the detail sheet.
    pub fn etiqueta(self) -> &'static str {
        match self {
            Self::Percepcion => "Percepción",
            Self::Deduccion => "Deducción",
            Self::Subsidio => "Subsidio",
        }
    }

    /// Column-header key prefix.
    pub fn prefijo(self) -> char {
        match self {
            Self::Percepcion => 'P',
            Self::Deduccion => 'D',
            Self::Subsidio => 'S',
        }
    }

    /// Detail-sheet fill color for this kind.
    pub fn relleno(self) -> Color {
        match self {
            Self::Percepcion => RELLENO_VERDE,
            Self::Deduccion => RELLENO_ROJO,
            Self::Subsidio => RELLENO_AZUL,
        }
    }
}

/// One perception/deduction/subsidy occurrence — the audit ("flat detail")
/// output, independent of the catalog.
#[derive(Debug, Clone)]
pub struct FilaDetalle {
    pub archivo: String,
    pub tipo: TipoConcepto,
    /// `TipoPercepcion` / `TipoDeduccion` / `TipoOtroPago` raw code.
    pub tipo_concepto: String,
    pub clave: String,
    pub concepto: String,
    /// Present only for perceptions.
    pub gravado: Option<Decimal>,
    /// Present only for perceptions.
    pub exento: Option<Decimal>,
    pub total: Decimal,
}

/// Deduplicated (clave, concepto) pairs per concept kind, collected across
/// the whole batch before any summary row is emitted.
///
/// `BTreeSet` keeps each catalog sorted lexicographically by
/// (clave, concepto) — column order is reproducible regardless of file
/// enumeration order.
#[derive(Debug, Default, Clone)]
pub struct CatalogoConceptos {
    pub percepciones: BTreeSet<(String, String)>,
    pub deducciones: BTreeSet<(String, String)>,
    pub subsidios: BTreeSet<(String, String)>,
}

impl CatalogoConceptos {
    /// Insert a pair; blank clave or concepto is never cataloged.
    pub fn insertar(&mut self, tipo: TipoConcepto, clave: &str, concepto: &str) {
        if clave.is_empty() || concepto.is_empty() {
            return;
        }
        let par = (clave.to_string(), concepto.to_string());
        match tipo {
            TipoConcepto::Percepcion => self.percepciones.insert(par),
            TipoConcepto::Deduccion => self.deducciones.insert(par),
            TipoConcepto::Subsidio => self.subsidios.insert(par),
        };
    }

    fn bloques(&self) -> [(TipoConcepto, &BTreeSet<(String, String)>); 3] {
        [
            (TipoConcepto::Percepcion, &self.percepciones),
            (TipoConcepto::Deduccion, &self.deducciones),
            (TipoConcepto::Subsidio, &self.subsidios),
        ]
    }

    /// Finalized dynamic column headers: all perceptions, then deductions,
    /// then subsidies, each block in catalog order.
    pub fn encabezados(&self) -> Vec<String> {
        self.bloques()
            .iter()
            .flat_map(|(tipo, pares)| {
                pares
                    .iter()
                    .map(|(clave, concepto)| clave_columna(*tipo, clave, concepto))
            })
            .collect()
    }
}

/// Stable column identity for one cataloged concept:
/// `P-<clave:15>-<concepto:20>`.
pub fn clave_columna(tipo: TipoConcepto, clave: &str, concepto: &str) -> String {
    format!(
        "{}-{}-{}",
        tipo.prefijo(),
        truncar(clave, TRUNCADO_CLAVE),
        truncar(concepto, TRUNCADO_CONCEPTO)
    )
}

// Character-safe: payroll labels carry accented Spanish text.
fn truncar(texto: &str, max: usize) -> String {
    texto.chars().take(max).collect()
}

/// One summary row: identity, period totals, and the dynamic concept
/// amounts aligned with the finalized header list. Unmatched columns stay
/// `None` — an explicit empty cell, never a zero.
#[derive(Debug, Clone)]
pub struct FilaNomina {
    pub uuid: String,
    /// 1-based sequential row number in processing order.
    pub consecutivo: u32,
    pub num_empleado: String,
    pub nombre: String,
    pub rfc: String,
    pub curp: String,
    pub puesto: String,
    pub departamento: String,
    pub tipo_nomina: String,
    pub fecha_comprobante: String,
    pub num_dias_pagados: String,
    pub fecha_inicial_pago: String,
    pub fecha_final_pago: String,
    pub fecha_pago: String,
    pub total_percepciones: Decimal,
    pub total_deducciones: Decimal,
    pub total_subsidios: Decimal,
    pub total_neto: Decimal,
    pub conceptos: Vec<Option<Decimal>>,
}

/// Everything a payroll run produced, plus the written report's path.
#[derive(Debug)]
pub struct ResultadoNomina {
    pub detalle: Vec<FilaDetalle>,
    pub catalogo: CatalogoConceptos,
    pub encabezados_conceptos: Vec<String>,
    pub filas: Vec<FilaNomina>,
    pub ruta: PathBuf,
}

/// Payroll element lookup: qualified `nomina12` search first, local-name
/// fallback for complements stamped without the prefix.
fn elementos_nomina<'a>(root: &'a XmlElement, nombre: &str) -> Vec<&'a XmlElement> {
    let elementos = buscar_todos(root, &format!("nomina12:{nombre}"), &BINDINGS_COMBINADO);
    if elementos.is_empty() {
        buscar_todos_local(root, nombre)
    } else {
        elementos
    }
}

/// First local-name match carrying any of the given attributes, else the
/// first match at all. Disambiguates the two `Receptor` elements (CFDI
/// party vs payroll employee) when namespaces are missing.
fn primer_local_con<'a>(
    root: &'a XmlElement,
    nombre: &str,
    atributos: &[&str],
) -> Option<&'a XmlElement> {
    let candidatos = buscar_todos_local(root, nombre);
    candidatos
        .iter()
        .find(|e| e.tiene_alguno(atributos))
        .copied()
        .or_else(|| candidatos.first().copied())
}

fn importe_percepcion(
    percepcion: &XmlElement,
    issues: &mut IssueTracker,
) -> (Decimal, Decimal, Decimal) {
    let gravado = a_decimal(
        percepcion.atributo("ImporteGravado"),
        Decimal::ZERO,
        issues,
        "ImporteGravado",
    );
    let exento = a_decimal(
        percepcion.atributo("ImporteExento"),
        Decimal::ZERO,
        issues,
        "ImporteExento",
    );
    (gravado, exento, gravado + exento)
}

/// Pass 1 over one document: detail rows plus catalog insertion.
fn extraer_detalle(
    root: &XmlElement,
    archivo: &str,
    catalogo: &mut CatalogoConceptos,
    issues: &mut IssueTracker,
) -> Vec<FilaDetalle> {
    let percepciones = elementos_nomina(root, "Percepcion");
    let deducciones = elementos_nomina(root, "Deduccion");
    let otros_pagos = elementos_nomina(root, "OtroPago");

    if percepciones.is_empty() && deducciones.is_empty() && otros_pagos.is_empty() {
        issues.warn(format!(
            "{archivo}: No se detectaron nodos de nómina. Namespaces encontrados: {}",
            resumen_namespaces(root)
        ));
    }

    let mut filas = Vec::new();

    for percepcion in percepciones {
        let clave = percepcion.atributo("Clave").unwrap_or("").to_string();
        let concepto = percepcion.atributo("Concepto").unwrap_or("").to_string();
        let (gravado, exento, total) = importe_percepcion(percepcion, issues);
        catalogo.insertar(TipoConcepto::Percepcion, &clave, &concepto);
        filas.push(FilaDetalle {
            archivo: archivo.to_string(),
            tipo: TipoConcepto::Percepcion,
            tipo_concepto: percepcion.atributo("TipoPercepcion").unwrap_or("").to_string(),
            clave,
            concepto,
            gravado: Some(gravado),
            exento: Some(exento),
            total,
        });
    }

    for deduccion in deducciones {
        let clave = deduccion.atributo("Clave").unwrap_or("").to_string();
        let concepto = deduccion.atributo("Concepto").unwrap_or("").to_string();
        let importe = a_decimal(
            deduccion.atributo("Importe"),
            Decimal::ZERO,
            issues,
            "Importe Deducción",
        );
        catalogo.insertar(TipoConcepto::Deduccion, &clave, &concepto);
        filas.push(FilaDetalle {
            archivo: archivo.to_string(),
            tipo: TipoConcepto::Deduccion,
            tipo_concepto: deduccion.atributo("TipoDeduccion").unwrap_or("").to_string(),
            clave,
            concepto,
            gravado: None,
            exento: None,
            total: importe,
        });
    }

    for otro_pago in otros_pagos {
        if otro_pago.atributo("TipoOtroPago") != Some(TIPO_OTRO_PAGO_SUBSIDIO) {
            continue;
        }
        let clave = otro_pago.atributo("Clave").unwrap_or("").to_string();
        let concepto = otro_pago.atributo("Concepto").unwrap_or("").to_string();
        let importe = a_decimal(
            otro_pago.atributo("Importe"),
            Decimal::ZERO,
            issues,
            "Importe Subsidio",
        );
        catalogo.insertar(TipoConcepto::Subsidio, &clave, &concepto);
        filas.push(FilaDetalle {
            archivo: archivo.to_string(),
            tipo: TipoConcepto::Subsidio,
            tipo_concepto: TIPO_OTRO_PAGO_SUBSIDIO.to_string(),
            clave,
            concepto,
            gravado: None,
            exento: None,
            total: importe,
        });
    }

    filas
}

fn texto(el: Option<&XmlElement>, atributo: &str) -> String {
    atributo_o(el, atributo, "").to_string()
}

/// Pass 2 over one document: the summary row, or `None` when the payroll
/// structure is incomplete.
fn construir_fila(
    root: &XmlElement,
    archivo: &str,
    consecutivo: u32,
    encabezados: &[String],
    indice: &HashMap<&str, usize>,
    issues: &mut IssueTracker,
) -> Option<FilaNomina> {
    let receptor_cfdi = buscar_primero(root, "cfdi:Receptor", &BINDINGS_COMBINADO)
        .or_else(|| buscar_primero(root, "cfdi3:Receptor", &BINDINGS_COMBINADO))
        .or_else(|| {
            primer_local_con(
                root,
                "Receptor",
                &["UsoCFDI", "RegimenFiscalReceptor", "DomicilioFiscalReceptor"],
            )
        });

    let receptor_nomina = buscar_primero(root, "nomina12:Receptor", &BINDINGS_COMBINADO)
        .or_else(|| primer_local_con(root, "Receptor", &["NumEmpleado", "Curp"]));

    let nomina = buscar_primero(root, "nomina12:Nomina", &BINDINGS_COMBINADO)
        .or_else(|| buscar_primero_local_nomina(root));

    let (Some(receptor_cfdi), Some(receptor_nomina), Some(nomina)) =
        (receptor_cfdi, receptor_nomina, nomina)
    else {
        issues.warn(format!(
            "Estructura de nómina incompleta en {archivo}. Receptor CFDI: {}; Receptor Nómina: {}; Nomina: {}.",
            si_o_no(receptor_cfdi.is_some()),
            si_o_no(receptor_nomina.is_some()),
            si_o_no(nomina.is_some()),
        ));
        return None;
    };

    let tfd = buscar_primero(root, "tfd:TimbreFiscalDigital", &BINDINGS_COMBINADO)
        .or_else(|| crate::xml::buscar_primero_local(root, "TimbreFiscalDigital"));

    let total_percepciones = a_decimal(
        nomina.atributo("TotalPercepciones"),
        Decimal::ZERO,
        issues,
        "TotalPercepciones",
    );
    let total_deducciones = a_decimal(
        nomina.atributo("TotalDeducciones"),
        Decimal::ZERO,
        issues,
        "TotalDeducciones",
    );
    let mut total_subsidios = Decimal::ZERO;
    for otro_pago in elementos_nomina(root, "OtroPago") {
        if otro_pago.atributo("TipoOtroPago") == Some(TIPO_OTRO_PAGO_SUBSIDIO) {
            total_subsidios +=
                a_decimal(otro_pago.atributo("Importe"), Decimal::ZERO, issues, "Subsidios");
        }
    }
    let total_neto = total_percepciones - total_deducciones + total_subsidios;

    let mut conceptos: Vec<Option<Decimal>> = vec![None; encabezados.len()];
    let mut asignar = |clave_col: String, importe: Decimal| {
        if let Some(&i) = indice.get(clave_col.as_str()) {
            // First occurrence per document wins; repeats are dropped.
            if conceptos[i].is_none() {
                conceptos[i] = Some(importe);
            }
        }
    };

    for percepcion in elementos_nomina(root, "Percepcion") {
        let (_, _, total) = importe_percepcion(percepcion, issues);
        asignar(
            clave_columna(
                TipoConcepto::Percepcion,
                percepcion.atributo("Clave").unwrap_or(""),
                percepcion.atributo("Concepto").unwrap_or(""),
            ),
            total,
        );
    }
    for deduccion in elementos_nomina(root, "Deduccion") {
        let importe = a_decimal(
            deduccion.atributo("Importe"),
            Decimal::ZERO,
            issues,
            "Importe Deducción",
        );
        asignar(
            clave_columna(
                TipoConcepto::Deduccion,
                deduccion.atributo("Clave").unwrap_or(""),
                deduccion.atributo("Concepto").unwrap_or(""),
            ),
            importe,
        );
    }
    for otro_pago in elementos_nomina(root, "OtroPago") {
        if otro_pago.atributo("TipoOtroPago") != Some(TIPO_OTRO_PAGO_SUBSIDIO) {
            continue;
        }
        let importe = a_decimal(
            otro_pago.atributo("Importe"),
            Decimal::ZERO,
            issues,
            "Importe Subsidio",
        );
        asignar(
            clave_columna(
                TipoConcepto::Subsidio,
                otro_pago.atributo("Clave").unwrap_or(""),
                otro_pago.atributo("Concepto").unwrap_or(""),
            ),
            importe,
        );
    }

    Some(FilaNomina {
        uuid: texto(tfd, "UUID"),
        consecutivo,
        num_empleado: texto(Some(receptor_nomina), "NumEmpleado"),
        nombre: texto(Some(receptor_cfdi), "Nombre"),
        rfc: texto(Some(receptor_cfdi), "Rfc"),
        curp: texto(Some(receptor_nomina), "Curp"),
        puesto: texto(Some(receptor_nomina), "Puesto"),
        departamento: texto(Some(receptor_nomina), "Departamento"),
        tipo_nomina: texto(Some(nomina), "TipoNomina"),
        fecha_comprobante: texto(Some(root), "Fecha"),
        num_dias_pagados: texto(Some(nomina), "NumDiasPagados"),
        fecha_inicial_pago: texto(Some(nomina), "FechaInicialPago"),
        fecha_final_pago: texto(Some(nomina), "FechaFinalPago"),
        fecha_pago: texto(Some(nomina), "FechaPago"),
        total_percepciones,
        total_deducciones,
        total_subsidios,
        total_neto,
        conceptos,
    })
}

fn buscar_primero_local_nomina(root: &XmlElement) -> Option<&XmlElement> {
    crate::xml::buscar_primero_local(root, "Nomina")
}

fn si_o_no(presente: bool) -> &'static str {
    if presente { "OK" } else { "No" }
}

/// Fixed summary-sheet headers, before the dynamic concept columns.
pub const ENCABEZADOS_NOMINA: [&str; 18] = [
    "UUID",
    "Consecutivo",
    "Núm Empleado",
    "Nombre",
    "RFC",
    "CURP",
    "Puesto",
    "Departamento",
    "Tipo de Nomina",
    "Fecha Comprobante",
    "Num Días Pagados",
    "Fecha Inicial Pago",
    "Fecha Final Pago",
    "Fecha Pago",
    "Total Percepciones",
    "Total Deducciones",
    "Total Subsidios",
    "Total Neto",
];

/// Run the full payroll extraction over a working directory and write the
/// three-sheet report.
pub fn procesar_nomina(workdir: &Path, issues: &mut IssueTracker) -> Option<ResultadoNomina> {
    let archivos = listar_xml_o_abortar(workdir, issues)?;

    // Pass 1: detail rows and catalogs. Loaded documents are kept for the
    // second pass so a broken file is diagnosed exactly once.
    let mut detalle = Vec::new();
    let mut catalogo = CatalogoConceptos::default();
    let mut documentos: Vec<(String, XmlElement)> = Vec::new();

    for path in &archivos {
        let archivo = nombre_archivo(path);
        tracing::info!("Procesando nómina: {archivo}");
        let Some(root) = cargar_documento(path, issues) else {
            continue;
        };
        detalle.extend(extraer_detalle(&root, &archivo, &mut catalogo, issues));
        documentos.push((archivo, root));
    }

    let encabezados = catalogo.encabezados();
    // Colliding truncated headers collapse onto one column; the later
    // catalog entry's index wins, matching the consumers' expectations.
    let indice: HashMap<&str, usize> = encabezados
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    // Pass 2: one summary row per structurally complete payslip.
    let mut filas = Vec::new();
    let mut consecutivo = 1u32;
    for (archivo, root) in &documentos {
        if let Some(fila) = construir_fila(root, archivo, consecutivo, &encabezados, &indice, issues)
        {
            filas.push(fila);
            consecutivo += 1;
        }
    }

    let ruta = workdir.join(NOMBRE_REPORTE);
    if let Err(e) = escribir_reporte(&ruta, &detalle, &catalogo, &encabezados, &filas) {
        issues.abort(format!("No se pudo guardar el archivo Excel: {e}"));
        return None;
    }

    Some(ResultadoNomina {
        detalle,
        catalogo,
        encabezados_conceptos: encabezados,
        filas,
        ruta,
    })
}

fn escribir_reporte(
    ruta: &Path,
    detalle: &[FilaDetalle],
    catalogo: &CatalogoConceptos,
    encabezados_conceptos: &[String],
    filas: &[FilaNomina],
) -> Result<(), ComprobanteError> {
    let mut libro = Workbook::new();

    // Detail sheet: one row per concept occurrence, kind-colored.
    {
        let hoja = libro.add_worksheet().set_name("Perc_Deduc_Sub")?;
        let encabezados = [
            "Archivo",
            "Tipo",
            "TipoPercepcion/Deduccion/Subsidio",
            "Clave",
            "Concepto",
            "ImporteGravado",
            "ImporteExento",
            "ImporteTotal",
        ];
        for (col, titulo) in encabezados.iter().enumerate() {
            hoja.write_string(0, col as u16, *titulo)?;
        }
        let relleno_percepcion = formato_relleno(RELLENO_VERDE);
        let relleno_deduccion = formato_relleno(RELLENO_ROJO);
        let relleno_subsidio = formato_relleno(RELLENO_AZUL);
        for (i, fila) in detalle.iter().enumerate() {
            let r = i as u32 + 1;
            let relleno = match fila.tipo {
                TipoConcepto::Percepcion => &relleno_percepcion,
                TipoConcepto::Deduccion => &relleno_deduccion,
                TipoConcepto::Subsidio => &relleno_subsidio,
            };
            hoja.write_string(r, 0, &fila.archivo)?;
            hoja.write_string_with_format(r, 1, fila.tipo.etiqueta(), relleno)?;
            hoja.write_string(r, 2, &fila.tipo_concepto)?;
            hoja.write_string(r, 3, &fila.clave)?;
            hoja.write_string(r, 4, &fila.concepto)?;
            if let Some(gravado) = fila.gravado {
                escribir_decimal(hoja, r, 5, gravado)?;
            }
            if let Some(exento) = fila.exento {
                escribir_decimal(hoja, r, 6, exento)?;
            }
            escribir_decimal(hoja, r, 7, fila.total)?;
        }
    }

    // Catalog sheet: P/D/S blocks separated by a blank row.
    {
        let hoja = libro.add_worksheet().set_name("Catalogo")?;
        hoja.write_string(0, 0, "Código")?;
        hoja.write_string(0, 1, "Clave")?;
        hoja.write_string(0, 2, "Concepto")?;
        let mut r = 1u32;
        let bloques = [
            ('P', &catalogo.percepciones),
            ('D', &catalogo.deducciones),
            ('S', &catalogo.subsidios),
        ];
        for (i, (prefijo, pares)) in bloques.iter().enumerate() {
            if i > 0 {
                r += 1; // blank separator row
            }
            for (clave, concepto) in pares.iter() {
                hoja.write_string(r, 0, format!("{prefijo}-{}", truncar(clave, 20)))?;
                hoja.write_string(r, 1, truncar(clave, 20))?;
                hoja.write_string(r, 2, truncar(concepto, 50))?;
                r += 1;
            }
        }
    }

    // Summary sheet: fixed identity/totals columns plus the dynamic
    // concept columns.
    {
        let hoja = libro.add_worksheet().set_name("Nomina")?;
        let encabezado = formato_encabezado();
        for (col, titulo) in ENCABEZADOS_NOMINA.iter().enumerate() {
            hoja.write_string_with_format(0, col as u16, *titulo, &encabezado)?;
        }
        let base = ENCABEZADOS_NOMINA.len() as u16;
        for (col, titulo) in encabezados_conceptos.iter().enumerate() {
            hoja.write_string_with_format(0, base + col as u16, titulo, &encabezado)?;
        }

        for (i, fila) in filas.iter().enumerate() {
            let r = i as u32 + 1;
            hoja.write_string(r, 0, &fila.uuid)?;
            hoja.write_number(r, 1, fila.consecutivo as f64)?;
            hoja.write_string(r, 2, &fila.num_empleado)?;
            hoja.write_string(r, 3, &fila.nombre)?;
            hoja.write_string(r, 4, &fila.rfc)?;
            hoja.write_string(r, 5, &fila.curp)?;
            hoja.write_string(r, 6, &fila.puesto)?;
            hoja.write_string(r, 7, &fila.departamento)?;
            hoja.write_string(r, 8, &fila.tipo_nomina)?;
            hoja.write_string(r, 9, &fila.fecha_comprobante)?;
            hoja.write_string(r, 10, &fila.num_dias_pagados)?;
            hoja.write_string(r, 11, &fila.fecha_inicial_pago)?;
            hoja.write_string(r, 12, &fila.fecha_final_pago)?;
            hoja.write_string(r, 13, &fila.fecha_pago)?;
            escribir_decimal(hoja, r, 14, fila.total_percepciones)?;
            escribir_decimal(hoja, r, 15, fila.total_deducciones)?;
            escribir_decimal(hoja, r, 16, fila.total_subsidios)?;
            escribir_decimal(hoja, r, 17, fila.total_neto)?;
            for (col, valor) in fila.conceptos.iter().enumerate() {
                if let Some(importe) = valor {
                    escribir_decimal(hoja, r, base + col as u16, *importe)?;
                }
            }
        }

        let mut anchos = AnchoColumnas::new();
        for (col, titulo) in ENCABEZADOS_NOMINA.iter().enumerate() {
            anchos.observar(col as u16, titulo);
        }
        for (col, titulo) in encabezados_conceptos.iter().enumerate() {
            anchos.observar(base + col as u16, titulo);
        }
        anchos.aplicar(hoja)?;
    }

    libro.save(ruta)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parsear_documento;
    use rust_decimal_macros::dec;

    const NOMINA_SIMPLE: &str = r#"<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/3"
        xmlns:nomina12="http://www.sat.gob.mx/nomina12" Fecha="2024-01-15T10:00:00">
        <cfdi:Receptor Rfc="XAXX010101000" Nombre="Juan Pérez" UsoCFDI="P01"/>
        <cfdi:Complemento>
          <nomina12:Nomina TipoNomina="O" TotalPercepciones="1000.00" TotalDeducciones="150.00"
              NumDiasPagados="15" FechaPago="2024-01-15">
            <nomina12:Receptor NumEmpleado="042" Curp="PEXJ800101HDFRRN09" Puesto="Analista"/>
            <nomina12:Percepciones>
              <nomina12:Percepcion TipoPercepcion="001" Clave="001" Concepto="Sueldo"
                  ImporteGravado="1000.00" ImporteExento="0.00"/>
            </nomina12:Percepciones>
            <nomina12:Deducciones>
              <nomina12:Deduccion TipoDeduccion="002" Clave="002" Concepto="ISR" Importe="150.00"/>
            </nomina12:Deducciones>
          </nomina12:Nomina>
        </cfdi:Complemento>
    </cfdi:Comprobante>"#;

    #[test]
    fn detail_extracts_all_three_kinds() {
        let root = parsear_documento(NOMINA_SIMPLE).unwrap();
        let mut catalogo = CatalogoConceptos::default();
        let mut issues = IssueTracker::new();
        let filas = extraer_detalle(&root, "n.xml", &mut catalogo, &mut issues);
        assert_eq!(filas.len(), 2);
        assert_eq!(filas[0].tipo, TipoConcepto::Percepcion);
        assert_eq!(filas[0].total, dec!(1000.00));
        assert_eq!(filas[1].tipo, TipoConcepto::Deduccion);
        assert!(issues.warnings().is_empty());
    }

    #[test]
    fn catalog_headers_sorted_and_prefixed() {
        let mut catalogo = CatalogoConceptos::default();
        catalogo.insertar(TipoConcepto::Deduccion, "002", "ISR");
        catalogo.insertar(TipoConcepto::Percepcion, "005", "Aguinaldo");
        catalogo.insertar(TipoConcepto::Percepcion, "001", "Sueldo");
        assert_eq!(
            catalogo.encabezados(),
            vec!["P-001-Sueldo", "P-005-Aguinaldo", "D-002-ISR"]
        );
    }

    #[test]
    fn blank_pairs_never_cataloged() {
        let mut catalogo = CatalogoConceptos::default();
        catalogo.insertar(TipoConcepto::Percepcion, "", "Sueldo");
        catalogo.insertar(TipoConcepto::Percepcion, "001", "");
        assert!(catalogo.encabezados().is_empty());
    }

    #[test]
    fn truncation_is_char_safe() {
        let clave = clave_columna(TipoConcepto::Percepcion, "001", "Compensación extraordinaria");
        assert_eq!(clave, "P-001-Compensación extraor");
    }

    #[test]
    fn summary_row_totals_and_dynamic_columns() {
        let root = parsear_documento(NOMINA_SIMPLE).unwrap();
        let mut catalogo = CatalogoConceptos::default();
        let mut issues = IssueTracker::new();
        extraer_detalle(&root, "n.xml", &mut catalogo, &mut issues);
        let encabezados = catalogo.encabezados();
        let indice: HashMap<&str, usize> = encabezados
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();

        let fila = construir_fila(&root, "n.xml", 1, &encabezados, &indice, &mut issues)
            .expect("complete payslip");
        assert_eq!(fila.total_percepciones, dec!(1000.00));
        assert_eq!(fila.total_deducciones, dec!(150.00));
        assert_eq!(fila.total_subsidios, dec!(0));
        assert_eq!(fila.total_neto, dec!(850.00));
        assert_eq!(fila.num_empleado, "042");
        assert_eq!(fila.nombre, "Juan Pérez");
        assert_eq!(encabezados, vec!["P-001-Sueldo", "D-002-ISR"]);
        assert_eq!(fila.conceptos, vec![Some(dec!(1000.00)), Some(dec!(150.00))]);
    }

    #[test]
    fn incomplete_structure_skips_with_warning() {
        let root = parsear_documento(
            r#"<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/3">
                <cfdi:Receptor Rfc="X" UsoCFDI="P01"/>
            </cfdi:Comprobante>"#,
        )
        .unwrap();
        let mut issues = IssueTracker::new();
        let fila = construir_fila(&root, "x.xml", 1, &[], &HashMap::new(), &mut issues);
        assert!(fila.is_none());
        assert_eq!(issues.warnings().len(), 1);
        assert!(issues.warnings()[0].contains("Nomina: No"));
    }

    #[test]
    fn unprefixed_payroll_found_by_local_fallback() {
        let root = parsear_documento(
            r#"<Comprobante Fecha="2024-01-01">
                <Receptor Rfc="X" Nombre="Ana" UsoCFDI="P01"/>
                <Receptor NumEmpleado="7" Curp="CURP"/>
                <Nomina TotalPercepciones="500" TotalDeducciones="100">
                  <Percepcion Clave="001" Concepto="Sueldo" ImporteGravado="500" ImporteExento="0"/>
                </Nomina>
            </Comprobante>"#,
        )
        .unwrap();
        let mut catalogo = CatalogoConceptos::default();
        let mut issues = IssueTracker::new();
        let filas = extraer_detalle(&root, "p.xml", &mut catalogo, &mut issues);
        assert_eq!(filas.len(), 1);
        let encabezados = catalogo.encabezados();
        let indice: HashMap<&str, usize> = encabezados
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();
        let fila = construir_fila(&root, "p.xml", 1, &encabezados, &indice, &mut issues)
            .expect("local-name fallback resolves the structure");
        assert_eq!(fila.total_neto, dec!(400));
        assert_eq!(fila.num_empleado, "7");
    }

    #[test]
    fn repeated_concept_keeps_first_amount() {
        let root = parsear_documento(
            r#"<Comprobante>
                <Receptor Rfc="X" Nombre="Ana" UsoCFDI="P01"/>
                <Receptor NumEmpleado="7"/>
                <Nomina TotalPercepciones="300" TotalDeducciones="0">
                  <Percepcion Clave="001" Concepto="Sueldo" ImporteGravado="100" ImporteExento="0"/>
                  <Percepcion Clave="001" Concepto="Sueldo" ImporteGravado="200" ImporteExento="0"/>
                </Nomina>
            </Comprobante>"#,
        )
        .unwrap();
        let mut catalogo = CatalogoConceptos::default();
        let mut issues = IssueTracker::new();
        extraer_detalle(&root, "r.xml", &mut catalogo, &mut issues);
        let encabezados = catalogo.encabezados();
        let indice: HashMap<&str, usize> = encabezados
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();
        let fila = construir_fila(&root, "r.xml", 1, &encabezados, &indice, &mut issues).unwrap();
        assert_eq!(fila.conceptos, vec![Some(dec!(100))]);
    }
}
