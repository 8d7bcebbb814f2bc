//! Invoice and payment-complement extraction into the flat
//! `cfdi_datos_extraidos.xlsx` sheet.
//!
//! One fixed 26-column row schema covers both document shapes. Goods and
//! services invoices emit one row per line-item concept; payment receipts
//! (`TipoDeComprobante = "P"`) emit one row per related document per
//! payment. Per concept, only the first tax-transferred and first
//! tax-withheld entries are captured — CFDI allows several of each, the
//! report deliberately keeps one of each kind.

use rust_decimal::Decimal;
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

use crate::core::{ComprobanteError, IssueTracker, listar_xml_o_abortar, nombre_archivo};
use crate::reportes::{AnchoColumnas, escribir_decimal, formato_encabezado};
use crate::xml::{
    BINDINGS_PAGOS, XmlElement, a_decimal, atributo_o, buscar_primero, buscar_todos,
    cargar_documento,
};

/// File name of the invoice report, created at the workdir root.
pub const NOMBRE_REPORTE: &str = "cfdi_datos_extraidos.xlsx";

/// Subtype marking a payment-complement receipt.
pub const TIPO_COMPROBANTE_PAGO: &str = "P";

/// Fixed column schema, in sheet order.
pub const ENCABEZADOS_CFDI: [&str; 26] = [
    "Tipo de Comprobante",
    "Folio CFDI (UUID)",
    "Folio CFDI (UUID) Relacionados",
    "Tipo Relación",
    "Fecha",
    "RFC Proveedor",
    "Nombre Proveedor",
    "Régimen Fiscal Proveedor",
    "CP del Proveedor",
    "RFC del Cliente",
    "Nombre del Cliente",
    "Uso del CFDI",
    "Método de Pago",
    "Forma de Pago",
    "Descripción",
    "Cantidad",
    "Unidad",
    "Valor Unitario",
    "Importe",
    "Clave Impuesto Trasladado",
    "Impuesto Trasladado",
    "Clave Impuesto Retenido",
    "Impuesto Retenido",
    "Total por Concepto",
    "Total General",
    "Versión CFDI",
];

/// One output row of the invoice report.
#[derive(Debug, Clone)]
pub struct FilaCfdi {
    pub tipo_comprobante: String,
    pub uuid: String,
    pub uuid_relacionado: String,
    pub tipo_relacion: String,
    pub fecha: String,
    pub rfc_emisor: String,
    pub nombre_emisor: String,
    pub regimen_fiscal_emisor: String,
    pub cp_emisor: String,
    pub rfc_receptor: String,
    pub nombre_receptor: String,
    pub uso_cfdi: String,
    pub metodo_pago: String,
    pub forma_pago: String,
    pub descripcion: String,
    pub cantidad: Decimal,
    pub unidad: String,
    pub valor_unitario: Decimal,
    pub importe: Decimal,
    pub clave_traslado: String,
    pub impuesto_trasladado: Decimal,
    pub clave_retencion: String,
    pub impuesto_retenido: Decimal,
    pub total_por_concepto: Decimal,
    pub total_general: String,
    pub version: String,
}

/// Result of an extraction run.
#[derive(Debug)]
pub struct ResultadoExtraccion {
    pub filas: Vec<FilaCfdi>,
    pub ruta: PathBuf,
}

// Header fields shared by every row of one document.
struct Encabezado {
    tipo_comprobante: String,
    uuid: String,
    fecha: String,
    rfc_emisor: String,
    nombre_emisor: String,
    regimen_fiscal_emisor: String,
    cp_emisor: String,
    rfc_receptor: String,
    nombre_receptor: String,
    uso_cfdi: String,
    metodo_pago: String,
    forma_pago: String,
    total_general: String,
    version: String,
}

fn leer_encabezado(root: &XmlElement, archivo: &str, issues: &mut IssueTracker) -> Encabezado {
    let tfd = buscar_primero(root, "tfd:TimbreFiscalDigital", &BINDINGS_PAGOS);
    let uuid = atributo_o(tfd, "UUID", "N/A").to_string();
    if uuid == "N/A" {
        // Still worth a row for audit, just without fiscal traceability.
        issues.warn(format!("UUID no encontrado en {archivo}"));
    }

    let emisor = buscar_primero(root, "cfdi:Emisor", &BINDINGS_PAGOS);
    let receptor = buscar_primero(root, "cfdi:Receptor", &BINDINGS_PAGOS);

    Encabezado {
        tipo_comprobante: atributo_o(Some(root), "TipoDeComprobante", "N/A").to_string(),
        uuid,
        fecha: atributo_o(Some(root), "Fecha", "N/A").to_string(),
        rfc_emisor: atributo_o(emisor, "Rfc", "N/A").to_string(),
        nombre_emisor: atributo_o(emisor, "Nombre", "Desconocido").to_string(),
        regimen_fiscal_emisor: atributo_o(emisor, "RegimenFiscal", "N/A").to_string(),
        cp_emisor: atributo_o(Some(root), "LugarExpedicion", "N/A").to_string(),
        rfc_receptor: atributo_o(receptor, "Rfc", "N/A").to_string(),
        nombre_receptor: atributo_o(receptor, "Nombre", "Desconocido").to_string(),
        uso_cfdi: atributo_o(receptor, "UsoCFDI", "N/A").to_string(),
        metodo_pago: atributo_o(Some(root), "MetodoPago", "N/A").to_string(),
        forma_pago: atributo_o(Some(root), "FormaPago", "N/A").to_string(),
        total_general: atributo_o(Some(root), "Total", "0").to_string(),
        version: atributo_o(Some(root), "Version", "N/A").to_string(),
    }
}

/// Extract every output row from one loaded document.
pub fn extraer_filas(
    root: &XmlElement,
    archivo: &str,
    issues: &mut IssueTracker,
) -> Vec<FilaCfdi> {
    let enc = leer_encabezado(root, archivo, issues);
    let mut filas = Vec::new();

    if enc.tipo_comprobante == TIPO_COMPROBANTE_PAGO {
        let Some(pagos) = buscar_primero(root, "pago20:Pagos", &BINDINGS_PAGOS) else {
            issues.error(format!("Complemento de pagos faltante en {archivo}"));
            return filas;
        };

        for pago in buscar_todos(pagos, "pago20:Pago", &BINDINGS_PAGOS) {
            let forma_pago_pago = atributo_o(Some(pago), "FormaDePagoP", "N/A").to_string();
            let monto = a_decimal(pago.atributo("Monto"), Decimal::ZERO, issues, "Monto pago");

            let doctos = buscar_todos(pago, "pago20:DoctoRelacionado", &BINDINGS_PAGOS);
            if doctos.is_empty() {
                issues.warn(format!("No hay DoctoRelacionado en pago de {archivo}"));
            }

            for docto in doctos {
                filas.push(FilaCfdi {
                    tipo_comprobante: enc.tipo_comprobante.clone(),
                    uuid: enc.uuid.clone(),
                    uuid_relacionado: atributo_o(Some(docto), "IdDocumento", "N/A").to_string(),
                    tipo_relacion: atributo_o(Some(docto), "TipoRelacion", "N/A").to_string(),
                    fecha: enc.fecha.clone(),
                    rfc_emisor: enc.rfc_emisor.clone(),
                    nombre_emisor: enc.nombre_emisor.clone(),
                    regimen_fiscal_emisor: enc.regimen_fiscal_emisor.clone(),
                    cp_emisor: enc.cp_emisor.clone(),
                    rfc_receptor: enc.rfc_receptor.clone(),
                    nombre_receptor: enc.nombre_receptor.clone(),
                    uso_cfdi: enc.uso_cfdi.clone(),
                    metodo_pago: enc.metodo_pago.clone(),
                    forma_pago: forma_pago_pago.clone(),
                    descripcion: "Pago".to_string(),
                    cantidad: Decimal::ONE,
                    unidad: "N/A".to_string(),
                    valor_unitario: monto,
                    importe: monto,
                    clave_traslado: "N/A".to_string(),
                    impuesto_trasladado: Decimal::ZERO,
                    clave_retencion: "N/A".to_string(),
                    impuesto_retenido: Decimal::ZERO,
                    total_por_concepto: monto,
                    total_general: enc.total_general.clone(),
                    version: enc.version.clone(),
                });
            }
        }
        return filas;
    }

    let relacionados = buscar_primero(root, "cfdi:CfdiRelacionados", &BINDINGS_PAGOS);
    let tipo_relacion = atributo_o(relacionados, "TipoRelacion", "N/A").to_string();

    let conceptos = buscar_todos(root, "cfdi:Concepto", &BINDINGS_PAGOS);
    if conceptos.is_empty() {
        issues.warn(format!("No se encontraron conceptos en {archivo}"));
    }

    for concepto in conceptos {
        let cantidad = a_decimal(concepto.atributo("Cantidad"), Decimal::ZERO, issues, "Cantidad");
        let valor_unitario = a_decimal(
            concepto.atributo("ValorUnitario"),
            Decimal::ZERO,
            issues,
            "ValorUnitario",
        );
        let importe = a_decimal(concepto.atributo("Importe"), Decimal::ZERO, issues, "Importe");

        // First of each tax kind only.
        let traslado = buscar_primero(concepto, "cfdi:Traslado", &BINDINGS_PAGOS);
        let impuesto_trasladado =
            a_decimal(traslado.and_then(|t| t.atributo("Importe")), Decimal::ZERO, issues, "Traslado");
        let retencion = buscar_primero(concepto, "cfdi:Retencion", &BINDINGS_PAGOS);
        let impuesto_retenido = a_decimal(
            retencion.and_then(|r| r.atributo("Importe")),
            Decimal::ZERO,
            issues,
            "Retención",
        );

        filas.push(FilaCfdi {
            tipo_comprobante: enc.tipo_comprobante.clone(),
            uuid: enc.uuid.clone(),
            uuid_relacionado: "N/A".to_string(),
            tipo_relacion: tipo_relacion.clone(),
            fecha: enc.fecha.clone(),
            rfc_emisor: enc.rfc_emisor.clone(),
            nombre_emisor: enc.nombre_emisor.clone(),
            regimen_fiscal_emisor: enc.regimen_fiscal_emisor.clone(),
            cp_emisor: enc.cp_emisor.clone(),
            rfc_receptor: enc.rfc_receptor.clone(),
            nombre_receptor: enc.nombre_receptor.clone(),
            uso_cfdi: enc.uso_cfdi.clone(),
            metodo_pago: enc.metodo_pago.clone(),
            forma_pago: enc.forma_pago.clone(),
            descripcion: atributo_o(Some(concepto), "Descripcion", "N/A").to_string(),
            cantidad,
            unidad: atributo_o(Some(concepto), "Unidad", "N/A").to_string(),
            valor_unitario,
            importe,
            clave_traslado: atributo_o(traslado, "Impuesto", "N/A").to_string(),
            impuesto_trasladado,
            clave_retencion: atributo_o(retencion, "Impuesto", "N/A").to_string(),
            impuesto_retenido,
            total_por_concepto: importe + impuesto_trasladado - impuesto_retenido,
            total_general: enc.total_general.clone(),
            version: enc.version.clone(),
        });
    }

    filas
}

/// Run the extraction over a working directory and write the report.
pub fn procesar_directorio(workdir: &Path, issues: &mut IssueTracker) -> Option<ResultadoExtraccion> {
    let archivos = listar_xml_o_abortar(workdir, issues)?;

    let mut filas = Vec::new();
    for path in &archivos {
        let archivo = nombre_archivo(path);
        tracing::info!("Procesando: {archivo}");
        let Some(root) = cargar_documento(path, issues) else {
            continue;
        };
        filas.extend(extraer_filas(&root, &archivo, issues));
    }

    if filas.is_empty() {
        issues.error("No se generaron datos procesables de los XML.");
        return None;
    }

    let ruta = workdir.join(NOMBRE_REPORTE);
    if let Err(e) = escribir_reporte(&ruta, &filas) {
        issues.abort(format!("No se pudo generar el archivo Excel: {e}"));
        return None;
    }

    Some(ResultadoExtraccion { filas, ruta })
}

fn escribir_reporte(ruta: &Path, filas: &[FilaCfdi]) -> Result<(), ComprobanteError> {
    let mut libro = Workbook::new();
    let hoja = libro.add_worksheet().set_name("Datos")?;

    let encabezado = formato_encabezado();
    let mut anchos = AnchoColumnas::new();
    for (col, titulo) in ENCABEZADOS_CFDI.iter().enumerate() {
        hoja.write_string_with_format(0, col as u16, *titulo, &encabezado)?;
        anchos.observar(col as u16, titulo);
    }

    for (i, fila) in filas.iter().enumerate() {
        let r = i as u32 + 1;
        let textos: [(u16, &str); 17] = [
            (0, fila.tipo_comprobante.as_str()),
            (1, fila.uuid.as_str()),
            (2, fila.uuid_relacionado.as_str()),
            (3, fila.tipo_relacion.as_str()),
            (4, fila.fecha.as_str()),
            (5, fila.rfc_emisor.as_str()),
            (6, fila.nombre_emisor.as_str()),
            (7, fila.regimen_fiscal_emisor.as_str()),
            (8, fila.cp_emisor.as_str()),
            (9, fila.rfc_receptor.as_str()),
            (10, fila.nombre_receptor.as_str()),
            (11, fila.uso_cfdi.as_str()),
            (12, fila.metodo_pago.as_str()),
            (13, fila.forma_pago.as_str()),
            (14, fila.descripcion.as_str()),
            (16, fila.unidad.as_str()),
            (24, fila.total_general.as_str()),
        ];
        for (col, valor) in textos {
            hoja.write_string(r, col, valor)?;
            anchos.observar(col, valor);
        }
        hoja.write_string(r, 19, fila.clave_traslado.as_str())?;
        hoja.write_string(r, 21, fila.clave_retencion.as_str())?;
        hoja.write_string(r, 25, fila.version.as_str())?;
        escribir_decimal(hoja, r, 15, fila.cantidad)?;
        escribir_decimal(hoja, r, 17, fila.valor_unitario)?;
        escribir_decimal(hoja, r, 18, fila.importe)?;
        escribir_decimal(hoja, r, 20, fila.impuesto_trasladado)?;
        escribir_decimal(hoja, r, 22, fila.impuesto_retenido)?;
        escribir_decimal(hoja, r, 23, fila.total_por_concepto)?;
    }

    anchos.aplicar(hoja)?;
    libro.save(ruta)?;
    Ok(())
}
