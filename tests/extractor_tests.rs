//! End-to-end invoice extraction tests over real temporary directories.
//!
//! Run with: `cargo test --features extractor --test extractor_tests`

#![cfg(feature = "extractor")]

use std::path::Path;

use comprobante::core::{IssueTracker, RunStatus};
use comprobante::extractor::{ENCABEZADOS_CFDI, NOMBRE_REPORTE, procesar_directorio};
use rust_decimal_macros::dec;

const FACTURA: &str = r#"<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4"
    xmlns:tfd="http://www.sat.gob.mx/TimbreFiscalDigital"
    Version="4.0" TipoDeComprobante="I" Fecha="2024-03-01T12:00:00"
    MetodoPago="PUE" FormaPago="03" Total="166.00" LugarExpedicion="06600">
    <cfdi:Emisor Rfc="AAA010101AAA" Nombre="Proveedor SA" RegimenFiscal="601"/>
    <cfdi:Receptor Rfc="BBB020202BBB" Nombre="Cliente SA" UsoCFDI="G03"/>
    <cfdi:Conceptos>
      <cfdi:Concepto Descripcion="Servicio A" Cantidad="1" Unidad="E48"
          ValorUnitario="100.00" Importe="100.00">
        <cfdi:Impuestos>
          <cfdi:Traslados>
            <cfdi:Traslado Impuesto="002" Importe="16.00"/>
          </cfdi:Traslados>
        </cfdi:Impuestos>
      </cfdi:Concepto>
      <cfdi:Concepto Descripcion="Servicio B" Cantidad="2" Unidad="E48"
          ValorUnitario="25.00" Importe="50.00"/>
    </cfdi:Conceptos>
    <cfdi:Complemento>
      <tfd:TimbreFiscalDigital UUID="AAAAAAAA-BBBB-CCCC-DDDD-EEEEEEEEEEEE"/>
    </cfdi:Complemento>
</cfdi:Comprobante>"#;

const PAGO: &str = r#"<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4"
    xmlns:pago20="http://www.sat.gob.mx/Pagos20"
    xmlns:tfd="http://www.sat.gob.mx/TimbreFiscalDigital"
    Version="4.0" TipoDeComprobante="P" Fecha="2024-03-05T09:00:00" Total="0">
    <cfdi:Emisor Rfc="AAA010101AAA" Nombre="Proveedor SA"/>
    <cfdi:Receptor Rfc="BBB020202BBB" Nombre="Cliente SA" UsoCFDI="CP01"/>
    <cfdi:Complemento>
      <pago20:Pagos>
        <pago20:Pago FormaDePagoP="03" Monto="500.00">
          <pago20:DoctoRelacionado IdDocumento="UUID-REL-1" TipoRelacion="04"/>
          <pago20:DoctoRelacionado IdDocumento="UUID-REL-2" TipoRelacion="04"/>
        </pago20:Pago>
      </pago20:Pagos>
      <tfd:TimbreFiscalDigital UUID="PPPPPPPP-BBBB-CCCC-DDDD-EEEEEEEEEEEE"/>
    </cfdi:Complemento>
</cfdi:Comprobante>"#;

fn escribir(dir: &Path, nombre: &str, contenido: &str) {
    std::fs::write(dir.join(nombre), contenido).unwrap();
}

#[test]
fn invoice_and_payment_batch_extracts_four_rows() {
    let dir = tempfile::tempdir().unwrap();
    escribir(dir.path(), "factura.xml", FACTURA);
    escribir(dir.path(), "pago.xml", PAGO);

    let mut issues = IssueTracker::new();
    let resultado = procesar_directorio(dir.path(), &mut issues).unwrap();

    // Files are processed in name order: factura.xml first.
    assert_eq!(resultado.filas.len(), 4);

    let servicio_a = &resultado.filas[0];
    assert_eq!(servicio_a.descripcion, "Servicio A");
    assert_eq!(servicio_a.impuesto_trasladado, dec!(16.00));
    assert_eq!(servicio_a.total_por_concepto, dec!(116.00));
    assert_eq!(servicio_a.rfc_emisor, "AAA010101AAA");
    assert_eq!(servicio_a.cp_emisor, "06600");
    assert_eq!(servicio_a.total_general, "166.00");

    let servicio_b = &resultado.filas[1];
    assert_eq!(servicio_b.total_por_concepto, dec!(50.00));
    assert_eq!(servicio_b.clave_traslado, "N/A");

    let pago_1 = &resultado.filas[2];
    assert_eq!(pago_1.tipo_comprobante, "P");
    assert_eq!(pago_1.descripcion, "Pago");
    assert_eq!(pago_1.uuid_relacionado, "UUID-REL-1");
    assert_eq!(pago_1.cantidad, dec!(1));
    assert_eq!(pago_1.valor_unitario, dec!(500.00));
    assert_eq!(resultado.filas[3].uuid_relacionado, "UUID-REL-2");

    assert!(resultado.ruta.ends_with(NOMBRE_REPORTE));
    assert!(resultado.ruta.exists());
    assert_eq!(issues.status(), RunStatus::Ok);
}

#[test]
fn column_schema_is_fixed_at_26() {
    assert_eq!(ENCABEZADOS_CFDI.len(), 26);
    assert_eq!(ENCABEZADOS_CFDI[0], "Tipo de Comprobante");
    assert_eq!(ENCABEZADOS_CFDI[25], "Versión CFDI");
}

#[test]
fn batch_with_no_extractable_rows_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    escribir(
        dir.path(),
        "vacia.xml",
        r#"<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4"
            Version="4.0" TipoDeComprobante="I" Total="0"/>"#,
    );

    let mut issues = IssueTracker::new();
    assert!(procesar_directorio(dir.path(), &mut issues).is_none());
    assert_eq!(issues.errors().len(), 1);
    assert_eq!(issues.status(), RunStatus::Degraded);
}

#[test]
fn broken_file_is_skipped_and_the_rest_extracted() {
    let dir = tempfile::tempdir().unwrap();
    escribir(dir.path(), "factura.xml", FACTURA);
    escribir(dir.path(), "roto.xml", "<<< no xml");

    let mut issues = IssueTracker::new();
    let resultado = procesar_directorio(dir.path(), &mut issues).unwrap();
    assert_eq!(resultado.filas.len(), 2);
    assert_eq!(issues.fatals().len(), 1);
    assert_eq!(issues.status(), RunStatus::Degraded);
}
