//! End-to-end validation tests with an in-memory status service.
//!
//! Run with: `cargo test --features validacion --test validacion_tests`

#![cfg(feature = "validacion")]

use std::path::Path;

use comprobante::core::{ComprobanteError, IssueTracker, RunStatus};
use comprobante::validacion::{
    CODIGO_EXITO, CODIGO_NO_ENCONTRADO, ConsultaEstatus, DatosCfdi, EstatusCfdi, NOMBRE_REPORTE,
    RespuestaSat, validar_directorio,
};

/// Canned status service: answers by UUID, never touches the network.
struct ServicioFijo;

impl ConsultaEstatus for ServicioFijo {
    fn consultar(&self, datos: &DatosCfdi) -> Result<RespuestaSat, ComprobanteError> {
        let (codigo, estado) = match datos.uuid.as_str() {
            "UUID-VIGENTE" => (CODIGO_EXITO, "Vigente"),
            "UUID-CANCELADO" => ("S - Comprobante obtenido.", "Cancelado"),
            "UUID-PERDIDO" => (CODIGO_NO_ENCONTRADO, ""),
            otro => return Err(ComprobanteError::Consulta(format!("timeout para {otro}"))),
        };
        Ok(RespuestaSat {
            codigo_estatus: codigo.to_string(),
            estado: estado.to_string(),
            es_cancelable: "Cancelable sin aceptación".to_string(),
            estatus_cancelacion: "N/A".to_string(),
        })
    }
}

fn cfdi_con_uuid(uuid: &str) -> String {
    format!(
        r#"<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4"
            xmlns:tfd="http://www.sat.gob.mx/TimbreFiscalDigital" Total="116.00">
            <cfdi:Emisor Rfc="AAA010101AAA" Nombre="Proveedor"/>
            <cfdi:Receptor Rfc="BBB020202BBB" Nombre="Cliente"/>
            <cfdi:Complemento><tfd:TimbreFiscalDigital UUID="{uuid}"/></cfdi:Complemento>
        </cfdi:Comprobante>"#
    )
}

fn escribir(dir: &Path, nombre: &str, contenido: &str) {
    std::fs::write(dir.join(nombre), contenido).unwrap();
}

#[test]
fn statuses_are_counted_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    escribir(dir.path(), "a_vigente.xml", &cfdi_con_uuid("UUID-VIGENTE"));
    escribir(dir.path(), "b_cancelado.xml", &cfdi_con_uuid("UUID-CANCELADO"));
    escribir(dir.path(), "c_perdido.xml", &cfdi_con_uuid("UUID-PERDIDO"));

    let mut issues = IssueTracker::new();
    let resultado = validar_directorio(dir.path(), &ServicioFijo, &mut issues).unwrap();

    assert_eq!(resultado.filas.len(), 3);
    assert_eq!(resultado.filas[0].estatus, EstatusCfdi::Vigente);
    assert_eq!(resultado.filas[1].estatus, EstatusCfdi::Cancelado);
    assert_eq!(resultado.filas[2].estatus, EstatusCfdi::NoEncontrado);

    assert_eq!(resultado.stats.vigente, 1);
    assert_eq!(resultado.stats.cancelado, 1);
    assert_eq!(resultado.stats.no_encontrado, 1);
    assert_eq!(resultado.stats.error, 0);

    assert!(resultado.ruta.ends_with(NOMBRE_REPORTE));
    assert!(resultado.ruta.exists());
    assert_eq!(issues.status(), RunStatus::Ok);
}

#[test]
fn service_failure_degrades_to_connection_error_row() {
    let dir = tempfile::tempdir().unwrap();
    escribir(dir.path(), "x.xml", &cfdi_con_uuid("UUID-SIN-RESPUESTA"));

    let mut issues = IssueTracker::new();
    let resultado = validar_directorio(dir.path(), &ServicioFijo, &mut issues).unwrap();

    assert_eq!(resultado.filas.len(), 1);
    assert_eq!(resultado.filas[0].estatus, EstatusCfdi::ErrorConexion);
    assert_eq!(resultado.stats.error, 1);
    // The raw transport error lands in the codigo_estatus column.
    assert!(resultado.filas[0].codigo_estatus.contains("timeout"));
    // Lookup failures are warnings: the batch itself is fine.
    assert_eq!(issues.warnings().len(), 1);
    // The warning carries only the first 8 characters of the UUID.
    assert!(issues.warnings()[0].contains("UUID UUID-SIN:"));
    assert_eq!(issues.status(), RunStatus::Ok);
}

#[test]
fn unreadable_file_becomes_an_error_row() {
    let dir = tempfile::tempdir().unwrap();
    escribir(dir.path(), "a.xml", &cfdi_con_uuid("UUID-VIGENTE"));
    escribir(dir.path(), "roto.xml", "no es xml");

    let mut issues = IssueTracker::new();
    let resultado = validar_directorio(dir.path(), &ServicioFijo, &mut issues).unwrap();

    assert_eq!(resultado.filas.len(), 2);
    let roto = &resultado.filas[1];
    assert_eq!(roto.estatus, EstatusCfdi::Error);
    assert_eq!(roto.archivo, "roto.xml");
    assert_eq!(roto.uuid, "N/A");
    assert_eq!(roto.codigo_estatus, "No se pudo leer el archivo");
    assert_eq!(resultado.stats.error, 1);
    assert_eq!(issues.status(), RunStatus::Degraded);
}

#[test]
fn cfdi_without_uuid_never_hits_the_service() {
    struct ServicioProhibido;
    impl ConsultaEstatus for ServicioProhibido {
        fn consultar(&self, _: &DatosCfdi) -> Result<RespuestaSat, ComprobanteError> {
            panic!("no debe consultarse sin UUID");
        }
    }

    let dir = tempfile::tempdir().unwrap();
    escribir(
        dir.path(),
        "sin_uuid.xml",
        r#"<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4" Total="1">
            <cfdi:Emisor Rfc="AAA"/><cfdi:Receptor Rfc="BBB"/>
        </cfdi:Comprobante>"#,
    );

    let mut issues = IssueTracker::new();
    let resultado = validar_directorio(dir.path(), &ServicioProhibido, &mut issues).unwrap();
    assert_eq!(resultado.filas.len(), 1);
    assert_eq!(resultado.filas[0].estatus, EstatusCfdi::Error);
    assert_eq!(issues.status(), RunStatus::Degraded);
}

#[test]
fn empty_directory_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let mut issues = IssueTracker::new();
    assert!(validar_directorio(dir.path(), &ServicioFijo, &mut issues).is_none());
    assert_eq!(issues.exit_code(), 2);
}
