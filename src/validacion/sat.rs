//! Blocking SOAP client for the SAT invoice-status service.
//!
//! The service is slow and unreliable; the client applies a bounded retry
//! with linear backoff on transport failures and 5xx responses, then gives
//! up so the caller can mark the document "Error de conexión" and move on.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use std::io::Cursor;
use std::time::Duration;

use crate::core::ComprobanteError;
use crate::validacion::{ConsultaEstatus, DatosCfdi, RespuestaSat};
use crate::xml::{buscar_primero_local, parsear_documento};

/// SAT ConsultaCFDI service endpoint.
pub const SAT_URL: &str =
    "https://consultaqr.facturaelectronica.sat.gob.mx/ConsultaCFDIService.svc";

const SOAP_ACTION: &str = "http://tempuri.org/IConsultaCFDIService/Consulta";
const NS_SOAP: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const NS_TEMPURI: &str = "http://tempuri.org/";

/// Real status-lookup client.
#[derive(Debug, Clone)]
pub struct ClienteSat {
    url: String,
    intentos: u32,
    espera_base: Duration,
    timeout: Duration,
}

impl Default for ClienteSat {
    fn default() -> Self {
        Self {
            url: SAT_URL.to_string(),
            intentos: 3,
            espera_base: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClienteSat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn con_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    fn enviar(&self, envelope: &str) -> Result<String, ComprobanteError> {
        let cliente = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ComprobanteError::Consulta(e.to_string()))?;

        let mut ultimo_error = String::new();
        for intento in 1..=self.intentos {
            if intento > 1 {
                std::thread::sleep(self.espera_base * (intento - 1));
            }
            let respuesta = cliente
                .post(&self.url)
                .header("Content-Type", "text/xml; charset=utf-8")
                .header("SOAPAction", SOAP_ACTION)
                .body(envelope.to_string())
                .send();
            match respuesta {
                Ok(r) if r.status().is_server_error() => {
                    ultimo_error = format!("HTTP {}", r.status());
                }
                Ok(r) if !r.status().is_success() => {
                    return Err(ComprobanteError::Consulta(format!("HTTP {}", r.status())));
                }
                Ok(r) => {
                    return r
                        .text()
                        .map_err(|e| ComprobanteError::Consulta(e.to_string()));
                }
                Err(e) => ultimo_error = e.to_string(),
            }
        }
        Err(ComprobanteError::Consulta(format!(
            "sin respuesta tras {} intento(s): {ultimo_error}",
            self.intentos
        )))
    }
}

impl ConsultaEstatus for ClienteSat {
    fn consultar(&self, datos: &DatosCfdi) -> Result<RespuestaSat, ComprobanteError> {
        let uuid_corto: String = datos.uuid.chars().take(8).collect();
        tracing::info!("Consultando SAT para UUID: {uuid_corto}...");
        let envelope = construir_envelope(&datos.expresion())?;
        let cuerpo = self.enviar(&envelope)?;
        interpretar_respuesta(&cuerpo)
    }
}

fn xml_io(e: std::io::Error) -> ComprobanteError {
    ComprobanteError::Xml(format!("error al escribir envelope: {e}"))
}

/// SOAP 1.1 request envelope carrying the lookup expression.
fn construir_envelope(expresion: &str) -> Result<String, ComprobanteError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_io)?;

    let mut envelope = BytesStart::new("soapenv:Envelope");
    envelope.push_attribute(("xmlns:soapenv", NS_SOAP));
    envelope.push_attribute(("xmlns:tem", NS_TEMPURI));
    writer.write_event(Event::Start(envelope)).map_err(xml_io)?;
    writer
        .write_event(Event::Empty(BytesStart::new("soapenv:Header")))
        .map_err(xml_io)?;
    writer
        .write_event(Event::Start(BytesStart::new("soapenv:Body")))
        .map_err(xml_io)?;
    writer
        .write_event(Event::Start(BytesStart::new("tem:Consulta")))
        .map_err(xml_io)?;
    writer
        .write_event(Event::Start(BytesStart::new("tem:expresionImpresa")))
        .map_err(xml_io)?;
    writer
        .write_event(Event::Text(BytesText::new(expresion)))
        .map_err(xml_io)?;
    for nombre in ["tem:expresionImpresa", "tem:Consulta", "soapenv:Body", "soapenv:Envelope"] {
        writer
            .write_event(Event::End(quick_xml::events::BytesEnd::new(nombre)))
            .map_err(xml_io)?;
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| ComprobanteError::Xml(format!("envelope UTF-8: {e}")))
}

/// Pull the result fields out of the SOAP response, namespace-agnostically.
///
/// Field names are the provider's; `EstatusCalificacion` is an older alias
/// for the cancellation-qualification field still seen in the wild.
fn interpretar_respuesta(cuerpo: &str) -> Result<RespuestaSat, ComprobanteError> {
    let root = parsear_documento(cuerpo)
        .map_err(|e| ComprobanteError::Consulta(format!("respuesta ilegible: {e}")))?;

    let campo = |nombre: &str| -> Option<String> {
        buscar_primero_local(&root, nombre)
            .and_then(|e| e.texto())
            .map(str::to_string)
    };

    Ok(RespuestaSat {
        codigo_estatus: campo("CodigoEstatus").unwrap_or_else(|| "N/A".to_string()),
        estado: campo("Estado").unwrap_or_else(|| "N/A".to_string()),
        es_cancelable: campo("EsCancelable").unwrap_or_else(|| "N/A".to_string()),
        estatus_cancelacion: campo("EstatusCancelacion")
            .or_else(|| campo("EstatusCalificacion"))
            .unwrap_or_else(|| "N/A".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validacion::{CODIGO_EXITO, EstatusCfdi, clasificar_respuesta};

    #[test]
    fn sat_url_is_https() {
        assert!(SAT_URL.starts_with("https://"));
    }

    #[test]
    fn envelope_carries_expression_and_namespaces() {
        let envelope = construir_envelope("?re=AAA&rr=BBB&tt=1.00&id=UUID").unwrap();
        assert!(envelope.contains("xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\""));
        assert!(envelope.contains("xmlns:tem=\"http://tempuri.org/\""));
        // quick-xml escapes the ampersands in the text node
        assert!(envelope.contains("?re=AAA&amp;rr=BBB&amp;tt=1.00&amp;id=UUID"));
        assert!(envelope.contains("<tem:expresionImpresa>"));
    }

    #[test]
    fn parses_a_soap_response() {
        let cuerpo = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
          <s:Body>
            <ConsultaResponse xmlns="http://tempuri.org/">
              <ConsultaResult xmlns:a="http://schemas.datacontract.org/2004/07/Sat.Cfdi">
                <a:CodigoEstatus>S - Comprobante obtenido satisfactoriamente.</a:CodigoEstatus>
                <a:EsCancelable>Cancelable sin aceptación</a:EsCancelable>
                <a:Estado>Vigente</a:Estado>
                <a:EstatusCancelacion/>
              </ConsultaResult>
            </ConsultaResponse>
          </s:Body>
        </s:Envelope>"#;
        let respuesta = interpretar_respuesta(cuerpo).unwrap();
        assert_eq!(respuesta.codigo_estatus, CODIGO_EXITO);
        assert_eq!(respuesta.estado, "Vigente");
        assert_eq!(respuesta.estatus_cancelacion, "N/A");
        assert_eq!(clasificar_respuesta(&respuesta), EstatusCfdi::Vigente);
    }

    #[test]
    fn garbage_response_is_a_query_error() {
        assert!(interpretar_respuesta("no soy xml <<<").is_err());
    }
}
