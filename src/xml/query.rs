use rust_decimal::Decimal;
use std::str::FromStr;

use crate::core::IssueTracker;
use crate::xml::XmlElement;

/// CFDI 4.0 namespace URI.
pub const NS_CFDI_40: &str = "http://www.sat.gob.mx/cfd/4";
/// CFDI 3.3 namespace URI.
pub const NS_CFDI_33: &str = "http://www.sat.gob.mx/cfd/3";
/// Payroll complement (nómina 1.2) namespace URI.
pub const NS_NOMINA12: &str = "http://www.sat.gob.mx/nomina12";
/// TimbreFiscalDigital (government seal) namespace URI.
pub const NS_TFD: &str = "http://www.sat.gob.mx/TimbreFiscalDigital";
/// Payment complement 2.0 namespace URI.
pub const NS_PAGOS20: &str = "http://www.sat.gob.mx/Pagos20";

/// Ordered alias → namespace-URI mapping for one schema family.
///
/// Static configuration data; never mutated at runtime.
#[derive(Debug, Clone, Copy)]
pub struct NamespaceBindings {
    pares: &'static [(&'static str, &'static str)],
}

impl NamespaceBindings {
    pub const fn new(pares: &'static [(&'static str, &'static str)]) -> Self {
        Self { pares }
    }

    /// Resolve an alias to its URI.
    pub fn resolver(&self, alias: &str) -> Option<&'static str> {
        self.pares
            .iter()
            .find(|(a, _)| *a == alias)
            .map(|(_, uri)| *uri)
    }
}

/// Bindings for CFDI 4.0 documents.
pub const BINDINGS_CFDI_40: NamespaceBindings =
    NamespaceBindings::new(&[("cfdi", NS_CFDI_40), ("tfd", NS_TFD)]);

/// Bindings for CFDI 3.3 documents.
pub const BINDINGS_CFDI_33: NamespaceBindings =
    NamespaceBindings::new(&[("cfdi", NS_CFDI_33), ("tfd", NS_TFD)]);

/// Bindings for payroll detection (nómina rides on CFDI 3.3).
pub const BINDINGS_NOMINA: NamespaceBindings =
    NamespaceBindings::new(&[("cfdi", NS_CFDI_33), ("nomina12", NS_NOMINA12)]);

/// Bindings for payment-complement extraction.
pub const BINDINGS_PAGOS: NamespaceBindings = NamespaceBindings::new(&[
    ("cfdi", NS_CFDI_40),
    ("tfd", NS_TFD),
    ("pago20", NS_PAGOS20),
]);

/// Combined bindings the payroll extractor queries against: both CFDI
/// versions plus nómina and the fiscal seal.
pub const BINDINGS_COMBINADO: NamespaceBindings = NamespaceBindings::new(&[
    ("cfdi", NS_CFDI_40),
    ("cfdi3", NS_CFDI_33),
    ("nomina12", NS_NOMINA12),
    ("tfd", NS_TFD),
]);

fn auto_y_descendientes<'a>(el: &'a XmlElement) -> impl Iterator<Item = &'a XmlElement> {
    std::iter::once(el).chain(el.descendientes())
}

fn coincide(el: &XmlElement, uri: &str, local: &str) -> bool {
    el.nombre() == local && el.namespace() == Some(uri)
}

/// Find all elements matching a slash-separated path of `alias:Nombre`
/// segments under a binding set.
///
/// Each segment is a self-or-descendant search scoped to the previous
/// match. An unknown alias or malformed segment yields an empty result,
/// never an error.
pub fn buscar_todos<'a>(
    el: &'a XmlElement,
    ruta: &str,
    bindings: &NamespaceBindings,
) -> Vec<&'a XmlElement> {
    let mut frente: Vec<&'a XmlElement> = vec![el];
    for segmento in ruta.split('/') {
        let Some((alias, local)) = segmento.split_once(':') else {
            return Vec::new();
        };
        let Some(uri) = bindings.resolver(alias) else {
            return Vec::new();
        };
        frente = frente
            .into_iter()
            .flat_map(auto_y_descendientes)
            .filter(|e| coincide(e, uri, local))
            .collect();
        if frente.is_empty() {
            return Vec::new();
        }
    }
    frente
}

/// First element matching a namespace-qualified path, or `None`.
pub fn buscar_primero<'a>(
    el: &'a XmlElement,
    ruta: &str,
    bindings: &NamespaceBindings,
) -> Option<&'a XmlElement> {
    buscar_todos(el, ruta, bindings).into_iter().next()
}

/// All elements whose unqualified tag name matches, ignoring namespaces
/// entirely. The last resort of the lookup cascade, for documents stamped
/// with an unexpected or missing namespace declaration.
pub fn buscar_todos_local<'a>(el: &'a XmlElement, nombre: &str) -> Vec<&'a XmlElement> {
    auto_y_descendientes(el)
        .filter(|e| e.nombre() == nombre)
        .collect()
}

/// First element by unqualified tag name, or `None`.
pub fn buscar_primero_local<'a>(el: &'a XmlElement, nombre: &str) -> Option<&'a XmlElement> {
    auto_y_descendientes(el).find(|e| e.nombre() == nombre)
}

/// Attribute of a possibly-absent element, with a default.
pub fn atributo_o<'a>(el: Option<&'a XmlElement>, nombre: &str, default: &'a str) -> &'a str {
    el.and_then(|e| e.atributo(nombre)).unwrap_or(default)
}

/// Parse a decimal attribute value defensively.
///
/// The single chokepoint for numeric coercion across every extractor:
/// `None` or blank returns the default silently; a malformed value returns
/// the default and records exactly one warning naming the offending value
/// and the caller's context label. Never fails.
pub fn a_decimal(
    valor: Option<&str>,
    default: Decimal,
    issues: &mut IssueTracker,
    contexto: &str,
) -> Decimal {
    let Some(texto) = valor.map(str::trim).filter(|t| !t.is_empty()) else {
        return default;
    };
    match Decimal::from_str(texto) {
        Ok(n) => n,
        Err(_) => {
            issues.warn(format!(
                "No se pudo convertir a número '{texto}' en {contexto}"
            ));
            default
        }
    }
}

/// Short summary of the namespace URIs present in a document, for
/// diagnostics when expected nodes are missing.
pub fn resumen_namespaces(el: &XmlElement) -> String {
    let mut uris: Vec<&str> = auto_y_descendientes(el)
        .filter_map(|e| e.namespace())
        .collect();
    uris.sort_unstable();
    uris.dedup();
    if uris.is_empty() {
        "(sin namespaces)".to_string()
    } else {
        uris.join(", ")
    }
}
