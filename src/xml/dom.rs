use std::path::Path;

use crate::core::{IssueTracker, nombre_archivo};

/// One element of a loaded XML document: an owned, read-only tree view.
///
/// Built once per load from a `roxmltree` parse. Owning the tree keeps the
/// query layer free of parser lifetimes and lets a document outlive the
/// text it was parsed from.
#[derive(Debug, Clone)]
pub struct XmlElement {
    nombre: String,
    namespace: Option<String>,
    atributos: Vec<(String, String)>,
    texto: String,
    hijos: Vec<XmlElement>,
}

impl XmlElement {
    /// Unqualified tag name.
    pub fn nombre(&self) -> &str {
        &self.nombre
    }

    /// Namespace URI, if the element is namespaced.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Attribute value by unqualified name: whitespace-trimmed, blank
    /// collapses to `None`.
    pub fn atributo(&self, nombre: &str) -> Option<&str> {
        self.atributos
            .iter()
            .find(|(n, _)| n == nombre)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Direct text content, whitespace-trimmed; blank collapses to `None`.
    pub fn texto(&self) -> Option<&str> {
        Some(self.texto.as_str()).filter(|t| !t.is_empty())
    }

    /// Direct child elements.
    pub fn hijos(&self) -> &[XmlElement] {
        &self.hijos
    }

    /// All descendant elements, depth-first in document order, excluding
    /// `self`.
    pub fn descendientes(&self) -> Descendientes<'_> {
        Descendientes {
            pila: self.hijos.iter().rev().collect(),
        }
    }

    /// Whether any of the given attributes is present.
    pub fn tiene_alguno(&self, atributos: &[&str]) -> bool {
        atributos.iter().any(|a| self.atributo(a).is_some())
    }
}

/// Depth-first iterator over descendants. See [`XmlElement::descendientes`].
pub struct Descendientes<'a> {
    pila: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendientes<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let siguiente = self.pila.pop()?;
        self.pila.extend(siguiente.hijos.iter().rev());
        Some(siguiente)
    }
}

/// Parse an XML string into an owned element tree.
pub fn parsear_documento(texto: &str) -> Result<XmlElement, String> {
    let texto = texto.trim_start_matches('\u{feff}');
    let doc = roxmltree::Document::parse(texto).map_err(|e| e.to_string())?;
    Ok(convertir(doc.root_element()))
}

fn convertir(node: roxmltree::Node<'_, '_>) -> XmlElement {
    XmlElement {
        nombre: node.tag_name().name().to_string(),
        namespace: node.tag_name().namespace().map(str::to_string),
        atributos: node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().trim().to_string()))
            .collect(),
        texto: node
            .children()
            .filter_map(|n| n.text())
            .collect::<String>()
            .trim()
            .to_string(),
        hijos: node
            .children()
            .filter(|n| n.is_element())
            .map(convertir)
            .collect(),
    }
}

/// Load one XML file defensively.
///
/// A missing file, unreadable file, or malformed document records exactly
/// one file-scoped fatal naming the file and the cause, and returns `None`.
/// Callers must skip the file, never abort the batch. Content is decoded
/// UTF-8-lossily so stray encoding damage degrades instead of failing.
pub fn cargar_documento(path: &Path, issues: &mut IssueTracker) -> Option<XmlElement> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            issues.fatal(format!("Archivo no encontrado o ilegible: {}: {e}", path.display()));
            return None;
        }
    };
    let texto = String::from_utf8_lossy(&bytes);
    match parsear_documento(&texto) {
        Ok(root) => Some(root),
        Err(e) => {
            issues.fatal(format!(
                "No se pudo leer/parsear XML '{}': {e}",
                nombre_archivo(path)
            ));
            None
        }
    }
}
