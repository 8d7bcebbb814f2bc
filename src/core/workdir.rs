use std::path::{Path, PathBuf};

use crate::core::IssueTracker;

/// List the XML files directly under `dir` (non-recursive, case-insensitive
/// `.xml` extension), sorted by file name.
///
/// Sorting makes row order and catalog contents reproducible regardless of
/// the file system's enumeration order.
pub fn listar_xml(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && tiene_extension_xml(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Like [`listar_xml`], but records the failure modes the pipelines share:
/// an unreadable directory or an empty one is a run-scoped fatal.
pub fn listar_xml_o_abortar(dir: &Path, issues: &mut IssueTracker) -> Option<Vec<PathBuf>> {
    let files = match listar_xml(dir) {
        Ok(files) => files,
        Err(e) => {
            issues.abort(format!("No se pudo leer el directorio '{}': {e}", dir.display()));
            return None;
        }
    };
    if files.is_empty() {
        issues.abort(format!(
            "No se encontraron archivos XML en {}",
            dir.display()
        ));
        return None;
    }
    Some(files)
}

fn tiene_extension_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

/// File name component for diagnostics, falling back to the full path.
pub fn nombre_archivo(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
