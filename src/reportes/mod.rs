//! Shared xlsx styling: the fill-color table, header format, and column
//! auto-sizing.
//!
//! Styles are an explicit, enumerated configuration table built per report
//! run and passed to the sheet writers — no process-wide mutable state.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, Worksheet, XlsxError};

/// Green fill: perceptions / "Vigente" status.
pub const RELLENO_VERDE: Color = Color::RGB(0x00C6EFCE);
/// Red fill: deductions / "Cancelado" status.
pub const RELLENO_ROJO: Color = Color::RGB(0x00FFC7CE);
/// Blue fill: subsidies.
pub const RELLENO_AZUL: Color = Color::RGB(0x00DDEBF7);
/// Amber fill: "No encontrado" status.
pub const RELLENO_AMBAR: Color = Color::RGB(0x00FFEB9C);
/// Gray fill: error rows.
pub const RELLENO_GRIS: Color = Color::RGB(0x00D3D3D3);
/// Header-row fill.
pub const RELLENO_ENCABEZADO: Color = Color::RGB(0x00BDD7EE);

/// Solid fill format for one of the color constants.
pub fn formato_relleno(color: Color) -> Format {
    Format::new().set_background_color(color)
}

/// Bold, filled header-row format.
pub fn formato_encabezado() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(RELLENO_ENCABEZADO)
}

/// Write a decimal cell, converting to `f64` only here at the spreadsheet
/// boundary.
pub fn escribir_decimal(
    hoja: &mut Worksheet,
    fila: u32,
    col: u16,
    valor: Decimal,
) -> Result<(), XlsxError> {
    hoja.write_number(fila, col, valor.to_f64().unwrap_or(0.0))?;
    Ok(())
}

/// Accumulates the widest content seen per column and applies
/// `min(ancho + 2, 50)` at the end, mirroring the reports' auto-size rule.
#[derive(Debug, Default)]
pub struct AnchoColumnas {
    anchos: Vec<usize>,
}

impl AnchoColumnas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the display width of one cell's content.
    pub fn observar(&mut self, col: u16, contenido: &str) {
        let col = col as usize;
        if self.anchos.len() <= col {
            self.anchos.resize(col + 1, 0);
        }
        let ancho = contenido.chars().count();
        if ancho > self.anchos[col] {
            self.anchos[col] = ancho;
        }
    }

    /// Apply the accumulated widths to a worksheet.
    pub fn aplicar(&self, hoja: &mut Worksheet) -> Result<(), XlsxError> {
        for (col, ancho) in self.anchos.iter().enumerate() {
            let ajustado = (*ancho + 2).min(50);
            hoja.set_column_width(col as u16, ajustado as f64)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancho_tracks_maximum_per_column() {
        let mut anchos = AnchoColumnas::new();
        anchos.observar(0, "abc");
        anchos.observar(0, "abcdef");
        anchos.observar(2, "xy");
        assert_eq!(anchos.anchos, vec![6, 0, 2]);
    }

    #[test]
    fn ancho_counts_chars_not_bytes() {
        let mut anchos = AnchoColumnas::new();
        anchos.observar(0, "Nómina");
        assert_eq!(anchos.anchos[0], 6);
    }
}
