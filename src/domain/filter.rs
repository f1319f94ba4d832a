//! Filter dimension values and the traversal grid
//!
//! The portal exposes results only through two `<select>` controls
//! (academic year and school/program). Both dimensions are enumerated once
//! per run and the traversal space is their full cross-product.

use serde::{Deserialize, Serialize};

/// One selectable option in a filter dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterValue {
    /// Visible text, used as the selection key when driving the control.
    pub text: String,
    /// Raw option value. Placeholder ("select one") options carry an empty
    /// value and are excluded at enumeration time.
    pub value: String,
}

impl FilterValue {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }

    /// True for non-selectable placeholder options.
    pub fn is_placeholder(&self) -> bool {
        self.value.is_empty()
    }
}

/// The two filter dimensions captured at run start. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDimensions {
    pub years: Vec<FilterValue>,
    pub programs: Vec<FilterValue>,
}

impl FilterDimensions {
    pub fn cell_count(&self) -> usize {
        self.years.len() * self.programs.len()
    }

    /// Full cross-product in the fixed traversal order: years outer,
    /// programs inner, both in enumeration (DOM) order.
    pub fn cells(&self) -> Vec<GridCell> {
        let mut cells = Vec::with_capacity(self.cell_count());
        for year in &self.years {
            for program in &self.programs {
                cells.push(GridCell {
                    year: year.clone(),
                    program: program.clone(),
                });
            }
        }
        cells
    }
}

/// One (year, program) combination in the traversal space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    pub year: FilterValue,
    pub program: FilterValue,
}

impl GridCell {
    /// Log-friendly label, program first to match the portal's reading order.
    pub fn label(&self) -> String {
        format!("{} / {}", self.program.text, self.year.text)
    }
}
