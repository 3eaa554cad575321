//! Resolution of logical columns against the header row of a source.

use std::collections::HashMap;

use kpi_core::settings::{ColumnField, ColumnMapping};
use tracing::debug;

use crate::error::DataFormatError;

fn normalize(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Header index of every logical column found in a source.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<ColumnField, usize>,
    headers: Vec<String>,
}

impl ColumnIndex {
    /// Match each field's aliases against `headers`, first alias wins.
    ///
    /// Fails with [`DataFormatError::MissingColumns`] listing every required
    /// field that matched nothing.
    pub fn resolve(headers: &[String], mapping: &ColumnMapping) -> Result<Self, DataFormatError> {
        let lookup: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .rev()
            .map(|(i, h)| (normalize(h), i))
            .collect();

        let mut positions = HashMap::new();
        let mut missing = Vec::new();
        for field in ColumnField::ALL {
            let found = mapping
                .aliases(field)
                .iter()
                .find_map(|alias| lookup.get(&normalize(alias)).copied());
            match found {
                Some(idx) => {
                    positions.insert(field, idx);
                }
                None if field.is_required() => missing.push(field.label().to_string()),
                None => {}
            }
        }

        if !missing.is_empty() {
            return Err(DataFormatError::MissingColumns(missing));
        }

        let index = Self {
            positions,
            headers: headers.to_vec(),
        };
        debug!("resolved columns: {:?}", index.detected());
        Ok(index)
    }

    pub fn position(&self, field: ColumnField) -> Option<usize> {
        self.positions.get(&field).copied()
    }

    /// Source header matched for `field`.
    pub fn header(&self, field: ColumnField) -> Option<&str> {
        self.position(field)
            .and_then(|i| self.headers.get(i))
            .map(|h| h.trim())
    }

    /// `(field label, source header)` pairs in field order.
    pub fn detected(&self) -> Vec<(String, String)> {
        ColumnField::ALL
            .iter()
            .filter_map(|&f| self.header(f).map(|h| (f.label().to_string(), h.to_string())))
            .collect()
    }

    /// Optional fields the source does not provide.
    pub fn missing_optional(&self) -> Vec<String> {
        ColumnField::ALL
            .iter()
            .filter(|f| !f.is_required() && self.position(**f).is_none())
            .map(|f| f.label().to_string())
            .collect()
    }
}
