use csv::StringRecord;
use std::collections::HashMap;

use crate::error::{AnalyticsError, Result};

/// A logical column and the header spellings accepted for it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

impl ColumnSpec {
    pub const fn required(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            name,
            aliases,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            name,
            aliases,
            required: false,
        }
    }
}

/// Header positions resolved once per file, before any row is parsed.
#[derive(Debug, Clone)]
pub struct Schema {
    positions: HashMap<&'static str, (usize, String)>,
}

impl Schema {
    pub fn resolve(headers: &StringRecord, specs: &[ColumnSpec], source: &str) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(normalize).collect();
        let mut positions = HashMap::new();

        for spec in specs {
            // Aliases are listed in priority order.
            let found = spec.aliases.iter().find_map(|alias| {
                let key = normalize(alias);
                normalized.iter().position(|h| *h == key)
            });

            match found {
                Some(idx) => {
                    let header = headers.get(idx).unwrap_or(spec.name).to_string();
                    positions.insert(spec.name, (idx, header));
                }
                None if spec.required => {
                    return Err(AnalyticsError::MissingColumn {
                        source_name: source.to_string(),
                        column: spec.name.to_string(),
                    });
                }
                None => {}
            }
        }

        Ok(Self { positions })
    }

    pub fn has(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// The header text as it appears in the file, for error messages.
    pub fn header(&self, name: &'static str) -> &str {
        self.positions
            .get(name)
            .map(|(_, h)| h.as_str())
            .unwrap_or(name)
    }

    /// Trimmed cell value; `None` when the column is absent or the cell is blank.
    pub fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        let (idx, _) = self.positions.get(name)?;
        record.get(*idx).map(str::trim).filter(|v| !v.is_empty())
    }
}

fn normalize(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
