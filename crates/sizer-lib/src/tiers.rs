//! Tier capacity table
//!
//! Maps an instance size name (e.g. `M30`) to its capacity envelope and
//! orders tiers by rank so the next smaller tier can be found.
//!
//! The CSV source has a header row with the columns `tier` (or an unnamed
//! first column), `cpu`, `ram`, `connections` (or `connection`), `iops` and
//! an optional `sort` rank. Without `sort`, rows rank in file order.

use crate::error::ConfigError;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Built-in capacities: name, vCPU, RAM GB, max connections, max IOPS
const DEFAULT_TIERS: &[(&str, f64, f64, f64, f64)] = &[
    ("M10", 2.0, 2.0, 1500.0, 1000.0),
    ("M20", 2.0, 4.0, 3000.0, 2000.0),
    ("M30", 2.0, 8.0, 3000.0, 3000.0),
    ("M40", 4.0, 16.0, 6000.0, 3000.0),
    ("M50", 8.0, 32.0, 16000.0, 3000.0),
    ("M60", 16.0, 64.0, 32000.0, 3000.0),
    ("M80", 32.0, 128.0, 96000.0, 3000.0),
    ("M140", 48.0, 192.0, 96000.0, 3000.0),
    ("M200", 64.0, 256.0, 128000.0, 3000.0),
];

/// Capacity envelope of one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    pub cpu_cores: f64,
    pub ram_gb: f64,
    pub max_connections: f64,
    pub max_iops: f64,
    pub rank: u32,
}

/// Lookup from tier name to capacity
#[derive(Debug, Clone, Default)]
pub struct TierTable {
    tiers: HashMap<String, TierSpec>,
}

impl TierTable {
    pub fn new(specs: impl IntoIterator<Item = TierSpec>) -> Self {
        Self {
            tiers: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// Table used when no tier file is available
    pub fn builtin() -> Self {
        Self::new(DEFAULT_TIERS.iter().zip(1..).map(
            |(&(name, cpu_cores, ram_gb, max_connections, max_iops), rank)| TierSpec {
                name: name.to_string(),
                cpu_cores,
                ram_gb,
                max_connections,
                max_iops,
                rank,
            },
        ))
    }

    /// Load the table from a CSV file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Load from `path` when given, falling back to the built-in table
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::load(path) {
            Ok(table) if !table.is_empty() => table,
            Ok(_) => {
                tracing::warn!(
                    event = "config_fallback",
                    path = %path.display(),
                    "Tier file has no rows, using built-in tiers"
                );
                Self::builtin()
            }
            Err(e) => {
                tracing::warn!(
                    event = "config_fallback",
                    path = %path.display(),
                    error = %e,
                    "Could not load tier file, using built-in tiers"
                );
                Self::builtin()
            }
        }
    }

    /// Parse CSV rows
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();

        let name_col = headers
            .iter()
            .position(|h| h.is_empty() || h.eq_ignore_ascii_case("tier") || h.eq_ignore_ascii_case("name"))
            .ok_or(ConfigError::MissingColumn("tier"))?;
        let cpu_col = column(&headers, &["cpu"]).ok_or(ConfigError::MissingColumn("cpu"))?;
        let ram_col = column(&headers, &["ram"]).ok_or(ConfigError::MissingColumn("ram"))?;
        let conn_col = column(&headers, &["connections", "connection"])
            .ok_or(ConfigError::MissingColumn("connections"))?;
        let iops_col = column(&headers, &["iops"]).ok_or(ConfigError::MissingColumn("iops"))?;
        let rank_col = column(&headers, &["sort", "rank"]);

        let mut specs = Vec::new();
        for (index, result) in rdr.records().enumerate() {
            let record = result?;
            let line = record.position().map_or(index as u64 + 2, |p| p.line());

            let name = record.get(name_col).unwrap_or_default();
            if name.is_empty() {
                continue;
            }

            let rank = match rank_col {
                Some(col) => {
                    let value = number(&record, col, line)?;
                    if value < 0.0 || value.fract() != 0.0 {
                        return Err(ConfigError::InvalidRow {
                            line,
                            reason: format!("rank must be a non-negative integer, got {value}"),
                        });
                    }
                    value as u32
                }
                None => index as u32 + 1,
            };

            specs.push(TierSpec {
                name: name.to_string(),
                cpu_cores: number(&record, cpu_col, line)?,
                ram_gb: number(&record, ram_col, line)?,
                max_connections: number(&record, conn_col, line)?,
                max_iops: number(&record, iops_col, line)?,
                rank,
            });
        }

        Ok(Self::new(specs))
    }

    pub fn get(&self, name: &str) -> Option<&TierSpec> {
        self.tiers.get(name)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Nearest tier ranked strictly below `name`.
    ///
    /// `None` for unknown tiers and for the lowest-ranked tier.
    pub fn find_lower_tier(&self, name: &str) -> Option<&TierSpec> {
        let current = self.get(name)?;
        self.tiers
            .values()
            .filter(|spec| spec.rank < current.rank)
            .max_by_key(|spec| spec.rank)
    }
}

fn column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

fn number(record: &StringRecord, col: usize, line: u64) -> Result<f64, ConfigError> {
    let raw = record.get(col).unwrap_or_default();
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>().map_err(|_| ConfigError::InvalidRow {
        line,
        reason: format!("'{raw}' is not a number"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_table() {
        let table = TierTable::builtin();
        assert_eq!(table.len(), 9);

        let m30 = table.get("M30").unwrap();
        assert_eq!(m30.ram_gb, 8.0);
        assert_eq!(m30.max_iops, 3000.0);
        assert_eq!(m30.max_connections, 3000.0);
    }

    #[test]
    fn test_find_lower_tier() {
        let table = TierTable::builtin();

        assert!(table.find_lower_tier("M10").is_none());
        assert_eq!(table.find_lower_tier("M20").unwrap().name, "M10");
        assert_eq!(table.find_lower_tier("M30").unwrap().name, "M20");
        assert_eq!(table.find_lower_tier("M50").unwrap().name, "M40");
        assert_eq!(table.find_lower_tier("M200").unwrap().name, "M140");
        assert!(table.find_lower_tier("INVALID").is_none());
    }

    #[test]
    fn test_lower_tier_skips_rank_gaps() {
        let csv = "tier,cpu,ram,connections,iops,sort\n\
                   M10,2,2,1500,1000,10\n\
                   M40,4,16,6000,3000,40\n\
                   M30,2,8,3000,3000,30\n";
        let table = TierTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.find_lower_tier("M40").unwrap().name, "M30");
        assert_eq!(table.find_lower_tier("M30").unwrap().name, "M10");
    }

    #[test]
    fn test_load_with_unnamed_first_column() {
        let csv = ",cpu,ram,connection,iops,sort\n\
                   M10, 2, 2, 1500, 1000, 1\n\
                   M20, 2, 4, 3000, 2000, 2\n";
        let table = TierTable::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        let m20 = table.get("M20").unwrap();
        assert_eq!(m20.max_connections, 3000.0);
        assert_eq!(m20.rank, 2);
    }

    #[test]
    fn test_rank_defaults_to_row_order() {
        let csv = "tier,cpu,ram,connections,iops\n\
                   small,1,1,100,100\n\
                   large,4,16,1000,1000\n";
        let table = TierTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.get("small").unwrap().rank, 1);
        assert_eq!(table.get("large").unwrap().rank, 2);
        assert_eq!(table.find_lower_tier("large").unwrap().name, "small");
    }

    #[test]
    fn test_invalid_number_reports_line() {
        let csv = "tier,cpu,ram,connections,iops\nM10,two,2,1500,1000\n";
        match TierTable::from_reader(csv.as_bytes()) {
            Err(ConfigError::InvalidRow { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected invalid row, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column() {
        let csv = "tier,cpu,ram,iops\nM10,2,2,1000\n";
        assert!(matches!(
            TierTable::from_reader(csv.as_bytes()),
            Err(ConfigError::MissingColumn("connections"))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "tier,cpu,ram,connections,iops,sort").unwrap();
        writeln!(file, "M10,2,2,1500,1000,1").unwrap();
        file.flush().unwrap();

        let table = TierTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get("M10").is_some());
    }

    #[test]
    fn test_missing_file_falls_back_to_builtin() {
        let table = TierTable::load_or_builtin(Some(Path::new("/nonexistent/tiers.csv")));
        assert_eq!(table.len(), TierTable::builtin().len());

        let table = TierTable::load_or_builtin(None);
        assert!(table.get("M200").is_some());
    }
}
