// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed attribute tables.
//!
//! Tables are `;`-separated with a header row. A typed column is written
//! `<Name> [<type>]` where the type is one of `str`, `float`, `int`, `bool`
//! or `list<separator><type>` (for example `list,float`). Columns without a
//! type are ignored. Values are trimmed; an empty cell reads as null, or as
//! an empty list for list columns, and floats accept a decimal comma.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use cityjson_lite_model::{AttrValue, Attributes};

use crate::error::{Error, Result};

/// Type of a column, parsed from its header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Str,
    Float,
    Int,
    Bool,
    List { separator: char, item: Box<ColumnType> },
}

impl ColumnType {
    pub fn parse(spec: &str) -> Result<Self> {
        match spec {
            "str" => Ok(ColumnType::Str),
            "float" => Ok(ColumnType::Float),
            "int" => Ok(ColumnType::Int),
            "bool" => Ok(ColumnType::Bool),
            _ => {
                let rest = spec
                    .strip_prefix("list")
                    .ok_or_else(|| Error::UnsupportedType(spec.to_string()))?;
                let mut chars = rest.chars();
                let separator = chars
                    .next()
                    .ok_or_else(|| Error::UnsupportedType(spec.to_string()))?;
                Ok(ColumnType::List {
                    separator,
                    item: Box::new(ColumnType::parse(chars.as_str())?),
                })
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            ColumnType::Str => "str".into(),
            ColumnType::Float => "float".into(),
            ColumnType::Int => "int".into(),
            ColumnType::Bool => "bool".into(),
            ColumnType::List { separator, item } => format!("list{separator}{}", item.describe()),
        }
    }

    /// Read a raw cell
    pub fn read(&self, column: &str, raw: &str) -> Result<AttrValue> {
        let invalid = || Error::InvalidValue {
            column: column.to_string(),
            value: raw.to_string(),
            ty: self.describe(),
        };
        Ok(match self {
            ColumnType::Str => AttrValue::String(raw.to_string()),
            _ if raw.is_empty() => match self {
                ColumnType::List { .. } => AttrValue::List(Vec::new()),
                _ => AttrValue::Null,
            },
            ColumnType::Float => {
                AttrValue::Float(raw.replace(',', ".").parse().map_err(|_| invalid())?)
            }
            ColumnType::Int => AttrValue::Int(raw.parse().map_err(|_| invalid())?),
            ColumnType::Bool => AttrValue::Bool(raw.to_lowercase() == "true"),
            ColumnType::List { separator, item } => AttrValue::List(
                raw.split(*separator)
                    .map(|part| item.read(column, part.trim()))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

/// Split a header into its name and type; `None` for untyped columns
pub fn split_header(header: &str) -> Result<Option<(&str, ColumnType)>> {
    if !header.contains(" [") {
        return Ok(None);
    }
    let (name, ty) = header
        .split_once(" [")
        .and_then(|(name, rest)| Some((name, rest.strip_suffix(']')?)))
        .filter(|(_, ty)| !ty.contains(" ["))
        .ok_or_else(|| Error::InvalidHeader(header.to_string()))?;
    Ok(Some((name, ColumnType::parse(ty)?)))
}

/// Read one cell under its typed header, returning the resolved name
pub fn read_cell(header: &str, raw: &str) -> Result<(String, AttrValue)> {
    let (name, ty) = split_header(header)?.ok_or_else(|| Error::InvalidHeader(header.to_string()))?;
    Ok((name.to_string(), ty.read(name, raw.trim())?))
}

/// One non-blank row of a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Values of the requested columns, in request order
    pub specific: Vec<AttrValue>,
    /// Every other typed column, by resolved name
    pub attributes: Attributes,
}

/// Read a table file, pulling `specific` columns out of the attributes
pub fn read_table(path: &Path, specific: &[&str]) -> Result<Vec<TableRow>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    read_table_from(file, &path.display().to_string(), specific)
}

/// Read a table from any reader; `source_name` only appears in errors
pub fn read_table_from(reader: impl Read, source_name: &str, specific: &[&str]) -> Result<Vec<TableRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut specific_positions = Vec::with_capacity(specific.len());
    for column in specific {
        let position = headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| Error::MissingColumn {
                column: column.to_string(),
                source_name: source_name.to_string(),
            })?;
        specific_positions.push(position);
    }

    let mut typed = Vec::new();
    for (position, header) in headers.iter().enumerate() {
        if specific_positions.contains(&position) {
            continue;
        }
        if let Some((name, ty)) = split_header(header)? {
            if typed.iter().any(|(_, n, _): &(usize, &str, ColumnType)| *n == name) {
                return Err(Error::DuplicateColumn {
                    name: name.to_string(),
                    source_name: source_name.to_string(),
                });
            }
            typed.push((position, name, ty));
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let cell = |position: usize| record.get(position).unwrap_or("");

        let specific = specific
            .iter()
            .zip(&specific_positions)
            .map(|(header, &position)| read_cell(header, cell(position)).map(|(_, value)| value))
            .collect::<Result<Vec<_>>>()?;

        let mut attributes = Attributes::new();
        for (position, name, ty) in &typed {
            attributes.insert(name.to_string(), ty.read(name, cell(*position).trim())?);
        }

        rows.push(TableRow {
            specific,
            attributes,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_types() {
        assert_eq!(ColumnType::parse("str").unwrap(), ColumnType::Str);
        assert_eq!(
            ColumnType::parse("list,float").unwrap(),
            ColumnType::List {
                separator: ',',
                item: Box::new(ColumnType::Float)
            }
        );
        assert!(matches!(ColumnType::parse("date"), Err(Error::UnsupportedType(_))));
    }

    #[test]
    fn cell_values() {
        let float = ColumnType::Float;
        assert_eq!(float.read("h", "3,5").unwrap(), AttrValue::Float(3.5));
        assert_eq!(float.read("h", "").unwrap(), AttrValue::Null);
        assert!(float.read("h", "tall").is_err());
        assert_eq!(ColumnType::Bool.read("b", "TRUE").unwrap(), AttrValue::Bool(true));
        assert_eq!(ColumnType::Bool.read("b", "yes").unwrap(), AttrValue::Bool(false));
        assert_eq!(ColumnType::Str.read("s", "").unwrap(), AttrValue::String(String::new()));

        let list = ColumnType::parse("list|int").unwrap();
        assert_eq!(list.read("l", "").unwrap(), AttrValue::List(Vec::new()));
        assert_eq!(
            list.read("l", "1|2").unwrap(),
            AttrValue::List(vec![AttrValue::Int(1), AttrValue::Int(2)])
        );
    }

    #[test]
    fn headers() {
        assert!(split_header("Comment").unwrap().is_none());
        let (name, ty) = split_header("Level [float]").unwrap().unwrap();
        assert_eq!((name, ty), ("Level", ColumnType::Float));
        assert!(matches!(split_header("Bad [str"), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn table_rows() {
        let data = "\u{feff}Key [str];Name [str];Height [float];Notes\n\
                    A;Hall;12,5;anything\n\
                    ;;;\n\
                    B; Annex ;;\n";
        let rows = read_table_from(data.as_bytes(), "test", &["Key [str]"]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].specific, vec![AttrValue::from("A")]);
        assert_eq!(rows[0].attributes["Height"], AttrValue::Float(12.5));
        assert!(!rows[0].attributes.contains_key("Notes"));
        assert!(!rows[0].attributes.contains_key("Key"));
        assert_eq!(rows[1].attributes["Name"], AttrValue::from("Annex"));
        assert_eq!(rows[1].attributes["Height"], AttrValue::Null);
    }

    #[test]
    fn missing_and_duplicate_columns() {
        let data = "Name [str];Name [int]\nx;1\n";
        assert!(matches!(
            read_table_from(data.as_bytes(), "test", &[]),
            Err(Error::DuplicateColumn { .. })
        ));
        assert!(matches!(
            read_table_from(data.as_bytes(), "test", &["Key [str]"]),
            Err(Error::MissingColumn { .. })
        ));
    }
}
