// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit codelist formatting.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use cityjson_lite_model::{AttrValue, Attributes};

use crate::error::{Error, Result};
use crate::table::{read_table, read_table_from, TableRow};

pub const CODE_COLUMN: &str = "Code [str]";
pub const IMPLIES_COLUMN: &str = "Implies [list,str]";
pub const IMPLIES: &str = "Implies";
pub const IMPLIED_BY: &str = "Implied by";

/// Codelist entries keyed by code
pub type Codelist = BTreeMap<String, Attributes>;

fn build(rows: Vec<TableRow>) -> Result<Codelist> {
    let mut codes = Codelist::new();
    let mut implied_by: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for TableRow {
        specific,
        mut attributes,
    } in rows
    {
        let code = specific[0].as_str().unwrap_or_default().to_string();
        if code.is_empty() {
            return Err(Error::Codelist("one row misses its code".to_string()));
        }
        if codes.contains_key(&code) {
            return Err(Error::Codelist(format!("the code '{code}' is duplicated")));
        }
        let implies = specific[1].string_list();
        for implied in &implies {
            implied_by
                .entry(implied.clone())
                .or_default()
                .push(code.clone());
        }
        attributes.insert(IMPLIES.to_string(), AttrValue::from(implies));
        codes.insert(code, attributes);
    }

    for (code, attributes) in codes.iter_mut() {
        let reverse = implied_by.remove(code).unwrap_or_default();
        attributes.insert(IMPLIED_BY.to_string(), AttrValue::from(reverse));
    }
    Ok(codes)
}

pub fn read_codelist(path: &Path) -> Result<Codelist> {
    build(read_table(path, &[CODE_COLUMN, IMPLIES_COLUMN])?)
}

pub fn read_codelist_from(reader: impl Read, source_name: &str) -> Result<Codelist> {
    build(read_table_from(reader, source_name, &[CODE_COLUMN, IMPLIES_COLUMN])?)
}

/// Format a codelist table as JSON keyed by code
pub fn format_codelist(input: &Path, output: &Path) -> Result<()> {
    let codes = read_codelist(input)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(output, serde_json::to_vec(&codes)?).map_err(|e| Error::io(output, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "Code [str];Implies [list,str];Label [str]\n\
                         A;;Area\n\
                         A1;A;Office\n\
                         A2;A,A1;Meeting\n";

    #[test]
    fn reverse_implications() {
        let codes = read_codelist_from(TABLE.as_bytes(), "codes").unwrap();
        assert_eq!(codes.len(), 3);
        assert_eq!(codes["A"][IMPLIED_BY], AttrValue::from(vec!["A1", "A2"]));
        assert_eq!(codes["A1"][IMPLIED_BY], AttrValue::from(vec!["A2"]));
        assert_eq!(codes["A2"][IMPLIES], AttrValue::from(vec!["A", "A1"]));
        assert_eq!(codes["A2"][IMPLIED_BY], AttrValue::List(Vec::new()));
        assert_eq!(codes["A1"]["Label"], AttrValue::from("Office"));
    }

    #[test]
    fn invalid_codes() {
        let duplicate = "Code [str];Implies [list,str]\nA;\nA;\n";
        assert!(matches!(read_codelist_from(duplicate.as_bytes(), "codes"), Err(Error::Codelist(_))));
        let missing = "Code [str];Implies [list,str]\n;A\n";
        assert!(matches!(read_codelist_from(missing.as_bytes(), "codes"), Err(Error::Codelist(_))));
    }
}
