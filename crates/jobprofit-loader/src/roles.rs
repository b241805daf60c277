//! Sheet-role detection
//!
//! A workbook is matched to the three input roles by looking for alias
//! substrings in the lower-cased, trimmed sheet names. Aliases are tried in
//! order and, for each alias, sheets in workbook order, so an earlier alias
//! beats an earlier sheet.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The input a sheet supplies to the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetRole {
    Timesheet,
    RevRec,
    Quotes,
}

impl SheetRole {
    pub const ALL: [SheetRole; 3] = [SheetRole::Timesheet, SheetRole::RevRec, SheetRole::Quotes];

    /// Name substrings that identify the role, most specific intent first
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            SheetRole::Timesheet => &["wfm", "timesheet", "time", "wfm hist", "wfm data"],
            SheetRole::RevRec => &["rev rec", "revrec", "revenue", "rev", "revenue recognition"],
            SheetRole::Quotes => &["quotes", "estimates", "estimate", "quote", "quotation"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SheetRole::Timesheet => "timesheet",
            SheetRole::RevRec => "revrec",
            SheetRole::Quotes => "quotes",
        }
    }
}

impl fmt::Display for SheetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// First sheet whose normalised name contains one of `aliases`.
///
/// Returns the sheet name exactly as it appears in the workbook.
pub fn pick_sheet<'a>(sheet_names: &'a [String], aliases: &[&str]) -> Option<&'a str> {
    let normalised: Vec<String> = sheet_names
        .iter()
        .map(|name| name.trim().to_lowercase())
        .collect();

    aliases.iter().find_map(|alias| {
        let alias = alias.to_lowercase();
        normalised
            .iter()
            .position(|name| name.contains(&alias))
            .map(|i| sheet_names[i].as_str())
    })
}

/// Pick a sheet for every role; a sheet may serve more than one role
pub fn detect_roles(sheet_names: &[String]) -> Vec<(SheetRole, Option<String>)> {
    SheetRole::ALL
        .into_iter()
        .map(|role| (role, pick_sheet(sheet_names, role.aliases()).map(str::to_string)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        let sheets = names(&["  WFM Hist ", "Rev Rec 2024", "Quotes"]);
        assert_eq!(pick_sheet(&sheets, SheetRole::Timesheet.aliases()), Some("  WFM Hist "));
        assert_eq!(pick_sheet(&sheets, SheetRole::RevRec.aliases()), Some("Rev Rec 2024"));
        assert_eq!(pick_sheet(&sheets, SheetRole::Quotes.aliases()), Some("Quotes"));
    }

    #[test]
    fn earlier_alias_beats_earlier_sheet() {
        // "timesheet" is a later alias than "wfm", so the WFM sheet wins
        let sheets = names(&["Timesheet", "WFM export"]);
        assert_eq!(pick_sheet(&sheets, SheetRole::Timesheet.aliases()), Some("WFM export"));
    }

    #[test]
    fn substring_matches_are_loose() {
        // "time" is an alias, so any sheet containing it qualifies
        let sheets = names(&["Summary", "Overtime"]);
        assert_eq!(pick_sheet(&sheets, SheetRole::Timesheet.aliases()), Some("Overtime"));

        let sheets = names(&["Estimate v2"]);
        assert_eq!(pick_sheet(&sheets, SheetRole::Quotes.aliases()), Some("Estimate v2"));
    }

    #[test]
    fn unmatched_roles_are_none() {
        let sheets = names(&["Sheet1", "Sheet2"]);
        let roles = detect_roles(&sheets);
        assert_eq!(
            roles,
            vec![
                (SheetRole::Timesheet, None),
                (SheetRole::RevRec, None),
                (SheetRole::Quotes, None),
            ]
        );
    }
}
