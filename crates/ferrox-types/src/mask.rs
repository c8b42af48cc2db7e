//! File masks and target name masks

use glob::{MatchOptions, Pattern};

use crate::{Error, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, PartialEq)]
struct Mask {
    pattern: Pattern,
    directories_only: bool,
}

impl Mask {
    fn parse(text: &str) -> Result<Self> {
        let directories_only = text.ends_with('/');
        let text = text.trim_end_matches('/');
        let pattern = Pattern::new(text)
            .map_err(|e| Error::config(format!("Invalid file mask \"{}\": {}", text, e)))?;
        Ok(Self {
            pattern,
            directories_only,
        })
    }

    fn matches(&self, name: &str, is_directory: bool) -> bool {
        (!self.directories_only || is_directory) && self.pattern.matches_with(name, MATCH_OPTIONS)
    }
}

/// Include/exclude file masks
///
/// Syntax is `include1;include2|exclude1;exclude2`. A mask ending with `/`
/// applies to directories only. Without include masks everything is included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMasks {
    text: String,
    include: Vec<Mask>,
    exclude: Vec<Mask>,
}

impl FileMasks {
    /// Parse a mask string
    pub fn parse(text: &str) -> Result<Self> {
        let (include, exclude) = text.split_once('|').unwrap_or((text, ""));
        Ok(Self {
            text: text.to_string(),
            include: parse_list(include)?,
            exclude: parse_list(exclude)?,
        })
    }

    /// Source text of the masks
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether no mask is set
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Whether a name passes the masks
    pub fn matches(&self, name: &str, is_directory: bool) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|mask| mask.matches(name, is_directory));
        included && !self.exclude.iter().any(|mask| mask.matches(name, is_directory))
    }
}

fn parse_list(text: &str) -> Result<Vec<Mask>> {
    text.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Mask::parse)
        .collect()
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(index) if index > 0 => (&name[..index], Some(&name[index + 1..])),
        _ => (name, None),
    }
}

/// Apply a target mask to a file name
///
/// A `*` in the mask stands for the corresponding part of the name: `*`
/// keeps the name, `*.ext` swaps the extension, `*-old.*` decorates the stem
/// and a mask without `*` is a literal replacement.
pub fn mask_file_name(name: &str, mask: &str) -> String {
    if mask.is_empty() || mask == "*" || mask == "*.*" {
        return name.to_string();
    }
    let (name_stem, name_extension) = split_extension(name);
    let (mask_stem, mask_extension) = split_extension(mask);
    let stem = mask_stem.replace('*', name_stem);
    let extension = mask_extension.map(|extension| extension.replace('*', name_extension.unwrap_or("")));
    match extension {
        Some(extension) if !extension.is_empty() => format!("{}.{}", stem, extension),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "anything.txt", false, true)]
    #[case("*.txt", "notes.TXT", false, true)]
    #[case("*.txt", "notes.md", false, false)]
    #[case("*.txt;*.md", "notes.md", false, true)]
    #[case("|*.tmp", "build.tmp", false, false)]
    #[case("|*.tmp", "build.rs", false, true)]
    #[case("*|secret*", "secret.txt", false, false)]
    #[case("|.git/", ".git", true, false)]
    #[case("|.git/", ".git", false, true)]
    fn test_masks(
        #[case] masks: &str,
        #[case] name: &str,
        #[case] is_directory: bool,
        #[case] expected: bool,
    ) {
        let masks = FileMasks::parse(masks).unwrap();
        assert_eq!(masks.matches(name, is_directory), expected);
    }

    #[test]
    fn test_invalid_mask() {
        assert!(FileMasks::parse("[").is_err());
    }

    #[rstest]
    #[case("report.txt", "*", "report.txt")]
    #[case("report.txt", "*.bak", "report.bak")]
    #[case("report.txt", "copy.*", "copy.txt")]
    #[case("report.txt", "other.md", "other.md")]
    #[case("README", "*.md", "README.md")]
    #[case(".profile", "*.*", ".profile")]
    #[case("report.txt", "*-20240101-120000.*", "report-20240101-120000.txt")]
    #[case("README", "*-1.*", "README-1")]
    fn test_mask_file_name(#[case] name: &str, #[case] mask: &str, #[case] expected: &str) {
        assert_eq!(mask_file_name(name, mask), expected);
    }
}
