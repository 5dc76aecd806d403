//! Loading the monitored domain list.
//!
//! Two formats are accepted: CSV records
//! (`domain[,name[,description[,url]]]`, quoted fields and `#` comments
//! allowed, optional `domain,...` header) and a JSON
//! array of objects with at least a `domain` field.

use crate::{
    errors::{LoadError, WhoisError},
    DomainEntry,
};
use std::{collections::HashSet, path::Path};
use tracing::{info, warn};

const MAX_DOMAIN_LENGTH: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    Lines,
    Json,
}

impl ListFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ListFormat::Json,
            _ => ListFormat::Lines,
        }
    }
}

pub async fn load_domains(path: &Path) -> Result<Vec<DomainEntry>, LoadError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let domains = parse_domains(&text, ListFormat::from_path(path))?;
    info!("Loaded {} domains from {}", domains.len(), path.display());
    Ok(domains)
}

/// Parse a domain list; invalid and duplicate entries are skipped with a warning.
pub fn parse_domains(text: &str, format: ListFormat) -> Result<Vec<DomainEntry>, LoadError> {
    let raw = match format {
        ListFormat::Json => serde_json::from_str::<Vec<DomainEntry>>(text)?,
        ListFormat::Lines => parse_lines(text)?,
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(raw.len());

    for mut entry in raw {
        match validate_domain(&entry.domain) {
            Ok(domain) => {
                if !seen.insert(domain.clone()) {
                    warn!("Ignoring duplicate domain {}", domain);
                    continue;
                }
                entry.domain = domain;
                entries.push(entry);
            }
            Err(e) => warn!("Ignoring domain list entry: {}", e),
        }
    }

    Ok(entries)
}

/// Comma-separated records with standard double-quote escaping, so a
/// description may itself contain commas.
fn parse_lines(text: &str) -> Result<Vec<DomainEntry>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record?;
        let domain = record.get(0).unwrap_or_default();
        // Header row
        if domain.is_empty() || domain.eq_ignore_ascii_case("domain") {
            continue;
        }

        let optional = |index: usize| record.get(index).filter(|value| !value.is_empty()).map(str::to_string);
        entries.push(DomainEntry {
            domain: domain.to_string(),
            name: optional(1),
            description: optional(2),
            url: optional(3),
        });
    }

    Ok(entries)
}

/// Normalize and sanity-check a registrable domain name.
pub fn validate_domain(domain: &str) -> Result<String, WhoisError> {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();

    if domain.is_empty() {
        return Err(WhoisError::InvalidDomain("Empty domain".to_string()));
    }

    if domain.len() > MAX_DOMAIN_LENGTH {
        return Err(WhoisError::InvalidDomain(format!("Domain name too long: {}", domain)));
    }

    if !domain.contains('.')
        || domain.contains("..")
        || domain.starts_with('.')
        || domain.contains(char::is_whitespace)
    {
        return Err(WhoisError::InvalidDomain(format!("Invalid domain format: {}", domain)));
    }

    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::assert_ok;

    #[test]
    fn test_parse_lines_with_metadata() {
        let text = "domain,name,description,url\n\
# personal sites\n\
rezo.net,Rezo,Le réseau des copains,https://rezo.net\n\
\n\
  Visionscarto.NET  \n";
        let entries = assert_ok!(parse_domains(text, ListFormat::Lines));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].domain, "rezo.net");
        assert_eq!(entries[0].name.as_deref(), Some("Rezo"));
        assert_eq!(entries[0].url.as_deref(), Some("https://rezo.net"));
        assert_eq!(entries[1], DomainEntry::new("visionscarto.net"));
    }

    #[test]
    fn test_quoted_description_keeps_its_comma() {
        let text = "visionscarto.net,Visionscarto,\"Cartes, et représentations\",https://visionscarto.net\n";
        let entries = assert_ok!(parse_domains(text, ListFormat::Lines));

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description.as_deref(), Some("Cartes, et représentations"));
        assert_eq!(entries[0].url.as_deref(), Some("https://visionscarto.net"));
    }

    #[test]
    fn test_parse_json_list() {
        let text = r#"[
            {"domain": "rezo.net", "name": "Rezo"},
            {"domain": "visionscarto.net", "description": "Cartes"}
        ]"#;
        let entries = parse_domains(text, ListFormat::Json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].description.as_deref(), Some("Cartes"));

        assert!(parse_domains("{not json", ListFormat::Json).is_err());
    }

    #[test]
    fn test_invalid_and_duplicate_entries_skipped() {
        let text = "rezo.net\nlocalhost\nbad..example\nREZO.net\n.example\n";
        let entries = parse_domains(text, ListFormat::Lines).unwrap();
        assert_eq!(entries, vec![DomainEntry::new("rezo.net")]);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ListFormat::from_path(Path::new("domains.JSON")), ListFormat::Json);
        assert_eq!(ListFormat::from_path(Path::new("domains.csv")), ListFormat::Lines);
        assert_eq!(ListFormat::from_path(Path::new("domains")), ListFormat::Lines);
    }

    #[tokio::test]
    async fn test_load_domains_from_file() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "rezo.net\nvisionscarto.net").unwrap();

        let entries = load_domains(file.path()).await.unwrap();
        assert_eq!(entries.len(), 2);

        let missing = load_domains(Path::new("/nonexistent/domains.txt")).await;
        assert!(matches!(missing, Err(LoadError::Read { .. })));
    }
}
