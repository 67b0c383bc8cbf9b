//! Claim-to-header mapping resolution.
//!
//! # Responsibilities
//! - Parse the mapping file (flat JSON object of claim → header)
//! - Parse the inline `claim:header,...` mapping string
//! - Merge both tables, inline entries overriding file entries
//! - Decide between merged, degraded and fatal outcomes
//!
//! # Design Decisions
//! - Each source is parsed into its own table; the merge builds a new one
//! - A source failure is only fatal when the other source is also unusable

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Claim key → outbound header name.
pub type ClaimMapping = BTreeMap<String, String>;

/// Which sources contributed to the resolved mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimMappingSource {
    FileOnly,
    InlineOnly,
    Merged,
    Empty,
}

/// Errors raised by a single mapping source, or by the combination of both.
#[derive(Debug, Error)]
pub enum ClaimMappingError {
    #[error("unable to read claim mapping file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse claim mapping file {path}: {source}")]
    FileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no inline claim mappings set")]
    InlineUnset,

    #[error("unexpected number of ':' in claim mapping '{fragment}'")]
    Malformed { fragment: String },

    #[error("either the claim mapping file or inline mappings need to be valid (file: {file}; inline: {inline})")]
    NoUsableSource {
        file: Box<ClaimMappingError>,
        inline: Box<ClaimMappingError>,
    },
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClaimMapping {
    pub mapping: ClaimMapping,
    pub source: ClaimMappingSource,
}

/// Load the mapping file.
pub fn from_file(path: &Path) -> Result<ClaimMapping, ClaimMappingError> {
    let content = fs::read_to_string(path).map_err(|source| ClaimMappingError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ClaimMappingError::FileParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse an inline `claim:header,...` string.
///
/// Each fragment splits on its last `:`, so claim keys may themselves contain
/// colons. The first fragment without a `:` fails the whole string.
pub fn from_inline(value: &str) -> Result<ClaimMapping, ClaimMappingError> {
    if value.is_empty() {
        return Err(ClaimMappingError::InlineUnset);
    }

    let mut mapping = ClaimMapping::new();
    for fragment in value.split(',').filter(|f| !f.is_empty()) {
        let (claim, header) = fragment
            .rsplit_once(':')
            .ok_or_else(|| ClaimMappingError::Malformed { fragment: fragment.to_string() })?;
        mapping.insert(claim.to_string(), header.to_string());
    }
    Ok(mapping)
}

/// Build a new table from `file` with `inline` entries applied on top.
pub fn merge(file: &ClaimMapping, inline: &ClaimMapping) -> ClaimMapping {
    file.iter()
        .chain(inline.iter())
        .map(|(claim, header)| (claim.clone(), header.clone()))
        .collect()
}

/// Resolve the claim mapping from both sources.
///
/// Source failures that are survivable are logged at warn level.
pub fn resolve(path: &Path, inline: &str) -> Result<ResolvedClaimMapping, ClaimMappingError> {
    let file_result = from_file(path);
    let inline_result = from_inline(inline);

    let resolved = match (file_result, inline_result) {
        (Ok(file), Ok(inline)) => ResolvedClaimMapping {
            mapping: merge(&file, &inline),
            source: ClaimMappingSource::Merged,
        },
        (Ok(file), Err(inline_err)) => {
            if !matches!(inline_err, ClaimMappingError::InlineUnset) {
                tracing::warn!(error = %inline_err, "unable to parse inline claim mappings, using file only");
            }
            ResolvedClaimMapping { mapping: file, source: ClaimMappingSource::FileOnly }
        }
        (Err(file_err), Ok(inline)) => {
            tracing::warn!(error = %file_err, "unable to load claim mapping file, using inline mappings only");
            ResolvedClaimMapping { mapping: inline, source: ClaimMappingSource::InlineOnly }
        }
        (Err(file_err), Err(inline_err)) => {
            return Err(ClaimMappingError::NoUsableSource {
                file: Box::new(file_err),
                inline: Box::new(inline_err),
            });
        }
    };

    if resolved.mapping.is_empty() {
        return Ok(ResolvedClaimMapping { source: ClaimMappingSource::Empty, ..resolved });
    }
    Ok(resolved)
}
