//! File-based secret sources
//!
//! Sources are line-oriented `KEY=value` files. For a base path `.secrets`
//! and environment `staging`, the candidates are `.secrets`,
//! `.secrets.staging`, `.secrets.public` and `.secrets.public.staging`,
//! merged in that order (later files win). Every candidate may instead be
//! present as an encrypted `<file>.enc` sibling (see [`crate::cipher`]); a
//! plain file takes precedence over its encrypted variant. The process
//! environment is merged last, then `${NAME}` references are expanded.

use crate::cipher;
use crate::config::Settings;
use crate::{Result, SecretGateError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

static VAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable reference pattern"));

/// Expansion passes before cyclic references are given up on.
const MAX_EXPANSION_PASSES: usize = 10;

/// Loads and merges all configured sources into one flat mapping.
///
/// The result is what the resolution cache partitions into its private and
/// public maps: files first, then the process environment (which wins unless
/// `override_env` is set), then variable expansion over the merged whole.
pub fn load_sources(settings: &Settings) -> Result<HashMap<String, String>> {
    let mut merged: HashMap<String, String> = HashMap::new();
    for candidate in candidate_paths(settings) {
        if let Some(vars) = read_candidate(&candidate, settings)? {
            tracing::debug!(
                file = %candidate.display(),
                count = vars.len(),
                "loaded secrets file"
            );
            merged.extend(vars);
        }
    }

    if settings.system_env {
        if settings.override_env {
            for (key, value) in std::env::vars() {
                merged.entry(key).or_insert(value);
            }
        } else {
            for (key, value) in std::env::vars() {
                merged.insert(key, value);
            }
        }
    }

    if settings.expand {
        expand_mapping(&mut merged);
    }
    Ok(merged)
}

/// Candidate files in merge order (later entries override earlier ones).
fn candidate_paths(settings: &Settings) -> Vec<PathBuf> {
    let base = settings.path.clone();
    let public = with_suffix(&base, "public");
    let mut candidates = vec![base.clone()];
    if let Some(env) = settings.environment.as_deref() {
        candidates.push(with_suffix(&base, env));
    }
    candidates.push(public.clone());
    if let Some(env) = settings.environment.as_deref() {
        candidates.push(with_suffix(&public, env));
    }
    candidates
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{suffix}"));
    PathBuf::from(name)
}

/// Reads one candidate, trying the plain file first and then the `.enc`
/// sibling. Returns `Ok(None)` when neither exists.
fn read_candidate(path: &Path, settings: &Settings) -> Result<Option<HashMap<String, String>>> {
    if path.exists() {
        return parse_file(path).map(Some);
    }

    let encrypted = with_suffix(path, "enc");
    if !encrypted.exists() {
        return Ok(None);
    }
    let Some(passphrase) = settings.encryption_key.as_deref() else {
        return Err(SecretGateError::EncryptionKeyMissing {
            path: encrypted.display().to_string(),
        });
    };
    let payload = fs::read_to_string(&encrypted)?;
    let plain = cipher::decrypt(&payload, passphrase).map_err(|e| SecretGateError::Decryption {
        path: encrypted.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(parse_content(&plain)))
}

fn parse_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_content(&content))
}

/// Parses `KEY=value` lines without any variable substitution; the expansion
/// pass below owns `${NAME}` handling, so substitution at parse time (as
/// dotenv parsers do it) would bypass the expansion toggle and resolve
/// references before later files are merged.
///
/// Blank lines and `#` comment lines are skipped, a leading `export ` is
/// tolerated, and single or double quotes around a value are stripped.
/// Malformed lines are skipped.
fn parse_content(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line
            .strip_prefix("export ")
            .map(str::trim_start)
            .unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            tracing::debug!(line = idx + 1, "skipping malformed secrets line");
            continue;
        };
        let key = key.trim();
        if !is_valid_key(key) {
            tracing::debug!(line = idx + 1, "skipping line with invalid key");
            continue;
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    vars
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Substitutes `${NAME}` references across the mapping until a fixpoint.
///
/// References to absent keys expand to the empty string on the first pass.
/// Cyclic references cannot converge; after the pass bound whatever
/// references remain are cleared to the empty string as well.
fn expand_mapping(map: &mut HashMap<String, String>) {
    for _ in 0..MAX_EXPANSION_PASSES {
        let mut updates: Vec<(String, String)> = Vec::new();
        for (key, value) in map.iter() {
            if !value.contains("${") {
                continue;
            }
            let replaced = VAR_REF.replace_all(value, |caps: &regex::Captures<'_>| {
                map.get(&caps[1]).cloned().unwrap_or_default()
            });
            if let Cow::Owned(new) = replaced {
                updates.push((key.clone(), new));
            }
        }
        if updates.is_empty() {
            return;
        }
        for (key, value) in updates {
            map.insert(key, value);
        }
    }

    let leftovers: Vec<(String, String)> = map
        .iter()
        .filter(|(_, value)| value.contains("${"))
        .map(|(key, value)| (key.clone(), VAR_REF.replace_all(value, "").into_owned()))
        .collect();
    for (key, value) in leftovers {
        map.insert(key, value);
    }
}
