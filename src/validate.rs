use std::fmt;
use std::path::Path;

use caddyfile_rs::{parse, tokenize};
use serde::Serialize;

use crate::error::ProxyResult;

/// One validation message, attributed to the offending fragment when
/// that could be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub fragment: Option<String>,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn for_fragment(name: &str, message: &str) -> Self {
        Self {
            fragment: Some(name.to_string()),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn global(message: &str) -> Self {
        Self {
            fragment: None,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fragment {
            Some(name) => write!(f, "[{name}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Syntax-check a single piece of Caddyfile source. Returns the list
/// of problems; empty means the source tokenizes and parses.
#[must_use]
pub fn check_source(source: &str) -> Vec<String> {
    let tokens = match tokenize(source) {
        Ok(tokens) => tokens,
        Err(e) => return vec![format!("{e:?}")],
    };
    match parse(&tokens) {
        Ok(_) => Vec::new(),
        Err(e) => vec![format!("{e:?}")],
    }
}

/// Syntax-check one fragment file on disk.
pub fn check_file(path: &Path) -> ProxyResult<Vec<String>> {
    let source = std::fs::read_to_string(path)?;
    Ok(check_source(&source))
}

/// Attribute unattributed diagnostics to a fragment whose name or
/// file name appears in the message. The external validator reports
/// file paths, not fragment names.
#[must_use]
pub fn attribute(diagnostics: Vec<Diagnostic>, names: &[String]) -> Vec<Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| {
            if d.fragment.is_some() {
                return d;
            }
            let owner = names
                .iter()
                .find(|name| d.message.contains(&format!("{name}.caddy")))
                .cloned();
            Diagnostic {
                fragment: owner,
                message: d.message,
            }
        })
        .collect()
}
