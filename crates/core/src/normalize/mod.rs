//! Canonicalization of raw disassembled operations into instruction tokens.
//!
//! A raw operation looks like `"<MNEMONIC> <arg>,<arg>,..."`. The token is the
//! lower-cased mnemonic followed by each rewritten argument, joined with `_`:
//! - `[...]` memory operands lose their brackets;
//! - `call:<name>` becomes `libc:<name>` when the catalog knows the callee,
//!   otherwise `call:unknown`;
//! - everything else passes through untouched.

use thiserror::Error;

use crate::symbols::SymbolCatalog;

const CALL_PREFIX: &str = "call:";
const LIBRARY_PREFIX: &str = "libc:";
const UNKNOWN_CALL: &str = "call:unknown";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The operation does not split into exactly one mnemonic and one argument list.
    #[error("Malformed operation {operation:?}: expected \"<mnemonic> <args>\"")]
    MalformedOperation { operation: String },
}

pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Stateless normalizer bound to a symbol catalog.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    catalog: &'a SymbolCatalog,
}

impl<'a> Normalizer<'a> {
    pub fn new(catalog: &'a SymbolCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a SymbolCatalog {
        self.catalog
    }

    /// Normalize one raw operation into its canonical token.
    pub fn normalize(&self, raw_operation: &str) -> NormalizeResult<String> {
        let mut parts = raw_operation.split(' ');
        let (mnemonic, args) = match (parts.next(), parts.next(), parts.next()) {
            (Some(mnemonic), Some(args), None) if !mnemonic.is_empty() => (mnemonic, args),
            _ => {
                return Err(NormalizeError::MalformedOperation {
                    operation: raw_operation.to_string(),
                })
            }
        };

        let mut token = mnemonic.to_lowercase();
        for arg in args.split(',') {
            token.push('_');
            token.push_str(&self.rewrite_argument(arg));
        }
        Ok(token)
    }

    fn rewrite_argument(&self, arg: &str) -> String {
        let arg = strip_brackets(arg);
        match arg.strip_prefix(CALL_PREFIX) {
            Some(callee) if self.catalog.contains(callee) => format!("{LIBRARY_PREFIX}{callee}"),
            Some(_) => UNKNOWN_CALL.to_string(),
            None => arg.to_string(),
        }
    }
}

/// Drop one pair of surrounding `[` `]`, if present.
fn strip_brackets(arg: &str) -> &str {
    arg.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_brackets_only_removes_matching_pair() {
        assert_eq!(strip_brackets("[rax+8]"), "rax+8");
        assert_eq!(strip_brackets("[rax"), "[rax");
        assert_eq!(strip_brackets("rax]"), "rax]");
        assert_eq!(strip_brackets("[[x]]"), "[x]");
    }
}
