//! Variable expansion inside `.env` values
//!
//! `$NAME`, `${NAME}` and `${NAME:-default}` resolve against the
//! [`ProcessEnv`] being built first, then against other entries of the same
//! file. Unknown names expand to an empty string and `\$` stays a literal
//! dollar sign.
//!
//! dotenvy would otherwise substitute from the OS environment while parsing,
//! so every `$` is swapped for a private-use sentinel before the text reaches
//! it and expanded here afterwards.

use std::collections::BTreeMap;

use super::ProcessEnv;

/// Stands in for an unescaped `$` while dotenvy parses
const REFERENCE: char = '\u{E000}';

/// Stands in for an escaped `\$`
const LITERAL_DOLLAR: char = '\u{E001}';

/// Replace `$` with sentinels so the dotenv parser performs no lookups
pub(super) fn protect(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut backslashes = 0usize;

    for c in content.chars() {
        match c {
            '$' if backslashes % 2 == 1 => {
                out.pop();
                out.push(LITERAL_DOLLAR);
            }
            '$' => out.push(REFERENCE),
            other => out.push(other),
        }
        backslashes = if c == '\\' { backslashes + 1 } else { 0 };
    }

    out
}

/// Expands the entries of one parsed file
pub(super) struct Expander<'a> {
    env: &'a ProcessEnv,
    entries: &'a BTreeMap<String, String>,
}

impl<'a> Expander<'a> {
    pub(super) fn new(env: &'a ProcessEnv, entries: &'a BTreeMap<String, String>) -> Self {
        Self { env, entries }
    }

    /// Final value of the entry `key`, whose parsed text is `raw`
    pub(super) fn expand_entry(&self, key: &'a str, raw: &'a str) -> String {
        let mut seen = vec![key];
        self.expand_value(raw, &mut seen)
    }

    fn expand_value(&self, raw: &'a str, seen: &mut Vec<&'a str>) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(start) = rest.find(REFERENCE) {
            out.push_str(&rest[..start]);
            let after = &rest[start + REFERENCE.len_utf8()..];

            match parse_reference(after) {
                Some(reference) => {
                    let value = self.lookup(reference.name, seen);
                    match reference.default {
                        Some(default) if value.is_empty() => {
                            out.push_str(&self.expand_value(default, seen))
                        }
                        _ => out.push_str(&value),
                    }
                    rest = &after[reference.consumed..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out.replace(LITERAL_DOLLAR, "$")
    }

    fn lookup(&self, name: &'a str, seen: &mut Vec<&'a str>) -> String {
        if let Some(value) = self.env.get(name) {
            return value.to_string();
        }
        if seen.contains(&name) {
            return String::new();
        }

        match self.entries.get(name) {
            Some(raw) => {
                seen.push(name);
                let value = self.expand_value(raw, seen);
                seen.pop();
                value
            }
            None => String::new(),
        }
    }
}

struct Reference<'a> {
    name: &'a str,
    default: Option<&'a str>,
    /// Bytes of the input the reference spans, after the `$`
    consumed: usize,
}

/// Parse `NAME`, `{NAME}` or `{NAME:-default}` at the start of `text`
fn parse_reference(text: &str) -> Option<Reference<'_>> {
    if let Some(body) = text.strip_prefix('{') {
        let end = body.find('}')?;
        let inner = &body[..end];
        let (name, default) = match inner.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (inner, None),
        };
        return is_name(name).then_some(Reference {
            name,
            default,
            consumed: end + 2,
        });
    }

    let len = text
        .find(|c: char| !is_name_char(c))
        .unwrap_or(text.len());
    (len > 0).then_some(Reference {
        name: &text[..len],
        default: None,
        consumed: len,
    })
}

fn is_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expand_all(env: &ProcessEnv, content: &str) -> BTreeMap<String, String> {
        let entries: BTreeMap<String, String> = dotenvy::from_read_iter(protect(content).as_bytes())
            .map(|item| item.unwrap())
            .collect();
        let expander = Expander::new(env, &entries);
        entries
            .iter()
            .map(|(key, raw)| (key.clone(), expander.expand_entry(key, raw)))
            .collect()
    }

    #[test]
    fn test_references_resolve_against_env_first() {
        let env: ProcessEnv = [("HOST".to_string(), "from-env".to_string())].into_iter().collect();
        let values = expand_all(&env, "HOST=from-file\nURL=http://${HOST}/api\nBARE=$HOST:80\n");

        assert_eq!(values["URL"], "http://from-env/api");
        assert_eq!(values["BARE"], "from-env:80");
    }

    #[test]
    fn test_same_file_entries_and_defaults() {
        let env = ProcessEnv::default();
        let values = expand_all(
            &env,
            "ROOT=/srv\nDATA=${ROOT}/data\nPORT=${MISSING_PORT:-8080}\nEMPTY=${MISSING}\n",
        );

        assert_eq!(values["DATA"], "/srv/data");
        assert_eq!(values["PORT"], "8080");
        assert_eq!(values["EMPTY"], "");
    }

    #[test]
    fn test_escaped_dollar_and_cycles() {
        let env = ProcessEnv::default();
        let values = expand_all(&env, "PRICE=\\$5\nQUOTED='cost \\$HOME'\nA=${B}\nB=${A}x\n");

        assert_eq!(values["PRICE"], "$5");
        assert_eq!(values["QUOTED"], "cost $HOME");
        assert_eq!(values["A"], "x");
        assert_eq!(values["B"], "x");
    }

    #[test]
    fn test_lone_dollar_is_kept() {
        let env = ProcessEnv::default();
        let values = expand_all(&env, "TAIL=cash$\nBRACE=\"${not closed\"\n");
        assert_eq!(values["TAIL"], "cash$");
        assert_eq!(values["BRACE"], "${not closed");
    }
}
