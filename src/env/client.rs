//! Client-side environment
//!
//! Picks the variables that are safe to embed in a client bundle and encodes
//! them for the bundler's constant replacement.

use std::collections::BTreeMap;

use serde::Serialize;

use super::ProcessEnv;

/// Variables with this prefix are exposed to client code by default
pub const DEFAULT_CLIENT_PREFIX: &str = "REACT_APP_";

/// Socket overrides for the dev server's live-reload client
const WDS_SOCKET_VARS: [&str; 3] = ["WDS_SOCKET_HOST", "WDS_SOCKET_PATH", "WDS_SOCKET_PORT"];

/// Client-visible variables with their plain string values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawEnv(BTreeMap<String, String>);

impl RawEnv {
    /// Build from the loaded environment
    ///
    /// Starts from the well-known defaults and overlays every variable whose
    /// name starts with `prefix`.
    pub fn from_env(env: &ProcessEnv, prefix: &str, public_url: &str) -> Self {
        let mut vars = BTreeMap::new();

        vars.insert(
            "NODE_ENV".to_string(),
            env.non_empty("NODE_ENV").unwrap_or("development").to_string(),
        );
        vars.insert(
            "PUBLIC_URL".to_string(),
            if public_url.is_empty() { "/" } else { public_url }.to_string(),
        );
        for name in WDS_SOCKET_VARS {
            if let Some(value) = env.get(name) {
                vars.insert(name.to_string(), value.to_string());
            }
        }
        vars.insert(
            "FAST_REFRESH".to_string(),
            env.get("FAST_REFRESH").unwrap_or("false").to_string(),
        );

        if !prefix.is_empty() {
            for (name, value) in env.iter().filter(|(name, _)| name.starts_with(prefix)) {
                vars.insert(name.to_string(), value.to_string());
            }
        }

        Self(vars)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON-encode every value
    pub fn stringify(&self) -> StringifiedEnv {
        StringifiedEnv {
            process_env: self
                .0
                .iter()
                .map(|(name, value)| (name.clone(), serde_json::Value::from(value.as_str()).to_string()))
                .collect(),
        }
    }
}

/// [`RawEnv`] with each value encoded as a JSON string literal
///
/// Serializes as `{"process.env": {...}}`, the shape bundler define plugins
/// accept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StringifiedEnv {
    #[serde(rename = "process.env")]
    process_env: BTreeMap<String, String>,
}

impl StringifiedEnv {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.process_env.get(name).map(String::as_str)
    }

    /// Flattened define-map: `process.env.NAME` -> literal
    pub fn define_map(&self) -> BTreeMap<String, String> {
        self.process_env
            .iter()
            .map(|(name, literal)| (format!("process.env.{}", name), literal.clone()))
            .collect()
    }

    /// Decode back into plain values
    pub fn decode(&self) -> Result<RawEnv, serde_json::Error> {
        self.process_env
            .iter()
            .map(|(name, literal)| {
                serde_json::from_str::<String>(literal).map(|value| (name.clone(), value))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(RawEnv)
    }
}

/// Both encodings of the client environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEnvironment {
    pub raw: RawEnv,
    pub stringified: StringifiedEnv,
}

impl ClientEnvironment {
    pub fn new(env: &ProcessEnv, prefix: &str, public_url: &str) -> Self {
        let raw = RawEnv::from_env(env, prefix, public_url);
        let stringified = raw.stringify();
        Self { raw, stringified }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env_of(pairs: &[(&str, &str)]) -> ProcessEnv {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let raw = RawEnv::from_env(&ProcessEnv::default(), DEFAULT_CLIENT_PREFIX, "");

        assert_eq!(raw.get("NODE_ENV"), Some("development"));
        assert_eq!(raw.get("PUBLIC_URL"), Some("/"));
        assert_eq!(raw.get("FAST_REFRESH"), Some("false"));
        assert_eq!(raw.get("WDS_SOCKET_HOST"), None);
        assert_eq!(raw.len(), 3);
    }

    #[test]
    fn test_only_prefixed_variables_are_exposed() {
        let env = env_of(&[
            ("REACT_APP_API", "https://api.example.com"),
            ("DATABASE_PASSWORD", "hunter2"),
            ("WDS_SOCKET_PORT", "0"),
            ("NODE_ENV", "production"),
        ]);
        let raw = RawEnv::from_env(&env, DEFAULT_CLIENT_PREFIX, "/app/");

        assert_eq!(raw.get("REACT_APP_API"), Some("https://api.example.com"));
        assert_eq!(raw.get("DATABASE_PASSWORD"), None);
        assert_eq!(raw.get("WDS_SOCKET_PORT"), Some("0"));
        assert_eq!(raw.get("NODE_ENV"), Some("production"));
        assert_eq!(raw.get("PUBLIC_URL"), Some("/app/"));
    }

    #[test]
    fn test_custom_prefix() {
        let env = env_of(&[("REACT_APP_A", "1"), ("VITE_B", "2")]);
        let raw = RawEnv::from_env(&env, "VITE_", "/");

        assert_eq!(raw.get("VITE_B"), Some("2"));
        assert_eq!(raw.get("REACT_APP_A"), None);
    }

    #[test]
    fn test_stringified_decodes_to_raw() {
        let env = env_of(&[
            ("REACT_APP_QUOTED", r#"say "hi""#),
            ("REACT_APP_NEWLINE", "a\nb"),
            ("REACT_APP_UNICODE", "caf\u{e9} \\ slash"),
            ("REACT_APP_EMPTY", ""),
        ]);
        let client = ClientEnvironment::new(&env, DEFAULT_CLIENT_PREFIX, "/");

        assert_eq!(client.stringified.get("REACT_APP_QUOTED"), Some(r#""say \"hi\"""#));
        assert_eq!(client.stringified.decode().unwrap(), client.raw);
    }

    #[test]
    fn test_define_map_shape() {
        let env = env_of(&[("REACT_APP_FLAG", "on")]);
        let client = ClientEnvironment::new(&env, DEFAULT_CLIENT_PREFIX, "/");
        let define = client.stringified.define_map();

        assert_eq!(define.get("process.env.REACT_APP_FLAG").map(String::as_str), Some("\"on\""));
        assert_eq!(define.get("process.env.NODE_ENV").map(String::as_str), Some("\"development\""));

        let json = serde_json::to_value(&client.stringified).unwrap();
        assert_eq!(json["process.env"]["REACT_APP_FLAG"], "\"on\"");
    }
}
