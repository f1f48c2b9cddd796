//! Bundler option glue
//!
//! Translates resolved paths, parsed flags and the loaded environment into
//! a single JSON document the script hands to the bundler.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::cli::{CliOption, ParsedArguments, Script};
use crate::config::Config;
use crate::env::{ClientEnvironment, Mode, ProcessEnv};
use crate::error::ConfigError;
use crate::paths::ClientPaths;

/// Environment variable carrying the serialized [`BundlerOptions`]
pub const BUNDLER_OPTIONS_VAR: &str = "KICKSTART_BUNDLER_OPTIONS";

/// Images below this many bytes are inlined as data URLs by default
const DEFAULT_IMAGE_INLINE_SIZE_LIMIT: u64 = 10_000;

/// JSX transform flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsxRuntime {
    Automatic,
    Classic,
}

/// Options for a bundler run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerOptions {
    pub script: Script,
    pub mode: Mode,
    pub entry: PathBuf,
    pub html_template: PathBuf,
    pub public_dir: PathBuf,
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub public_url: String,
    pub module_extensions: Vec<String>,
    pub define: BTreeMap<String, String>,
    pub source_map: bool,
    pub jsx_runtime: JsxRuntime,
    pub image_inline_size_limit: u64,
    pub verbose: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_server: Option<DevServerOptions>,
}

/// Development server options, only present for `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServerOptions {
    pub host: String,
    pub port: u16,
    pub fast_refresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_port: Option<u16>,
}

impl BundlerOptions {
    pub fn new(
        args: &ParsedArguments,
        mode: Mode,
        paths: &ClientPaths,
        client: &ClientEnvironment,
        env: &ProcessEnv,
        config: &Config,
    ) -> Result<Self, ConfigError> {
        let dev_server = match args.script {
            Script::Start => Some(DevServerOptions::from_env(env, config)?),
            _ => None,
        };

        Ok(Self {
            script: args.script,
            mode,
            entry: paths.app_index_js.clone(),
            html_template: paths.app_html.clone(),
            public_dir: paths.app_public.clone(),
            src_dir: paths.app_src.clone(),
            out_dir: paths.app_build.clone(),
            cache_dir: paths.app_cache.clone(),
            public_url: paths.public_url_or_path.clone(),
            module_extensions: paths.module_file_extensions.clone(),
            define: client.stringified.define_map(),
            source_map: env.get("GENERATE_SOURCEMAP") != Some("false"),
            jsx_runtime: if env.get("DISABLE_NEW_JSX_TRANSFORM") == Some("true") {
                JsxRuntime::Classic
            } else {
                JsxRuntime::Automatic
            },
            image_inline_size_limit: parse_number(env, "IMAGE_INLINE_SIZE_LIMIT")?
                .unwrap_or(DEFAULT_IMAGE_INLINE_SIZE_LIMIT),
            verbose: args.flag(CliOption::Verbose).unwrap_or(false),
            color: args.flag(CliOption::Color),
            dev_server,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl DevServerOptions {
    fn from_env(env: &ProcessEnv, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            host: env
                .non_empty("HOST")
                .map(str::to_string)
                .unwrap_or_else(|| config.dev.host.clone()),
            port: parse_number(env, "PORT")?.unwrap_or(config.dev.port),
            fast_refresh: env.get("FAST_REFRESH") != Some("false"),
            socket_host: env.non_empty("WDS_SOCKET_HOST").map(str::to_string),
            socket_path: env.non_empty("WDS_SOCKET_PATH").map(str::to_string),
            socket_port: parse_number(env, "WDS_SOCKET_PORT")?,
        })
    }
}

/// Parse a numeric variable; unset or empty is `None`, garbage is an error
fn parse_number<T: FromStr>(env: &ProcessEnv, name: &str) -> Result<Option<T>, ConfigError> {
    env.non_empty(name)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                name: name.to_string(),
                value: value.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{parse_arguments, ParseOptions};
    use crate::paths::{resolve_paths, PathOptions};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn env_of(pairs: &[(&str, &str)]) -> ProcessEnv {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn options_for(argv: &[&str], env: &ProcessEnv) -> Result<BundlerOptions, ConfigError> {
        let dir = tempdir().unwrap();
        let args = parse_arguments(argv.iter().copied(), ParseOptions::default()).unwrap();
        let paths = resolve_paths(dir.path(), &PathOptions::default()).unwrap();
        let client = ClientEnvironment::new(env, "REACT_APP_", &paths.public_url_or_path);
        BundlerOptions::new(&args, Mode::Development, &paths, &client, env, &Config::default())
    }

    #[test]
    fn test_build_defaults() {
        let options = options_for(&["build"], &ProcessEnv::default()).unwrap();

        assert!(options.source_map);
        assert_eq!(options.jsx_runtime, JsxRuntime::Automatic);
        assert_eq!(options.image_inline_size_limit, 10_000);
        assert!(!options.verbose);
        assert_eq!(options.color, None);
        assert!(options.dev_server.is_none());
        assert!(options.out_dir.ends_with("dist"));
    }

    #[test]
    fn test_environment_switches() {
        let env = env_of(&[
            ("GENERATE_SOURCEMAP", "false"),
            ("DISABLE_NEW_JSX_TRANSFORM", "true"),
            ("IMAGE_INLINE_SIZE_LIMIT", "0"),
        ]);
        let options = options_for(&["build", "--verbose", "--no-color"], &env).unwrap();

        assert!(!options.source_map);
        assert_eq!(options.jsx_runtime, JsxRuntime::Classic);
        assert_eq!(options.image_inline_size_limit, 0);
        assert!(options.verbose);
        assert_eq!(options.color, Some(false));
    }

    #[test]
    fn test_start_gets_dev_server() {
        let env = env_of(&[("PORT", "4321"), ("WDS_SOCKET_PORT", "443")]);
        let options = options_for(&["start"], &env).unwrap();

        assert_eq!(
            options.dev_server,
            Some(DevServerOptions {
                host: "0.0.0.0".to_string(),
                port: 4321,
                fast_refresh: true,
                socket_host: None,
                socket_path: None,
                socket_port: Some(443),
            })
        );
    }

    #[test]
    fn test_invalid_port_is_a_config_error() {
        let env = env_of(&[("PORT", "http")]);
        let err = options_for(&["start"], &env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name, .. } if name == "PORT"));
    }

    #[test]
    fn test_json_shape() {
        let env = env_of(&[("REACT_APP_KEY", "v")]);
        let json: serde_json::Value =
            serde_json::from_str(&options_for(&["build"], &env).unwrap().to_json().unwrap()).unwrap();

        assert_eq!(json["script"], "build");
        assert_eq!(json["mode"], "development");
        assert_eq!(json["jsxRuntime"], "automatic");
        assert_eq!(json["define"]["process.env.REACT_APP_KEY"], "\"v\"");
        assert!(json.get("devServer").is_none());
    }
}
