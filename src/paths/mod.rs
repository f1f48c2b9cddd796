//! Project path resolution
//!
//! Every location kickstart hands to the bundler is derived from the
//! working directory and a fixed layout. The layout mode only moves the
//! anchor directories; the relative layout never changes.

mod public_url;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::utils::normalize_path;

pub use public_url::{resolve_public_url, PublicUrlOptions};

/// Package name of the scripts when installed into a project
pub const OWN_PACKAGE: &str = "kickstart-scripts";

/// Extensions the bundler resolves, in lookup order
pub const MODULE_FILE_EXTENSIONS: &[&str] = &[
    "web.mjs", "mjs", "web.js", "js", "web.ts", "ts", "web.tsx", "tsx", "json", "web.jsx", "jsx",
];

/// Extension assumed when no candidate file exists yet
const FALLBACK_EXTENSION: &str = "js";

/// Where the project and the scripts live relative to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathMode {
    /// Scripts installed under the project's `node_modules`
    #[default]
    InPlace,
    /// Scripts copied into the project itself
    #[serde(alias = "after-extraction")]
    AfterEject,
    /// Working on the scripts package; the project is its `template/`
    BeforePackaging,
}

impl PathMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PathMode::InPlace => "in-place",
            PathMode::AfterEject => "after-eject",
            PathMode::BeforePackaging => "before-packaging",
        }
    }
}

impl fmt::Display for PathMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-place" => Ok(PathMode::InPlace),
            "after-eject" | "after-extraction" => Ok(PathMode::AfterEject),
            "before-packaging" => Ok(PathMode::BeforePackaging),
            other => Err(ConfigError::UnknownPathMode(other.to_string())),
        }
    }
}

/// Inputs to [`resolve_paths`] besides the working directory
#[derive(Debug, Clone)]
pub struct PathOptions {
    pub mode: PathMode,
    pub own_root: Option<PathBuf>,
    pub build_dir: String,
    pub scripts_dir: String,
    pub is_development: bool,
    pub public_url_override: Option<String>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            mode: PathMode::default(),
            own_root: None,
            build_dir: crate::config::DEFAULT_BUILD_DIR.to_string(),
            scripts_dir: "scripts".to_string(),
            is_development: true,
            public_url_override: None,
        }
    }
}

/// Root directories for the project and for the scripts package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchors {
    pub app: PathBuf,
    pub own: PathBuf,
}

/// Compute the anchors for `mode`, resolving symlinks in `cwd` first
pub fn anchors(cwd: &Path, mode: PathMode, own_root: Option<&Path>) -> Result<Anchors, ConfigError> {
    let real_cwd = realpath(cwd)?;
    let own_root = own_root.map(realpath).transpose()?;

    let anchors = match mode {
        PathMode::InPlace => Anchors {
            own: own_root.unwrap_or_else(|| real_cwd.join("node_modules").join(OWN_PACKAGE)),
            app: real_cwd,
        },
        PathMode::AfterEject => Anchors {
            own: own_root.unwrap_or_else(|| real_cwd.clone()),
            app: real_cwd,
        },
        PathMode::BeforePackaging => {
            let own = own_root.unwrap_or(real_cwd);
            Anchors {
                app: own.join("template"),
                own,
            }
        }
    };

    debug!(
        "Path mode {}: app at {}, scripts at {}",
        mode,
        anchors.app.display(),
        anchors.own.display()
    );

    Ok(anchors)
}

/// Canonicalize `path`, without `\\?\` prefixes on Windows
pub(crate) fn realpath(path: &Path) -> Result<PathBuf, ConfigError> {
    dunce::canonicalize(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolved project locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPaths {
    pub dotenv: PathBuf,
    pub app_path: PathBuf,
    pub app_build: PathBuf,
    pub app_public: PathBuf,
    pub app_html: PathBuf,
    pub app_index_js: PathBuf,
    pub app_package_json: PathBuf,
    pub app_src: PathBuf,
    pub app_ts_config: PathBuf,
    pub app_js_config: PathBuf,
    pub yarn_lock_file: PathBuf,
    pub tests_setup: PathBuf,
    pub proxy_setup: PathBuf,
    pub app_node_modules: PathBuf,
    pub app_cache: PathBuf,
    pub sw_src: PathBuf,
    pub own_path: PathBuf,
    pub own_scripts: PathBuf,
    pub public_url_or_path: String,
    pub module_file_extensions: Vec<String>,
}

impl ClientPaths {
    /// Script module the runtime should execute
    pub fn script_module(&self, script_name: &str) -> PathBuf {
        self.own_scripts.join(format!("{}.js", script_name))
    }
}

/// Resolve every project location for `cwd`
pub fn resolve_paths(cwd: &Path, options: &PathOptions) -> Result<ClientPaths, ConfigError> {
    let Anchors { app, own } = anchors(cwd, options.mode, options.own_root.as_deref())?;
    let resolve_app = |relative: &str| normalize_path(&app.join(relative));

    let app_package_json = resolve_app("package.json");
    let homepage = read_homepage(&app_package_json)?;
    let public_url_or_path = resolve_public_url(PublicUrlOptions {
        is_development: options.is_development,
        homepage: homepage.as_deref(),
        env_override: options.public_url_override.as_deref(),
    });

    Ok(ClientPaths {
        dotenv: resolve_app(".env"),
        app_build: resolve_app(&options.build_dir),
        app_public: resolve_app("public"),
        app_html: resolve_app("public/index.html"),
        app_index_js: resolve_module(&app, "src/index"),
        app_package_json,
        app_src: resolve_app("src"),
        app_ts_config: resolve_app("tsconfig.json"),
        app_js_config: resolve_app("jsconfig.json"),
        yarn_lock_file: resolve_app("yarn.lock"),
        tests_setup: resolve_module(&app, "src/setupTests"),
        proxy_setup: resolve_app("src/setupProxy.js"),
        app_node_modules: resolve_app("node_modules"),
        app_cache: resolve_app("node_modules/.cache"),
        sw_src: resolve_module(&app, "src/service-worker"),
        own_scripts: normalize_path(&own.join(&options.scripts_dir)),
        own_path: own,
        public_url_or_path,
        module_file_extensions: MODULE_FILE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        app_path: app,
    })
}

/// First existing `stem.<ext>` in extension order, else `stem.js`
fn resolve_module(root: &Path, stem: &str) -> PathBuf {
    let base = normalize_path(&root.join(stem));
    let with_ext = |ext: &str| {
        let mut file = base.clone().into_os_string();
        file.push(".");
        file.push(ext);
        PathBuf::from(file)
    };

    MODULE_FILE_EXTENSIONS
        .iter()
        .map(|ext| with_ext(ext))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| with_ext(FALLBACK_EXTENSION))
}

/// Package manifest fields kickstart cares about
#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    homepage: Option<String>,
}

/// The `homepage` field of `package.json`, if the file exists
pub fn read_homepage(package_json: &Path) -> Result<Option<String>, ConfigError> {
    if !package_json.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(package_json).map_err(|source| ConfigError::Io {
        path: package_json.to_path_buf(),
        source,
    })?;
    let manifest: PackageManifest =
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: package_json.to_path_buf(),
            source,
        })?;

    Ok(manifest.homepage)
}
