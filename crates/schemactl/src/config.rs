//! Project configuration.
//!
//! A project root holds `db.schema`, whose first lines are the
//! configuration header (`db = "<dialect>"` and `url = env("<VAR>")` or a
//! literal URL), and a `migrations/` directory. The connection URL lives
//! in `.env` under `<ROOTDIR_UPPER>_DB_URL`, one variable per root.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

static ENV_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"env\("([^"]+)"\)"#).expect("env regex"));

/// Parsed `db.schema` header.
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    pub dialect: Dialect,
    pub url: String,
}

/// Path of the schema snapshot file inside a project root.
#[must_use]
pub fn schema_path(root: &Path) -> PathBuf {
    root.join("db.schema")
}

/// Name of the connection-string variable for a project root:
/// the root directory's name, uppercased, suffixed with `_DB_URL`.
#[must_use]
pub fn env_var_name(root: &Path) -> String {
    let dir = root
        .file_name()
        .map_or_else(|| root.to_string_lossy(), |n| n.to_string_lossy());
    format!("{}_DB_URL", dir.to_uppercase())
}

impl SchemaConfig {
    /// Loads the configuration header from a `db.schema` file.
    ///
    /// `env("VAR")` URL values resolve through the process environment;
    /// the `.env` file itself is loaded by the CLI before this runs.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SchemaError::Config {
            path: path.to_path_buf(),
            message: format!("cannot read schema file: {e}"),
        })?;

        let mut dialect = None;
        let mut url = None;

        for line in content.lines() {
            let line = line.trim();
            if let Some(value) = line.strip_prefix("db =") {
                dialect = Some(value.trim().trim_matches(|c| c == '"' || c == '\'').parse()?);
            } else if let Some(value) = line.strip_prefix("url =") {
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                if let Some(caps) = ENV_REF_RE.captures(value) {
                    let var = &caps[1];
                    match std::env::var(var) {
                        Ok(v) if !v.is_empty() => url = Some(v),
                        _ => warn!(var, "environment variable referenced in schema file is not set"),
                    }
                } else {
                    url = Some(value.to_string());
                }
            }
        }

        let dialect = dialect.ok_or_else(|| SchemaError::Config {
            path: path.to_path_buf(),
            message: "missing 'db = \"...\"' line".to_string(),
        })?;
        let url = url.ok_or_else(|| SchemaError::Config {
            path: path.to_path_buf(),
            message: "could not determine database URL".to_string(),
        })?;

        Ok(Self { dialect, url })
    }
}

/// Scaffolds a new project root: writes the `db.schema` header and
/// records the connection URL in `.env`.
///
/// When no URL is given, the sqlite family defaults to `<root>/dev.db`.
pub fn init(root: &Path, dialect: Dialect, url: Option<&str>) -> Result<()> {
    let url = url.map_or_else(
        || root.join("dev.db").to_string_lossy().replace('\\', "/"),
        ToString::to_string,
    );

    let schema_file = schema_path(root);
    if !schema_file.exists() {
        fs::create_dir_all(root)?;
        let header = format!("db = \"{dialect}\"\nurl = env(\"{}\")", env_var_name(root));
        fs::write(&schema_file, header)?;
    }

    let env_line = format!("{}=\"{url}\"", env_var_name(root));
    let env_path = Path::new(".env");
    if env_path.exists() {
        let mut content = fs::read_to_string(env_path)?;
        if !content.ends_with('\n') && !content.is_empty() {
            content.push('\n');
        }
        content.push_str(&env_line);
        content.push('\n');
        fs::write(env_path, content)?;
    } else {
        fs::write(env_path, format!("{env_line}\n"))?;
    }
    Ok(())
}

/// Rewrites the `db = ...` line of `db.schema` and/or the project's
/// URL line in `.env`, appending either line when it is absent.
pub fn update(root: &Path, db: Option<&str>, url: Option<&str>) -> Result<()> {
    if let Some(url) = url {
        let var = env_var_name(root);
        let env_path = Path::new(".env");
        let content = if env_path.exists() {
            fs::read_to_string(env_path)?
        } else {
            String::new()
        };
        let replaced = rewrite_line(&content, &format!("{var}="), &format!("{var}=\"{url}\""));
        fs::write(env_path, replaced)?;
    }

    if let Some(db) = db {
        // Validate before touching the file.
        let _: Dialect = db.parse()?;
        let schema_file = schema_path(root);
        let content = fs::read_to_string(&schema_file)?;
        let replaced = rewrite_line(&content, "db =", &format!("db = \"{db}\""));
        fs::write(&schema_file, replaced)?;
    }
    Ok(())
}

fn rewrite_line(content: &str, prefix: &str, replacement: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut found = false;
    for line in content.lines() {
        if line.starts_with(prefix) {
            lines.push(replacement.to_string());
            found = true;
        } else {
            lines.push(line.to_string());
        }
    }
    if !found {
        lines.push(replacement.to_string());
    }
    lines.join("\n") + "\n"
}
