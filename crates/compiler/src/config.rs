//! Project configuration reader (spec §6 "Project configuration", §9.3.R.2).

use std::path::{Path, PathBuf};

use yasn_core::{Diagnostic, DiagnosticKind};

fn config_error(msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Resolve, msg)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppMetadataDefaults {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub publisher: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectConfig {
    pub modules_root: Option<PathBuf>,
    pub modules_paths: Vec<PathBuf>,
    pub app: AppMetadataDefaults,
}

/// Loads `<root>/project.toml`. Returns defaults if the file does not exist.
/// Unknown tables and keys are ignored.
pub fn load(project_root: &Path) -> Result<ProjectConfig, Diagnostic> {
    let path = project_root.join("project.toml");
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(_) => return Ok(ProjectConfig::default()),
    };
    parse(&text)
}

fn parse(text: &str) -> Result<ProjectConfig, Diagnostic> {
    let doc: toml::Value = text.parse().map_err(|e| {
        config_error(format!(
            "invalid project.toml: {e} (hint: if this is a version looking like semver, quote it: version = \"1.2.3\")"
        ))
    })?;

    let modules = doc.get("modules");
    let modules_root = modules
        .and_then(|m| m.get("root"))
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let modules_paths = modules
        .and_then(|m| m.get("paths"))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).map(PathBuf::from).collect())
        .unwrap_or_default();

    let app_table = doc.get("app");
    let name = app_table.and_then(|a| a.get("name")).and_then(|v| v.as_str()).map(str::to_string);
    let display_name = app_table
        .and_then(|a| a.get("displayName"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let description = app_table
        .and_then(|a| a.get("description"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let publisher = app_table
        .and_then(|a| a.get("publisher"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let version = match app_table.and_then(|a| a.get("version")) {
        None => None,
        Some(v) => Some(validate_version(v)?),
    };

    Ok(ProjectConfig {
        modules_root,
        modules_paths,
        app: AppMetadataDefaults {
            name,
            display_name,
            description,
            version,
            publisher,
        },
    })
}

/// `app.version` accepts a bare integer, a bare decimal (`1`, `1.2`), or a
/// quoted semver-looking string (`"1.2.3"`, optionally with `-pre`/`+build`).
/// An unquoted three-component version is already a `toml` parse error by
/// the time it reaches here (caught in [`parse`]); this validates the
/// quoted-string case.
fn validate_version(value: &toml::Value) -> Result<String, Diagnostic> {
    match value {
        toml::Value::Integer(n) => Ok(n.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::String(s) => {
            if is_semver(s) || is_bare_decimal(s) {
                Ok(s.clone())
            } else {
                Err(config_error(format!(
                    "app.version '{s}' is not a valid version (expected MAJOR.MINOR.PATCH, optionally with -prerelease/+build)"
                )))
            }
        }
        other => Err(config_error(format!("app.version has unsupported type: {other:?}"))),
    }
}

fn is_bare_decimal(s: &str) -> bool {
    let mut parts = s.split('.');
    matches!((parts.next(), parts.next(), parts.next()), (Some(a), b, None) if !a.is_empty() && a.chars().all(|c| c.is_ascii_digit()) && b.map(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())).unwrap_or(true))
}

fn is_semver(s: &str) -> bool {
    let (core, _rest) = match s.split_once(['-', '+']) {
        Some((core, rest)) => (core, Some(rest)),
        None => (s, None),
    };
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load(Path::new("/nonexistent/path/that/does/not/exist")).unwrap();
        assert_eq!(cfg, ProjectConfig::default());
    }

    #[test]
    fn reads_modules_and_app_tables() {
        let toml = r#"
[modules]
root = "src"
paths = ["vendor"]

[app]
name = "demo"
displayName = "Demo App"
version = "1.2.3"
"#;
        let cfg = parse(toml).unwrap();
        assert_eq!(cfg.modules_root, Some(PathBuf::from("src")));
        assert_eq!(cfg.modules_paths, vec![PathBuf::from("vendor")]);
        assert_eq!(cfg.app.name, Some("demo".to_string()));
        assert_eq!(cfg.app.version, Some("1.2.3".to_string()));
    }

    #[test]
    fn bare_integer_version_accepted() {
        let toml = "[app]\nversion = 1\n";
        let cfg = parse(toml).unwrap();
        assert_eq!(cfg.app.version, Some("1".to_string()));
    }

    #[test]
    fn unquoted_three_component_version_is_a_toml_error() {
        let toml = "[app]\nversion = 1.2.3\n";
        assert!(parse(toml).is_err());
    }

    #[test]
    fn quoted_non_semver_string_rejected() {
        let toml = "[app]\nversion = \"not-a-version!!\"\n";
        assert!(parse(toml).is_err());
    }

    #[test]
    fn semver_with_prerelease_accepted() {
        let toml = "[app]\nversion = \"1.2.3-beta.1\"\n";
        let cfg = parse(toml).unwrap();
        assert_eq!(cfg.app.version, Some("1.2.3-beta.1".to_string()));
    }
}
