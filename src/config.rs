use crate::types::RegionalMode;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Fully resolved run configuration, built by `main` from CLI flags
/// with optional YAML overrides.
#[derive(Clone, Debug)]
pub struct OrganizerConfig {
    pub source_root: PathBuf,
    pub target_root: PathBuf,
    pub regional_mode: RegionalMode,
    pub disable_subcategory_processing: bool,
    pub max_workers: Option<usize>,
    pub extension_allowlist: Option<Vec<String>>,
    pub dry_run: bool,
    pub report_path: Option<PathBuf>,
}

/// Optional YAML overlay. Every field is optional; CLI flags win over
/// the file.
#[derive(Debug, Default, Deserialize)]
pub struct YamlConfig {
    pub regional: Option<bool>,
    pub no_subcategory: Option<bool>,
    pub workers: Option<usize>,
    pub extensions: Option<Vec<String>>,
}

/// Missing or unparsable config file is not an error: the defaults
/// simply apply.
pub fn load_yaml(path: &Path) -> Option<YamlConfig> {
    if !path.exists() {
        return None;
    }
    let file = File::open(path).ok()?;
    serde_yaml::from_reader(file).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_none() {
        assert!(load_yaml(Path::new("/no/such/config.yaml")).is_none());
    }

    #[test]
    fn yaml_fields_are_optional() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "regional: true\nworkers: 4").unwrap();
        let cfg = load_yaml(f.path()).unwrap();
        assert_eq!(cfg.regional, Some(true));
        assert_eq!(cfg.workers, Some(4));
        assert_eq!(cfg.no_subcategory, None);
        assert_eq!(cfg.extensions, None);
    }
}
