//! Module layer provisioning.
//!
//! A layer is a directory under `<modules>/system/layers/` plus an entry in
//! `<modules>/layers.conf`. Provisioning refuses to touch an installation
//! that already has either.

use super::ledger::MutationLedger;
use crate::error::{InstallError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use xp_config::validate::validate_layer_name;

/// File listing active layers, relative to the modules root.
pub const LAYERS_CONF: &str = "layers.conf";

/// Directory of a named layer.
pub fn layer_dir(modules_root: &Path, name: &str) -> PathBuf {
    modules_root.join("system").join("layers").join(name)
}

/// Contents written to `layers.conf`.
pub fn layers_conf_contents(layers: &[String]) -> String {
    format!("layers={}", layers.join(","))
}

/// Fail unless every layer can be created without disturbing existing state.
///
/// Touches nothing on disk.
pub fn check_pristine(layers: &[String], modules_root: &Path) -> Result<()> {
    if layers.is_empty() {
        return Err(InstallError::EmptyLayerList);
    }

    let mut seen = HashSet::new();
    for name in layers {
        validate_layer_name(name).map_err(|_| InstallError::InvalidLayerName(name.clone()))?;
        if !seen.insert(name.as_str()) {
            return Err(InstallError::DuplicateLayer(name.clone()));
        }
    }

    for name in layers {
        let dir = layer_dir(modules_root, name);
        if dir.symlink_metadata().is_ok() {
            return Err(InstallError::existing_path(dir));
        }
    }

    let conf = modules_root.join(LAYERS_CONF);
    if conf.symlink_metadata().is_ok() {
        return Err(InstallError::existing_path(conf));
    }
    Ok(())
}

/// Create the layer directories and `layers.conf`.
///
/// Every created path, including missing parents, is recorded in `ledger`
/// in creation order. Returns the path of `layers.conf`.
pub fn provision(
    layers: &[String],
    modules_root: &Path,
    ledger: &mut MutationLedger,
) -> Result<PathBuf> {
    check_pristine(layers, modules_root)?;

    for name in layers {
        let dir = layer_dir(modules_root, name);
        create_dir_recorded(&dir, ledger)?;
        info!(
            target: "install.layer_created",
            layer = %name,
            path = %dir.display(),
            "Created layer directory"
        );
    }

    let conf = modules_root.join(LAYERS_CONF);
    fs::write(&conf, layers_conf_contents(layers)).map_err(|e| InstallError::io(&conf, e))?;
    ledger.record_file(&conf);
    info!(
        target: "install.layers_conf",
        path = %conf.display(),
        layers = %layers.join(","),
        "Wrote layers.conf"
    );

    Ok(conf)
}

fn create_dir_recorded(dir: &Path, ledger: &mut MutationLedger) -> Result<()> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current {
        if path.symlink_metadata().is_ok() {
            break;
        }
        missing.push(path.to_path_buf());
        current = path.parent();
    }

    for path in missing.into_iter().rev() {
        fs::create_dir(&path).map_err(|e| InstallError::io(&path, e))?;
        debug!(path = %path.display(), "Created directory");
        ledger.record_dir(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn modules(temp: &TempDir) -> PathBuf {
        let root = temp.path().join("modules");
        fs::create_dir_all(root.join("system/layers/base")).unwrap();
        root
    }

    #[test]
    fn test_provision_single_layer() {
        let temp = TempDir::new().unwrap();
        let root = modules(&temp);
        let mut ledger = MutationLedger::new();

        let conf = provision(&names(&["microprofile"]), &root, &mut ledger).unwrap();

        assert!(root.join("system/layers/microprofile").is_dir());
        assert_eq!(fs::read_to_string(&conf).unwrap(), "layers=microprofile");
        assert_eq!(
            ledger.paths(),
            vec![root.join("system/layers/microprofile"), conf]
        );
    }

    #[test]
    fn test_provision_preserves_order_and_records_parents() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("modules");
        fs::create_dir_all(root.join("system")).unwrap();
        let mut ledger = MutationLedger::new();

        provision(&names(&["b", "a"]), &root, &mut ledger).unwrap();

        assert_eq!(
            fs::read_to_string(root.join(LAYERS_CONF)).unwrap(),
            "layers=b,a"
        );
        assert_eq!(
            ledger.paths(),
            vec![
                root.join("system/layers"),
                root.join("system/layers/b"),
                root.join("system/layers/a"),
                root.join(LAYERS_CONF),
            ]
        );
    }

    #[test]
    fn test_existing_layer_dir_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let root = modules(&temp);
        fs::create_dir_all(root.join("system/layers/observability")).unwrap();
        let mut ledger = MutationLedger::new();

        let err = provision(&names(&["microprofile", "observability"]), &root, &mut ledger)
            .unwrap_err();

        assert!(matches!(err, InstallError::NotPristine { .. }));
        assert!(ledger.is_empty());
        assert!(!root.join("system/layers/microprofile").exists());
        assert!(!root.join(LAYERS_CONF).exists());
    }

    #[test]
    fn test_existing_layers_conf_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let root = modules(&temp);
        fs::write(root.join(LAYERS_CONF), "layers=other").unwrap();
        let mut ledger = MutationLedger::new();

        let err = provision(&names(&["microprofile"]), &root, &mut ledger).unwrap_err();

        assert!(err.to_string().contains("layers.conf"));
        assert!(ledger.is_empty());
        assert!(!root.join("system/layers/microprofile").exists());
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        let temp = TempDir::new().unwrap();
        let root = modules(&temp);
        let mut ledger = MutationLedger::new();

        assert!(matches!(
            provision(&names(&["mp", "mp"]), &root, &mut ledger),
            Err(InstallError::DuplicateLayer(_))
        ));
        assert!(matches!(
            provision(&names(&["../escape"]), &root, &mut ledger),
            Err(InstallError::InvalidLayerName(_))
        ));
        assert!(matches!(
            provision(&[], &root, &mut ledger),
            Err(InstallError::EmptyLayerList)
        ));
        assert!(ledger.is_empty());
    }
}
