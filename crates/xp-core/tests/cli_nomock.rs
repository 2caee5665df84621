//! CLI tests for xp-installer.
//!
//! These exercise argument handling, exit codes and the bundle,
//! inspect and create-config commands end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use xp_bundle::{ArchiveSummary, ArchiveWriter, Manifest, MANIFEST_PATH};

fn xp_installer() -> Command {
    let mut cmd = Command::cargo_bin("xp-installer").expect("xp-installer binary should exist");
    cmd.env_remove("XP_INSTALLER_CONFIG")
        .env_remove("XP_INSTALLER_CONFIG_DIR")
        .env_remove("JBOSS_HOME")
        .env_remove("XP_LOG");
    cmd
}

/// Empty config file so a developer's own installer.toml is never picked up.
fn empty_config(dir: &Path) -> PathBuf {
    let path = dir.join("installer.toml");
    fs::write(&path, "").unwrap();
    path
}

/// Core runtime template without a layer key.
fn core_template(dir: &Path) -> PathBuf {
    let staging = dir.join("core");
    let mut manifest = Manifest::new();
    manifest.set("Main-Class", "org.example.installer.Main");
    manifest.write_to(&staging.join(MANIFEST_PATH)).unwrap();
    fs::write(staging.join("Main.class"), b"\xca\xfe\xba\xbe").unwrap();

    let mut writer = ArchiveWriter::new();
    writer.add_tree(&staging).unwrap();
    let out = dir.join("installer-core.jar");
    writer.write(&out).unwrap();
    out
}

// ============================================================================
// General
// ============================================================================

mod general {
    use super::*;

    #[test]
    fn version_prints_package_version() {
        xp_installer()
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn unknown_command_is_argument_error() {
        xp_installer()
            .arg("nonexistent-command")
            .assert()
            .code(10)
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn help_succeeds() {
        xp_installer()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("bundle"));
    }

    #[test]
    fn missing_config_file_is_argument_error() {
        xp_installer()
            .args(["--config", "/nonexistent/installer.toml", "version"])
            .assert()
            .success();

        let temp = TempDir::new().unwrap();
        xp_installer()
            .args(["--config", "/nonexistent/installer.toml", "bundle"])
            .args(["--installer-core", core_template(temp.path()).to_str().unwrap()])
            .args(["--patch", "/nonexistent/patch.zip"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("/nonexistent/installer.toml"));
    }
}

// ============================================================================
// bundle / inspect
// ============================================================================

mod bundle {
    use super::*;

    #[test]
    fn bundle_builds_inspectable_archive() {
        let temp = TempDir::new().unwrap();
        let config = empty_config(temp.path());
        let core = core_template(temp.path());
        let patch = temp.path().join("patch.zip");
        fs::write(&patch, b"PK-patch").unwrap();
        let config_root = temp.path().join("configs");
        fs::create_dir_all(config_root.join("standalone/configuration")).unwrap();
        fs::write(
            config_root.join("standalone/configuration/standalone-microprofile.xml"),
            "<server/>",
        )
        .unwrap();
        let out_dir = temp.path().join("target");

        xp_installer()
            .arg("--config")
            .arg(&config)
            .arg("bundle")
            .arg("--installer-core")
            .arg(&core)
            .arg("--patch")
            .arg(&patch)
            .arg("--config-root")
            .arg(&config_root)
            .args([
                "--added-config",
                "standalone/configuration/standalone-microprofile.xml",
            ])
            .arg("--output-dir")
            .arg(&out_dir)
            .assert()
            .success()
            .stdout(predicate::str::contains("xp-installer.jar"));

        let archive = out_dir.join("xp-installer.jar");
        let summary = ArchiveSummary::open(&archive).unwrap();
        assert!(summary.has_patch);
        assert!(summary.entries.contains(&"Main.class".to_string()));
        assert_eq!(
            summary.added_configs,
            vec!["standalone/configuration/standalone-microprofile.xml"]
        );
        let manifest = summary.manifest.unwrap();
        assert_eq!(manifest.layers().unwrap(), vec!["microprofile"]);
        assert_eq!(manifest.get("Main-Class"), Some("org.example.installer.Main"));

        xp_installer()
            .arg("inspect")
            .arg(&archive)
            .assert()
            .success()
            .stdout(predicate::str::contains("layers: microprofile"))
            .stdout(predicate::str::contains("patch: present"));
    }

    #[test]
    fn bundle_with_custom_name_and_layer() {
        let temp = TempDir::new().unwrap();
        let config = empty_config(temp.path());
        let core = core_template(temp.path());
        let patch = temp.path().join("patch.zip");
        fs::write(&patch, b"PK-patch").unwrap();

        xp_installer()
            .arg("--config")
            .arg(&config)
            .arg("bundle")
            .arg("--installer-core")
            .arg(&core)
            .arg("--patch")
            .arg(&patch)
            .args(["--archive-name", "custom.jar", "--default-layer", "observability"])
            .arg("--output-dir")
            .arg(temp.path())
            .assert()
            .success();

        let summary = ArchiveSummary::open(&temp.path().join("custom.jar")).unwrap();
        assert_eq!(
            summary.manifest.unwrap().layers().unwrap(),
            vec!["observability"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn bundle_runs_patch_generator() {
        let temp = TempDir::new().unwrap();
        let config = empty_config(temp.path());
        let core = core_template(temp.path());
        let generator = temp.path().join("gen.sh");
        fs::write(
            &generator,
            "#!/bin/sh\nfor a in \"$@\"; do case \"$a\" in --output-file=*) printf generated > \"${a#--output-file=}\" ;; esac; done\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&generator, fs::Permissions::from_mode(0o755)).unwrap();
        }

        xp_installer()
            .arg("--config")
            .arg(&config)
            .arg("bundle")
            .arg("--installer-core")
            .arg(&core)
            .arg("--patch-generator")
            .arg(&generator)
            .args(["--patch-generator-arg", "--combine-with=7.4.0.GA"])
            .arg("--output-dir")
            .arg(temp.path())
            .assert()
            .success();

        assert!(ArchiveSummary::open(&temp.path().join("xp-installer.jar"))
            .unwrap()
            .has_patch);
    }

    #[test]
    fn missing_added_config_exits_13() {
        let temp = TempDir::new().unwrap();
        let config = empty_config(temp.path());
        let core = core_template(temp.path());
        let patch = temp.path().join("patch.zip");
        fs::write(&patch, b"PK-patch").unwrap();

        xp_installer()
            .arg("--config")
            .arg(&config)
            .arg("bundle")
            .arg("--installer-core")
            .arg(&core)
            .arg("--patch")
            .arg(&patch)
            .arg("--config-root")
            .arg(temp.path())
            .args(["--added-config", "docs/missing.txt"])
            .arg("--output-dir")
            .arg(temp.path())
            .assert()
            .code(13)
            .stderr(predicate::str::contains("missing.txt"));

        assert!(!temp.path().join("xp-installer.jar").exists());
    }

    #[test]
    fn patch_and_generator_conflict() {
        xp_installer()
            .args([
                "bundle",
                "--installer-core",
                "core.jar",
                "--patch",
                "patch.zip",
                "--patch-generator",
                "gen",
            ])
            .assert()
            .code(10);
    }

    #[test]
    fn patch_is_required() {
        xp_installer()
            .args(["bundle", "--installer-core", "core.jar"])
            .assert()
            .code(10);
    }

    #[test]
    fn inspect_garbage_is_malformed() {
        let temp = TempDir::new().unwrap();
        let bogus = temp.path().join("bogus.jar");
        fs::write(&bogus, b"not a zip").unwrap();

        xp_installer().arg("inspect").arg(&bogus).assert().code(12);
    }
}

// ============================================================================
// create-config
// ============================================================================

mod create_config {
    use super::*;

    #[test]
    fn renders_template() {
        let temp = TempDir::new().unwrap();
        let template = temp.path().join("patch-config.xml");
        fs::write(
            &template,
            "<patch version=\"${expansion.pack.version}\">\n  <upgrade applies-to-version=\"${applies.to.version}\"/>\n</patch>\n",
        )
        .unwrap();

        xp_installer()
            .args(["create-config", "--version", "1.2.3.GA", "--template"])
            .arg(&template)
            .arg("--output-dir")
            .arg(temp.path())
            .assert()
            .success();

        let rendered = fs::read_to_string(temp.path().join("patch-config-1.2.3.xml")).unwrap();
        assert!(rendered.contains("version=\"1.2.3\""));
        assert!(rendered.contains("applies-to-version=\"1.2.2.GA\""));
    }

    #[test]
    fn bad_version_is_argument_error() {
        let temp = TempDir::new().unwrap();
        let template = temp.path().join("patch-config.xml");
        fs::write(&template, "x").unwrap();

        xp_installer()
            .args(["create-config", "--version", "1.2.3", "--template"])
            .arg(&template)
            .assert()
            .code(10)
            .stderr(predicate::str::contains("1.2.3"));
    }
}

// ============================================================================
// install
// ============================================================================

mod install {
    use super::*;

    #[test]
    fn missing_home_is_argument_error() {
        let temp = TempDir::new().unwrap();
        let config = empty_config(temp.path());
        xp_installer()
            .arg("--config")
            .arg(&config)
            .args(["install", "--jboss-home", "/nonexistent/server"])
            .args(["--archive", "/nonexistent/xp-installer.jar"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("/nonexistent/server"));
    }

    #[test]
    fn existing_layers_conf_is_not_pristine() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().join("server");
        fs::create_dir_all(home.join("modules/system/layers/base")).unwrap();
        fs::write(home.join("modules/layers.conf"), "layers=other").unwrap();
        let config = temp.path().join("installer.toml");
        fs::write(&config, "[server]\nhost_command = \"/nonexistent/host\"\n").unwrap();

        let staging = temp.path().join("staging");
        let mut manifest = Manifest::new();
        manifest.set(xp_bundle::LAYERS_KEY, "microprofile");
        manifest.write_to(&staging.join(MANIFEST_PATH)).unwrap();
        fs::write(staging.join(xp_bundle::PATCH_ENTRY), b"PK").unwrap();
        let mut writer = ArchiveWriter::new();
        writer.add_tree(&staging).unwrap();
        let archive = temp.path().join("xp-installer.jar");
        writer.write(&archive).unwrap();

        xp_installer()
            .arg("--config")
            .arg(&config)
            .arg("install")
            .arg("--jboss-home")
            .arg(&home)
            .arg("--archive")
            .arg(&archive)
            .assert()
            .code(11)
            .stderr(predicate::str::contains("layers.conf"));

        assert_eq!(
            fs::read_to_string(home.join("modules/layers.conf")).unwrap(),
            "layers=other"
        );
        assert!(!home.join("modules/system/layers/microprofile").exists());
    }
}
