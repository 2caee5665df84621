//! Patch-config template rendering for `create-config`.

use super::ensure_output_dir;
use crate::error::{InstallError, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

const EXPANSION_PACK_VERSION: &str = "${expansion.pack.version}";
const APPLIES_TO_VERSION: &str = "${applies.to.version}";

/// `applies-to` value for a first release.
pub const NO_PREVIOUS_VERSION: &str = "0.0.0";

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)\.GA$").expect("version regex"))
}

/// An expansion-pack release version, `X.Y.Z.GA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl PatchVersion {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || {
            InstallError::InvalidArgument(format!(
                "{} does not look like an expansion pack version (examples: 1.0.0.GA, 1.0.1.GA)",
                value
            ))
        };
        let caps = version_regex().captures(value).ok_or_else(invalid)?;
        let part = |i: usize| caps[i].parse::<u32>().map_err(|_| invalid());
        Ok(Self {
            major: part(1)?,
            minor: part(2)?,
            micro: part(3)?,
        })
    }

    /// `X.Y.Z` without the qualifier.
    pub fn root(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.micro)
    }

    /// Release the patch applies on top of: the previous micro, or
    /// [`NO_PREVIOUS_VERSION`] when there is none.
    pub fn applies_to(&self) -> String {
        if self.micro == 0 {
            NO_PREVIOUS_VERSION.to_string()
        } else {
            format!("{}.{}.{}.GA", self.major, self.minor, self.micro - 1)
        }
    }

    /// Substitute the version placeholders in every line of `template`.
    pub fn render(&self, template: &str) -> String {
        let root = self.root();
        let applies_to = self.applies_to();
        let mut out = String::with_capacity(template.len());
        for line in template.lines() {
            out.push_str(
                &line
                    .replace(APPLIES_TO_VERSION, &applies_to)
                    .replace(EXPANSION_PACK_VERSION, &root),
            );
            out.push('\n');
        }
        out
    }
}

/// Write `patch-config-<X.Y.Z>.xml` rendered from `template` into `output_dir`.
pub fn create_patch_config(version: &str, template: &Path, output_dir: &Path) -> Result<PathBuf> {
    let version = PatchVersion::parse(version)?;
    if !template.is_file() {
        return Err(InstallError::ConfigFileNotFound {
            path: template.to_path_buf(),
        });
    }
    let text = fs::read_to_string(template).map_err(|e| InstallError::io(template, e))?;

    ensure_output_dir(output_dir)?;
    let path = output_dir.join(format!("patch-config-{}.xml", version.root()));
    fs::write(&path, version.render(&text)).map_err(|e| InstallError::io(&path, e))?;

    info!(
        target: "bundle.patch_config",
        path = %path.display(),
        applies_to = %version.applies_to(),
        "Created patch config"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_versions() {
        let v = PatchVersion::parse("2.0.3.GA").unwrap();
        assert_eq!((v.major, v.minor, v.micro), (2, 0, 3));
        assert_eq!(v.root(), "2.0.3");
        assert_eq!(v.applies_to(), "2.0.2.GA");

        for bad in ["2.0.3", "2.0.3.CR1", "v2.0.3.GA", "2.0.GA", ""] {
            assert!(PatchVersion::parse(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_first_release_applies_to_nothing() {
        assert_eq!(PatchVersion::parse("1.0.0.GA").unwrap().applies_to(), "0.0.0");
        assert_eq!(PatchVersion::parse("3.1.0.GA").unwrap().applies_to(), "0.0.0");
    }

    #[test]
    fn test_render() {
        let v = PatchVersion::parse("1.0.2.GA").unwrap();
        let text = "<patch id=\"xp-${expansion.pack.version}\">\r\n<applies-to version=\"${applies.to.version}\"/>";
        assert_eq!(
            v.render(text),
            "<patch id=\"xp-1.0.2\">\n<applies-to version=\"1.0.1.GA\"/>\n"
        );
    }

    #[test]
    fn test_create_patch_config() {
        let temp = TempDir::new().unwrap();
        let template = temp.path().join("patch-config.xml");
        fs::write(&template, "<name>${expansion.pack.version}</name>\n").unwrap();

        let out = create_patch_config("1.0.1.GA", &template, &temp.path().join("out")).unwrap();

        assert_eq!(out, temp.path().join("out/patch-config-1.0.1.xml"));
        assert_eq!(fs::read_to_string(out).unwrap(), "<name>1.0.1</name>\n");
    }

    #[test]
    fn test_missing_template() {
        let temp = TempDir::new().unwrap();
        let err = create_patch_config("1.0.1.GA", &temp.path().join("none.xml"), temp.path())
            .unwrap_err();
        assert!(matches!(err, InstallError::ConfigFileNotFound { .. }));
    }
}
