//! `package.json` digestion.
//!
//! Feeds the cross-repository surface: package descriptors on symbols,
//! `workspace/xpackages` and `workspace/xdependencies`.

use std::collections::BTreeMap;

use serde::Deserialize;

use tsls_backend::PackageDescriptor;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RepositoryField {
    Url(String),
    Object { url: Option<String> },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    repository: Option<RepositoryField>,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    pub peer_dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
}

impl PackageJson {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn repo_url(&self) -> Option<String> {
        match &self.repository {
            Some(RepositoryField::Url(url)) => Some(url.clone()),
            Some(RepositoryField::Object { url }) => url.clone(),
            None => None,
        }
    }

    pub fn descriptor(&self) -> PackageDescriptor {
        PackageDescriptor {
            name: self.name.clone(),
            version: self.version.clone(),
            repo_url: self.repo_url(),
        }
    }

    /// Every declared dependency with the manifest section it came from,
    /// in deterministic order.
    pub fn all_dependencies(&self) -> Vec<(String, String, &'static str)> {
        let mut out = Vec::new();
        for (name, version) in &self.dependencies {
            out.push((name.clone(), version.clone(), "dependencies"));
        }
        for (name, version) in &self.dev_dependencies {
            out.push((name.clone(), version.clone(), "devDependencies"));
        }
        for (name, version) in &self.peer_dependencies {
            out.push((name.clone(), version.clone(), "peerDependencies"));
        }
        for (name, version) in &self.optional_dependencies {
            out.push((name.clone(), version.clone(), "optionalDependencies"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_reads_name_version_and_repo() {
        let package = PackageJson::parse(
            r#"{
                "name": "mypkg",
                "version": "1.2.3",
                "repository": {"type": "git", "url": "https://example.com/mypkg.git"}
            }"#,
        )
        .unwrap();
        let descriptor = package.descriptor();
        assert_eq!(descriptor.name.as_deref(), Some("mypkg"));
        assert_eq!(descriptor.version.as_deref(), Some("1.2.3"));
        assert_eq!(
            descriptor.repo_url.as_deref(),
            Some("https://example.com/mypkg.git")
        );
    }

    #[test]
    fn repository_may_be_a_plain_string() {
        let package =
            PackageJson::parse(r#"{"name": "p", "repository": "https://example.com/p"}"#).unwrap();
        assert_eq!(package.repo_url().as_deref(), Some("https://example.com/p"));
    }

    #[test]
    fn dependencies_carry_their_section() {
        let package = PackageJson::parse(
            r#"{
                "dependencies": {"a": "^1.0.0"},
                "devDependencies": {"b": "2.x"},
                "peerDependencies": {"c": "*"}
            }"#,
        )
        .unwrap();
        let deps = package.all_dependencies();
        assert_eq!(
            deps,
            vec![
                ("a".to_string(), "^1.0.0".to_string(), "dependencies"),
                ("b".to_string(), "2.x".to_string(), "devDependencies"),
                ("c".to_string(), "*".to_string(), "peerDependencies"),
            ]
        );
    }
}
