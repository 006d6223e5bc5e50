//! LM-016: Artifact files — load, save (atomic), path derivation.

use super::compiler::CompiledTemplate;
use super::hasher;
use std::path::{Path, PathBuf};

/// Derive the artifact path for a stack within the output directory.
pub fn artifact_path(out_dir: &Path, stack: &str) -> PathBuf {
    out_dir.join(format!("{}.template.json", stack))
}

/// Load the artifact last written for a stack. Returns None if the file
/// doesn't exist.
pub fn load_artifact(out_dir: &Path, stack: &str) -> Result<Option<serde_json::Value>, String> {
    let path = artifact_path(out_dir, stack);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("invalid artifact {}: {}", path.display(), e))?;
    Ok(Some(value))
}

/// Outcome of [`save_artifact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub path: PathBuf,
    /// `"blake3:{hex}"` of the written bytes
    pub hash: String,
    /// False when the file already held identical bytes
    pub changed: bool,
}

/// Save the rendered template atomically (write to temp, then rename).
pub fn save_artifact(out_dir: &Path, template: &CompiledTemplate) -> Result<SavedArtifact, String> {
    let path = artifact_path(out_dir, template.stack_name());
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("cannot create dir {}: {}", out_dir.display(), e))?;

    let json = template.to_json_pretty()?;
    let hash = hasher::hash_string(&json);
    let previous = if path.exists() {
        Some(hasher::hash_file(&path)?)
    } else {
        None
    };
    if previous.as_deref() == Some(hash.as_str()) {
        tracing::debug!(path = %path.display(), "artifact unchanged");
        return Ok(SavedArtifact {
            path,
            hash,
            changed: false,
        });
    }

    // Atomic write: temp file + rename
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    tracing::info!(path = %path.display(), %hash, "artifact written");

    Ok(SavedArtifact {
        path,
        hash,
        changed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compiler::TemplateCompiler;
    use crate::core::decorator::DeploymentContext;
    use crate::core::types::{FunctionUnit, HandlerRef, Verb};

    fn compiled(build: &str) -> CompiledTemplate {
        TemplateCompiler::builder()
            .function(FunctionUnit::new(Verb::Get, HandlerRef::new("get")))
            .build()
            .compile(&mut DeploymentContext::new("svc", build).with_stack_name("svc-ci"))
            .unwrap()
    }

    #[test]
    fn test_lm016_artifact_path() {
        let p = artifact_path(Path::new("/out"), "svc-ci");
        assert_eq!(p, PathBuf::from("/out/svc-ci.template.json"));
    }

    #[test]
    fn test_lm016_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_artifact(dir.path(), "none").unwrap().is_none());
    }

    #[test]
    fn test_lm016_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let saved = save_artifact(&out, &compiled("b-1")).unwrap();
        assert!(saved.changed);
        assert!(saved.hash.starts_with("blake3:"));
        assert!(!out.join("svc-ci.template.json.tmp").exists());

        let loaded = load_artifact(&out, "svc-ci").unwrap().unwrap();
        assert_eq!(loaded["Resources"]["Get"]["Type"], "AWS::Lambda::Function");
        assert_eq!(loaded["Metadata"]["lamina"]["buildId"], "b-1");
    }

    #[test]
    fn test_lm016_identical_save_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let first = save_artifact(dir.path(), &compiled("b-1")).unwrap();
        let second = save_artifact(dir.path(), &compiled("b-1")).unwrap();
        assert!(!second.changed);
        assert_eq!(first.hash, second.hash);

        let third = save_artifact(dir.path(), &compiled("b-2")).unwrap();
        assert!(third.changed);
    }

    #[test]
    fn test_lm016_load_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(artifact_path(dir.path(), "bad"), "{oops").unwrap();
        let err = load_artifact(dir.path(), "bad").unwrap_err();
        assert!(err.contains("invalid artifact"));
    }
}
