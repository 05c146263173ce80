//! `require` spec resolution and the cartridge source loader seam.

use std::rc::Rc;

use arc_vfs::VfsPath;

/// Reads a script source by canonical VFS path. The runtime backs this
/// with the sandbox (`cart:/` only); tests back it with maps.
pub type ScriptLoader = Rc<dyn Fn(&str) -> Result<String, String>>;

/// Script module extension appended when a spec has none.
pub const MODULE_EXTENSION: &str = "rhai";

/// Resolves a `require` spec against the directory of the requiring
/// module.
///
/// - `cart:/...` absolute specs resolve exactly.
/// - `./x` and `x` resolve relative to `requiring_dir` (a canonical
///   `cart:/` directory path).
/// - `..` anywhere is rejected, as is any non-`cart:/` namespace.
/// - The `.rhai` extension is appended when the final segment has no
///   extension.
pub fn resolve_module_spec(spec: &str, requiring_dir: &VfsPath) -> Result<VfsPath, String> {
    if spec.is_empty() {
        return Err("empty module spec".to_string());
    }

    let candidate = if let Some(rest) = spec.strip_prefix("cart:/") {
        VfsPath::parse(&format!("cart:/{}", rest))
    } else if spec.contains(":/") || spec.starts_with('/') {
        return Err(format!("{:?}: only cart:/ modules can be required", spec));
    } else {
        let relative = spec.strip_prefix("./").unwrap_or(spec);
        requiring_dir.join(relative)
    }
    .map_err(|err| err.to_string())?;

    if candidate.namespace() != arc_vfs::Namespace::Cart {
        return Err(format!("{:?}: only cart:/ modules can be required", spec));
    }

    // Deterministic extension completion.
    let has_extension = candidate
        .file_name()
        .map_or(false, |name| name.contains('.'));
    if has_extension {
        Ok(candidate)
    } else {
        candidate
            .parent()
            .join(&format!(
                "{}.{}",
                candidate.file_name().unwrap_or_default(),
                MODULE_EXTENSION
            ))
            .map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(path: &str) -> VfsPath {
        VfsPath::parse(path).unwrap()
    }

    #[test]
    fn absolute_and_relative_specs() {
        let here = dir("cart:/scripts");
        assert_eq!(
            resolve_module_spec("cart:/lib/util.rhai", &here).unwrap().to_string(),
            "cart:/lib/util.rhai"
        );
        assert_eq!(
            resolve_module_spec("./helper", &here).unwrap().to_string(),
            "cart:/scripts/helper.rhai"
        );
        assert_eq!(
            resolve_module_spec("helper", &here).unwrap().to_string(),
            "cart:/scripts/helper.rhai"
        );
        assert_eq!(
            resolve_module_spec("data.json", &here).unwrap().to_string(),
            "cart:/scripts/data.json"
        );
    }

    #[test]
    fn traversal_and_foreign_namespaces_are_rejected() {
        let here = dir("cart:/scripts");
        assert!(resolve_module_spec("../secrets", &here).is_err());
        assert!(resolve_module_spec("cart:/../x", &here).is_err());
        assert!(resolve_module_spec("save:/x", &here).is_err());
        assert!(resolve_module_spec("/etc/passwd", &here).is_err());
        assert!(resolve_module_spec("", &here).is_err());
    }
}
