//! Module descriptor (`.iml`) parsing.

use crate::core::Module;
use crate::errors::DescriptorParseError;
use roxmltree::Document;
use std::path::{Component, Path, PathBuf};

/// File extension of module descriptors.
pub const DESCRIPTOR_EXTENSION: &str = "iml";

const MODULE_DIR_VAR: &str = "$MODULE_DIR$";
const DEFAULT_VARIANT: &str = "debug";

/// Returns the single declared output location, `None` if the descriptor
/// declares none, or an error if it declares more than one.
pub fn declared_output(path: &Path, content: &str) -> Result<Option<String>, DescriptorParseError> {
    let doc = Document::parse(content)
        .map_err(|e| DescriptorParseError::new(path, format!("invalid XML: {e}")))?;

    let urls: Vec<&str> = doc
        .descendants()
        .filter(|n| n.has_tag_name("output"))
        .filter_map(|n| n.attribute("url"))
        .collect();

    match urls.as_slice() {
        [] => Ok(None),
        [url] => Ok(Some((*url).to_string())),
        _ => Err(DescriptorParseError::new(
            path,
            format!("{} output locations declared, expected at most one", urls.len()),
        )),
    }
}

/// Resolves a declared output url against the descriptor's directory.
#[must_use]
pub fn resolve_output_url(url: &str, descriptor_dir: &Path) -> PathBuf {
    let stripped = url.strip_prefix("file://").unwrap_or(url);
    let expanded = stripped.replace(MODULE_DIR_VAR, &descriptor_dir.to_string_lossy());
    normalize(Path::new(&expanded))
}

/// Removes `.` and `..` components without touching the filesystem.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Makes `path` absolute against the current directory, then normalizes it.
///
/// Falls back to the normalized input if the current directory is
/// unavailable.
#[must_use]
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).map_or_else(|_| normalize(path), |absolute| normalize(&absolute))
}

/// The variant tag of an output path: the component after the last
/// `classes`, else the one before it, else `debug`.
#[must_use]
pub fn variant_of(output: &Path) -> String {
    let parts: Vec<&str> = output
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();

    parts
        .iter()
        .rposition(|p| *p == "classes")
        .and_then(|i| parts.get(i + 1).or_else(|| i.checked_sub(1).and_then(|j| parts.get(j))))
        .map_or_else(|| DEFAULT_VARIANT.to_string(), |v| (*v).to_string())
}

/// The module root owning an output path: everything before the last
/// `build` component.
#[must_use]
pub fn module_root_of(output: &Path) -> Option<PathBuf> {
    let components: Vec<Component<'_>> = output.components().collect();
    let index = components.iter().rposition(|c| c.as_os_str() == "build")?;
    if index == 0 {
        return None;
    }
    Some(components[..index].iter().collect())
}

/// Build-output locations tried in order. Tooling versions place compiled
/// classes differently.
#[must_use]
pub fn build_path_candidates(declared: &Path, module_root: &Path, variant: &str) -> Vec<PathBuf> {
    let build = module_root.join("build");
    vec![
        declared.to_path_buf(),
        build.join("intermediates/javac").join(variant).join("classes"),
        build.join("intermediates/classes").join(variant),
        build.join("tmp/kotlin-classes").join(variant),
    ]
}

/// Parses one descriptor file into a module.
///
/// The module name is the file stem. The build path is the first existing
/// candidate directory, or `None` if none exists; the module is kept either
/// way so later changes can still be routed to it.
pub fn read_descriptor(path: &Path) -> Result<Option<Module>, DescriptorParseError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DescriptorParseError::new(path, format!("unreadable: {e}")))?;

    let Some(url) = declared_output(path, &content)? else {
        return Ok(None);
    };

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DescriptorParseError::new(path, "descriptor has no file name"))?;
    let descriptor_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let declared = resolve_output_url(&url, descriptor_dir);
    let variant = variant_of(&declared);
    let source_root = module_root_of(&declared).unwrap_or_else(|| descriptor_dir.to_path_buf());
    let build_path = build_path_candidates(&declared, &source_root, &variant)
        .into_iter()
        .find(|candidate| candidate.is_dir());

    Ok(Some(Module::new(name, source_root, build_path, variant)))
}
