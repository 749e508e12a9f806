//! Kernel launch descriptor (`kernel.json`).
//!
//! Only `metadata.kernel_provisioner.config` is ever changed by this crate,
//! every other field is carried over as read.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use crate::cache::{empty_object, read_json};
use crate::error::DocumentError;

pub const DISPLAY_NAME: &str = "Slurm Wrapper";
pub const PROVISIONER_NAME: &str = "slurm-provisioner";

const CONFIG_POINTER: &str = "/metadata/kernel_provisioner/config";
const PROVISIONER_POINTER: &str = "/metadata/kernel_provisioner";

pub fn default_descriptor() -> Value {
    json!({
        "display_name": DISPLAY_NAME,
        "language": "python",
        "metadata": {
            "debugger": true,
            "kernel_provisioner": {
                "config": {},
                "provisioner_name": PROVISIONER_NAME
            }
        }
    })
}

/// `metadata.kernel_provisioner.config`, `{}` when any level is missing.
pub fn provisioner_config(descriptor: Value) -> Value {
    descriptor
        .pointer(CONFIG_POINTER)
        .cloned()
        .unwrap_or_else(empty_object)
}

/// Serialize with sorted keys and four space indentation.
pub fn to_pretty_json(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    // serde_json::Map is a BTreeMap without `preserve_order`, keys come out sorted.
    value.serialize(&mut ser)?;
    Ok(buf)
}

pub fn read_descriptor(path: &Path) -> Result<Value, DocumentError> {
    read_json(path)
}

/// Replace `path` with `descriptor`. The new contents are written to a
/// sibling temporary file first and renamed into place.
pub fn write_descriptor(path: &Path, descriptor: &Value) -> Result<(), DocumentError> {
    let write_err = |source: std::io::Error| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };

    let contents = to_pretty_json(descriptor).map_err(|err| write_err(err.into()))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&contents).map_err(write_err)?;

    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(write_err)?;
    }

    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;

    Ok(())
}

/// Read-modify-write of the provisioner config leaf.
pub fn replace_config(path: &Path, new_config: Value) -> Result<(), DocumentError> {
    let mut descriptor = read_descriptor(path)?;

    let provisioner = descriptor
        .pointer_mut(PROVISIONER_POINTER)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| DocumentError::Shape {
            path: path.to_path_buf(),
            reason: "missing metadata.kernel_provisioner object",
        })?;

    provisioner.insert("config".to_string(), new_config);

    write_descriptor(path, &descriptor)
}
