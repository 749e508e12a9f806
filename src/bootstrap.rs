//! First-run installation of the kernel descriptor directory.

use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::engine::Engine;

use crate::kernel;
use crate::settings::Settings;

const LOGO_32: &str = include_str!("assets/logo-32x32.png.b64");
const LOGO_64: &str = include_str!("assets/logo-64x64.png.b64");
const LOGO_SVG: &str = include_str!("assets/logo-svg.svg.b64");

/// (file name, base64 contents) of the icons shipped with the default kernel.
const LOGOS: [(&str, &str); 3] = [
    ("logo-32x32.png", LOGO_32),
    ("logo-64x64.png", LOGO_64),
    ("logo-svg.svg", LOGO_SVG),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    AlreadyPresent,
    CopiedTemplate,
    Defaults,
}

/// Create the kernel directory unless it already exists.
///
/// A template tree from `SLURMEL_TEMPLATE_PATH` is preferred. If none is set
/// or copying it fails, a default descriptor and icons are written instead.
pub fn ensure_kernel_descriptor_exists(settings: &Settings) -> io::Result<BootstrapOutcome> {
    let kernel_dir = settings.kernel_dir();

    if kernel_dir.exists() {
        log::debug!("kernel directory {:?} already present", kernel_dir);
        return Ok(BootstrapOutcome::AlreadyPresent);
    }

    if let Some(parent) = kernel_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if let Some(template) = &settings.template_path {
        match copy_dir_all(template, &kernel_dir) {
            Ok(()) => {
                log::info!("installed kernel from template {:?}", template);
                return Ok(BootstrapOutcome::CopiedTemplate);
            }
            Err(err) => {
                log::debug!("template copy from {:?} failed: {}", template, err);
                // Leave no half-copied tree behind
                let _ = std::fs::remove_dir_all(&kernel_dir);
            }
        }
    }

    write_defaults(&kernel_dir)?;
    log::info!("installed default kernel in {:?}", kernel_dir);

    Ok(BootstrapOutcome::Defaults)
}

fn write_defaults(kernel_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(kernel_dir)?;

    let descriptor = kernel::to_pretty_json(&kernel::default_descriptor())?;
    std::fs::write(kernel_dir.join("kernel.json"), descriptor)?;

    for (file_name, encoded) in LOGOS {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        std::fs::write(kernel_dir.join(file_name), bytes)?;
    }

    Ok(())
}

/// Recursive copy. Fails if `dst` already exists.
fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    if !src.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{:?} is not a directory", src),
        ));
    }

    std::fs::create_dir(dst)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());

        // Follows symlinks, a linked directory is copied as a directory.
        if entry.path().is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
