//! Shipped collaborators for a terminal: an image file stands in for the
//! camera and command-line coordinates stand in for the GPS fix.

use crate::collab::{Camera, CollaboratorError, Locator, Photo};
use crate::model::GeoPoint;
use std::path::PathBuf;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "webp"];

/// "Captures" an existing image file as a `file://` uri.
pub struct FileCamera {
    path: PathBuf,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Camera for FileCamera {
    fn capture(&mut self) -> Result<Photo, CollaboratorError> {
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(CollaboratorError::Camera(format!(
                "{} is not an image ({})",
                self.path.display(),
                IMAGE_EXTENSIONS.join(", ")
            )));
        }

        let path = self
            .path
            .canonicalize()
            .map_err(|e| CollaboratorError::Camera(format!("{}: {e}", self.path.display())))?;
        if !path.is_file() {
            return Err(CollaboratorError::Camera(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Ok(Photo {
            uri: format!("file://{}", path.display()),
        })
    }
}

/// Position supplied up front; `None` behaves like a device without a fix.
pub struct FixedLocator {
    position: Option<GeoPoint>,
}

impl FixedLocator {
    pub fn new(position: Option<GeoPoint>) -> Self {
        Self { position }
    }
}

impl Locator for FixedLocator {
    fn current_position(&mut self) -> Result<GeoPoint, CollaboratorError> {
        match self.position {
            Some(point) if point.is_valid() => Ok(point),
            Some(point) => Err(CollaboratorError::Location(format!(
                "coordinates out of range: {}, {}",
                point.latitude, point.longitude
            ))),
            None => Err(CollaboratorError::Location(
                "no position available (pass --lat and --lon)".to_string(),
            )),
        }
    }
}
