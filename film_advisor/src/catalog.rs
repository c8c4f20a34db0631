//! JSON-file backed product catalog.
//!
//! The whole catalog is one JSON array in insertion order. Every save
//! rewrites the file through a temporary sibling that is renamed into place,
//! so readers never observe a half-written catalog.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize catalog: {0}")]
    Serialize(serde_json::Error),
    #[error("invalid product: {0}")]
    InvalidProduct(String),
    #[error("a product with id {0} already exists")]
    DuplicateId(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetCondition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub material_category: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finish_type: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub risk_residue: String,
}

impl TargetCondition {
    pub fn is_empty(&self) -> bool {
        self.material_category.is_empty()
            && self.finish_type.is_empty()
            && self.risk_residue.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "TargetCondition::is_empty")]
    pub target_condition: TargetCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Members this service does not interpret, kept so a save does not drop them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Product {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.id.trim().is_empty() {
            return Err(CatalogError::InvalidProduct("id is required".into()));
        }
        if self.name.trim().is_empty() {
            return Err(CatalogError::InvalidProduct("name is required".into()));
        }
        Ok(())
    }
}

pub struct CatalogStore {
    path: PathBuf,
    images_root: PathBuf,
    write_lock: Mutex<()>,
}

impl CatalogStore {
    /// Product images resolve against the working directory unless
    /// [`CatalogStore::with_images_root`] says otherwise.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            images_root: PathBuf::from("."),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_images_root(mut self, images_root: impl Into<PathBuf>) -> Self {
        self.images_root = images_root.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maps a product's `image_url` to an image file inside the images root.
    ///
    /// Returns `None` for anything that does not name an existing image
    /// file under the root once symlinks and `..` are resolved.
    pub fn resolve_image(&self, image_url: &str) -> Option<PathBuf> {
        let relative = Path::new(image_url);
        image::ImageFormat::from_path(relative).ok()?;

        let root = self.images_root.canonicalize().ok()?;
        let resolved = root.join(relative).canonicalize().ok()?;
        if !resolved.starts_with(&root) || !resolved.is_file() {
            tracing::debug!("Refusing image path {} outside {}", image_url, root.display());
            return None;
        }

        Some(resolved)
    }

    /// Returns an empty catalog when the file does not exist.
    pub fn load(&self) -> Result<Vec<Product>, CatalogError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|source| CatalogError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, products: &[Product]) -> Result<(), CatalogError> {
        let mut content =
            serde_json::to_string_pretty(products).map_err(CatalogError::Serialize)?;
        content.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::debug!("Saved {} products to {}", products.len(), self.path.display());
        Ok(())
    }

    /// Validates `product` and appends it to the end of the catalog.
    ///
    /// Appends within this process are serialized; another process writing
    /// the same file concurrently can still overwrite the result.
    pub fn append(&self, product: Product) -> Result<Vec<Product>, CatalogError> {
        product.validate()?;

        let _guard = self.write_lock.lock();
        let mut products = self.load()?;
        if products.iter().any(|p| p.id == product.id) {
            return Err(CatalogError::DuplicateId(product.id));
        }

        tracing::info!("Adding product {} to catalog", product.id);
        products.push(product);
        self.save(&products)?;

        Ok(products)
    }

    /// Looks a product up by id.
    pub fn find(&self, id: &str) -> Result<Option<Product>, CatalogError> {
        Ok(self.load()?.into_iter().find(|p| p.id == id))
    }
}
