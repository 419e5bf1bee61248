// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The object-type catalog seam.
//!
//! Parsing a project's type tree is out of scope; the editor only needs "what are the
//! declared defaults of this type" and "where does the project live". Anything that can
//! answer those implements [`Catalog`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::{Instance, ObjectDefaults, Overrides, TypePath};

pub trait Catalog: Send + Sync {
    /// Directory the project lives in; map discovery scans beneath it.
    fn root_path(&self) -> &Path;

    /// Declared default variables of `type_path`, or `None` for an unknown type.
    fn resolve_default_variables(&self, type_path: &TypePath) -> Option<&ObjectDefaults>;

    fn instance(&self, type_path: TypePath, overrides: Option<Overrides>) -> Instance {
        let defaults = self.resolve_default_variables(&type_path);
        Instance::resolve(type_path.clone(), overrides, defaults)
    }

    fn default_instance(&self, type_path: &TypePath) -> Option<Instance> {
        self.resolve_default_variables(type_path)
            .map(|defaults| Instance::default_of(type_path.clone(), defaults))
    }
}

pub type SharedCatalog = Arc<dyn Catalog>;

/// A catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    root: PathBuf,
    objects: HashMap<TypePath, ObjectDefaults>,
}

impl MemoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            objects: HashMap::new(),
        }
    }

    pub fn with_object(mut self, type_path: TypePath, defaults: ObjectDefaults) -> Self {
        self.insert(type_path, defaults);
        self
    }

    pub fn insert(&mut self, type_path: TypePath, defaults: ObjectDefaults) {
        self.objects.insert(type_path, defaults);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn into_shared(self) -> SharedCatalog {
        Arc::new(self)
    }
}

impl Catalog for MemoryCatalog {
    fn root_path(&self) -> &Path {
        &self.root
    }

    fn resolve_default_variables(&self, type_path: &TypePath) -> Option<&ObjectDefaults> {
        self.objects.get(type_path)
    }
}
