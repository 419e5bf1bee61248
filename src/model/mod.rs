// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core data model.
//!
//! Map documents hold a dense grid of tiles; each tile is an ordered stack of instances with
//! optional variable overrides on top of catalog defaults.

pub mod ids;
pub mod instance;
pub mod map;
pub mod value;
pub mod vars;

pub use ids::{MapId, TypePath, TypePathError};
pub use instance::{Dir, Instance, ObjectDefaults, VAR_DIR, VAR_ICON, VAR_ICON_STATE, VAR_NAME};
pub use map::{Flavor, LineEnding, MapDocument, MapEditError, MapSize, Point, SourceFormat, Tile};
pub use value::VarValue;
pub use vars::Overrides;
