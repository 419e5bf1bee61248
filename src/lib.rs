// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Tilewright: the map lifecycle and persistence core of a BYOND `.dmm` map editor.
//!
//! - [`format::dmm`] parses map files and writes them back against their original bytes.
//! - [`holder::MapHolder`] owns the open maps, their backups and the active selection.
//! - [`instances`] aggregates the placed variants of an object type across open maps.

pub mod catalog;
pub mod config;
pub mod format;
pub mod holder;
pub mod instances;
pub mod model;
pub mod store;
