//! Persona catalog — process-wide, read-mostly registry of definitions.
//!
//! Bundled definitions are compiled in; an optional directory of TOML files
//! can override them. Reload publishes a new immutable snapshot atomically,
//! so in-flight routing decisions keep the snapshot they started with.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::types::{Persona, PersonaKind};

// ─────────────────────────────────────────────────────────────────
// Bundled Definitions
// ─────────────────────────────────────────────────────────────────

fn bundled_definition(kind: PersonaKind) -> &'static str {
    match kind {
        PersonaKind::Analyst => include_str!("../../config/personas/analyst.toml"),
        PersonaKind::Creative => include_str!("../../config/personas/creative.toml"),
        PersonaKind::Researcher => include_str!("../../config/personas/researcher.toml"),
        PersonaKind::Advisor => include_str!("../../config/personas/advisor.toml"),
        PersonaKind::Mentor => include_str!("../../config/personas/mentor.toml"),
    }
}

// ─────────────────────────────────────────────────────────────────
// Catalog Snapshot
// ─────────────────────────────────────────────────────────────────

/// An immutable set of personas plus the designated default.
///
/// Safe to share across workers without locking; entries never change after
/// construction.
#[derive(Debug)]
pub struct Catalog {
    personas: Vec<Arc<Persona>>,
    by_kind: HashMap<PersonaKind, usize>,
    default_kind: PersonaKind,
    version: u64,
}

impl Catalog {
    fn build(personas: Vec<Persona>, default_kind: PersonaKind, version: u64) -> Result<Self> {
        let personas: Vec<Arc<Persona>> = personas.into_iter().map(Arc::new).collect();
        let mut by_kind = HashMap::with_capacity(personas.len());
        for (idx, persona) in personas.iter().enumerate() {
            if by_kind.insert(persona.kind, idx).is_some() {
                return Err(Error::Config(format!(
                    "duplicate persona definition for '{}'",
                    persona.kind
                )));
            }
        }
        if !by_kind.contains_key(&default_kind) {
            return Err(Error::Config(format!(
                "default persona '{}' is not in the catalog",
                default_kind
            )));
        }
        Ok(Self {
            personas,
            by_kind,
            default_kind,
            version,
        })
    }

    /// Resolve a persona by kind.
    pub fn resolve(&self, kind: PersonaKind) -> Result<Arc<Persona>> {
        self.by_kind
            .get(&kind)
            .map(|&idx| self.personas[idx].clone())
            .ok_or_else(|| Error::PersonaNotFound(kind.slug().to_string()))
    }

    /// All personas in catalog order.
    pub fn all(&self) -> &[Arc<Persona>] {
        &self.personas
    }

    /// The fallback persona used when nothing clears the score threshold.
    pub fn default_persona(&self) -> Arc<Persona> {
        let idx = self.by_kind[&self.default_kind];
        self.personas[idx].clone()
    }

    pub fn default_kind(&self) -> PersonaKind {
        self.default_kind
    }

    /// Monotonic snapshot version, bumped on every reload.
    pub fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona Catalog
// ─────────────────────────────────────────────────────────────────

/// Holder that publishes immutable [`Catalog`] snapshots.
pub struct PersonaCatalog {
    snapshot: RwLock<Arc<Catalog>>,
}

impl PersonaCatalog {
    /// Load the bundled definitions for every [`PersonaKind`].
    pub fn load_bundled(default_kind: PersonaKind) -> Result<Self> {
        let mut personas = Vec::with_capacity(PersonaKind::all().len());
        for kind in PersonaKind::all() {
            let persona = Persona::from_toml(bundled_definition(*kind)).map_err(Error::Config)?;
            if persona.kind != *kind {
                return Err(Error::Config(format!(
                    "bundled definition for '{}' declares kind '{}'",
                    kind, persona.kind
                )));
            }
            personas.push(persona);
        }
        let catalog = Catalog::build(personas, default_kind, 1)?;
        info!(
            personas = catalog.personas.len(),
            default = %default_kind,
            "persona catalog loaded"
        );
        Ok(Self {
            snapshot: RwLock::new(Arc::new(catalog)),
        })
    }

    /// Load definitions from a directory of `*.toml` files. Kinds not present
    /// in the directory fall back to their bundled definition.
    pub fn load_dir(dir: &Path, default_kind: PersonaKind) -> Result<Self> {
        let catalog = Self::load_bundled(default_kind)?;
        let overrides = read_definitions(dir)?;
        if !overrides.is_empty() {
            catalog.reload_with(overrides)?;
        }
        Ok(catalog)
    }

    /// Current snapshot. Cheap; callers hold it for the whole routing
    /// decision so a concurrent reload cannot shift the ground under them.
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.snapshot.read().clone()
    }

    /// Publish a new snapshot with the given definitions replacing their
    /// bundled counterparts.
    pub fn reload_with(&self, overrides: Vec<Persona>) -> Result<()> {
        let current = self.snapshot();
        let mut merged: Vec<Persona> = current
            .all()
            .iter()
            .map(|p| Persona::clone(p))
            .collect();
        for replacement in overrides {
            match merged.iter_mut().find(|p| p.kind == replacement.kind) {
                Some(slot) => *slot = replacement,
                None => merged.push(replacement),
            }
        }
        let next = Catalog::build(merged, current.default_kind(), current.version() + 1)?;
        debug!(version = next.version(), "persona catalog republished");
        *self.snapshot.write() = Arc::new(next);
        Ok(())
    }
}

fn read_definitions(dir: &Path) -> Result<Vec<Persona>> {
    let mut out = Vec::new();
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "persona directory not found: {}",
            dir.display()
        )));
    }
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "toml").unwrap_or(false))
        .collect();
    entries.sort();
    for path in entries {
        let text = fs::read_to_string(&path)?;
        let persona = Persona::from_toml(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), kind = %persona.kind, "persona definition loaded");
        out.push(persona);
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
