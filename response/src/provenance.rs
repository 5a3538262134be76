//! How a response product was put together.

use serde::{Deserialize, Serialize};

use crate::components::{ComponentKind, ComponentMeta, SelectedParameter};
use crate::reconcile::Extrapolation;

/// One component that contributed to a product, in photon-path order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub kind: ComponentKind,
    pub label: String,
    /// File the component was loaded from
    pub source: String,
    /// Whether a modelled rather than measured curve was used
    pub model: bool,
    pub selection: Option<SelectedParameter>,
}

impl From<&ComponentMeta> for ProvenanceEntry {
    fn from(meta: &ComponentMeta) -> Self {
        Self {
            kind: meta.kind,
            label: meta.label.clone(),
            source: meta.source.clone(),
            model: meta.model,
            selection: meta.selection.clone(),
        }
    }
}

/// Where the common energy grid came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridOrigin {
    /// Input grid of the detector matrix
    Detector,
    /// Energies supplied by the caller
    Requested,
    /// Finest grid among the scalar components, named by label
    Finest(String),
}

/// Record attached to every product: what went in and how it was aligned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub entries: Vec<ProvenanceEntry>,
    pub grid_origin: GridOrigin,
    pub extrapolation: Extrapolation,
}

impl Provenance {
    /// Every component, in photon-path order
    pub fn entries(&self) -> &[ProvenanceEntry] {
        &self.entries
    }

    /// Entries of one kind, in path order
    pub fn of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &ProvenanceEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Selection records of every parameter-family component
    pub fn selections(&self) -> impl Iterator<Item = (&ProvenanceEntry, &SelectedParameter)> {
        self.entries
            .iter()
            .filter_map(|e| e.selection.as_ref().map(|s| (e, s)))
    }
}
