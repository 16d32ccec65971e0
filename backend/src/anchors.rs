use std::{
    collections::HashSet,
    fs::File,
    io::{self, Read},
    path::Path,
};

use crate::models::{AnchorNode, AnchorPair, CoordinateError};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read anchor file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid anchor definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("anchor catalog is empty")]
    Empty,
    #[error("anchor at position {0} has an empty name")]
    EmptyName(usize),
    #[error("duplicate anchor name {0:?}")]
    DuplicateName(String),
    #[error("anchor {name:?} has invalid coordinates: {source}")]
    InvalidCoordinate {
        name: String,
        source: CoordinateError,
    },
}

/// Fixed, ordered set of anchors used as stitching nodes.
///
/// Built once and shared read-only; order only matters for pair enumeration.
#[derive(Debug, Clone)]
pub struct AnchorCatalog {
    anchors: Vec<AnchorNode>,
}

impl AnchorCatalog {
    pub fn new(anchors: Vec<AnchorNode>) -> Result<Self, CatalogError> {
        if anchors.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::with_capacity(anchors.len());
        for (idx, anchor) in anchors.iter().enumerate() {
            if anchor.name.trim().is_empty() {
                return Err(CatalogError::EmptyName(idx));
            }
            if !seen.insert(anchor.name.as_str()) {
                return Err(CatalogError::DuplicateName(anchor.name.clone()));
            }
            anchor
                .coords
                .validate()
                .map_err(|source| CatalogError::InvalidCoordinate {
                    name: anchor.name.clone(),
                    source,
                })?;
        }
        Ok(Self { anchors })
    }

    /// Country centroids across western Europe, all reachable by road from
    /// one another.
    pub fn default_catalog() -> Self {
        Self {
            anchors: vec![
                AnchorNode::new("France", 46.227638, 2.213749),
                AnchorNode::new("Germany", 51.165691, 10.451526),
                AnchorNode::new("Spain", 40.463667, -3.74922),
                AnchorNode::new("Italy", 41.87194, 12.56738),
                AnchorNode::new("Belgium", 50.503887, 4.469936),
                AnchorNode::new("Netherlands", 52.132633, 5.291266),
            ],
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads a JSON array of `{"name", "coords": {"lat", "lon"}}` objects.
    pub fn from_reader(reader: impl Read) -> Result<Self, CatalogError> {
        let anchors: Vec<AnchorNode> = serde_json::from_reader(reader)?;
        Self::new(anchors)
    }

    pub fn anchors(&self) -> &[AnchorNode] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn pair_count(&self) -> usize {
        let n = self.anchors.len();
        n * n.saturating_sub(1) / 2
    }

    /// Every unordered pair `(i, j)` with `i < j`, lexicographic.
    pub fn pairs(&self) -> impl Iterator<Item = AnchorPair> + '_ {
        let n = self.anchors.len();
        (0..n).flat_map(move |i| ((i + 1)..n).map(move |j| AnchorPair { i, j }))
    }

    pub fn endpoints(&self, pair: AnchorPair) -> (&AnchorNode, &AnchorNode) {
        (&self.anchors[pair.i], &self.anchors[pair.j])
    }
}
