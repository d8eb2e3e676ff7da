use super::models::residue::ResidueType;
use nalgebra::Vector3;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Side-chain offset vectors for one residue type, expressed in the local
/// backbone frame of its alpha carbon.
///
/// `compact` applies under short-span (helix-like) backbone geometry and
/// `extended` under long-span (strand-like) geometry; intermediate spans blend
/// the two.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetPair {
    pub compact: Vector3<f64>,
    pub extended: Vector3<f64>,
}

impl OffsetPair {
    pub fn new(compact: Vector3<f64>, extended: Vector3<f64>) -> Self {
        Self { compact, extended }
    }
}

// Compact and extended local offsets (x, y, z each) per canonical residue type,
// derived from average side-chain centroids over the two limiting backbone
// conformations.
const DEFAULT_OFFSETS: [(ResidueType, [f64; 6]); 20] = [
    (ResidueType::Alanine, [0.253, -1.133, 0.985, 0.119, -0.763, 1.312]),
    (ResidueType::Arginine, [-0.057, -2.522, 3.639, -0.057, -1.21, 3.986]),
    (ResidueType::Asparagine, [-0.402, -1.237, 2.111, 0.132, -0.863, 2.328]),
    (ResidueType::AsparticAcid, [-0.287, -1.451, 1.989, 0.396, -0.798, 2.313]),
    (ResidueType::Cysteine, [-0.139, -1.265, 1.619, 0.019, -0.813, 1.897]),
    (ResidueType::Glutamine, [-0.095, -1.674, 2.612, 0.047, -0.886, 2.991]),
    (ResidueType::GlutamicAcid, [-0.028, -1.774, 2.546, 0.096, -0.923, 3.016]),
    (ResidueType::Glycine, [0.0, -0.111, -0.111, 0.0, -0.111, -0.111]),
    (ResidueType::Histidine, [-0.301, -1.405, 2.801, -0.207, -0.879, 3.019]),
    (ResidueType::Isoleucine, [0.094, -1.416, 1.836, -0.105, -0.659, 2.219]),
    (ResidueType::Leucine, [-0.069, -1.247, 2.292, 0.002, -0.462, 2.579]),
    (ResidueType::Lysine, [0.032, -1.835, 2.989, 0.002, -0.882, 3.405]),
    (ResidueType::Methionine, [-0.04, -1.446, 2.587, 0.072, -0.81, 2.883]),
    (ResidueType::Phenylalanine, [0.151, -1.256, 3.161, -0.448, -0.791, 3.286]),
    (ResidueType::Proline, [-0.751, -1.643, 0.467, -1.016, -1.228, 0.977]),
    (ResidueType::Serine, [0.121, -1.476, 1.186, 0.223, -1.042, 1.571]),
    (ResidueType::Threonine, [0.075, -1.341, 1.398, 0.051, -0.909, 1.712]),
    (ResidueType::Tryptophan, [0.558, -1.694, 3.433, -0.06, -0.574, 3.834]),
    (ResidueType::Tyrosine, [0.308, -1.387, 3.492, -0.618, -0.799, 3.634]),
    (ResidueType::Valine, [0.264, -1.194, 1.531, 0.077, -0.631, 1.854]),
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateEntry {
    compact: [f64; 3],
    extended: [f64; 3],
}

/// Read-only registry of side-chain offset templates, supplied once at process
/// start and shared by reference into reconstruction.
#[derive(Debug, Clone)]
pub struct SidechainTemplates {
    table: HashMap<ResidueType, OffsetPair>,
}

impl SidechainTemplates {
    /// Loads a template registry from a TOML file keyed by three-letter residue
    /// codes.
    ///
    /// The file must cover all twenty canonical residue types; a partial table
    /// fails here rather than during reconstruction.
    pub fn load(path: &Path) -> Result<Self, TemplateLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| TemplateLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let raw: HashMap<String, TemplateEntry> =
            toml::from_str(&content).map_err(|e| TemplateLoadError::Toml {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;

        let mut table = HashMap::with_capacity(raw.len());
        for (name, entry) in raw {
            let residue = ResidueType::from_str(&name).map_err(|_| {
                TemplateLoadError::UnknownResidueName {
                    path: path.to_string_lossy().to_string(),
                    name,
                }
            })?;
            table.insert(
                residue,
                OffsetPair::new(
                    Vector3::from(entry.compact),
                    Vector3::from(entry.extended),
                ),
            );
        }

        for residue in ResidueType::ALL {
            if !table.contains_key(&residue) {
                return Err(TemplateLoadError::MissingResidue {
                    path: path.to_string_lossy().to_string(),
                    residue,
                });
            }
        }

        Ok(Self { table })
    }

    /// Builds a registry from explicit entries. No completeness check is
    /// performed; lookups for absent types fail at reconstruction time.
    pub fn from_entries(entries: impl IntoIterator<Item = (ResidueType, OffsetPair)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, residue: ResidueType) -> Option<&OffsetPair> {
        self.table.get(&residue)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for SidechainTemplates {
    fn default() -> Self {
        Self::from_entries(DEFAULT_OFFSETS.iter().map(|&(residue, [cx, cy, cz, ex, ey, ez])| {
            (
                residue,
                OffsetPair::new(Vector3::new(cx, cy, cz), Vector3::new(ex, ey, ez)),
            )
        }))
    }
}

#[derive(Debug, Error)]
pub enum TemplateLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Template table '{path}' uses unknown residue code '{name}'")]
    UnknownResidueName { path: String, name: String },
    #[error("Template table '{path}' is missing residue type {residue}")]
    MissingResidue {
        path: String,
        residue: ResidueType,
    },
}
