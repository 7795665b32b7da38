use super::AnalysisError;
use crate::core::geometry::PeriodicCell;
use crate::core::snapshot::Snapshot;
use nalgebra::Point3;

/// Wigner-Seitz occupancy analysis: every particle of a frame is assigned
/// to its nearest reference lattice site under minimum-image distances, and
/// the per-site particle counts classify sites as vacant (< 1) or
/// interstitial hosts (> 1).
pub struct WignerSeitz {
    sites: Vec<Point3<f64>>,
    cell: PeriodicCell,
}

impl WignerSeitz {
    /// Builds the analysis around a reference configuration; positions are
    /// wrapped once here. The reference cell also defines the periodicity
    /// used for every later frame.
    pub fn new(reference: &Snapshot) -> Result<Self, AnalysisError> {
        if reference.is_empty() {
            return Err(AnalysisError::EmptyReference);
        }
        let wrapped = reference.wrapped();
        Ok(Self {
            sites: wrapped.positions().to_vec(),
            cell: *wrapped.cell(),
        })
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    pub fn sites(&self) -> &[Point3<f64>] {
        &self.sites
    }

    pub fn cell(&self) -> &PeriodicCell {
        &self.cell
    }

    /// Counts the particles occupying each reference site.
    pub fn occupancies(&self, frame: &Snapshot) -> Vec<u32> {
        let mut counts = vec![0u32; self.sites.len()];
        for position in frame.positions() {
            let position = self.cell.wrap(position);
            let mut nearest = 0usize;
            let mut nearest_distance = f64::INFINITY;
            for (index, site) in self.sites.iter().enumerate() {
                let distance = self.cell.distance(&position, site);
                if distance < nearest_distance {
                    nearest = index;
                    nearest_distance = distance;
                }
            }
            counts[nearest] += 1;
        }
        counts
    }

    /// The positions of all under-occupied (vacant) sites.
    pub fn vacant_sites(&self, occupancies: &[u32]) -> Vec<Point3<f64>> {
        self.sites
            .iter()
            .zip(occupancies)
            .filter(|&(_, &count)| count < 1)
            .map(|(site, _)| *site)
            .collect()
    }

    /// Number of over-occupied sites, each hosting at least one interstitial.
    pub fn interstitial_count(&self, occupancies: &[u32]) -> u32 {
        occupancies.iter().filter(|&&count| count > 1).count() as u32
    }
}
