use super::AnalysisError;
use super::cluster::cluster_sites;
use super::occupancy::WignerSeitz;
use super::plot;
use super::series::AnalysisSeries;
use crate::core::io::lammps::LammpsDumpFile;
use crate::core::io::traits::TrajectoryFile;
use crate::core::snapshot::Snapshot;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Reference configuration defining the lattice sites.
    pub reference_path: PathBuf,
    /// Connectivity cutoff for vacancy clustering, in cell units.
    pub cutoff: f64,
    /// Rewrite the tables every this many frames; 0 writes only at
    /// finalization.
    pub flush_every: usize,
    pub table_dir: PathBuf,
    pub plot_dir: PathBuf,
}

/// Owns the reference lattice and all accumulated series for one analysis
/// run. Frames pass through a fixed pipeline: wrap, per-site occupancy,
/// vacancy clustering, interstitial count, series accumulation.
pub struct AnalysisEngine {
    config: AnalysisConfig,
    occupancy: WignerSeitz,
    series: AnalysisSeries,
}

impl AnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let (reference, _) = LammpsDumpFile::read_from_path(&config.reference_path)?;
        let occupancy = WignerSeitz::new(&reference)?;
        info!(
            sites = occupancy.site_count(),
            reference = %config.reference_path.display(),
            "Analysis reference loaded"
        );
        Ok(Self {
            config,
            occupancy,
            series: AnalysisSeries::new(),
        })
    }

    pub fn series(&self) -> &AnalysisSeries {
        &self.series
    }

    /// Analyzes one frame. Energies are recorded only when provided; pull
    /// mode has none.
    pub fn process_frame(
        &mut self,
        frame: &Snapshot,
        step: u64,
        thermo: Option<(f64, f64)>,
    ) -> Result<(), AnalysisError> {
        let occupancies = self.occupancy.occupancies(frame);
        let vacant = self.occupancy.vacant_sites(&occupancies);
        let clusters = cluster_sites(&vacant, self.occupancy.cell(), self.config.cutoff);
        let interstitials = self.occupancy.interstitial_count(&occupancies);

        debug!(
            step,
            vacancies = vacant.len(),
            interstitials,
            clusters = clusters.len(),
            "Frame analyzed"
        );
        self.series
            .record_frame(step, vacant.len() as u32, interstitials, &clusters);
        if let Some((potential, kinetic)) = thermo {
            self.series.record_thermo(step, potential, kinetic);
        }

        if self.config.flush_every > 0 && self.series.frame_count() % self.config.flush_every == 0
        {
            self.flush()?;
        }
        Ok(())
    }

    /// Reads a trajectory frame from disk and analyzes it, taking the step
    /// from the dump header.
    pub fn process_file(&mut self, path: &Path) -> Result<(), AnalysisError> {
        let (frame, metadata) = LammpsDumpFile::read_from_path(path)?;
        self.process_frame(&frame, metadata.timestep, None)
    }

    fn flush(&self) -> Result<(), AnalysisError> {
        self.series
            .write_defects(&self.config.table_dir.join("defects.csv"))?;
        self.series
            .write_clusters(&self.config.table_dir.join("clusters.csv"))?;
        if self.series.has_thermo() {
            self.series
                .write_thermo(&self.config.table_dir.join("thermo.csv"))?;
        }
        Ok(())
    }

    /// Writes the final tables and renders every plot. Consumes the engine;
    /// nothing can be recorded afterwards.
    pub fn finalize(self) -> Result<(), AnalysisError> {
        self.flush()?;
        self.render_plots()?;
        info!(frames = self.series.frame_count(), "Analysis finalized");
        Ok(())
    }

    fn render_plots(&self) -> Result<(), AnalysisError> {
        let dir = &self.config.plot_dir;

        plot::line_chart(
            &dir.join("vacancies.png"),
            "Vacancies",
            "count",
            &[("vacancies", &self.series.vacancies())],
        )?;
        plot::line_chart(
            &dir.join("interstitials.png"),
            "Interstitials",
            "count",
            &[("interstitials", &self.series.interstitials())],
        )?;

        let [potential, kinetic, total] = self.series.energies();
        plot::line_chart(
            &dir.join("energy.png"),
            "Energy",
            "energy",
            &[
                ("potential", &potential),
                ("kinetic", &kinetic),
                ("total", &total),
            ],
        )?;

        plot::line_chart(
            &dir.join("bubble_size.png"),
            "Bubble size",
            "sites",
            &[("bubble", &self.series.bubble_sizes())],
        )?;
        let [x, y, z] = self.series.bubble_track();
        plot::line_chart(
            &dir.join("bubble_position.png"),
            "Bubble position",
            "coordinate",
            &[("x", &x), ("y", &y), ("z", &z)],
        )?;
        plot::line_chart(
            &dir.join("non_bubble_vacancies.png"),
            "Non-bubble vacancies",
            "count",
            &[("non-bubble vacancies", &self.series.non_bubble_vacancies())],
        )?;
        Ok(())
    }
}
