use super::AnalysisError;
use super::cluster::ClusterRecord;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct DefectRow {
    pub step: u64,
    pub vacancies: u32,
    pub interstitials: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterRow {
    pub step: u64,
    #[serde(rename = "cluster id")]
    pub cluster_id: u32,
    pub size: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThermoRow {
    pub step: u64,
    #[serde(rename = "potential energy")]
    pub potential: f64,
    #[serde(rename = "kinetic energy")]
    pub kinetic: f64,
    #[serde(rename = "total energy")]
    pub total: f64,
}

/// Accumulated per-frame analysis results. Tables are rewritten in full on
/// every flush, so a partially-complete run still leaves consistent files.
///
/// "The bubble" is cluster id 1: the largest vacancy cluster of each frame.
/// Frames with zero clusters contribute a bubble size of 0 and no
/// coordinate sample.
#[derive(Default)]
pub struct AnalysisSeries {
    defects: Vec<DefectRow>,
    clusters: Vec<ClusterRow>,
    thermo: Vec<ThermoRow>,
}

impl AnalysisSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(
        &mut self,
        step: u64,
        vacancies: u32,
        interstitials: u32,
        clusters: &[ClusterRecord],
    ) {
        self.defects.push(DefectRow {
            step,
            vacancies,
            interstitials,
        });
        for cluster in clusters {
            self.clusters.push(ClusterRow {
                step,
                cluster_id: cluster.id,
                size: cluster.size,
                x: cluster.center_of_mass.x,
                y: cluster.center_of_mass.y,
                z: cluster.center_of_mass.z,
            });
        }
    }

    pub fn record_thermo(&mut self, step: u64, potential: f64, kinetic: f64) {
        self.thermo.push(ThermoRow {
            step,
            potential,
            kinetic,
            total: potential + kinetic,
        });
    }

    pub fn frame_count(&self) -> usize {
        self.defects.len()
    }

    pub fn has_thermo(&self) -> bool {
        !self.thermo.is_empty()
    }

    pub fn write_defects(&self, path: &Path) -> Result<(), AnalysisError> {
        write_rows(path, &self.defects)
    }

    pub fn write_clusters(&self, path: &Path) -> Result<(), AnalysisError> {
        write_rows(path, &self.clusters)
    }

    pub fn write_thermo(&self, path: &Path) -> Result<(), AnalysisError> {
        write_rows(path, &self.thermo)
    }

    fn bubble_row(&self, step: u64) -> Option<&ClusterRow> {
        self.clusters
            .iter()
            .find(|row| row.step == step && row.cluster_id == 1)
    }

    /// Bubble size per frame; 0 on frames without clusters.
    pub fn bubble_sizes(&self) -> Vec<(f64, f64)> {
        self.defects
            .iter()
            .map(|row| {
                let size = self.bubble_row(row.step).map_or(0, |bubble| bubble.size);
                (row.step as f64, size as f64)
            })
            .collect()
    }

    /// Bubble center-of-mass coordinate per frame, one series per axis.
    /// Cluster-free frames are omitted.
    pub fn bubble_track(&self) -> [Vec<(f64, f64)>; 3] {
        let mut track = [Vec::new(), Vec::new(), Vec::new()];
        for row in &self.defects {
            if let Some(bubble) = self.bubble_row(row.step) {
                let step = row.step as f64;
                track[0].push((step, bubble.x));
                track[1].push((step, bubble.y));
                track[2].push((step, bubble.z));
            }
        }
        track
    }

    /// Vacancies outside the bubble: total vacancies minus bubble size.
    pub fn non_bubble_vacancies(&self) -> Vec<(f64, f64)> {
        self.defects
            .iter()
            .map(|row| {
                let bubble = self.bubble_row(row.step).map_or(0, |b| b.size);
                (
                    row.step as f64,
                    row.vacancies.saturating_sub(bubble) as f64,
                )
            })
            .collect()
    }

    pub fn vacancies(&self) -> Vec<(f64, f64)> {
        self.defects
            .iter()
            .map(|row| (row.step as f64, row.vacancies as f64))
            .collect()
    }

    pub fn interstitials(&self) -> Vec<(f64, f64)> {
        self.defects
            .iter()
            .map(|row| (row.step as f64, row.interstitials as f64))
            .collect()
    }

    /// Potential, kinetic and total energy series.
    pub fn energies(&self) -> [Vec<(f64, f64)>; 3] {
        let mut series = [Vec::new(), Vec::new(), Vec::new()];
        for row in &self.thermo {
            let step = row.step as f64;
            series[0].push((step, row.potential));
            series[1].push((step, row.kinetic));
            series[2].push((step, row.total));
        }
        series
    }
}

fn write_rows<R: Serialize>(path: &Path, rows: &[R]) -> Result<(), AnalysisError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use std::fs;

    fn cluster(id: u32, size: u32) -> ClusterRecord {
        ClusterRecord {
            id,
            size,
            center_of_mass: Point3::new(1.0, 2.0, 3.0),
        }
    }

    #[test]
    fn defect_table_has_expected_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defects.csv");

        let mut series = AnalysisSeries::new();
        series.record_frame(0, 4, 1, &[]);
        series.record_frame(10, 3, 0, &[]);
        series.write_defects(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "step,vacancies,interstitials");
        assert_eq!(lines.next().unwrap(), "0,4,1");
        assert_eq!(lines.next().unwrap(), "10,3,0");
    }

    #[test]
    fn cluster_and_thermo_tables_have_expected_headers() {
        let dir = tempfile::tempdir().unwrap();

        let mut series = AnalysisSeries::new();
        series.record_frame(0, 4, 0, &[cluster(1, 3)]);
        series.record_thermo(0, -1.0, 0.5);

        let cluster_path = dir.path().join("clusters.csv");
        series.write_clusters(&cluster_path).unwrap();
        let text = fs::read_to_string(&cluster_path).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "step,cluster id,size,x,y,z"
        );

        let thermo_path = dir.path().join("thermo.csv");
        series.write_thermo(&thermo_path).unwrap();
        let text = fs::read_to_string(&thermo_path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "step,potential energy,kinetic energy,total energy"
        );
        assert_eq!(lines.next().unwrap(), "0,-1.0,0.5,-0.5");
    }

    #[test]
    fn cluster_free_frames_have_bubble_size_zero_and_no_track_sample() {
        let mut series = AnalysisSeries::new();
        series.record_frame(0, 5, 0, &[cluster(1, 4)]);
        series.record_frame(10, 2, 0, &[]);
        series.record_frame(20, 6, 0, &[cluster(1, 5), cluster(2, 1)]);

        assert_eq!(
            series.bubble_sizes(),
            vec![(0.0, 4.0), (10.0, 0.0), (20.0, 5.0)]
        );

        let [x, _, _] = series.bubble_track();
        let steps: Vec<f64> = x.iter().map(|(step, _)| *step).collect();
        assert_eq!(steps, vec![0.0, 20.0]);
    }

    #[test]
    fn non_bubble_vacancies_equal_total_on_cluster_free_frames() {
        let mut series = AnalysisSeries::new();
        series.record_frame(0, 5, 0, &[cluster(1, 4)]);
        series.record_frame(10, 2, 0, &[]);

        assert_eq!(
            series.non_bubble_vacancies(),
            vec![(0.0, 1.0), (10.0, 2.0)]
        );
    }
}
