use crate::core::geometry::PeriodicCell;
use nalgebra::{Point3, Vector3};

/// One connected cluster of sites. Ids are reassigned per frame after
/// sorting by size, so id 1 is always the largest cluster of its frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRecord {
    pub id: u32,
    pub size: u32,
    pub center_of_mass: Point3<f64>,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut index: usize) -> usize {
        while self.parent[index] != index {
            self.parent[index] = self.parent[self.parent[index]];
            index = self.parent[index];
        }
        index
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent[root_b] = root_a;
        }
    }
}

/// Groups sites into clusters by pairwise connectivity: two sites belong to
/// the same cluster when their minimum-image distance is within `cutoff`.
/// Returned clusters are sorted size-descending with ids 1..n; the center
/// of mass is accumulated with displacements relative to the first member,
/// so clusters straddling the periodic boundary stay compact.
pub fn cluster_sites(
    sites: &[Point3<f64>],
    cell: &PeriodicCell,
    cutoff: f64,
) -> Vec<ClusterRecord> {
    if sites.is_empty() {
        return Vec::new();
    }

    let mut components = UnionFind::new(sites.len());
    for a in 0..sites.len() {
        for b in (a + 1)..sites.len() {
            if cell.distance(&sites[a], &sites[b]) <= cutoff {
                components.union(a, b);
            }
        }
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); sites.len()];
    for index in 0..sites.len() {
        let root = components.find(index);
        members[root].push(index);
    }

    let mut clusters: Vec<ClusterRecord> = members
        .into_iter()
        .filter(|group| !group.is_empty())
        .map(|group| {
            let anchor = sites[group[0]];
            let mut displacement_sum = Vector3::zeros();
            for &index in &group {
                displacement_sum += cell.min_image(&(sites[index] - anchor));
            }
            let center = cell.wrap(&(anchor + displacement_sum / group.len() as f64));
            ClusterRecord {
                id: 0,
                size: group.len() as u32,
                center_of_mass: center,
            }
        })
        .collect();

    clusters.sort_by(|a, b| b.size.cmp(&a.size));
    for (index, cluster) in clusters.iter_mut().enumerate() {
        cluster.id = index as u32 + 1;
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sites_means_no_clusters() {
        let cell = PeriodicCell::cubic(10.0);
        assert!(cluster_sites(&[], &cell, 1.5).is_empty());
    }

    #[test]
    fn id_one_is_always_the_largest_cluster() {
        let cell = PeriodicCell::cubic(20.0);
        // A pair at x ~ 2 and a triple at x ~ 10.
        let sites = vec![
            Point3::new(2.0, 2.0, 2.0),
            Point3::new(3.0, 2.0, 2.0),
            Point3::new(10.0, 10.0, 10.0),
            Point3::new(11.0, 10.0, 10.0),
            Point3::new(10.0, 11.0, 10.0),
        ];
        let clusters = cluster_sites(&sites, &cell, 1.5);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, 1);
        assert_eq!(clusters[0].size, 3);
        assert_eq!(clusters[1].id, 2);
        assert_eq!(clusters[1].size, 2);
    }

    #[test]
    fn isolated_sites_are_singleton_clusters() {
        let cell = PeriodicCell::cubic(20.0);
        let sites = vec![Point3::new(1.0, 1.0, 1.0), Point3::new(9.0, 9.0, 9.0)];
        let clusters = cluster_sites(&sites, &cell, 1.0);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.size == 1));
    }

    #[test]
    fn connectivity_spans_the_periodic_boundary() {
        let cell = PeriodicCell::cubic(10.0);
        let sites = vec![
            Point3::new(0.3, 5.0, 5.0),
            Point3::new(9.7, 5.0, 5.0),
        ];
        let clusters = cluster_sites(&sites, &cell, 1.0);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 2);
        // Center of mass sits on the boundary, not at x = 5.
        let x = clusters[0].center_of_mass.x;
        assert!(x < 0.5 || x > 9.5, "unexpected center x = {}", x);
    }

    #[test]
    fn chains_merge_transitively() {
        let cell = PeriodicCell::cubic(20.0);
        let sites: Vec<_> = (0..5).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let clusters = cluster_sites(&sites, &cell, 1.1);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 5);
        assert!((clusters[0].center_of_mass.x - 2.0).abs() < 1e-9);
    }
}
