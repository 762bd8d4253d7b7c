// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use proptest::prelude::*;
use proptest::sample::Index;
use vtopo_core::{BoundingBox, Categories, GeometrySource, LinePoints, LineType};
use vtopo_topology::{Dataset, RTree};

fn bbox() -> impl Strategy<Value = BoundingBox> {
    (0.0..100.0f64, 0.0..100.0f64, 0.0..15.0f64, 0.0..15.0f64)
        .prop_map(|(x, y, w, h)| BoundingBox::from_corners(x, y, x + w, y + h))
}

fn assert_sorted_incidence(ds: &Dataset) -> Result<(), TestCaseError> {
    for (id, node) in ds.topology().nodes() {
        prop_assert_eq!(node.lines.len(), node.angles.len(), "{}", id);
        prop_assert!(
            node.angles.windows(2).all(|w| w[0] <= w[1]),
            "{} angles out of order: {:?}",
            id,
            node.angles
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn rtree_matches_brute_force(
        boxes in prop::collection::vec(bbox(), 0..150),
        removals in prop::collection::vec(any::<Index>(), 0..60),
        query in bbox(),
    ) {
        let mut tree = RTree::new();
        for (i, b) in boxes.iter().enumerate() {
            tree.insert(*b, i);
        }
        let mut alive = vec![true; boxes.len()];
        if !boxes.is_empty() {
            for r in removals {
                let i = r.index(boxes.len());
                prop_assert_eq!(tree.remove(&boxes[i], i), alive[i]);
                alive[i] = false;
            }
        }

        let mut got = tree.query(&query);
        got.sort_unstable();
        let expected: Vec<usize> = boxes
            .iter()
            .enumerate()
            .filter(|(i, b)| alive[*i] && b.intersects(&query))
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(tree.len(), alive.iter().filter(|a| **a).count());
    }

    #[test]
    fn node_lines_stay_sorted_by_angle(
        ends in prop::collection::vec((-50i32..50, -50i32..50), 1..25),
        removals in prop::collection::vec(any::<Index>(), 0..10),
    ) {
        let mut ds = Dataset::in_memory("spokes", false);
        let mut ids = Vec::new();
        for (x, y) in ends {
            if x == 0 && y == 0 {
                continue;
            }
            let points = LinePoints::from_xy(&[(0.0, 0.0), (f64::from(x), f64::from(y))]);
            ids.push(ds.write_line(LineType::Line, points, Categories::new()).unwrap());
        }
        assert_sorted_incidence(&ds)?;

        if !ids.is_empty() {
            for r in removals {
                let id = ids[r.index(ids.len())];
                if ds.source().is_alive(id) {
                    ds.delete_line(id).unwrap();
                }
            }
        }
        assert_sorted_incidence(&ds)?;

        let alive = ds.line_ids().len();
        let at_origin = ds
            .find_node(0.0, 0.0, 0.0)
            .unwrap()
            .map_or(0, |n| ds.get_node_lines(n).unwrap().len());
        prop_assert_eq!(at_origin, alive);
    }
}
