// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use vtopo_core::{
    BoundingBox, Categories, DirectedLineRef, ExternalSource, FaceRef, Feature, GeometrySource,
    LineId, LinePoints, LineType, Source,
};
use vtopo_topology::{
    BridgeAction, BuildLevel, CentroidArea, Dataset, OpenMode, TopologyConfig, TopologySummary,
    TOPO_FILE,
};

fn boundary(ds: &mut Dataset, coords: &[(f64, f64)]) -> LineId {
    ds.write_line(LineType::Boundary, LinePoints::from_xy(coords), Categories::new())
        .unwrap()
}

fn centroid(ds: &mut Dataset, x: f64, y: f64, cat: i32) -> LineId {
    ds.write_line(
        LineType::Centroid,
        LinePoints::from_xy(&[(x, y)]),
        Categories::single(1, cat),
    )
    .unwrap()
}

fn feature(kind: LineType, coords: &[(f64, f64)]) -> Feature {
    Feature::new(kind, LinePoints::from_xy(coords), Categories::new())
}

#[test]
fn bridge_between_two_squares_is_the_only_bridge() {
    let mut ds = Dataset::in_memory("squares", false);
    let left = boundary(
        &mut ds,
        &[(2.0, 0.0), (0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)],
    );
    let right = boundary(
        &mut ds,
        &[(5.0, 0.0), (5.0, 2.0), (7.0, 2.0), (7.0, 0.0), (5.0, 0.0)],
    );
    let bridge = boundary(&mut ds, &[(2.0, 0.0), (5.0, 0.0)]);
    ds.build_topology(BuildLevel::ALL, 0.0).unwrap();

    let report = ds.remove_bridges(BridgeAction::Remove, None).unwrap();
    assert_eq!(report.bridges, vec![bridge]);
    assert_eq!(report.dangles, 0);

    assert!(!ds.source().is_alive(bridge));
    assert!(ds.source().is_alive(left));
    assert!(ds.source().is_alive(right));
    assert_eq!(ds.topology().area_count(), 2);
    // both squares now have an outer isle again
    assert_eq!(ds.topology().isle_count(), 2);
}

#[test]
fn self_loop_is_never_a_bridge() {
    // a closed loop enclosing nothing keeps both sides unassigned
    let source: Source = ExternalSource::new(
        vec![feature(LineType::Boundary, &[(0.0, 0.0), (4.0, 0.0), (0.0, 0.0)])],
        false,
    )
    .into();
    let mut ds = Dataset::from_source("loop", source, TopologyConfig::default()).unwrap();
    let stats = ds.build_topology(BuildLevel::ALL, 0.0).unwrap();
    assert_eq!((stats.areas, stats.isles), (0, 0));

    let id = LineId::new(1).unwrap();
    let (left, right) = ds.topology().line_faces(id).unwrap();
    assert!(left.is_universe() && right.is_universe());

    // nothing to change, so even a read-only source succeeds
    let report = ds.remove_bridges(BridgeAction::Remove, None).unwrap();
    assert!(report.bridges.is_empty());
    assert_eq!(report.dangles, 0);
}

#[test]
fn square_with_hole() {
    let source: Source = ExternalSource::new(
        vec![
            feature(
                LineType::Boundary,
                &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)],
            ),
            feature(
                LineType::Boundary,
                &[(4.0, 4.0), (4.0, 6.0), (6.0, 6.0), (6.0, 4.0), (4.0, 4.0)],
            ),
            feature(LineType::Centroid, &[(1.0, 1.0)]),
            feature(LineType::Centroid, &[(5.0, 5.0)]),
        ],
        false,
    )
    .into();
    let mut ds = Dataset::from_source("holes", source, TopologyConfig::default()).unwrap();
    let stats = ds.build_topology(BuildLevel::ALL, 0.0).unwrap();
    assert_eq!((stats.areas, stats.isles), (2, 2));
    assert_eq!(stats.centroids_attached, 2);
    assert_eq!(stats.isles_outside, 1);

    let outer = ds.find_area(1.0, 1.0).unwrap().unwrap();
    let inner = ds.find_area(5.0, 5.0).unwrap().unwrap();
    assert_ne!(outer, inner);
    assert_relative_eq!(ds.area_size(outer).unwrap(), 96.0);
    assert_relative_eq!(ds.area_size(inner).unwrap(), 4.0);

    let graph = ds.topology();
    let isles = graph.area_isles(outer).unwrap();
    assert_eq!(isles.len(), 1);
    assert_eq!(graph.isle_area(isles[0]).unwrap(), Some(outer));
    assert!(graph.area_isles(inner).unwrap().is_empty());
    assert_eq!(
        graph.centroid_area(LineId::new(4).unwrap()).unwrap(),
        CentroidArea::Area(inner)
    );

    // outer ring only, isles do not add to the perimeter
    assert_relative_eq!(graph.area_perimeter(ds.source(), outer).unwrap(), 40.0);
    assert_relative_eq!(graph.area_perimeter(ds.source(), inner).unwrap(), 8.0);
    let ring = graph.area_points(ds.source(), inner).unwrap();
    assert_eq!(ring.len(), 5);
    assert_eq!(ring.first(), ring.last());
    let on_edge = |v: f64| v == 4.0 || v == 6.0;
    assert!(ring.points().iter().all(|p| on_edge(p.x) || on_edge(p.y)));

    let corner = BoundingBox::from_corners(0.0, 0.0, 1.0, 1.0);
    assert_eq!(graph.select_areas_by_box(&corner), vec![outer]);
    let mut both = graph.select_areas_by_box(&BoundingBox::from_corners(4.5, 4.5, 5.5, 5.5));
    both.sort_unstable();
    let mut expected = vec![outer, inner];
    expected.sort_unstable();
    assert_eq!(both, expected);

    let universe_isle = graph.select_isles_by_box(&corner);
    assert_eq!(universe_isle.len(), 1);
    assert_eq!(graph.isle_area(universe_isle[0]).unwrap(), None);
    let centre = graph.select_isles_by_box(&BoundingBox::from_point(5.0, 4.0, 0.0));
    assert_eq!(centre.len(), 2);
    assert!(centre.contains(&isles[0]));
}

#[test]
fn dissolve_reaches_neighbour_through_isle() {
    let mut ds = Dataset::in_memory("holes", false);
    boundary(&mut ds, &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)]);
    let hole = boundary(&mut ds, &[(4.0, 4.0), (4.0, 6.0), (6.0, 6.0), (6.0, 4.0), (4.0, 4.0)]);
    let big = centroid(&mut ds, 1.0, 1.0, 1);
    let small = centroid(&mut ds, 5.0, 5.0, 2);

    let report = ds.remove_small_areas(4.0, None).unwrap();
    assert_eq!(report.areas, 1);
    assert_eq!(report.lines, 2);
    assert!(!ds.source().is_alive(hole));
    assert!(!ds.source().is_alive(small));

    let area = ds.find_area(5.0, 5.0).unwrap().unwrap();
    assert_eq!(ds.topology().area_centroid(area).unwrap(), Some(big));
    assert!(ds.topology().area_isles(area).unwrap().is_empty());
    assert_relative_eq!(ds.area_size(area).unwrap(), 100.0);
    assert!(ds.lines_by_category(1, 2).is_empty());
}

#[test]
fn unit_square_dissolves_into_its_large_neighbour() {
    let mut ds = Dataset::in_memory("plots", false);
    boundary(&mut ds, &[(10.0, 0.0), (0.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
    boundary(&mut ds, &[(10.0, 10.0), (10.0, 1.0)]);
    let shared = boundary(&mut ds, &[(10.0, 1.0), (10.0, 0.0)]);
    boundary(&mut ds, &[(10.0, 1.0), (11.0, 1.0), (11.0, 0.0), (10.0, 0.0)]);
    let big = centroid(&mut ds, 5.0, 5.0, 1);
    let small = centroid(&mut ds, 10.5, 0.5, 2);
    assert_eq!(ds.topology().area_count(), 2);

    let report = ds.remove_small_areas(2.0, None).unwrap();
    assert_eq!((report.areas, report.lines, report.skipped), (1, 2, 0));
    assert_relative_eq!(report.size, 1.0);
    assert!(!ds.source().is_alive(shared));
    assert!(!ds.source().is_alive(small));

    assert_eq!(ds.topology().area_count(), 1);
    assert_eq!(ds.topology().count_of(LineType::Centroid), 1);
    let area = ds.find_area(10.5, 0.5).unwrap().unwrap();
    assert_eq!(ds.topology().area_centroid(area).unwrap(), Some(big));
    assert_relative_eq!(ds.area_size(area).unwrap(), 101.0);
    assert_duality(&ds);
}

#[test]
fn rebuild_is_idempotent() {
    let mut ds = Dataset::in_memory("grid", false);
    build_scene(&mut ds);

    ds.build_topology(BuildLevel::ALL, 0.0).unwrap();
    let first = ds.topology().to_json(0).unwrap();
    ds.build_topology(BuildLevel::ALL, 0.0).unwrap();
    assert_eq!(ds.topology().to_json(0).unwrap(), first);
}

#[test]
fn lower_level_build_tears_down_faces() {
    let mut ds = Dataset::in_memory("grid", false);
    build_scene(&mut ds);
    assert!(ds.topology().area_count() > 0);

    let stats = ds.build_topology(BuildLevel::Base, 0.0).unwrap();
    assert_eq!(stats.level, Some(BuildLevel::Base));
    assert_eq!(ds.topology().area_count(), 0);
    assert_eq!(ds.topology().isle_count(), 0);
    assert!(ds.find_area(1.0, 1.0).is_err());
    assert!(ds.find_node(10.0, 10.0, 0.0).unwrap().is_some());
    assert!(ds.find_node(0.0, 10.0, 0.0).unwrap().is_none());
}

/// Two rooms split by a wall, with a hole in the left one.
fn build_scene(ds: &mut Dataset) -> LineId {
    boundary(ds, &[(10.0, 0.0), (0.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
    boundary(ds, &[(10.0, 10.0), (20.0, 10.0), (20.0, 0.0), (10.0, 0.0)]);
    let wall = boundary(ds, &[(10.0, 0.0), (10.0, 10.0)]);
    boundary(ds, &[(3.0, 3.0), (3.0, 6.0), (6.0, 6.0), (6.0, 3.0), (3.0, 3.0)]);
    centroid(ds, 1.0, 1.0, 1);
    centroid(ds, 15.0, 5.0, 2);
    centroid(ds, 4.5, 4.5, 3);
    wall
}

/// Every ring entry has its face on the right, and every face recorded on a
/// boundary lists that boundary in its ring.
fn assert_duality(ds: &Dataset) {
    let graph = ds.topology();
    let side = |r: DirectedLineRef| {
        let (left, right) = graph.line(r.id).unwrap().faces().unwrap();
        if r.forward {
            right
        } else {
            left
        }
    };
    for (id, area) in graph.areas() {
        for &r in &area.lines {
            assert_eq!(side(r), FaceRef::Area(id), "{r} in area {id}");
        }
    }
    for (id, isle) in graph.isles() {
        for &r in &isle.lines {
            assert_eq!(side(r), FaceRef::Isle(id), "{r} in isle {id}");
        }
    }
    for (id, line) in graph.lines() {
        let Some((left, right)) = line.faces() else {
            continue;
        };
        for (face, forward) in [(right, true), (left, false)] {
            let r = DirectedLineRef { id, forward };
            let ring = match face {
                FaceRef::Universe => continue,
                FaceRef::Area(a) => &graph.area(a).unwrap().lines,
                FaceRef::Isle(i) => &graph.isle(i).unwrap().lines,
            };
            assert!(ring.contains(&r), "{r} missing from its face ring");
        }
    }
}

/// Topology facts that do not depend on entity numbering.
fn fingerprint(ds: &Dataset) -> (TopologySummary, Vec<i64>, Vec<(LineId, &'static str, i64)>) {
    let graph = ds.topology();
    let size = |area| (ds.area_size(area).unwrap() * 1000.0).round() as i64;

    let mut sizes: Vec<i64> = graph.areas().map(|(id, _)| size(id)).collect();
    sizes.sort_unstable();

    let centroids = graph
        .lines()
        .filter(|(_, l)| l.kind == LineType::Centroid)
        .map(|(id, _)| match graph.centroid_area(id).unwrap() {
            CentroidArea::Outside => (id, "outside", 0),
            CentroidArea::Area(a) => (id, "area", size(a)),
            CentroidArea::Duplicate(a) => (id, "duplicate", size(a)),
        })
        .collect();
    (graph.summary(), sizes, centroids)
}

#[test]
fn incremental_edits_match_full_rebuild() {
    let mut ds = Dataset::in_memory("rooms", false);
    let wall = build_scene(&mut ds);

    assert_duality(&ds);
    let before = fingerprint(&ds);
    ds.build_topology(BuildLevel::ALL, 0.0).unwrap();
    assert_eq!(fingerprint(&ds), before);
    assert_eq!(before.1, vec![9_000, 91_000, 100_000]);

    ds.delete_line(wall).unwrap();
    boundary(&mut ds, &[(10.0, 10.0), (10.0, 15.0)]);
    assert_duality(&ds);
    let after = fingerprint(&ds);
    assert_eq!(after.1, vec![9_000, 191_000]);
    ds.build_topology(BuildLevel::ALL, 0.0).unwrap();
    assert_eq!(fingerprint(&ds), after);
    assert_duality(&ds);

    // the first centroid keeps the merged room, the second is a duplicate
    let kinds: Vec<&str> = after.2.iter().map(|c| c.1).collect();
    assert_eq!(kinds, vec!["area", "duplicate", "area"]);
}

#[test]
fn stale_topology_file_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("parcels");

    let mut ds = Dataset::create(&path, false, TopologyConfig::default()).unwrap();
    boundary(&mut ds, &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)]);
    centroid(&mut ds, 5.0, 5.0, 1);
    ds.close().unwrap();
    let saved = std::fs::read_to_string(path.join(TOPO_FILE)).unwrap();

    // a matching snapshot is loaded as is
    let ds = Dataset::open(&path, OpenMode::ReadOnly, TopologyConfig::default()).unwrap();
    assert_eq!(ds.name(), "parcels");
    assert_eq!(ds.topology().level(), BuildLevel::Centroids);
    assert!(ds.find_area(5.0, 5.0).unwrap().is_some());
    assert_eq!(ds.lines_by_category(1, 1).len(), 1);
    ds.close().unwrap();

    // edit without writing the topology back
    let config = TopologyConfig {
        save_topology: false,
        ..TopologyConfig::default()
    };
    let mut ds = Dataset::open(&path, OpenMode::Update, config).unwrap();
    ds.write_line(
        LineType::Point,
        LinePoints::from_xy(&[(20.0, 20.0)]),
        Categories::new(),
    )
    .unwrap();
    ds.close().unwrap();
    assert!(!path.join(TOPO_FILE).exists());

    std::fs::write(path.join(TOPO_FILE), saved).unwrap();
    let mut ds = Dataset::open(&path, OpenMode::ReadOnly, TopologyConfig::default()).unwrap();
    assert_eq!(ds.topology().level(), BuildLevel::None);
    assert!(ds.find_area(5.0, 5.0).is_err());
    assert_eq!(ds.line_ids().len(), 3);

    // rebuilding in memory works on a read-only dataset
    ds.build_topology(BuildLevel::ALL, 0.0).unwrap();
    assert!(ds.find_area(5.0, 5.0).unwrap().is_some());
    assert!(ds.delete_line(LineId::new(1).unwrap()).is_err());
}

#[test]
fn external_source_is_read_only() {
    let source: Source = ExternalSource::new(
        vec![feature(LineType::Line, &[(0.0, 0.0), (1.0, 1.0)])],
        false,
    )
    .into();
    let mut ds = Dataset::from_source("external", source, TopologyConfig::default()).unwrap();
    ds.build_topology(BuildLevel::ALL, 0.0).unwrap();
    let id = LineId::new(1).unwrap();

    assert!(ds.delete_line(id).is_err());
    let points = LinePoints::from_xy(&[(0.0, 0.0), (2.0, 2.0)]);
    assert!(ds
        .rewrite_line(id, LineType::Boundary, points, Categories::new())
        .is_err());
    assert!(ds
        .write_line(LineType::Point, LinePoints::from_xy(&[(0.0, 0.0)]), Categories::new())
        .is_err());

    // nothing changed
    assert_eq!(ds.read_line(id).unwrap().kind, LineType::Line);
    assert_eq!(ds.find_line(0.5, 0.5, 0.1, LineType::Line.into()).unwrap(), Some(id));
}
