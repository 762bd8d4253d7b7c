// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use proptest::prelude::*;
use vtopo_core::{
    ByteOrderTag, Categories, Feature, GeometrySource, LinePoints, LineType, NativeStore,
};

fn line_type() -> impl Strategy<Value = LineType> {
    prop_oneof![
        Just(LineType::Point),
        Just(LineType::Line),
        Just(LineType::Boundary),
        Just(LineType::Centroid),
        Just(LineType::Face),
        Just(LineType::Kernel),
    ]
}

fn coord() -> impl Strategy<Value = f64> {
    -1.0e7..1.0e7f64
}

fn feature(with_z: bool) -> impl Strategy<Value = Feature> {
    (
        line_type(),
        prop::collection::vec((coord(), coord(), coord()), 1..12),
        prop::collection::vec((1i32..4, 0i32..1000), 0..4),
    )
        .prop_map(move |(kind, coords, cats)| {
            let mut points = LinePoints::new();
            let take = if kind.is_point_class() { 1 } else { coords.len() };
            for &(x, y, z) in coords.iter().take(take) {
                points.push(x, y, if with_z { z } else { 0.0 });
            }
            let cats = cats.into_iter().fold(Categories::new(), |mut acc, (l, c)| {
                acc.add(l, c);
                acc
            });
            Feature::new(kind, points, cats)
        })
}

fn assert_same(read: &Feature, written: &Feature) {
    assert_eq!(read.kind, written.kind);
    assert!(read.cats.same_set(&written.cats));
    assert_eq!(read.points.len(), written.points.len());
    for (a, b) in read.points.points().iter().zip(written.points.points()) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-10);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-10);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-10);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn written_features_read_back_after_reopen(
        big_endian in any::<bool>(),
        with_z in any::<bool>(),
        features in prop::collection::vec(feature(true), 1..20),
    ) {
        let order = if big_endian { ByteOrderTag::Big } else { ByteOrderTag::Little };
        let features: Vec<Feature> = features
            .into_iter()
            .map(|mut f| {
                if !with_z {
                    for p in f.points.points_mut() {
                        p.z = 0.0;
                    }
                }
                f
            })
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coor");
        let mut ids = Vec::new();
        {
            let mut store = NativeStore::create(&path, order, with_z).unwrap();
            for f in &features {
                ids.push(store.write(f).unwrap());
            }
            store.flush().unwrap();
        }

        let store = NativeStore::open(&path, false).unwrap();
        prop_assert_eq!(store.byte_order(), order);
        prop_assert_eq!(store.with_z(), with_z);
        prop_assert_eq!(store.live_ids(), ids.clone());
        for (id, written) in ids.iter().zip(&features) {
            assert_same(&store.read(*id).unwrap(), written);
        }
    }
}

#[test]
fn deleted_records_stay_dead_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coor");
    let line = Feature::new(
        LineType::Line,
        LinePoints::from_xy(&[(0.0, 0.0), (1.0, 1.0)]),
        Categories::single(1, 3),
    );

    let (a, b) = {
        let mut store = NativeStore::create(&path, ByteOrderTag::Big, false).unwrap();
        let a = store.write(&line).unwrap();
        let b = store.write(&line).unwrap();
        store.delete(a).unwrap();
        store.flush().unwrap();
        (a, b)
    };

    let store = NativeStore::open(&path, false).unwrap();
    assert!(!store.is_alive(a));
    assert!(store.is_alive(b));
    assert_eq!(store.alive_count(), 1);
    assert!(store.read(a).is_err());
    assert_same(&store.read(b).unwrap(), &line);
}
