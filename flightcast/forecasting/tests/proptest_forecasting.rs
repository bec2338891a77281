use flightcast_forecasting::{
    Blender, KinematicExtrapolator, NormalizationStats, Normalizer, Point, Provenance, Trajectory,
    TrajectoryId, Windower,
};
use proptest::prelude::*;
use std::sync::Arc;

fn point() -> impl Strategy<Value = Point> {
    (-1.0e4f64..1.0e4, -1.0e4f64..1.0e4, 0.0f64..1.0e4).prop_map(|(x, y, t)| Point::new(x, y, t))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(1.0)
}

// Round trip through normalization preserves every coordinate
proptest! {
    #[test]
    fn prop_normalize_round_trip(
        points in prop::collection::vec(point(), 1..64),
        mean in prop::array::uniform3(-500.0f64..500.0),
        std in prop::array::uniform3(0.01f64..500.0),
    ) {
        let normalizer = Normalizer::new(Arc::new(NormalizationStats::new(mean, std).unwrap()));
        let restored = normalizer.denormalize_points(&normalizer.normalize_points(&points));
        for (original, back) in points.iter().zip(&restored) {
            prop_assert!(close(original.x, back.x), "x {} -> {}", original.x, back.x);
            prop_assert!(close(original.y, back.y), "y {} -> {}", original.y, back.y);
            prop_assert!(close(original.t, back.t), "t {} -> {}", original.t, back.t);
        }
    }
}

// Stats computed from data always normalize it without dividing by zero
proptest! {
    #[test]
    fn prop_fitted_stats_are_usable(points in prop::collection::vec(point(), 1..64)) {
        let stats = NormalizationStats::from_points(&points).unwrap();
        prop_assert!(stats.std().iter().all(|value| *value > 0.0));
        let normalized = Normalizer::new(Arc::new(stats)).normalize_points(&points);
        prop_assert!(normalized.iter().all(Point::is_finite));
    }
}

// Sample count is sum(max(0, len - w)) and each target follows its window
proptest! {
    #[test]
    fn prop_windower_count(
        lengths in prop::collection::vec(0usize..20, 0..6),
        window_size in 1usize..8,
    ) {
        let trajectories: Vec<Trajectory> = lengths
            .iter()
            .enumerate()
            .map(|(index, len)| {
                let points = (0..*len)
                    .map(|i| Point::new(i as f64, index as f64, i as f64))
                    .collect();
                Trajectory::new(TrajectoryId::new(format!("t{index}")), points).unwrap()
            })
            .collect();
        let windower = Windower::new(window_size).unwrap();
        let expected: usize = lengths.iter().map(|len| len.saturating_sub(window_size)).sum();
        let samples: Vec<_> = windower.windows(&trajectories).collect();
        prop_assert_eq!(samples.len(), expected);
        prop_assert_eq!(windower.count(&trajectories), expected);
        for sample in samples {
            prop_assert_eq!(sample.window.len(), window_size);
            let last = sample.window[window_size - 1];
            prop_assert_eq!(sample.target.t, last.t + 1.0);
        }
    }
}

// Constant velocity is continued by the kinematic estimate
proptest! {
    #[test]
    fn prop_kinematic_continues_constant_velocity(
        start in point(),
        velocity in (-50.0f64..50.0, -50.0f64..50.0, 0.1f64..5.0),
    ) {
        let step = Point::new(velocity.0, velocity.1, velocity.2);
        let history: Vec<Point> = (0..5).map(|i| start + step * f64::from(i)).collect();
        let next = KinematicExtrapolator::new().extrapolate(&history).unwrap();
        let expected = start + step * 5.0;
        prop_assert!((next.x - expected.x).abs() < 1e-6);
        prop_assert!((next.y - expected.y).abs() < 1e-6);
        prop_assert!((next.t - expected.t).abs() < 1e-6);
    }
}

// Without a learned estimate the blend is the kinematic point itself
proptest! {
    #[test]
    fn prop_blend_without_neural_is_identity(kinematic in point()) {
        let prediction = Blender::default().blend(kinematic, None);
        prop_assert_eq!(prediction.point, kinematic);
        prop_assert_eq!(prediction.provenance, Provenance::Kinematic);
    }
}
