use approx::assert_abs_diff_eq;
use ndarray::{s, Array2};
use speechfeat::transforms::DeltaFeatures;
use speechfeat::{
    compute_deltas, compute_vad_energy, sliding_window_cmn, DeltaFeatureOptions,
    SlidingWindowCmnOptions, VadEnergyOptions,
};

fn features(num_frames: usize, dim: usize) -> Array2<f32> {
    Array2::from_shape_fn((num_frames, dim), |(t, d)| {
        ((t as f32 * 0.37 + d as f32).sin() * 4.0) + d as f32
    })
}

#[test]
fn deltas_triple_the_dimension_and_keep_statics() {
    let input = features(20, 13);
    let output = compute_deltas(DeltaFeatureOptions::default(), &input).unwrap();
    assert_eq!(output.dim(), (20, 39));
    assert_eq!(output.slice(s![.., ..13]), input);
}

#[test]
fn deltas_of_a_quadratic_have_constant_acceleration() {
    let input = Array2::from_shape_fn((30, 1), |(t, _)| (t * t) as f32);
    let output = compute_deltas(DeltaFeatureOptions::default(), &input).unwrap();
    // away from the edges the first delta is 2t and the second is 2
    for t in 4..26 {
        assert_abs_diff_eq!(output[[t, 1]], 2.0 * t as f32, epsilon = 1e-3);
        assert_abs_diff_eq!(output[[t, 2]], 2.0, epsilon = 1e-3);
    }
}

#[test]
fn per_frame_processing_matches_whole_matrix() {
    let input = features(9, 4);
    let deltas = DeltaFeatures::new(DeltaFeatureOptions {
        order: 2,
        window: 3,
    })
    .unwrap();
    let whole = deltas.process_matrix(input.view());
    for t in 0..9 {
        assert_eq!(deltas.process(input.view(), t), whole.row(t));
    }
}

#[test]
fn cmn_centered_full_window_removes_the_global_mean() {
    let input = features(50, 5);
    let opts = SlidingWindowCmnOptions {
        cmn_window: 1000,
        min_window: 100,
        center: true,
        normalize_variance: false,
    };
    let output = sliding_window_cmn(&opts, &input).unwrap();
    for d in 0..5 {
        let mean = input.column(d).sum() / 50.0;
        for t in 0..50 {
            assert_abs_diff_eq!(output[[t, d]], input[[t, d]] - mean, epsilon = 1e-4);
        }
    }
}

#[test]
fn cmn_on_empty_matrix_is_empty() {
    let output =
        sliding_window_cmn(&SlidingWindowCmnOptions::default(), &Array2::zeros((0, 7))).unwrap();
    assert_eq!(output.dim(), (0, 7));
}

#[test]
fn vad_follows_log_energy_against_mean_scaled_threshold() {
    let mut input = Array2::zeros((10, 13));
    for t in 0..10 {
        input[[t, 0]] = if (3..7).contains(&t) { 12.0 } else { 2.0 };
    }
    let opts = VadEnergyOptions::default();
    // threshold = 5.0 + 0.5 * mean(6.0) = 8.0
    let decisions = compute_vad_energy(&opts, &input).unwrap();
    let expected: Vec<f32> = (0..10).map(|t| if (3..7).contains(&t) { 1.0 } else { 0.0 }).collect();
    assert_eq!(decisions, expected);
}

#[test]
fn vad_decision_count_matches_frames_after_cmn_and_deltas() {
    let input = features(40, 13);
    let normalized = sliding_window_cmn(&SlidingWindowCmnOptions::default(), &input).unwrap();
    let expanded = compute_deltas(DeltaFeatureOptions::default(), &normalized).unwrap();
    let decisions = compute_vad_energy(
        &VadEnergyOptions {
            vad_frames_context: 2,
            ..VadEnergyOptions::default()
        },
        &expanded,
    )
    .unwrap();
    assert_eq!(decisions.len(), 40);
    assert!(decisions.iter().all(|&d| d == 0.0 || d == 1.0));
}
