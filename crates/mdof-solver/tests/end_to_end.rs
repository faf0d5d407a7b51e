//! End-to-end transient and pushover runs of small shear buildings.

use approx::assert_relative_eq;
use mdof_model::{BackboneParameters, GroundMotionRecord, StructuralParameters};
use mdof_solver::{
    Algorithm, ConvergenceTest, LadderConfig, MdofModel, TimeStep, response_spectrum,
};

fn clough(n: usize) -> StructuralParameters {
    StructuralParameters::uniform(n, 1000.0, 1.0e6, 0.05).with_backbone(
        "Modified-Clough",
        BackboneParameters {
            yield_shear: vec![2.0e4; n],
            overstrength: vec![1.3; n],
            hardening: vec![0.05; n],
            ultimate_drift: vec![0.5; n],
            pinching: 0.0,
        },
    )
}

#[test]
fn silent_ground_leaves_building_at_rest() {
    let params = StructuralParameters::elastic(
        vec![1000.0, 1000.0, 1000.0],
        vec![1.0e6, 1.0e6, 1.0e6],
        0.05,
    );
    let mut model = MdofModel::new(&params).unwrap();
    let record = GroundMotionRecord::new("zero", 0.02, vec![0.0; 100]).unwrap();

    let outcome = model.run_dynamic(&record, 1.0, TimeStep::AsInRecord).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.reached_time, outcome.total_time);
    assert_relative_eq!(outcome.total_time, 2.0, epsilon = 1e-12);
    assert!(model.max_drift().iter().all(|d| d.abs() < 1e-12));
    assert!(model.max_abs_accel().iter().all(|a| a.abs() < 1e-12));
    assert_eq!(model.residual_drift(), 0.0);
}

#[test]
fn fixed_time_step_interpolates_record() {
    let params = StructuralParameters::uniform(1, 1000.0, 1.0e6, 0.05);
    let mut model = MdofModel::new(&params).unwrap();
    let record = GroundMotionRecord::new("ramp", 0.02, vec![0.05; 50]).unwrap();

    let outcome = model.run_dynamic(&record, 1.0, TimeStep::Fixed(0.005)).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.steps, 200);
    assert_eq!(model.trajectory().len(), 201);
}

#[test]
fn exhausted_ladder_stops_early() {
    let params = StructuralParameters::uniform(2, 1000.0, 1.0e6, 0.05);
    let ladder = LadderConfig {
        tolerance: 1e-8,
        max_iterations: 1,
        tests: vec![ConvergenceTest::NormDispIncr],
        algorithms: vec![Algorithm::RaphsonNewton],
    };
    let mut model = MdofModel::new(&params).unwrap().with_ladder(ladder);

    // Quiet for half a second, then a strong pulse no single iteration absorbs
    let mut accel = vec![0.0; 100];
    for a in accel.iter_mut().skip(60) {
        *a = 0.3;
    }
    let record = GroundMotionRecord::new("step", 0.01, accel).unwrap();

    let outcome = model.run_dynamic(&record, 1.0, TimeStep::AsInRecord).unwrap();
    assert!(!outcome.finished);
    assert!(outcome.reached_time < outcome.total_time);
    assert!(outcome.reached_time > 0.5);

    let times = model.trajectory().times();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_relative_eq!(
        *times.last().unwrap(),
        outcome.reached_time,
        epsilon = 1e-12
    );
}

#[test]
fn strong_shaking_yields_clough_building() {
    let params = clough(2);
    let mut model = MdofModel::new(&params).unwrap();
    let dt = 0.01;
    let accel = (0..500)
        .map(|i| 1.5 * (2.0 * std::f64::consts::PI * i as f64 * dt).sin())
        .collect();
    let record = GroundMotionRecord::new("sine", dt, accel).unwrap();

    let outcome = model.run_dynamic(&record, 1.0, TimeStep::AsInRecord).unwrap();
    assert!(outcome.finished);
    assert!(model.max_drift()[0] > 0.02);

    let peak_strength = 1.3 * 2.0e4;
    for sample in model.trajectory().samples() {
        for force in &sample.force {
            assert!(force.abs() <= peak_strength * (1.0 + 1e-9));
        }
    }
}

#[test]
fn pushover_and_modal_agree_for_elastic_building() {
    let params = StructuralParameters::uniform(3, 1000.0, 1.0e6, 0.05);
    let mut model = MdofModel::new(&params).unwrap();
    let periods = model.eigen(3).unwrap();
    assert_eq!(periods.len(), 3);

    let curve = model.run_static_pushover(&[0.03], 0.005, 3).unwrap();
    assert!(curve.finished);
    let last = curve.samples.last().unwrap();
    assert_relative_eq!(last.control_disp, 0.03, epsilon = 1e-12);
    // Story 1 carries the whole base shear
    assert_relative_eq!(last.force[0], last.base_shear, max_relative = 1e-9);
    assert!(last.drift[0] > last.drift[2]);
}

#[test]
fn spectrum_of_silent_record_is_zero() {
    let spectrum = response_spectrum(&[0.0; 64], 0.01, &[0.1, 0.5, 1.0], 0.05);
    assert_eq!(spectrum, vec![0.0, 0.0, 0.0]);
}
