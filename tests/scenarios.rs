//! End-to-end runs: detector output in, results and session summary out.

use std::sync::mpsc;
use std::sync::Arc;

use axis_trainer::biomechanics::{BiometricResult, BiomechanicsAnalyzer, ExerciseKind};
use axis_trainer::capability::{
    Capabilities, CapabilityMonitor, DeviceMode, ModeHandle, MonitorEvent, ThermalState,
};
use axis_trainer::config::Config;
use axis_trainer::demo::DemoScenario;
use axis_trainer::fusion::SensorFusion;
use axis_trainer::governor::FrameGovernor;
use axis_trainer::pipeline::{FrameInput, FrameOutcome, Pipeline};
use axis_trainer::pose::JointId;
use axis_trainer::session::SessionAggregator;

fn analyze_scenario(scenario: DemoScenario, index: usize) -> BiometricResult {
    let fusion = SensorFusion::default();
    let frame = fusion.fuse(&scenario.pose(index), None, DeviceMode::Standard, 0.0);
    BiomechanicsAnalyzer::new().analyze(scenario.exercise(), &frame.positions(), 0.0)
}

fn standard_pipeline(exercise: ExerciseKind) -> Pipeline {
    Pipeline::new(
        exercise,
        ModeHandle::new(DeviceMode::Standard),
        Arc::new(FrameGovernor::default()),
        SensorFusion::default(),
    )
}

#[test]
fn test_good_squat() {
    let result = analyze_scenario(DemoScenario::PerfectSquat, 0);
    assert!(result.is_correct);
    assert_eq!(result.feedback, "Perfect squat form!");
    assert!((result.confidence - 0.85).abs() < 1e-6);
    assert!(result.metric_measurements["hip_depth_meters"] > 0.0);
}

#[test]
fn test_shallow_squat() {
    let result = analyze_scenario(DemoScenario::ShallowSquat, 0);
    assert!(!result.is_correct);
    assert_eq!(result.feedback, "Go deeper! Lower your hips below knee level.");
    assert!(result.metric_measurements["hip_depth_meters"] < -0.05);
}

#[test]
fn test_missing_hips_is_neutral() {
    let mut pose = DemoScenario::PerfectSquat.pose(0);
    pose.remove(JointId::LeftHip);
    pose.remove(JointId::RightHip);

    let mut pipeline = standard_pipeline(ExerciseKind::Squat);
    let FrameOutcome::Analyzed(result) = pipeline.process(&FrameInput::new(0.0, pose)) else {
        panic!("frame should be admitted");
    };
    assert!(result.is_correct);
    assert_eq!(result.feedback, "");
    assert_eq!(result.confidence, 0.3);
    assert!(result.is_neutral());
}

#[test]
fn test_session_average_knee_angle() {
    let mut session = SessionAggregator::new();
    for (i, angle) in [80.0f32, 90.0, 100.0].into_iter().enumerate() {
        let mut r = BiometricResult::neutral(i as f64);
        r.feedback = "Perfect squat form!".into();
        r.confidence = 0.85;
        r.joint_angles.insert("knee_angle_deg".into(), angle);
        assert!(session.append(r));
    }
    let summary = session.summary();
    assert_eq!(summary.total_frames, 3);
    assert!((summary.averages["knee_angle_deg"] - 90.0).abs() < 1e-4);
    assert_eq!(summary.accuracy_pct, 100.0);
}

#[test]
fn test_demo_session_summary() {
    let config = Config::default();
    let (tx, rx) = mpsc::channel();
    let mut pipeline = Pipeline::from_config(
        &config,
        ExerciseKind::Squat,
        ModeHandle::new(DeviceMode::Standard),
    )
    .with_results(tx);

    let mut frames = DemoScenario::PerfectSquat.frames(30, 30.0);
    let shallow = DemoScenario::ShallowSquat.pose(0);
    for frame in frames.iter_mut().skip(20) {
        frame.joints = shallow.clone();
    }
    for frame in &frames {
        assert!(matches!(pipeline.process(frame), FrameOutcome::Analyzed(_)));
    }

    let emitted: Vec<BiometricResult> = rx.try_iter().collect();
    assert_eq!(emitted.len(), 30);
    assert!(emitted.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let summary = pipeline.finish();
    assert_eq!(summary.total_frames, 30);
    assert_eq!(summary.analyzed_frames, 30);
    assert_eq!(summary.correct_frames, 20);
    assert!((summary.accuracy_pct - 200.0 / 3.0).abs() < 1e-3);
    assert_eq!(summary.corrections.len(), 1);
    assert_eq!(summary.corrections[0].count, 10);
    assert_eq!(
        summary.corrections[0].feedback,
        "Go deeper! Lower your hips below knee level."
    );
    assert_eq!(pipeline.governor().admitted_count(), 30);
    assert_eq!(pipeline.governor().dropped_count(), 0);
}

#[test]
fn test_thermal_downgrade_mid_session() {
    let (event_tx, event_rx) = mpsc::channel();
    let (thermal_tx, thermal_rx) = mpsc::channel();
    let monitor = CapabilityMonitor::new(Capabilities::new(true, true)).with_events(event_tx);
    let (mode, monitor_thread) = monitor.spawn(thermal_rx);

    let mut pipeline = Pipeline::new(
        ExerciseKind::Plank,
        mode,
        Arc::new(FrameGovernor::default()),
        SensorFusion::default(),
    );
    assert_eq!(pipeline.mode(), DeviceMode::Pro);

    let frames = DemoScenario::Plank.frames(20, 30.0);
    for frame in &frames[..10] {
        pipeline.process(frame);
    }

    thermal_tx.send(ThermalState::Serious).unwrap();
    let event = event_rx.recv().unwrap();
    assert_eq!(
        event,
        MonitorEvent::ThermalDowngrade {
            thermal: ThermalState::Serious
        }
    );
    assert_eq!(pipeline.mode(), DeviceMode::Standard);

    // 二度目の高温通知ではイベントは出ない
    thermal_tx.send(ThermalState::Critical).unwrap();
    for frame in &frames[10..] {
        pipeline.process(frame);
    }
    thermal_tx.send(ThermalState::Nominal).unwrap();
    assert!(matches!(event_rx.recv().unwrap(), MonitorEvent::Restored { .. }));

    drop(thermal_tx);
    let monitor = monitor_thread.join().unwrap();
    assert!(!monitor.is_downgraded());
    assert_eq!(pipeline.mode(), DeviceMode::Pro);

    let summary = pipeline.finish();
    assert_eq!(summary.total_frames, 20);
    assert_eq!(summary.accuracy_pct, 100.0);
}
