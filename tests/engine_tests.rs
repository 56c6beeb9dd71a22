use multi_ahrs::{
    Ahrs, BoardType, FusionAlgorithm, ImuType, SensorSample, parameters::beta_from_gyro_meas_error,
};
use nalgebra::{UnitQuaternion, Vector3};
use std::cell::Cell;
use std::rc::Rc;

const ACTIVE: [FusionAlgorithm; 5] = [
    FusionAlgorithm::Madgwick,
    FusionAlgorithm::Mahony,
    FusionAlgorithm::Complementary,
    FusionAlgorithm::Fusion,
    FusionAlgorithm::Classic,
];

fn engine() -> Ahrs<fn() -> u64> {
    fn frozen() -> u64 {
        0
    }
    let mut ahrs = Ahrs::new(frozen as fn() -> u64);
    ahrs.begin();
    ahrs
}

fn level_north() -> SensorSample {
    SensorSample::new(
        Vector3::zeros(),
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(1.0, 0.0, 0.0),
    )
}

/// Sample a stationary body with orientation `truth` would produce
fn stationary(truth: &UnitQuaternion<f32>) -> SensorSample {
    SensorSample::new(
        Vector3::zeros(),
        truth.inverse_transform_vector(&Vector3::z()),
        truth.inverse_transform_vector(&Vector3::new(0.3, 0.0, -0.4)),
    )
}

#[test]
fn test_defaults_before_begin() {
    let ahrs = Ahrs::new(|| 0u64);
    assert_eq!(ahrs.fusion_algorithm(), FusionAlgorithm::Madgwick);
    assert_eq!(ahrs.board_type(), BoardType::NotDefined);
    assert_eq!(ahrs.imu_type(), ImuType::Unknown);
    assert_eq!(ahrs.board_type_str(), "Undefined Board");
    assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
    assert_eq!(ahrs.data(), SensorSample::default());
}

#[test]
fn test_madgwick_stationary_stays_level() {
    let mut ahrs = engine();
    ahrs.set_data(level_north());
    for _ in 0..100 {
        ahrs.update_with_delta_time(0.01);
    }

    let angles = ahrs.angles();
    assert!(angles.roll.abs() < 0.5, "roll {}", angles.roll);
    assert!(angles.pitch.abs() < 0.5, "pitch {}", angles.pitch);
    assert!(angles.yaw.abs() < 0.5, "yaw {}", angles.yaw);
}

#[test]
fn test_classic_level_north_is_exactly_zero() {
    let mut ahrs = engine();
    ahrs.set_fusion_algorithm(FusionAlgorithm::Classic);
    ahrs.set_data(level_north());
    ahrs.update_with_delta_time(0.01);

    let angles = ahrs.angles();
    assert_eq!(angles.roll, 0.0);
    assert_eq!(angles.pitch, 0.0);
    assert_eq!(angles.yaw, 0.0);
}

#[test]
fn test_none_leaves_quaternion_untouched() {
    let mut ahrs = engine();
    ahrs.set_fusion_algorithm(FusionAlgorithm::Classic);
    ahrs.set_data(stationary(&UnitQuaternion::from_euler_angles(0.2, 0.3, -1.0)));
    ahrs.update_with_delta_time(0.01);
    let before = ahrs.quaternion();

    ahrs.set_fusion_algorithm(FusionAlgorithm::None);
    ahrs.set_data(SensorSample::new(
        Vector3::new(100.0, -50.0, 25.0),
        Vector3::new(0.5, 0.5, 0.5),
        Vector3::new(0.0, 1.0, 0.0),
    ));
    for _ in 0..100 {
        ahrs.update_with_delta_time(0.01);
    }
    assert_eq!(ahrs.quaternion(), before);
}

#[test]
fn test_switching_preserves_quaternion() {
    let truth = UnitQuaternion::from_euler_angles(0.3, -0.2, 0.9);

    for from in ACTIVE {
        for to in FusionAlgorithm::ALL {
            let mut ahrs = engine();
            ahrs.set_fusion_algorithm(from);
            ahrs.set_data(stationary(&truth));
            for _ in 0..50 {
                ahrs.update_with_delta_time(0.01);
            }

            let before = ahrs.quaternion();
            ahrs.set_fusion_algorithm(to);
            assert_eq!(ahrs.quaternion(), before, "{} -> {}", from, to);
        }
    }
}

#[test]
fn test_entering_mahony_clears_integral() {
    let mut ahrs = engine();
    ahrs.set_fusion_algorithm(FusionAlgorithm::Mahony);
    ahrs.set_ki(0.5);
    ahrs.set_data(stationary(&UnitQuaternion::from_euler_angles(0.5, 0.0, 0.0)));
    for _ in 0..20 {
        ahrs.update_with_delta_time(0.01);
    }
    assert!(ahrs.orientation_state().integral_error().norm() > 0.0);

    // re-selecting the active algorithm is not an entry
    ahrs.set_fusion_algorithm(FusionAlgorithm::Mahony);
    assert!(ahrs.orientation_state().integral_error().norm() > 0.0);

    ahrs.set_fusion_algorithm(FusionAlgorithm::Madgwick);
    ahrs.set_fusion_algorithm(FusionAlgorithm::Mahony);
    assert_eq!(ahrs.orientation_state().integral_error(), Vector3::zeros());
}

#[test]
fn test_zero_and_negative_delta_time_are_noops() {
    for algorithm in ACTIVE {
        let mut ahrs = engine();
        ahrs.set_fusion_algorithm(algorithm);
        ahrs.set_data(stationary(&UnitQuaternion::from_euler_angles(0.4, 0.1, 2.0)));
        ahrs.update_with_delta_time(0.01);
        let before = ahrs.quaternion();

        ahrs.set_data(SensorSample::new(
            Vector3::new(90.0, 0.0, 45.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ));
        ahrs.update_with_delta_time(0.0);
        ahrs.update_with_delta_time(-0.01);

        let after = ahrs.quaternion();
        assert_eq!(
            after.coords.map(f32::to_bits),
            before.coords.map(f32::to_bits),
            "{}",
            algorithm
        );
    }
}

#[test]
fn test_gimbal_lock_angles_are_finite() {
    // pitch +90: the up direction lies along body -X
    let truth = UnitQuaternion::from_euler_angles(0.0, core::f32::consts::FRAC_PI_2, 0.7);
    let sample = stationary(&truth);
    assert!((sample.accelerometer - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-6);

    for algorithm in ACTIVE {
        let mut ahrs = engine();
        ahrs.set_fusion_algorithm(algorithm);
        ahrs.set_data(sample);
        for _ in 0..500 {
            ahrs.update_with_delta_time(0.01);
        }

        let angles = ahrs.angles();
        assert!(angles.roll.is_finite(), "{}", algorithm);
        assert!(angles.pitch.is_finite(), "{}", algorithm);
        assert!(angles.yaw.is_finite(), "{}", algorithm);
        assert!(angles.heading.is_finite(), "{}", algorithm);
        assert!(angles.pitch > 80.0, "{} pitch {}", algorithm, angles.pitch);
    }
}

#[test]
fn test_heading_and_configurator_angles() {
    let mut ahrs = engine();
    ahrs.set_fusion_algorithm(FusionAlgorithm::Classic);
    ahrs.set_declination(0.0);

    // North lies along body +Y, so the nose points east
    ahrs.set_data(SensorSample::new(
        Vector3::zeros(),
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(0.0, 1.0, 0.0),
    ));
    ahrs.update_with_delta_time(0.01);

    let angles = ahrs.angles();
    assert!((angles.yaw + 90.0).abs() < 1e-3);
    assert!((angles.heading - 90.0).abs() < 1e-3);

    ahrs.set_declination(12.5);
    let display = ahrs.configurator_angles();
    assert!((display.yaw - 102.5).abs() < 1e-3);
    assert_eq!(display.pitch, -ahrs.angles().pitch);
}

#[test]
fn test_begin_applies_imu_defaults() {
    let mut ahrs = Ahrs::new(|| 0u64);
    ahrs.set_board_type(BoardType::XiaoSense);
    ahrs.begin();

    assert_eq!(ahrs.imu_type(), ImuType::Lsm6ds3);
    let parameters = ahrs.parameters();
    assert_eq!(parameters.gyro_meas_error, 10.0);
    assert_eq!(parameters.beta, beta_from_gyro_meas_error(10.0));
}

#[test]
fn test_explicit_imu_wins_over_board() {
    let mut ahrs = Ahrs::new(|| 0u64);
    ahrs.set_board_type(BoardType::XiaoSense);
    ahrs.set_imu_type(ImuType::Bmi270Bmm150);
    ahrs.begin();

    assert_eq!(ahrs.imu_type(), ImuType::Bmi270Bmm150);
    assert_eq!(ahrs.parameters().gyro_meas_error, 5.0);
}

#[test]
fn test_overrides_survive_begin() {
    let mut ahrs = Ahrs::new(|| 0u64);
    ahrs.set_kp(3.0);
    ahrs.set_alpha(0.9);
    ahrs.set_beta(0.05);
    ahrs.set_declination(-4.0);
    ahrs.set_board_type(BoardType::Nano33BleSenseRev2);
    ahrs.begin();

    let parameters = ahrs.parameters();
    assert_eq!(parameters.kp, 3.0);
    assert_eq!(parameters.alpha, 0.9);
    assert_eq!(parameters.beta, 0.05);
    assert_eq!(parameters.declination, -4.0);
    assert_eq!(parameters.gyro_meas_error, 5.0);
}

#[test]
fn test_begin_is_idempotent() {
    let mut ahrs = Ahrs::new(|| 0u64);
    ahrs.set_board_type(BoardType::Nano33Ble);
    ahrs.set_fusion_gain(0.3);
    ahrs.begin();
    let parameters = ahrs.parameters();

    ahrs.set_data(stationary(&UnitQuaternion::from_euler_angles(0.4, 0.0, 0.0)));
    for _ in 0..20 {
        ahrs.update_with_delta_time(0.01);
    }

    ahrs.begin();
    ahrs.begin();
    assert_eq!(ahrs.parameters(), parameters);
    assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
    assert_eq!(ahrs.imu_type(), ImuType::Lsm9ds1);
}

#[test]
fn test_unused_parameters_are_stored() {
    let mut ahrs = engine();
    ahrs.set_fusion_algorithm(FusionAlgorithm::Classic);
    ahrs.set_kp(-1.0);
    ahrs.set_alpha(2.0);
    ahrs.set_data(level_north());
    ahrs.update_with_delta_time(0.01);

    assert_eq!(ahrs.parameters().kp, -1.0);
    assert_eq!(ahrs.parameters().alpha, 2.0);
    assert_eq!(ahrs.angles().roll, 0.0);
}

#[test]
fn test_update_uses_clock() {
    let now = Rc::new(Cell::new(0u64));
    let clock = {
        let now = Rc::clone(&now);
        move || now.get()
    };

    let mut ahrs = Ahrs::new(clock);
    ahrs.set_fusion_algorithm(FusionAlgorithm::Mahony);
    ahrs.begin();
    ahrs.set_data(SensorSample::new(
        Vector3::new(0.0, 0.0, 45.0),
        Vector3::zeros(),
        Vector3::zeros(),
    ));

    // first tick only records the time
    ahrs.update();
    assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());

    for _ in 0..200 {
        now.set(now.get() + 10_000);
        ahrs.update();
    }

    // 45 deg/s for two seconds
    assert!((ahrs.angles().yaw - 90.0).abs() < 1.0, "yaw {}", ahrs.angles().yaw);
}

#[test]
fn test_begin_restarts_timing() {
    let now = Rc::new(Cell::new(1_000_000u64));
    let clock = {
        let now = Rc::clone(&now);
        move || now.get()
    };

    let mut ahrs = Ahrs::new(clock);
    ahrs.begin();
    ahrs.set_data(SensorSample::new(
        Vector3::new(0.0, 0.0, 45.0),
        Vector3::zeros(),
        Vector3::zeros(),
    ));
    ahrs.update();

    now.set(5_000_000);
    ahrs.begin();
    ahrs.update();
    assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
}

#[test]
fn test_fusion_diagnostics() {
    let mut ahrs = engine();
    ahrs.set_fusion_algorithm(FusionAlgorithm::Fusion);
    ahrs.set_data(level_north());
    assert!(ahrs.fusion_flags().initialising);

    for _ in 0..400 {
        ahrs.update_with_delta_time(0.01);
    }

    assert!(!ahrs.fusion_flags().initialising);
    assert!((ahrs.gravity() - Vector3::z()).norm() < 1e-3);
    assert!(ahrs.linear_acceleration().norm() < 1e-3);
    assert!(ahrs.earth_acceleration().norm() < 1e-3);

    let states = ahrs.fusion_internal_states();
    assert!(!states.accelerometer_ignored);
    assert!(states.acceleration_error < 0.1);
}

#[test]
fn test_six_axis_board() {
    let mut ahrs = Ahrs::new(|| 0u64);
    ahrs.set_board_type(BoardType::XiaoSense);
    ahrs.begin();

    let truth = UnitQuaternion::from_euler_angles(-0.3, 0.2, 0.0);
    let accelerometer = truth.inverse_transform_vector(&Vector3::z());

    for algorithm in ACTIVE {
        ahrs.set_fusion_algorithm(algorithm);
        ahrs.set_data(SensorSample::without_magnetometer(Vector3::zeros(), accelerometer));
        for _ in 0..1000 {
            ahrs.update_with_delta_time(0.01);
        }

        let angles = ahrs.angles();
        assert!((angles.roll + 0.3f32.to_degrees()).abs() < 1.0, "{}", algorithm);
        assert!((angles.pitch - 0.2f32.to_degrees()).abs() < 1.0, "{}", algorithm);
    }
}

#[test]
fn test_switching_into_fusion_without_magnetometer_keeps_yaw() {
    let mut ahrs = engine();
    let truth = UnitQuaternion::from_euler_angles(0.0, 0.0, 1.2);
    ahrs.set_fusion_algorithm(FusionAlgorithm::Classic);
    ahrs.set_data(stationary(&truth));
    ahrs.update_with_delta_time(0.01);
    let yaw = ahrs.angles().yaw;
    assert!((yaw - 1.2f32.to_degrees()).abs() < 0.1, "yaw {}", yaw);

    // same attitude, magnetometer gone
    ahrs.set_data(SensorSample::without_magnetometer(
        Vector3::zeros(),
        truth.inverse_transform_vector(&Vector3::z()),
    ));
    ahrs.set_fusion_algorithm(FusionAlgorithm::Fusion);
    for _ in 0..300 {
        ahrs.update_with_delta_time(0.01);
    }

    assert!((ahrs.angles().yaw - yaw).abs() < 0.1, "yaw {}", ahrs.angles().yaw);
}

#[test]
fn test_begin_follows_board_changes() {
    let mut ahrs = Ahrs::new(|| 0u64);
    ahrs.set_board_type(BoardType::Nano33Ble);
    ahrs.begin();
    assert_eq!(ahrs.imu_type(), ImuType::Lsm9ds1);
    assert_eq!(ahrs.parameters().gyro_meas_error, 40.0);

    ahrs.set_board_type(BoardType::XiaoSense);
    ahrs.begin();
    assert_eq!(ahrs.imu_type(), ImuType::Lsm6ds3);
    assert_eq!(ahrs.parameters().gyro_meas_error, 10.0);
}

#[test]
fn test_explicit_imu_survives_board_change() {
    let mut ahrs = Ahrs::new(|| 0u64);
    ahrs.set_imu_type(ImuType::Bmi270Bmm150);
    ahrs.set_board_type(BoardType::Nano33Ble);
    ahrs.begin();
    ahrs.set_board_type(BoardType::XiaoSense);
    ahrs.begin();

    assert_eq!(ahrs.imu_type(), ImuType::Bmi270Bmm150);
    assert_eq!(ahrs.parameters().gyro_meas_error, 5.0);
}

#[test]
fn test_acceleration_outputs_follow_active_algorithm() {
    let mut ahrs = engine();
    ahrs.set_data(level_north());
    for _ in 0..100 {
        ahrs.update_with_delta_time(0.01);
    }
    assert_eq!(ahrs.fusion_algorithm(), FusionAlgorithm::Madgwick);
    assert!((ahrs.gravity() - Vector3::z()).norm() < 1e-3);
    assert!(ahrs.linear_acceleration().norm() < 1e-3);
    assert!(ahrs.earth_acceleration().norm() < 1e-3);

    // rolled body, then pushed forward along its own x axis
    let truth = UnitQuaternion::from_euler_angles(0.5, 0.0, 0.0);
    ahrs.set_fusion_algorithm(FusionAlgorithm::Classic);
    ahrs.set_data(stationary(&truth));
    ahrs.update_with_delta_time(0.01);
    assert!((ahrs.gravity() - truth.inverse_transform_vector(&Vector3::z())).norm() < 1e-4);

    let mut sample = stationary(&truth);
    sample.accelerometer += Vector3::new(0.2, 0.0, 0.0);
    ahrs.set_data(sample);
    assert!((ahrs.linear_acceleration() - Vector3::new(0.2, 0.0, 0.0)).norm() < 1e-2);
    assert!((ahrs.earth_acceleration() - Vector3::new(0.2, 0.0, 0.0)).norm() < 1e-2);
}
