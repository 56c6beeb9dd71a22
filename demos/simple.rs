use multi_ahrs::{Ahrs, BoardType, FusionAlgorithm, SensorSample};
use nalgebra::Vector3;
use std::time::Instant;

fn main() {
    // microseconds since start, as an on-board timer would report
    let start = Instant::now();
    let mut ahrs = Ahrs::new(move || start.elapsed().as_micros() as u64);

    ahrs.set_board_type(BoardType::XiaoSense);
    ahrs.set_fusion_algorithm(FusionAlgorithm::Mahony);
    ahrs.begin();
    println!("{} ({:?})", ahrs.board_type_str(), ahrs.imu_type());

    for _ in 0..10 {
        // this loop should repeat each time new sensor data is available
        let gyroscope = Vector3::new(0.0, 0.0, 0.0); // replace this with actual gyroscope data in degrees/s
        let accelerometer = Vector3::new(0.0, 0.0, 1.0); // replace this with actual accelerometer data in g

        ahrs.set_data(SensorSample::without_magnetometer(gyroscope, accelerometer));
        ahrs.update();

        let angles = ahrs.angles();
        println!(
            "Roll: {:.2}, Pitch: {:.2}, Yaw: {:.2}, Heading: {:.2}",
            angles.roll, angles.pitch, angles.yaw, angles.heading
        );

        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}
