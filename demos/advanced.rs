//! Advanced AHRS demonstration
//!
//! Runs every fusion algorithm over the recorded trajectory in
//! `testdata/sensor_data.csv` and plots the estimated Euler angles against
//! the recorded ground truth, followed by the Fusion filter's rejection
//! diagnostics.
//!
//! Features demonstrated:
//! - Runtime algorithm selection
//! - Per-board parameter defaults and explicit overrides
//! - Declination-corrected heading and configurator angles
//! - Fusion filter internal state monitoring
//!
//! Run with: `cargo run --example advanced`

use multi_ahrs::{Ahrs, BoardType, FusionAlgorithm, SensorSample};
use nalgebra::Vector3;
use plotters::prelude::*;
use serde::Deserialize;
use std::error::Error;

#[derive(Debug, Deserialize)]
struct SensorData {
    #[serde(rename = "Time (s)")]
    time: f32,
    #[serde(rename = "Gyroscope X (deg/s)")]
    gyro_x: f32,
    #[serde(rename = "Gyroscope Y (deg/s)")]
    gyro_y: f32,
    #[serde(rename = "Gyroscope Z (deg/s)")]
    gyro_z: f32,
    #[serde(rename = "Accelerometer X (g)")]
    accel_x: f32,
    #[serde(rename = "Accelerometer Y (g)")]
    accel_y: f32,
    #[serde(rename = "Accelerometer Z (g)")]
    accel_z: f32,
    #[serde(rename = "Magnetometer X (G)")]
    mag_x: f32,
    #[serde(rename = "Magnetometer Y (G)")]
    mag_y: f32,
    #[serde(rename = "Magnetometer Z (G)")]
    mag_z: f32,
    #[serde(rename = "Roll (deg)")]
    roll: f32,
    #[serde(rename = "Pitch (deg)")]
    pitch: f32,
    #[serde(rename = "Yaw (deg)")]
    yaw: f32,
}

const ALGORITHMS: [FusionAlgorithm; 5] = [
    FusionAlgorithm::Madgwick,
    FusionAlgorithm::Mahony,
    FusionAlgorithm::Complementary,
    FusionAlgorithm::Fusion,
    FusionAlgorithm::Classic,
];

const COLORS: [RGBColor; 5] = [
    RGBColor(220, 20, 60),
    RGBColor(34, 139, 34),
    RGBColor(30, 144, 255),
    RGBColor(255, 140, 0),
    RGBColor(148, 0, 211),
];

/// Per-tick output of one algorithm run
struct Run {
    algorithm: FusionAlgorithm,
    angles: Vec<(f32, f32, f32)>,
}

/// Fusion filter diagnostics per tick
#[derive(Default)]
struct Diagnostics {
    acceleration_error: Vec<f32>,
    magnetic_error: Vec<f32>,
    initialising: Vec<f32>,
    accelerometer_ignored: Vec<f32>,
    magnetometer_ignored: Vec<f32>,
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("Advanced AHRS Example - all algorithms on the recorded trajectory");

    let mut reader = csv::Reader::from_path("testdata/sensor_data.csv")?;
    let mut sensor_data = Vec::new();
    for result in reader.deserialize() {
        let record: SensorData = result?;
        sensor_data.push(record);
    }
    let Some(last) = sensor_data.last() else {
        return Err("no sensor data".into());
    };
    let time_range = sensor_data[0].time..last.time;

    println!("Processing {} sensor samples...", sensor_data.len());

    let mut runs = Vec::new();
    let mut diagnostics = Diagnostics::default();

    for algorithm in ALGORITHMS {
        let mut ahrs = Ahrs::new(|| 0u64);
        ahrs.set_board_type(BoardType::Nano33BleSenseRev2);
        ahrs.set_fusion_algorithm(algorithm);
        ahrs.set_declination(0.0);
        ahrs.begin();

        let mut angles = Vec::with_capacity(sensor_data.len());
        for (i, data) in sensor_data.iter().enumerate() {
            let delta_time = if i == 0 {
                0.0
            } else {
                data.time - sensor_data[i - 1].time
            };

            ahrs.set_data(SensorSample::new(
                Vector3::new(data.gyro_x, data.gyro_y, data.gyro_z),
                Vector3::new(data.accel_x, data.accel_y, data.accel_z),
                Vector3::new(data.mag_x, data.mag_y, data.mag_z),
            ));
            ahrs.update_with_delta_time(delta_time);

            let euler = ahrs.angles();
            angles.push((euler.roll, euler.pitch, euler.yaw));

            if algorithm == FusionAlgorithm::Fusion {
                let states = ahrs.fusion_internal_states();
                let flags = ahrs.fusion_flags();
                diagnostics.acceleration_error.push(states.acceleration_error);
                diagnostics.magnetic_error.push(states.magnetic_error);
                diagnostics.initialising.push(bool_value(flags.initialising));
                diagnostics
                    .accelerometer_ignored
                    .push(bool_value(states.accelerometer_ignored));
                diagnostics
                    .magnetometer_ignored
                    .push(bool_value(states.magnetometer_ignored));
            }

            if i % 1000 == 0 {
                let display = ahrs.configurator_angles();
                println!(
                    "{:>13} sample {:>5}: roll={:6.1}° pitch={:6.1}° heading={:6.1}°",
                    algorithm.name(),
                    i,
                    display.roll,
                    display.pitch,
                    display.yaw
                );
            }
        }

        runs.push(Run { algorithm, angles });
    }

    println!("Generating plots...");
    create_plots(&sensor_data, &runs, &diagnostics, time_range)?;

    println!("✓ Plots saved to advanced_plots.png");
    Ok(())
}

fn bool_value(flag: bool) -> f32 {
    if flag { 1.0 } else { 0.0 }
}

/// Three Euler angle panels (estimates against truth), two error panels and
/// three flag panels
fn create_plots(
    sensor_data: &[SensorData],
    runs: &[Run],
    diagnostics: &Diagnostics,
    time_range: std::ops::Range<f32>,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new("advanced_plots.png", (1000, 1400)).into_drawing_area();
    root.fill(&WHITE)?;

    let height_ratios = [4, 4, 4, 2, 2, 1, 1, 1];
    let total_height: u32 = height_ratios.iter().sum();
    let mut y_offset = 0;
    let mut areas = Vec::new();
    for &ratio in &height_ratios {
        let height = (ratio * 1400) / total_height;
        areas.push(root.margin(10, 10, y_offset, 1400 - y_offset - height));
        y_offset += height;
    }

    let axes: [(&str, fn(&SensorData) -> f32, fn(&(f32, f32, f32)) -> f32); 3] = [
        ("Roll", |d| d.roll, |e| e.0),
        ("Pitch", |d| d.pitch, |e| e.1),
        ("Yaw", |d| d.yaw, |e| e.2),
    ];

    for (area, (name, truth, estimate)) in areas.iter().zip(axes) {
        let mut chart = ChartBuilder::on(area)
            .caption(name, ("sans-serif", 18))
            .margin(5)
            .x_label_area_size(0)
            .y_label_area_size(50)
            .build_cartesian_2d(time_range.clone(), -180f32..180f32)?;
        chart.configure_mesh().y_desc("Degrees").draw()?;

        chart
            .draw_series(LineSeries::new(
                sensor_data.iter().map(|d| (d.time, truth(d))),
                BLACK.stroke_width(2),
            ))?
            .label("Truth")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLACK));

        for (run, &color) in runs.iter().zip(COLORS.iter()) {
            chart
                .draw_series(LineSeries::new(
                    sensor_data
                        .iter()
                        .zip(run.angles.iter())
                        .map(|(d, e)| (d.time, estimate(e))),
                    color,
                ))?
                .label(run.algorithm.name())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
        }
        chart.configure_series_labels().draw()?;
    }

    create_line_plot(
        &areas[3],
        sensor_data,
        &diagnostics.acceleration_error,
        "Fusion acceleration error",
        time_range.clone(),
    )?;
    create_line_plot(
        &areas[4],
        sensor_data,
        &diagnostics.magnetic_error,
        "Fusion magnetic error",
        time_range.clone(),
    )?;
    create_bool_plot(
        &areas[5],
        sensor_data,
        &diagnostics.initialising,
        "Initialising",
        time_range.clone(),
    )?;
    create_bool_plot(
        &areas[6],
        sensor_data,
        &diagnostics.accelerometer_ignored,
        "Accelerometer ignored",
        time_range.clone(),
    )?;
    create_bool_plot(
        &areas[7],
        sensor_data,
        &diagnostics.magnetometer_ignored,
        "Magnetometer ignored",
        time_range,
    )?;

    root.present()?;
    Ok(())
}

fn create_line_plot(
    area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    sensor_data: &[SensorData],
    values: &[f32],
    label: &str,
    time_range: std::ops::Range<f32>,
) -> Result<(), Box<dyn Error>> {
    let mut chart = ChartBuilder::on(area)
        .margin(5)
        .x_label_area_size(0)
        .y_label_area_size(50)
        .build_cartesian_2d(time_range, 0f32..20f32)?;
    chart.configure_mesh().y_desc("Degrees").draw()?;

    chart
        .draw_series(LineSeries::new(
            sensor_data
                .iter()
                .zip(values.iter())
                .map(|(d, &v)| (d.time, v)),
            &RGBColor(128, 128, 0), // olive
        ))?
        .label(label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], RGBColor(128, 128, 0)));

    chart.configure_series_labels().draw()?;
    Ok(())
}

/// Boolean flag plot showing True/False states over time
fn create_bool_plot(
    area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    sensor_data: &[SensorData],
    values: &[f32],
    label: &str,
    time_range: std::ops::Range<f32>,
) -> Result<(), Box<dyn Error>> {
    let last = label == "Magnetometer ignored";
    let mut chart = ChartBuilder::on(area)
        .margin(5)
        .x_label_area_size(if last { 40 } else { 0 })
        .y_label_area_size(50)
        .build_cartesian_2d(time_range, -0.1f32..1.1f32)?;

    let formatter = |y: &f32| {
        if *y < 0.5 {
            "False".to_string()
        } else {
            "True".to_string()
        }
    };
    let mut mesh = chart.configure_mesh();
    mesh.y_label_formatter(&formatter);
    if last {
        mesh.x_desc("Time (s)");
    }
    mesh.draw()?;

    chart
        .draw_series(LineSeries::new(
            sensor_data
                .iter()
                .zip(values.iter())
                .map(|(d, &v)| (d.time, v)),
            &CYAN,
        ))?
        .label(label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], CYAN));

    chart.configure_series_labels().draw()?;
    Ok(())
}
