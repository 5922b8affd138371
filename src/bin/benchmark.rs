//! Propagator timing suite

use gratingsim::{GsmBeam, Interferometer, PropagationStats, SimulationParameters};

use ndarray::Array1;
use std::time::Instant;

const HALF_WIDTH: f64 = 5.0e-4;

fn benchmark_initial_profile(base: &SimulationParameters) {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK: Initial Intensity Profile");
    println!("{}", "=".repeat(60));

    for &resolution in &[256, 1024, 4096, 16384] {
        let params = SimulationParameters {
            resolution,
            ..base.clone()
        };
        let sim = Interferometer::new(&params);
        let x = params.sample_positions(HALF_WIDTH);
        let mut intensity = Array1::zeros(resolution);

        let n_iters = 100;
        let start = Instant::now();
        for _ in 0..n_iters {
            sim.initial_intensity(params.z_position_1st_grating, &x, &mut intensity);
        }
        let elapsed = start.elapsed().as_secs_f64() / n_iters as f64;

        println!("  {:>6} samples: {:.1} μs", resolution, elapsed * 1e6);
    }
}

fn benchmark_single_grating(base: &SimulationParameters, beam: &GsmBeam) {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK: Single-Grating Propagator");
    println!("{}", "=".repeat(60));

    let z = 0.5 * (base.z_position_1st_grating + base.z_position_2nd_grating);

    for &resolution in &[256, 1024, 4096] {
        let params = SimulationParameters {
            resolution,
            ..base.clone()
        };
        let sim = Interferometer::new(&params);
        let x = params.sample_positions(HALF_WIDTH);

        let n_iters = 20;
        let mut kept = 0;
        let start = Instant::now();
        for _ in 0..n_iters {
            let mut intensity = Array1::zeros(resolution);
            kept = sim.intensity_after_first_grating(z, beam, &x, &mut intensity).terms_included;
        }
        let elapsed = start.elapsed().as_secs_f64() / n_iters as f64;

        println!(
            "  {:>6} samples: {:.3} ms ({} order pairs kept)",
            resolution,
            elapsed * 1000.0,
            kept
        );
    }
}

fn benchmark_double_grating(base: &SimulationParameters, beam: &GsmBeam) {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK: Double-Grating Propagator");
    println!("{}", "=".repeat(60));

    let z = base.z_position_2nd_grating + (base.z_position_2nd_grating - base.z_position_1st_grating);

    for &resolution in &[64, 256, 1024] {
        let params = SimulationParameters {
            resolution,
            ..base.clone()
        };
        let sim = Interferometer::new(&params);
        let x = params.sample_positions(HALF_WIDTH);

        let n_iters = 5;
        let mut stats = PropagationStats::default();
        let start = Instant::now();
        for _ in 0..n_iters {
            let mut intensity = Array1::zeros(resolution);
            stats = sim.intensity_after_second_grating(z, beam, &x, &mut intensity);
        }
        let elapsed = start.elapsed().as_secs_f64() / n_iters as f64;

        let evaluations = resolution * stats.terms_included;
        println!(
            "  {:>6} samples: {:.3} ms ({}/{} quadruples kept)",
            resolution,
            elapsed * 1000.0,
            stats.terms_included,
            stats.terms_evaluated
        );
        println!("         Throughput: {:.2} Mterms/s", evaluations as f64 / elapsed / 1e6);
    }
}

fn benchmark_order_window(base: &SimulationParameters, beam: &GsmBeam) {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK: Order Window Scaling (double grating)");
    println!("{}", "=".repeat(60));

    let z = base.z_position_2nd_grating + 1.0;

    for &orders in &[3, 5, 7, 9] {
        let params = SimulationParameters {
            resolution: 256,
            diffraction_orders: orders,
            ..base.clone()
        };
        let sim = Interferometer::new(&params);
        let x = params.sample_positions(HALF_WIDTH);
        let mut intensity = Array1::zeros(params.resolution);

        let stats = sim.intensity_after_second_grating(z, beam, &x, &mut intensity);
        println!(
            "  ±{}: {:.3} ms, {} of {} terms kept",
            orders,
            stats.elapsed.as_secs_f64() * 1000.0,
            stats.terms_included,
            stats.terms_evaluated
        );
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let params = match std::env::args().nth(1) {
        Some(path) => match SimulationParameters::load(&path) {
            Ok(params) => params,
            Err(e) => {
                eprintln!("failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SimulationParameters::default(),
    };
    let beam = Interferometer::new(&params).beam_at_first_grating();
    log::info!(
        "beam at grating 1: width {:.3e} m, coherence {:.3e} m, radius {:.3e} m",
        beam.width,
        beam.coherence_width,
        beam.curvature_radius
    );

    println!("\n{}", "#".repeat(60));
    println!("#  GSM Grating Propagator Benchmark Suite");
    println!("{}", "#".repeat(60));

    benchmark_initial_profile(&params);
    benchmark_single_grating(&params, &beam);
    benchmark_double_grating(&params, &beam);
    benchmark_order_window(&params, &beam);

    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK COMPLETE");
    println!("{}", "=".repeat(60));
}
