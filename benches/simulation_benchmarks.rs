use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mna_core::element::SweepType;
use mna_core::Circuit;

fn rc_circuit() -> Circuit {
    let mut c = Circuit::new();
    c.mark_ground("0");
    c.add_voltage_source("V1", "1", "0", 5.0).unwrap();
    c.add_resistor("R1", "1", "2", 1000.0).unwrap();
    c.add_capacitor("C1", "2", "0", 1e-9).unwrap();
    c
}

fn bench_operating_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("operating_point");
    let circuit = rc_circuit();

    group.bench_function("dc", |b| {
        b.iter(|| {
            let mut circuit = circuit.clone();
            circuit.dc().unwrap();
        });
    });

    group.finish();
}

fn bench_matrix_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_solver");

    for size in [10, 50, 100, 200].iter() {
        group.bench_with_input(BenchmarkId::new("gaussian_elimination", size), size, |b, &size| {
            use mna_core::solver::{solve_real, DEFAULT_PIVOT_EPSILON};
            use nalgebra::{DMatrix, DVector};

            // A tridiagonal matrix, diagonally dominant enough to avoid an
            // accidental singular pivot across sizes.
            let mut matrix = DMatrix::<f64>::zeros(size, size);
            for i in 0..size {
                matrix[(i, i)] = 2.0;
                if i > 0 {
                    matrix[(i, i - 1)] = -1.0;
                    matrix[(i - 1, i)] = -1.0;
                }
            }
            let rhs = DVector::from_element(size, 1.0);

            b.iter(|| solve_real(matrix.clone(), rhs.clone(), DEFAULT_PIVOT_EPSILON).unwrap());
        });
    }

    group.finish();
}

fn bench_transient_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("transient_analysis");
    let circuit = rc_circuit();

    group.bench_function("transient_100_steps", |b| {
        b.iter(|| {
            let mut circuit = circuit.clone();
            circuit.transient(1e-9, 100e-9).unwrap();
        });
    });

    group.finish();
}

fn bench_ac_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("ac_sweep");

    let mut circuit = Circuit::new();
    circuit.mark_ground("0");
    circuit
        .add_ac_voltage_source("V1", "in", "0", 1.0, 0.0, 1000.0)
        .unwrap();
    circuit.add_resistor("R1", "in", "out", 1000.0).unwrap();
    circuit.add_capacitor("C1", "out", "0", 159.15e-9).unwrap();

    group.bench_function("decade_50_points", |b| {
        b.iter(|| {
            let mut circuit = circuit.clone();
            circuit
                .ac_sweep("V1", 1.0, 100_000.0, 50, SweepType::Decade)
                .unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_operating_point,
    bench_matrix_sizes,
    bench_transient_analysis,
    bench_ac_sweep
);
criterion_main!(benches);
