//! Low-voltage reference networks with grid infeed and motor contribution.

use ikss_algo::{
    compute_fault_currents, FaultCase, ShortCircuitCalculator, ShortCircuitConfig,
};
use ikss_core::{
    Branch, BranchId, Bus, BusId, GridId, GridSource, KilovoltAmperes, Kilovolts, MachineId,
    MachineSource, MegavoltAmperes, Network, SolverKind,
};
use tracing_subscriber::EnvFilter;

const R_OHM_PER_KM: f64 = 0.3211;
const X_OHM_PER_KM: f64 = 0.06911504;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn assert_close(actual: f64, expected: f64, rel: f64, what: &str) {
    let err = (actual - expected).abs() / expected.abs();
    assert!(
        err <= rel,
        "{what}: expected {expected}, got {actual} (relative error {err:.2e})"
    );
}

/// Grid at bus 0, one line, motor at bus 1.
fn two_bus() -> Network {
    let mut network = Network::new();
    network.add_bus(Bus::new(BusId::new(0), "Bus 0", Kilovolts(0.4)));
    network.add_bus(Bus::new(BusId::new(1), "Bus 1", Kilovolts(0.4)));
    network.add_grid(GridSource::new(
        GridId::new(0),
        "Grid",
        BusId::new(0),
        MegavoltAmperes(10.0),
        0.1,
    ));
    network
        .add_branch(Branch::from_line_parameters(
            BranchId::new(0),
            "Line 0-1",
            BusId::new(0),
            BusId::new(1),
            R_OHM_PER_KM,
            X_OHM_PER_KM,
            1.0,
        ))
        .unwrap();
    network.add_machine(MachineSource::new(
        MachineId::new(0),
        "Motor",
        BusId::new(1),
        KilovoltAmperes(0.5),
        7.0,
        0.6,
    ));
    network
}

/// Feeder of two lines with a motor halfway.
fn three_bus() -> Network {
    let mut network = Network::new();
    for id in 0..3 {
        network.add_bus(Bus::new(BusId::new(id), format!("Bus {id}"), Kilovolts(0.4)));
    }
    network.add_grid(
        GridSource::new(
            GridId::new(0),
            "Grid",
            BusId::new(0),
            MegavoltAmperes(5.0),
            0.4,
        )
        .with_min(MegavoltAmperes(1.0), 0.4),
    );
    for (id, from, to) in [(0, 0, 1), (1, 1, 2)] {
        network
            .add_branch(
                Branch::from_line_parameters(
                    BranchId::new(id),
                    format!("Line {from}-{to}"),
                    BusId::new(from),
                    BusId::new(to),
                    R_OHM_PER_KM,
                    X_OHM_PER_KM,
                    1.0,
                )
                .with_end_temperature(165.0),
            )
            .unwrap();
    }
    network.add_machine(MachineSource::new(
        MachineId::new(0),
        "Motor",
        BusId::new(1),
        KilovoltAmperes(5.0),
        7.0,
        0.6,
    ));
    network
}

#[test]
fn two_bus_max_bus_currents() {
    init_tracing();
    let results = compute_fault_currents(&two_bus(), FaultCase::Max, false).unwrap();

    let expected = [14.438745842, 0.763969933];
    for (id, expected) in expected.iter().enumerate() {
        let ikss = results.ikss(BusId::new(id)).unwrap().value();
        assert_close(ikss, *expected, 1e-4, &format!("Ik'' at bus {id}"));
    }
    assert!(results.branches().is_none());
    assert!(results.warnings().is_empty());
}

#[test]
fn three_bus_max_currents() {
    init_tracing();
    let results = compute_fault_currents(&three_bus(), FaultCase::Max, true).unwrap();

    let bus_expected = [7.268628890, 0.769333153, 0.386529578];
    for (id, expected) in bus_expected.iter().enumerate() {
        let ikss = results.ikss(BusId::new(id)).unwrap().value();
        assert_close(ikss, *expected, 1e-4, &format!("Ik'' at bus {id}"));
    }

    let branch_expected = [0.72719542, 0.38652958];
    for (id, expected) in branch_expected.iter().enumerate() {
        let branch = results.branch(BranchId::new(id)).unwrap();
        assert_close(
            branch.ikss_ka.unwrap().value(),
            *expected,
            1e-4,
            &format!("branch {id}"),
        );
    }
    // the last line carries the whole current of a fault at its end
    assert_eq!(
        results.branch(BranchId::new(1)).unwrap().fault_bus,
        Some(BusId::new(2))
    );
}

#[test]
fn three_bus_min_currents() {
    init_tracing();
    let results = compute_fault_currents(&three_bus(), FaultCase::Min, true).unwrap();

    let bus_expected = [1.486819071, 0.403240136, 0.210030419];
    for (id, expected) in bus_expected.iter().enumerate() {
        let ikss = results.ikss(BusId::new(id)).unwrap().value();
        assert_close(ikss, *expected, 1e-4, &format!("Ik'' at bus {id}"));
    }

    let branch_expected = [0.0447011029, 0.2100304187];
    for (id, expected) in branch_expected.iter().enumerate() {
        let branch = results.branch(BranchId::new(id)).unwrap();
        assert_close(
            branch.ikss_ka.unwrap().value(),
            *expected,
            1e-4,
            &format!("branch {id}"),
        );
    }
}

#[test]
fn backends_agree() {
    for case in FaultCase::all() {
        let faer = ShortCircuitCalculator::new()
            .with_solver(SolverKind::Faer)
            .with_branch_results(true)
            .compute(&three_bus(), case)
            .unwrap();
        let gauss = ShortCircuitCalculator::new()
            .with_solver(SolverKind::Gauss)
            .with_branch_results(true)
            .compute(&three_bus(), case)
            .unwrap();

        for id in 0..3 {
            let bus = BusId::new(id);
            assert_close(
                gauss.ikss(bus).unwrap().value(),
                faer.ikss(bus).unwrap().value(),
                1e-10,
                &format!("{case} Ik'' at bus {id}"),
            );
        }
        for id in 0..2 {
            let branch = BranchId::new(id);
            assert_close(
                gauss.branch(branch).unwrap().ikss_ka.unwrap().value(),
                faer.branch(branch).unwrap().ikss_ka.unwrap().value(),
                1e-10,
                &format!("{case} branch {id}"),
            );
        }
    }
}

#[test]
fn peak_current_and_power_follow_ikss() {
    let results = compute_fault_currents(&three_bus(), FaultCase::Max, false).unwrap();
    for bus in results.buses().values() {
        let ikss = bus.ikss_ka.unwrap().value();
        let kappa = bus.kappa.unwrap();
        assert!((1.02..=2.0).contains(&kappa));
        assert_close(
            bus.ip_ka.unwrap().value(),
            kappa * std::f64::consts::SQRT_2 * ikss,
            1e-12,
            "ip",
        );
        assert_close(
            bus.skss_mva.unwrap().value(),
            3.0_f64.sqrt() * 0.4 * ikss,
            1e-12,
            "Sk''",
        );
        assert!(bus.rk_ohm.unwrap().value() > 0.0);
        assert!(bus.xk_ohm.unwrap().value() > 0.0);
    }
}

#[test]
fn config_file_drives_the_calculation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short_circuit.toml");
    let config = ShortCircuitConfig {
        solver: SolverKind::Gauss,
        branch_results: true,
        ..ShortCircuitConfig::default()
    };
    config.save_to(&path).unwrap();

    let loaded = ShortCircuitConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let results = ShortCircuitCalculator::new()
        .with_config(loaded)
        .compute(&three_bus(), FaultCase::Max)
        .unwrap();
    assert!(results.branches().is_some());
    assert_close(
        results.ikss(BusId::new(0)).unwrap().value(),
        7.268628890,
        1e-4,
        "Ik'' at bus 0",
    );
}
