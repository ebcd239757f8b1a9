use popdyn_core::grid::Resolution;
use popdyn_core::integrator::SolverKind;
use popdyn_core::metrics::{MetricValue, Outlook};
use popdyn_core::models::ModelKind;
use popdyn_core::parameters::validate;
use popdyn_core::simulation::{simulate, SeriesReport, SimulationOutput, SimulationRequest};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn series(output: &SimulationOutput) -> &SeriesReport {
    output.series().expect("time-series output")
}

fn sir(beta: f64, gamma: f64) -> SimulationRequest {
    SimulationRequest::new(ModelKind::Sir)
        .with_parameter("N", 1000.0)
        .with_parameter("beta", beta)
        .with_parameter("gamma", gamma)
        .with_parameter("I0", 1.0)
        .with_parameter("t_max", 100.0)
}

fn assert_conserved(request: &SimulationRequest, population: f64) {
    let output = simulate(request);
    let report = series(&output);
    assert_eq!(report.failure, None, "{request:?}");
    for i in 0..report.trajectory.len() {
        let total = report.trajectory.total(i).expect("row");
        assert!(
            ((total - population) / population).abs() < 1e-6,
            "{} with {:?}: total {total} at t = {}",
            report.model,
            report.solver,
            report.trajectory.times[i]
        );
    }
}

#[test]
fn compartmental_models_conserve_population() {
    init_logging();
    let requests = [
        (sir(0.24, 0.1), 1000.0),
        (sir(0.24, 0.1).with_solver(SolverKind::Euler), 1000.0),
        (sir(0.24, 0.1).with_solver(SolverKind::Rk4), 1000.0),
        (SimulationRequest::new(ModelKind::Seir), 1000.0),
        (SimulationRequest::new(ModelKind::CohortSir), 100_000.0),
        (SimulationRequest::new(ModelKind::RumorSir), 275.0),
    ];
    for (request, population) in requests {
        assert_conserved(&request, population);
    }
}

#[test]
fn conservation_holds_across_parameter_sweep() {
    init_logging();
    // (N, infected at t = 0), from a single individual to a nearly saturated start.
    let starts = [(1.0, 0.999), (1000.0, 1.0), (1000.0, 990.0), (1e6, 10.0)];
    for solver in [SolverKind::Euler, SolverKind::Rk4, SolverKind::Adaptive] {
        for (n, infected) in starts {
            for (beta, gamma) in [(0.05, 0.1), (0.5, 0.0), (1.0, 0.1), (1.0, 1.0)] {
                let request = sir(beta, gamma)
                    .with_parameter("N", n)
                    .with_parameter("I0", infected)
                    .with_solver(solver);
                assert_conserved(&request, n);
            }
            for (beta, sigma, gamma) in [(0.05, 0.2, 0.1), (0.5, 0.5, 0.01), (0.3, 0.01, 0.5)] {
                let request = SimulationRequest::new(ModelKind::Seir)
                    .with_parameter("N", n)
                    .with_parameter("beta", beta)
                    .with_parameter("sigma", sigma)
                    .with_parameter("gamma", gamma)
                    .with_parameter("E0", infected / 2.0)
                    .with_parameter("I0", infected / 2.0)
                    .with_solver(solver);
                assert_conserved(&request, n);
            }
        }
    }
}

#[test]
fn recovered_never_decreases() {
    init_logging();
    for request in [
        sir(0.24, 0.1),
        sir(0.5, 0.05).with_solver(SolverKind::Euler),
        SimulationRequest::new(ModelKind::Seir),
        SimulationRequest::new(ModelKind::RumorSir),
    ] {
        let output = simulate(&request);
        let recovered = series(&output).trajectory.series("R").expect("R series");
        for pair in recovered.windows(2) {
            assert!(pair[1] >= pair[0], "R decreased: {} -> {}", pair[0], pair[1]);
        }
    }
}

#[test]
fn reproduction_number_threshold() {
    init_logging();
    let output = simulate(&sir(0.3, 0.1));
    let infected = series(&output).trajectory.series("I").expect("I series");
    assert!(infected.iter().skip(1).any(|i| *i > infected[0]));

    let output = simulate(&sir(0.05, 0.1));
    let report = series(&output);
    let infected = report.trajectory.series("I").expect("I series");
    assert!(infected[1] <= infected[0]);
    let epidemic = report
        .metrics
        .as_ref()
        .and_then(|m| m.epidemic.as_ref())
        .expect("epidemic metrics");
    assert_eq!(epidemic.outlook, Some(Outlook::Declining));
}

#[test]
fn identical_requests_give_identical_results() {
    init_logging();
    for kind in ModelKind::ALL {
        let request = SimulationRequest::new(kind);
        assert_eq!(simulate(&request), simulate(&request), "{kind}");
    }
}

#[test]
fn zero_recovery_rate_reports_undefined_reproduction_number() {
    init_logging();
    let output = simulate(&sir(0.3, 0.0));
    let report = series(&output);
    assert_eq!(report.failure, None);
    let epidemic = report
        .metrics
        .as_ref()
        .and_then(|m| m.epidemic.as_ref())
        .expect("epidemic metrics");
    assert_eq!(epidemic.reproduction_number, Some(MetricValue::Undefined));
    assert_eq!(epidemic.outlook, Some(Outlook::Undefined));

    let json = serde_json::to_string(&output).expect("serialize");
    assert!(
        json.contains(r#""reproduction_number":{"status":"undefined"}"#),
        "{json}"
    );
}

#[test]
fn sir_euler_reference_scenario() {
    init_logging();
    let request = sir(0.24, 0.1)
        .with_solver(SolverKind::Euler)
        .with_resolution(Resolution::Step(1.0));
    let output = simulate(&request);
    let report = series(&output);
    assert_eq!(report.trajectory.len(), 101);

    let epidemic = report
        .metrics
        .as_ref()
        .and_then(|m| m.epidemic.as_ref())
        .expect("epidemic metrics");
    assert_eq!(epidemic.infection_peak.index, 54);
    assert_eq!(epidemic.infection_peak.time, 54.0);
    assert!(epidemic.infection_peak.value > 200.0);
    assert!((epidemic.final_recovered - 860.6).abs() < 1.0);
    assert!((epidemic.attack_rate_percent - 86.06).abs() < 0.1);
    assert_eq!(epidemic.reproduction_number, Some(MetricValue::Defined(0.24 / 0.1)));
    assert_eq!(epidemic.outlook, Some(Outlook::Growing));
}

#[test]
fn exponential_reference_value() {
    init_logging();
    let request = SimulationRequest::new(ModelKind::Exponential)
        .with_parameter("P0", 100.0)
        .with_parameter("r", 0.03)
        .with_parameter("t_max", 100.0);
    for request in [request.clone(), request.with_solver(SolverKind::Adaptive)] {
        let output = simulate(&request);
        let report = series(&output);
        let last = *report.trajectory.series("P").expect("P").last().expect("last");
        assert!((last - 2008.55).abs() / 2008.55 < 0.01, "{last}");
    }
}

#[test]
fn logistic_reaches_capacity() {
    init_logging();
    let request = SimulationRequest::new(ModelKind::Logistic)
        .with_parameter("P0", 100.0)
        .with_parameter("r", 0.1)
        .with_parameter("K", 1000.0)
        .with_parameter("t_max", 150.0);
    let output = simulate(&request);
    let report = series(&output);
    let last = *report.trajectory.series("P").expect("P").last().expect("last");
    assert!((1000.0 - last).abs() / 1000.0 < 1e-3, "{last}");

    let growth = report
        .metrics
        .as_ref()
        .and_then(|m| m.growth.as_ref())
        .expect("growth metrics");
    assert_eq!(growth.carrying_capacity, Some(1000.0));
    let t99 = growth.time_to_capacity.expect("time to capacity");
    assert!(t99 > 60.0 && t99 < 70.0, "{t99}");
}

#[test]
fn validation_is_idempotent_through_simulate() {
    init_logging();
    let request = SimulationRequest::new(ModelKind::Seir)
        .with_parameter("N", 50.0)
        .with_parameter("E0", 80.0)
        .with_parameter("I0", 5.0)
        .with_parameter("beta", -1.0);
    let output = simulate(&request);
    let report = series(&output);
    assert!(!report.adjustments.is_empty());

    let again = validate(ModelKind::Seir, &report.parameters.to_raw());
    assert_eq!(again.parameters, report.parameters);
    assert!(again.adjustments.is_empty());
}

#[test]
fn seir_reports_incubation_and_peak_delay() {
    init_logging();
    let output = simulate(&SimulationRequest::new(ModelKind::Seir));
    let report = series(&output);
    let metrics = report.metrics.as_ref().expect("metrics");
    let exposure = metrics.exposure.as_ref().expect("exposure metrics");
    assert_eq!(exposure.incubation_period, MetricValue::Defined(5.0));
    let infected_peak = metrics.peak("I").expect("I peak");
    assert_eq!(
        exposure.peak_delay,
        infected_peak.time - exposure.exposed_peak.time
    );
    assert!(report.trajectory.series.iter().flatten().all(|v| *v >= 0.0));
}

#[test]
fn vector_field_defaults() {
    init_logging();
    let output = simulate(&SimulationRequest::new(ModelKind::VectorField));
    let report = output.field().expect("field output");
    assert_eq!((report.dx.as_str(), report.dy.as_str()), ("sin(y)", "cos(x)"));
    assert_eq!(report.field.points.len(), 225);
    assert!(report.field.max_magnitude <= 2.0_f64.sqrt() + 1e-12);
    assert!(report.field.min_magnitude >= 0.0);
}
