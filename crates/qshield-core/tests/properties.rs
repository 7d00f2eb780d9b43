use qshield_core::{
    AlertSeverity, EngineConfig, EngineError, ThreatLevel, ThreatStateEngine, ThreatStatus,
    classify_threat_level, recommendation_for,
};

const EPS: f64 = 1e-9;

fn engine() -> ThreatStateEngine {
    ThreatStateEngine::new(EngineConfig {
        seed: Some(7),
        ..EngineConfig::default()
    })
}

#[test]
fn high_samples_add_point_three_until_clamped() {
    let samples = [0.111, 0.12, 0.25, 0.5, 0.99, 1.0, 7.5];
    for &s in &samples {
        let mut e = engine();
        let mut expected = e.anomaly_score();
        for _ in 0..12 {
            let obs = e.observe_error_rate_sample(s);
            expected = (expected + 0.3).min(3.0);
            assert!(
                (obs.new_anomaly_score - expected).abs() < EPS,
                "sample {} gave {} expected {}",
                s,
                obs.new_anomaly_score,
                expected
            );
            assert!(obs.alert_emitted);
        }
        assert!((e.anomaly_score() - 3.0).abs() < EPS);
    }
}

#[test]
fn low_samples_subtract_point_one_until_floored() {
    let mut e = engine();
    for _ in 0..8 {
        e.observe_error_rate_sample(0.8);
    }
    let start = e.anomaly_score();
    assert!(start > 2.0);

    let mut expected = start;
    for s in [0.0, 0.02, 0.05, 0.11, -0.4].iter().cycle().take(40) {
        let obs = e.observe_error_rate_sample(*s);
        expected = (expected - 0.1).max(0.1);
        assert!((obs.new_anomaly_score - expected).abs() < EPS);
        assert!(!obs.alert_emitted);
    }
    assert!((e.anomaly_score() - 0.1).abs() < EPS);
}

#[test]
fn score_stays_in_bounds_across_mixed_operations() {
    let mut e = engine();
    e.reset();
    let script = [0.5, 0.01, 0.3, 0.3, 0.3, 0.02, 0.9, 0.9, 0.9, 0.9, 0.9, 0.9, 0.9, 0.9, 0.0];
    for (i, s) in script.iter().cycle().take(300).enumerate() {
        match i % 37 {
            11 => {
                e.trigger_anomaly();
            }
            23 => {
                e.simulate_eavesdropping();
            }
            31 => {
                e.reset();
            }
            _ => {
                e.observe_error_rate_sample(*s);
            }
        }
        let score = e.anomaly_score();
        assert!((0.1 - EPS..=3.0 + EPS).contains(&score), "score {} out of bounds", score);
        assert!(e.state().recent_alerts.len() <= 5);
    }
}

#[test]
fn trigger_anomaly_is_independent_of_prior_state() {
    for warmup in [0usize, 3, 20] {
        let mut e = engine();
        for _ in 0..warmup {
            e.observe_error_rate_sample(0.4);
        }
        let state = e.trigger_anomaly();
        assert!(state.is_under_attack);
        assert!((state.anomaly_score - 2.5).abs() < EPS);
        assert_eq!(state.status, ThreatStatus::UnderAttack);
    }
}

#[test]
fn reset_restores_defaults_and_is_idempotent() {
    let mut e = engine();
    e.observe_error_rate_sample(0.3);
    e.simulate_eavesdropping();

    let once = e.reset();
    assert!(!once.is_under_attack);
    assert!((once.anomaly_score - 0.1).abs() < EPS);
    assert!(once.recent_alerts.is_empty());
    assert!(once.qber_history.is_empty());

    let twice = e.reset();
    assert_eq!(once, twice);
}

#[test]
fn alerts_are_bounded_newest_first() {
    let mut e = engine();
    for i in 0..9 {
        e.observe_error_rate_sample(0.2 + i as f64 / 100.0);
    }
    e.trigger_anomaly();

    let alerts: Vec<_> = e.state().recent_alerts.iter().collect();
    assert_eq!(alerts.len(), 5);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    assert_eq!(alerts[1].message, "High QBER detected: 0.280 (threshold: 0.11)");
    assert_eq!(alerts[4].message, "High QBER detected: 0.250 (threshold: 0.11)");
}

#[test]
fn key_exchange_lengths_and_errors() {
    let mut e = engine();
    assert!(matches!(e.start_key_exchange(0), Err(EngineError::InvalidArgument(_))));
    assert!(matches!(e.start_key_exchange(-5), Err(EngineError::InvalidArgument(_))));

    assert_eq!(e.start_key_exchange(100).unwrap().shared_key.len(), 19);
    e.simulate_eavesdropping();
    assert_eq!(e.start_key_exchange(100).unwrap().shared_key.len(), 16);
}

#[test]
fn classification_scenario() {
    assert_eq!(classify_threat_level(0.1), ThreatLevel::Low);
    assert_eq!(recommendation_for(0.1), "Continue key exchange - Normal operation");
    assert_eq!(classify_threat_level(0.8), ThreatLevel::Medium);
    assert_eq!(
        recommendation_for(0.8),
        "Monitor closely - Elevated error rate detected"
    );
    assert_eq!(classify_threat_level(2.5), ThreatLevel::High);
    assert_eq!(
        recommendation_for(2.5),
        "Abort key exchange - Possible eavesdropping detected"
    );
}

#[test]
fn engine_history_assessment_sees_observed_qber() {
    let mut e = engine();
    e.observe_error_rate_sample(0.03);
    e.observe_error_rate_sample(0.19);
    let assessment = e.assess_history(&[0.96, 0.97]);
    assert_eq!(assessment.qber_level, Some(0.19));
    assert_eq!(assessment.alerts.len(), 2);
}
