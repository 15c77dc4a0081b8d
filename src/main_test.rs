use gwconform::suite::{ConformanceTest, ShardSettings, TestRegistry};

fn registry() -> TestRegistry {
    let mut registry = TestRegistry::new();
    for name in ["Compression", "BasicAuth", "ClientMTLS", "Tracing"] {
        registry
            .register(ConformanceTest::new(name, ""))
            .expect("register");
    }
    registry
}

#[test]
fn test_render_sharded_plan() {
    let registry = registry();
    let settings = ShardSettings {
        total: Some("2".to_string()),
        index: Some("0".to_string()),
        run_test: None,
    };

    let plan = registry.plan(&settings).expect("plan");

    // Sorted: BasicAuth, ClientMTLS, Compression, Tracing
    assert_eq!(crate::render_plan(&plan), "BasicAuth\nCompression\n");
}

#[test]
fn test_render_unsharded_plan_keeps_registration_order() {
    let registry = registry();

    let plan = registry.plan(&ShardSettings::default()).expect("plan");

    assert_eq!(
        crate::render_plan(&plan),
        "Compression\nBasicAuth\nClientMTLS\nTracing\n"
    );
}

#[test]
fn test_render_single_test_plan() {
    let registry = registry();
    let settings = ShardSettings {
        total: Some("3".to_string()),
        index: Some("7".to_string()),
        run_test: Some("ClientMTLS".to_string()),
    };

    let plan = registry.plan(&settings).expect("plan");

    assert_eq!(plan.tests.len(), 4);
    assert_eq!(crate::render_plan(&plan), "ClientMTLS\n");
}
