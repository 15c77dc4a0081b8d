use gwconform::suite::{PlanMode, ShardPlan, TestRegistry};
use gwconform::Config;
use tracing::{error, info};

/// Short names this worker runs, one per line in execution order
///
/// A single requested test narrows the full list down to that test.
pub fn render_plan(plan: &ShardPlan<'_>) -> String {
    let mut out = String::new();
    for name in plan.short_names() {
        if let PlanMode::RunTest(requested) = &plan.mode {
            if name != requested.as_str() {
                continue;
            }
        }
        out.push_str(name);
        out.push('\n');
    }
    out
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the plan
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let registry = TestRegistry::load_catalog(&config.catalog_path)?;

    let plan = match registry.plan(&config.shard) {
        Ok(plan) => plan,
        Err(e) => {
            error!(error = %e, "Refusing to run with an invalid shard configuration");
            return Err(e.into());
        }
    };

    match &plan.mode {
        PlanMode::RunTest(name) if registry.get(name).is_none() => {
            error!(test = %name, "Requested test is not registered");
            anyhow::bail!("test {:?} is not registered", name);
        }
        PlanMode::RunTest(name) => info!(test = %name, "Running single test"),
        PlanMode::Unsharded => info!(tests = plan.tests.len(), "Sharding disabled"),
        PlanMode::Sharded(shard) => info!(
            total = shard.total,
            index = shard.index,
            tests = plan.tests.len(),
            "Running shard"
        ),
    }

    print!("{}", render_plan(&plan));

    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
