use stepplan::logger::Logger;
use stepplan::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Logger::init_tracing();

    let mut registry = FunctionRegistry::new();
    registry.register(
        NativeFunction::new("writer", "outline", |vars: Variables| async move {
            let topic = vars.get("topic").unwrap_or("nothing");
            Ok(format!("outline about {topic}"))
        })
        .shared(),
    )?;
    registry.register(
        NativeFunction::new("writer", "draft", |vars: Variables| async move {
            Ok(format!("{} in a {} tone", vars.input(), vars.get("tone").unwrap_or("plain")))
        })
        .shared(),
    )?;

    let mut plan = PlanBuilder::new("write this week's newsletter")
        .name("newsletter")
        .state("topic", "owls")
        .step_with(registry.get("writer.outline")?, |leaf| leaf.with_output("outline"))
        .step_with(registry.get("writer.draft")?, |leaf| {
            leaf.with_parameter("tone", "dry, about $topic")
        })
        .output("newsletter")
        .build();

    // run the first step, save, and pick up again from the file
    let mut ctx = ExecutionContext::with_input("start");
    plan.invoke_next_step(&mut ctx).await?;

    let path = std::env::temp_dir().join("stepplan-newsletter.yaml");
    PlanLoader::save_plan(&plan, &path)?;
    println!("{}", std::fs::read_to_string(&path)?);

    let mut resumed = PlanLoader::load_plan_file(&path, &registry)?;
    let result = resumed.invoke(&mut ctx).await?;

    println!("newsletter: {}", result.try_get_output("newsletter").unwrap_or_default());
    Logger::for_context(&ctx).log_run_summary(&ctx);
    Ok(())
}
