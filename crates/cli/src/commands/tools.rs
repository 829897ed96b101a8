//! `loopwright tools`: connect the configured sources and print the catalog.

use std::path::Path;
use std::sync::Arc;

use loopwright_core::namespace;
use loopwright_mcp::RemoteSourceManager;
use loopwright_tools::ToolScope;

pub async fn run(config_path: Option<&Path>, only: &[String]) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let registry = Arc::new(loopwright_tools::default_registry());
    let sources = RemoteSourceManager::new(registry.clone());

    let outcomes = sources.connect_all(config.enabled_sources()).await;
    let scope = ToolScope::new(only, true);
    let tools = scope.visible(&registry);

    println!();
    for (id, outcome) in &outcomes {
        match outcome {
            Ok(report) => println!("  ✅ {id}: {} tools", report.tools.len()),
            Err(e) => println!("  ❌ {id}: {e}"),
        }
    }
    if !outcomes.is_empty() {
        println!();
    }

    for tool in &tools {
        let origin = match namespace::parse(&tool.name) {
            (Some(source), _) => source.to_string(),
            (None, _) => "local".to_string(),
        };
        println!("  {:<40} [{origin}]", tool.name);
        println!("      {}", tool.description);
    }
    println!();
    println!("  {} tools visible", tools.len());

    sources.shutdown().await;
    Ok(())
}
