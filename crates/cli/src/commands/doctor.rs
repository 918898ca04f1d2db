//! `weekforge doctor`: diagnose config and inputs.

use super::inputs;
use std::path::Path;
use weekforge_providers::build_generator;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 weekforge doctor");
    println!("===================\n");

    let mut issues = 0;

    let path = inputs::config_path(config_path);
    if !path.exists() {
        println!("  ⚠️  No {} (defaults apply) — run `weekforge init`", path.display());
        issues += 1;
    }

    let config = match inputs::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running other checks.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
        match build_generator(&config) {
            Ok(generator) => match generator.health_check().await {
                Ok(true) => println!("  ✅ {} endpoint reachable", generator.name()),
                Ok(false) | Err(_) => {
                    println!("  ❌ {} endpoint not reachable", generator.name());
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Generator unavailable: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ❌ No API key — set WEEKFORGE_API_KEY or OPENAI_API_KEY");
        issues += 1;
    }

    if config.search_api_key.is_some() {
        println!("  ✅ Search key configured");
    } else {
        println!("  ⚠️  No TAVILY_API_KEY — sections asking for recent material get no web sources");
    }

    match &config.azure {
        Some(azure) => println!("  ✅ Azure deployment: {}", azure.deployment),
        None => println!("  ✅ Endpoint: {} ({})", config.api_url, config.default_model),
    }

    match inputs::load_sections(None) {
        Ok(sections) if sections.is_empty() => {
            println!("  ❌ Section list is empty");
            issues += 1;
        }
        Ok(sections) => println!("  ✅ {} sections", sections.len()),
        Err(e) => {
            println!("  ❌ Section list invalid: {e}");
            issues += 1;
        }
    }

    for (name, file) in [
        ("Syllabus", config.paths.syllabus()),
        ("Template", config.paths.template()),
        ("Guidelines", config.paths.guidelines()),
    ] {
        match std::fs::metadata(&file) {
            Ok(meta) if meta.len() > 0 => println!("  ✅ {name}: {}", file.display()),
            Ok(_) => {
                println!("  ⚠️  {name} is empty: {}", file.display());
                issues += 1;
            }
            Err(_) => {
                println!("  ⚠️  {name} missing: {}", file.display());
                issues += 1;
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
