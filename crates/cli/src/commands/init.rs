//! `weekforge init`: first-time setup.

use super::inputs;
use std::path::Path;
use weekforge_config::{AppConfig, SECTIONS_FILE, default_sections_toml};

pub async fn run(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = inputs::config_path(config_path);
    let sections_path = config_path
        .parent()
        .map_or_else(|| SECTIONS_FILE.into(), |dir| dir.join(SECTIONS_FILE));

    println!("📚 weekforge: First-Time Setup");
    println!("==============================\n");

    write_unless_present(&config_path, &AppConfig::default_toml(), force)?;
    write_unless_present(&sections_path, &default_sections_toml(), force)?;

    let paths = AppConfig::default().paths;
    let base = config_path.parent().unwrap_or(Path::new(""));
    for dir in [&paths.input_dir, &paths.output_dir, &paths.run_logs_dir] {
        let dir = base.join(dir);
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            println!("✅ Created {}", dir.display());
        }
    }

    println!("\n📝 Next steps:");
    println!(
        "   1. Put syllabus.md, template.md, and guidelines.md in {}",
        base.join(&paths.input_dir).display()
    );
    println!("   2. Set WEEKFORGE_API_KEY (or api_key in {})", config_path.display());
    println!("   3. Run: weekforge generate --week 1 --dry-run\n");

    Ok(())
}

fn write_unless_present(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        println!("⚠️  {} already exists, leaving it (use --force to overwrite)", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}
