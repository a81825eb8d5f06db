use std::path::Path;

use cg_domain::config::{Config, ConfigSeverity};

/// Validate the config and print every issue.
///
/// Returns `false` when at least one error was found.
pub fn validate(config: &Config, config_path: &Path) -> bool {
    let issues = config.validate();
    let shown = config_path.display();

    if issues.is_empty() {
        println!("Config OK ({shown})");
        return true;
    }

    let errors = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{errors} error(s), {} warning(s) in {shown}", issues.len() - errors);

    errors == 0
}

/// Render the resolved config (defaults filled in) as TOML.
pub fn render(config: &Config) -> anyhow::Result<String> {
    toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}
