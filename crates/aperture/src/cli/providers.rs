//! The `aperture providers` command: show which providers would be served.

use aperture_core::config::resolve_env_var;
use aperture_core::{Config, Monitor, ProviderId, ProviderRegistry};
use std::sync::Arc;

/// Print every provider with its model, pricing and readiness.
pub async fn execute(config: &Config) -> anyhow::Result<()> {
    let registry = ProviderRegistry::from_config(config, Arc::new(Monitor::default()))?;

    println!(
        "{:<10} {:<44} {:>12} {:>12} {:>6}  STATUS",
        "PROVIDER", "MODEL", "COST/IMG", "CHARGE/IMG", "BATCH"
    );
    for id in ProviderId::ALL {
        let line = match registry.get(id) {
            Some(p) => format!(
                "{:<10} {:<44} {:>12} {:>12} {:>6}  ready",
                id.as_str(),
                p.model(),
                format!("${:.5}", p.cost_per_image()),
                format!("${:.5}", p.user_charge_per_image()),
                if p.supports_batch() { "yes" } else { "no" },
            ),
            None => {
                let settings = config.providers.settings(id);
                let reason = if !settings.enabled {
                    "disabled".to_string()
                } else if resolve_env_var(&settings.api_key).is_none() {
                    format!("missing key {}", settings.api_key)
                } else {
                    "unavailable".to_string()
                };
                format!(
                    "{:<10} {:<44} {:>12} {:>12} {:>6}  {reason}",
                    id.as_str(), settings.model, "-", "-", "-"
                )
            }
        };
        println!("{line}");
    }
    Ok(())
}
