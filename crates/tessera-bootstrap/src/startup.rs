//! Startup output.

use crate::Inventory;
use tessera_config::DatabaseConfig;
use tracing::info;

/// Prints the startup banner.
pub fn print_banner() {
    info!(r#"
  ______
 /_  __/__  _____________  _________ _
  / / / _ \/ ___/ ___/ _ \/ ___/ __ `/
 / / /  __(__  |__  )  __/ /  / /_/ /
/_/  \___/____/____/\___/_/   \__,_/

                metadata store
    "#);
}

/// Prints where the store lives and what it holds.
pub fn print_inventory(database: &DatabaseConfig, inventory: &Inventory) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("Database:             {}", database.url);
    info!("Principals:           {}", inventory.principals);
    info!("Teams:                {}", inventory.teams);
    info!("Nodes:                {}", inventory.nodes);
    info!("Access requirements:  {}", inventory.access_requirements);
    info!("Access approvals:     {}", inventory.access_approvals);
    info!("Wiki pages:           {}", inventory.wiki_pages);
    info!(
        "Changes:              {} (current change number {})",
        inventory.changes, inventory.current_change_number
    );
    info!("{}", separator);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_banner_does_not_panic() {
        print_banner();
    }

    #[test]
    fn test_print_inventory_does_not_panic() {
        let inventory = Inventory {
            principals: 3,
            changes: 5,
            current_change_number: 9,
            ..Inventory::default()
        };
        print_inventory(&DatabaseConfig::default(), &inventory);
    }
}
