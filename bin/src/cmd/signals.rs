//! Signal listing command implementation.

use crate::cmd::summary::print_header;
use tavira_signals::SignalCategory;
use tavira_signals::registry::signals_by_category;

const CATEGORIES: [(SignalCategory, &str); 3] = [
    (SignalCategory::Momentum, "Momentum"),
    (SignalCategory::Reversion, "Reversion"),
    (SignalCategory::Defensive, "Defensive"),
];

/// List available signals grouped by category.
pub(crate) fn list_signals(detailed: bool) {
    print_header("Available Signals");

    for (category, label) in &CATEGORIES {
        let signals = signals_by_category(category);
        if signals.is_empty() {
            continue;
        }

        println!("{label}: {}", category.description());
        println!("{}", "-".repeat(60));
        for info in signals {
            if detailed {
                println!(
                    "  {:12} - {} (lookback: {} months, {} days)",
                    info.name, info.description, info.monthly_lookback, info.daily_lookback
                );
            } else {
                println!("  {}", info.name);
            }
        }
        println!();
    }

    if !detailed {
        println!("Use --detailed for signal descriptions and lookbacks.\n");
    }
}
