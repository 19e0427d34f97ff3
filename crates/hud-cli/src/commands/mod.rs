pub mod demo;
pub mod match_tags;

use hud_core::{PlayerId, Scope};

/// Format a scope for display.
fn scope_label(scope: Scope) -> String {
    scope.map_or_else(|| "unscoped".to_string(), |p| p.to_string())
}

/// Parse a player number given on the command line.
fn player(n: Option<u32>) -> Scope {
    n.map(PlayerId)
}
