use colored::Colorize;
use hud_core::Tag;
use hud_core::scope::scopes_match;

use super::{player, scope_label};

pub fn run(
    slot: &str,
    extension: &str,
    slot_player: Option<u32>,
    extension_player: Option<u32>,
) -> Result<(), String> {
    let slot_tag = parse(slot)?;
    let extension_tag = parse(extension)?;
    let slot_scope = player(slot_player);
    let extension_scope = player(extension_player);

    println!("  {} {slot_tag} ({})", "Slot".bold(), scope_label(slot_scope));
    println!(
        "  {} {extension_tag} ({})",
        "Extension".bold(),
        scope_label(extension_scope)
    );
    println!();

    // The walk a slot performs when looking for extensions.
    for level in slot_tag.ancestors() {
        if level == extension_tag {
            println!("    {} {}", "->".green(), level.as_str().green().bold());
        } else {
            println!("       {}", level.as_str().dimmed());
        }
    }
    println!();

    let tags_match = slot_tag.matches(&extension_tag);
    let scopes_agree = scopes_match(slot_scope, extension_scope);
    if tags_match && scopes_agree {
        println!("  {}", "match".green().bold());
    } else {
        let reason = if !tags_match {
            format!("{extension_tag} is not {slot_tag} or one of its parents")
        } else {
            format!(
                "scope {} differs from {}",
                scope_label(extension_scope),
                scope_label(slot_scope)
            )
        };
        println!("  {} {}", "no match".red().bold(), reason.dimmed());
    }
    Ok(())
}

fn parse(s: &str) -> Result<Tag, String> {
    let tag: Tag = s.parse().map_err(|e: hud_core::HudError| e.to_string())?;
    if !tag.is_valid() {
        return Err("tags must not be empty".into());
    }
    Ok(tag)
}
