//! Integration tests for the `hud` CLI commands.
#![allow(deprecated)] // Command::cargo_bin – macro replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;

fn hud() -> Command {
    Command::cargo_bin("hud").unwrap()
}

fn demo_json(args: &[&str]) -> serde_json::Value {
    let output = hud()
        .arg("demo")
        .arg("--json")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid JSON output")
}

fn count_kind(json: &serde_json::Value, kind: &str) -> usize {
    json["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["kind"] == kind)
        .count()
}

// ---------------------------------------------------------------------------
// demo
// ---------------------------------------------------------------------------

#[test]
fn demo_reports_deliveries() {
    hud()
        .arg("demo")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Slot Deliveries")
                .and(predicate::str::contains("HUD.Slot.TopBar"))
                .and(predicate::str::contains("Compass"))
                .and(predicate::str::contains("deliveries")),
        );
}

#[test]
fn demo_tree_prints_layouts() {
    hud()
        .args(["demo", "--tree", "--players", "1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Widget tree of player#1")
                .and(predicate::str::contains("DemoLayout"))
                .and(predicate::str::contains("TopBar")),
        );
}

#[test]
fn demo_json_counts_deliveries() {
    let json = demo_json(&[]);
    // Compass reaches both slots of each player, Clock and the feed entry
    // reach one slot of player 1.
    assert_eq!(count_kind(&json, "added"), 6);
    assert_eq!(count_kind(&json, "removed"), 1);
    assert_eq!(json["layouts"].as_array().unwrap().len(), 2);
}

#[test]
fn demo_json_layers() {
    let json = demo_json(&["--players", "1"]);
    let layers = &json["layouts"][0]["layers"];
    assert_eq!(layers["HUD.Layer.GameMenu"].as_array().unwrap().len(), 1);
    assert!(layers["HUD.Layer.Menu"].as_array().unwrap().is_empty());
}

#[test]
fn demo_json_scopes_events() {
    let json = demo_json(&["--players", "1"]);
    for event in json["events"].as_array().unwrap() {
        assert_eq!(event["scope"], 1);
    }
}

#[test]
fn demo_without_pooling() {
    let json = demo_json(&["--no-pool", "--players", "1"]);
    // Only the feed slot keeps a pool.
    assert_eq!(json["pools"], 1);
}

#[test]
fn demo_rejects_player_count() {
    hud()
        .args(["demo", "--players", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 1 and 4"));
}

// ---------------------------------------------------------------------------
// match
// ---------------------------------------------------------------------------

#[test]
fn match_parent_extension() {
    hud()
        .args(["match", "HUD.Slot.TopBar", "HUD.Slot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("match").and(predicate::str::contains("no match").not()));
}

#[test]
fn match_child_extension_does_not_reach() {
    hud()
        .args(["match", "HUD.Slot", "HUD.Slot.TopBar"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no match").and(predicate::str::contains("one of its parents")));
}

#[test]
fn match_scope_mismatch() {
    hud()
        .args([
            "match",
            "HUD.Slot.TopBar",
            "HUD.Slot.TopBar",
            "--slot-player",
            "1",
            "--extension-player",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("scope player#2 differs from player#1"));
}

#[test]
fn match_rejects_malformed_tag() {
    hud()
        .args(["match", "HUD..Slot", "HUD"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn match_rejects_empty_tag() {
    hud()
        .args(["match", "", "HUD"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be empty"));
}
