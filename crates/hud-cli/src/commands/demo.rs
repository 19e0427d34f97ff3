use std::rc::Rc;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use hud_core::{ObjectContext, PlayerId, Tag, WidgetContextHandle, WidgetId};
use hud_framework::{
    ClassRef, Hud, HudConfig, LayoutEvent, LayoutEventKind, LayoutRegistryExt, SlotSpec, WidgetClass,
};
use hud_registry::RegistryHost;
use tracing::info;

use super::scope_label;

const MAP_PATH: &str = "/Game/UI/WorldMap";

/// Widget classes the scripted session uses.
struct DemoClasses {
    layout: ClassRef,
    compass: ClassRef,
    clock: ClassRef,
    feed_entry: ClassRef,
    inventory: ClassRef,
    map: ClassRef,
}

impl DemoClasses {
    fn new() -> Self {
        let label = WidgetClass::builder("Label").primitive().build();
        let top_bar = WidgetClass::builder("TopBar")
            .with_slot(SlotSpec::new(Tag::from_static("HUD.Slot.TopBar")))
            .build();
        let feed = WidgetClass::builder("Feed")
            .with_slot(
                SlotSpec::new(Tag::from_static("HUD.Slot.Feed"))
                    .pooled()
                    .with_configure(|_, widget, data| {
                        if let Some(text) = data.as_deref().and_then(|d| d.downcast_ref::<String>()) {
                            info!(widget = %widget, "feed entry: {text}");
                        }
                    }),
            )
            .build();
        let layout = WidgetClass::builder("DemoLayout")
            .with_child(&top_bar)
            .with_child(&feed)
            .build();
        let inventory = WidgetClass::builder("InventoryMenu")
            .with_child(&label)
            .on_initialize_tree(|_, widget, context| {
                let owner = context
                    .get::<ObjectContext>()
                    .and_then(|c| c.context_object.clone())
                    .and_then(|o| o.downcast_ref::<String>().cloned());
                if let Some(owner) = owner {
                    info!(widget = %widget, "inventory opened for {owner}");
                }
            })
            .build();
        Self {
            layout,
            compass: WidgetClass::builder("Compass").build(),
            clock: WidgetClass::builder("Clock").build(),
            feed_entry: WidgetClass::builder("FeedEntry").with_child(&label).build(),
            inventory,
            map: WidgetClass::builder("WorldMap").build(),
        }
    }
}

fn named(name: String) -> WidgetContextHandle {
    WidgetContextHandle::new(ObjectContext::new(Rc::new(name)))
}

pub fn run(players: u32, json: bool, tree: bool, pool_layers: bool) -> Result<(), String> {
    if !(1..=4).contains(&players) {
        return Err(format!("--players must be between 1 and 4, got {players}"));
    }
    let classes = DemoClasses::new();
    let config = HudConfig::default()
        .with_primary_layout_class(classes.layout.clone())
        .with_max_events(256)
        .with_pool_layers(pool_layers);
    let mut hud = Hud::new(config);
    hud.class_library_mut().register(MAP_PATH, classes.map.clone());
    let ids: Vec<PlayerId> = (1..=players).map(PlayerId).collect();

    // Registered before any layout exists; slots replay them when they appear.
    for player in &ids {
        hud.try_register_extension(
            Tag::from_static("HUD.Slot"),
            classes.compass.clone(),
            Some(*player),
            WidgetContextHandle::default(),
        )
        .map_err(|e| e.to_string())?;
    }
    let mut clock = hud
        .try_register_extension(
            Tag::from_static("HUD.Slot.TopBar"),
            classes.clock.clone(),
            Some(ids[0]),
            WidgetContextHandle::default(),
        )
        .map_err(|e| e.to_string())?;

    for player in &ids {
        hud.add_local_player(*player).map_err(|e| e.to_string())?;
    }

    let pickup = ObjectContext::new(Rc::new(ids[0])).with_data(Rc::new("picked up a key".to_string()));
    hud.try_register_extension(
        Tag::from_static("HUD.Slot.Feed"),
        classes.feed_entry.clone(),
        Some(ids[0]),
        WidgetContextHandle::new(pickup),
    )
    .map_err(|e| e.to_string())?;

    let menu = Tag::from_static("HUD.Layer.Menu");
    let mut inventories = Vec::new();
    for player in &ids {
        let widget = hud
            .try_push_to_layer(Some(*player), &menu, &classes.inventory, named(player.to_string()))
            .map_err(|e| e.to_string())?;
        inventories.push(widget);
    }

    hud.push_to_layer_async(
        Some(ids[0]),
        Tag::from_static("HUD.Layer.GameMenu"),
        MAP_PATH,
        named(ids[0].to_string()),
        |_, widget| info!(widget = ?widget, "world map push completed"),
    )
    .ok_or("could not queue the world map push")?;
    hud.update_streaming();

    hud.unregister_extension(&mut clock);
    hud.try_pop_widget(inventories[0]).map_err(|e| e.to_string())?;

    if json {
        print_json(&hud, &ids)?;
    } else {
        print_report(&hud, &ids, pool_layers, tree);
    }

    hud.shutdown();
    Ok(())
}

fn widget_label(hud: &Hud, widget: Option<WidgetId>) -> String {
    widget
        .and_then(|id| hud.widget(id))
        .map_or_else(|| "-".to_string(), |w| format!("{} {}", w.class.name(), w.id))
}

fn print_report(hud: &Hud, players: &[PlayerId], pool_layers: bool, tree: bool) {
    let events = hud.layout_registry().events();
    println!(
        "  {} {}",
        "HUD demo".bold(),
        format!(
            "({} players, layers {})",
            players.len(),
            if pool_layers { "pooled" } else { "unpooled" }
        )
        .dimmed()
    );
    println!();

    println!("  {}", "Slot Deliveries".bold().underline());
    println!();
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Event", "Slot", "Extension", "Scope", "Widget"]);
    for event in events.events() {
        table.add_row(event_row(hud, event));
    }
    println!("{table}");
    println!();

    println!("  {}", "Layers".bold().underline());
    println!();
    let mut layers = Table::new();
    layers.set_content_arrangement(ContentArrangement::Dynamic);
    layers.set_header(vec!["Player", "Layer", "Widgets", "Active"]);
    for player in players {
        let Some(layout) = hud.primary_layout(*player) else {
            continue;
        };
        for tag in layout.layer_tags() {
            let widgets = hud.layer_widgets(*player, tag);
            layers.add_row(vec![
                player.to_string(),
                tag.to_string(),
                widgets.len().to_string(),
                widget_label(hud, hud.active_layer_widget(*player, tag)),
            ]);
        }
    }
    println!("{layers}");
    println!();

    if tree {
        for player in players {
            if let Some(layout) = hud.primary_layout(*player) {
                println!("  {}", format!("Widget tree of {player}").bold().underline());
                println!();
                for line in hud.outline(layout.root()).lines() {
                    println!("    {line}");
                }
                println!();
            }
        }
    }

    println!(
        "  {} deliveries, {} widgets live, {} pools",
        events.len(),
        hud.widgets().len(),
        hud.pool_count()
    );
}

fn event_row(hud: &Hud, event: &LayoutEvent<WidgetId>) -> Vec<String> {
    let kind = match event.kind {
        LayoutEventKind::ExtensionAdded => "added".green().to_string(),
        LayoutEventKind::ExtensionRemoved => "removed".red().to_string(),
    };
    vec![
        event.sequence.to_string(),
        kind,
        event.slot_tag.to_string(),
        format!("{} ({})", event.extension_tag, event.class_name),
        scope_label(event.scope),
        widget_label(hud, event.widget),
    ]
}

fn print_json(hud: &Hud, players: &[PlayerId]) -> Result<(), String> {
    let events: Vec<serde_json::Value> = hud
        .layout_registry()
        .events()
        .events()
        .iter()
        .map(|event| {
            serde_json::json!({
                "sequence": event.sequence,
                "kind": event.kind.to_string(),
                "slot": event.slot_tag,
                "extension": event.extension_tag,
                "class": event.class_name,
                "scope": event.scope,
                "widget": event.widget,
            })
        })
        .collect();
    let layouts: Vec<serde_json::Value> = players
        .iter()
        .filter_map(|player| hud.primary_layout(*player))
        .map(|layout| {
            let layers: serde_json::Map<String, serde_json::Value> = layout
                .layer_tags()
                .map(|tag| {
                    let widgets = hud.layer_widgets(layout.player(), tag);
                    (tag.to_string(), serde_json::json!(widgets))
                })
                .collect();
            serde_json::json!({
                "player": layout.player(),
                "root": layout.root(),
                "layers": layers,
            })
        })
        .collect();
    let report = serde_json::json!({
        "events": events,
        "layouts": layouts,
        "widgets": hud.widgets().len(),
        "pools": hud.pool_count(),
    });
    let text =
        serde_json::to_string_pretty(&report).map_err(|e| format!("JSON serialization error: {e}"))?;
    println!("{text}");
    Ok(())
}
