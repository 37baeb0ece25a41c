use std::{env, fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `crates/server/src/bin/generate_types.rs`.\n\n// Do not edit this file manually.";

    let decls: Vec<String> = vec![
        db::models::shift::Workplace::decl(),
        db::models::shift::TimeSlot::decl(),
        db::models::shift::ContentFilter::decl(),
        db::models::tag::Tag::decl(),
        db::models::tag::CreateTag::decl(),
        db::models::tag::UpdateTag::decl(),
        db::models::inventory_item::InventoryItem::decl(),
        db::models::inventory_item::InventoryItemWithTags::decl(),
        db::models::inventory_item::CreateInventoryItem::decl(),
        db::models::inventory_item::UpdateInventoryItem::decl(),
        db::models::inventory_item::InventoryFilter::decl(),
        db::models::inventory_check::InventoryCheck::decl(),
        db::models::inventory_check::CreateInventoryCheck::decl(),
        db::models::manual::Manual::decl(),
        db::models::manual::ManualDetail::decl(),
        db::models::manual::CreateManual::decl(),
        db::models::manual::UpdateManual::decl(),
        db::models::precaution::Precaution::decl(),
        db::models::precaution::PrecautionWithTags::decl(),
        db::models::precaution::CreatePrecaution::decl(),
        db::models::precaution::UpdatePrecaution::decl(),
        db::models::checklist_template::ChecklistTemplate::decl(),
        db::models::checklist_template::ChecklistTemplateWithItems::decl(),
        db::models::checklist_template::CreateChecklistTemplate::decl(),
        db::models::checklist_template::UpdateChecklistTemplate::decl(),
        db::models::checklist_template::TemplateFilter::decl(),
        db::models::checklist_item::ConnectedItemType::decl(),
        db::models::checklist_item::ChecklistItem::decl(),
        db::models::checklist_item::ConnectedItem::decl(),
        db::models::checklist_item::ChecklistItemWithConnections::decl(),
        db::models::checklist_item::ConnectedItemInput::decl(),
        db::models::checklist_item::CreateChecklistItem::decl(),
        db::models::checklist_item::UpdateChecklistItem::decl(),
        db::models::checklist_instance::ChecklistInstance::decl(),
        db::models::checklist_progress::ChecklistItemProgress::decl(),
        db::models::checklist_progress::ConnectedItemProgress::decl(),
        db::models::favorite::FavoriteKind::decl(),
        db::models::favorite::Favorite::decl(),
        db::models::favorite::CreateFavorite::decl(),
        services::services::session::ActorRole::decl(),
        services::services::session::Actor::decl(),
        services::services::session::LoginRequest::decl(),
        services::services::checklist_progress::ItemCompletion::decl(),
        services::services::checklist_progress::ConnectedItemView::decl(),
        services::services::checklist_progress::ChecklistItemView::decl(),
        services::services::checklist_progress::ChecklistInstanceView::decl(),
        services::services::checklist_run::ProgressFilter::decl(),
        services::services::checklist_run::ItemProgressInput::decl(),
        services::services::checklist_run::ConnectedProgressInput::decl(),
        services::services::checklist_run::SaveProgress::decl(),
        server::routes::checklists::ReorderChecklistItems::decl(),
        utils::response::ApiResponse::<()>::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n\n{body}\n")
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let check_mode = args.iter().any(|arg| arg == "--check");
    let output = args
        .iter()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("shared/types.ts"));

    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&output).unwrap_or_default();
        if current == generated {
            println!("✅ {} is up to date.", output.display());
            std::process::exit(0);
        } else {
            eprintln!(
                "❌ {} is not up to date. Please run `cargo run --bin generate_types` and commit the changes.",
                output.display()
            );
            std::process::exit(1);
        }
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).expect("cannot create output directory");
    }
    fs::write(&output, generated).expect("unable to write types.ts");
    println!("✅ TypeScript types generated in {}", output.display());
}
