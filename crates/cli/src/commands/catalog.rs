use innkeep_core::catalog::{CatalogSource, DirectoryCatalogSource, Retrieval};
use innkeep_core::config::{AppConfig, LoadOptions};
use innkeep_core::pricing::format_money;
use serde_json::json;

use crate::commands::CommandResult;

const QUERY_TOP_K: usize = 3;

/// Lists what the knowledge directory currently yields. With `query`, also
/// shows the snippets the assistant would hand to the language model.
pub fn run(query: Option<&str>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "catalog",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let source = DirectoryCatalogSource::new(&config.knowledge.directory);
    let knowledge = match source.load() {
        Ok(knowledge) => knowledge,
        Err(error) => {
            return CommandResult::failure("catalog", "knowledge_load", error.to_string(), 4);
        }
    };

    let currency = &config.payments.currency;
    let rooms = knowledge
        .rooms
        .iter()
        .map(|room| {
            json!({
                "id": room.id.0,
                "name": room.name,
                "nightly_price": format_money(room.nightly_price_cents(), currency),
            })
        })
        .collect::<Vec<_>>();
    let upsells = knowledge
        .upsells
        .iter()
        .map(|upsell| {
            json!({
                "id": upsell.id.0,
                "name": upsell.name,
                "price": format_money(upsell.price_cents(), currency),
            })
        })
        .collect::<Vec<_>>();

    let mut data = json!({
        "directory": source.directory().display().to_string(),
        "rooms": rooms,
        "upsells": upsells,
        "faq_count": knowledge.faqs.len(),
    });
    if let Some(query) = query {
        data["query"] = json!({
            "text": query,
            "snippets": knowledge.query(query, QUERY_TOP_K),
        });
    }

    CommandResult::success(
        "catalog",
        format!(
            "loaded {} room(s), {} upsell(s), {} faq(s)",
            knowledge.rooms.len(),
            knowledge.upsells.len(),
            knowledge.faqs.len()
        ),
        Some(data),
    )
}
