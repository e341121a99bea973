//! Mapping of RAWG-shaped JSON into [`GameRecord`].

use super::{GameDataError, GameRecord};
use serde_json::Value;

/// Trim a title query and collapse runs of whitespace.
pub fn normalize_query(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize one provider game object.
///
/// Both search results and detail bodies share this shape; only detail
/// bodies carry `description_raw`.
pub fn normalize_game(game: &Value) -> Result<GameRecord, GameDataError> {
    let title = game
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GameDataError::Upstream("game entry has no name".into()))?
        .to_string();

    let id = match game.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => game
            .get("slug")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };

    let platforms = names_under(game, "platforms", Some("platform"));
    let genres = names_under(game, "genres", None);

    let release_date = game
        .get("released")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    // RAWG reports 0 for titles nobody has rated yet.
    let rating = game
        .get("rating")
        .and_then(Value::as_f64)
        .filter(|r| *r > 0.0);

    let summary = game
        .get("description_raw")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_summary(&title, &genres, release_date.as_deref()));

    Ok(GameRecord {
        id,
        title,
        platforms,
        release_date,
        rating,
        summary,
        genres,
    })
}

/// Collect `name` fields from an array, optionally nested one level
/// (RAWG wraps platforms as `{"platform": {"name": ..}}`).
fn names_under(game: &Value, key: &str, nested: Option<&str>) -> Vec<String> {
    game.get(key)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let inner = match nested {
                        Some(field) => entry.get(field)?,
                        None => entry,
                    };
                    inner.get("name").and_then(Value::as_str).map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn fallback_summary(title: &str, genres: &[String], released: Option<&str>) -> String {
    match (genres.is_empty(), released) {
        (false, Some(date)) => format!("{title} is a {} game released {date}.", genres.join("/")),
        (false, None) => format!("{title} is a {} game.", genres.join("/")),
        (true, Some(date)) => format!("{title} was released {date}."),
        (true, None) => String::new(),
    }
}
