//! Analytics responder - the tool pipeline
//!
//! Three stages per request:
//!   1. tool selection - the model picks one tool from the registry and
//!      fills its parameters (the only LLM call in this responder)
//!   2. tool execution - schema validation, then the catalog query
//!   3. result formatting - deterministic markdown + chart payload,
//!      no model involved
//!
//! Every stage failure becomes a user-visible textual Outcome; the only
//! error that escapes is gateway unavailability during selection.

use crate::gateway::{strip_code_fences, LlmGateway};
use crate::models::{Outcome, Question, ToolFailureKind, ToolInvocation, ToolResult};
use crate::tools::ToolRegistry;
use crate::Result;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const NOT_RELEVANT_ANSWER: &str =
    "Извините, я могу отвечать только на вопросы о музыкальной аналитике из данных лейбла õzen.";

const MALFORMED_SELECTION_ANSWER: &str =
    "Не удалось обработать аналитический запрос. Попробуйте переформулировать вопрос.";

const EXECUTION_ERROR_ANSWER: &str =
    "Извините, при выполнении запроса произошла ошибка. Попробуйте ещё раз позже.";

/// Raw tool-selection reply shape expected from the model
#[derive(Debug, Deserialize)]
struct SelectionReply {
    tool_name: String,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    reasoning: String,
}

enum ToolSelection {
    Invocation(ToolInvocation),
    NotRelevant,
    Malformed(String),
}

pub struct AnalyticsAgent {
    gateway: Arc<dyn LlmGateway>,
    registry: Arc<ToolRegistry>,
}

impl AnalyticsAgent {
    pub fn new(gateway: Arc<dyn LlmGateway>, registry: Arc<ToolRegistry>) -> Self {
        Self { gateway, registry }
    }

    pub async fn respond(&self, question: &Question) -> Result<Outcome> {
        // --- Stage 1: tool selection ---
        let selection = self.select_tool(question).await?;

        let mut invocation = match selection {
            ToolSelection::NotRelevant => {
                info!("Analytics question not relevant to the tool registry");
                return Ok(Outcome::answered(NOT_RELEVANT_ANSWER));
            }
            ToolSelection::Malformed(detail) => {
                warn!("Malformed tool selection reply: {}", detail);
                return Ok(Outcome::answered(MALFORMED_SELECTION_ANSWER)
                    .with_error(format!("malformed tool selection: {}", detail)));
            }
            ToolSelection::Invocation(invocation) => invocation,
        };

        if !self.registry.contains(&invocation.tool_name) {
            warn!(tool = %invocation.tool_name, "Selected tool is not in the registry");
            return Ok(Outcome::answered(format!(
                "Для этого вопроса нет подходящего инструмента аналитики. \
                 Я могу рассказать о стримах, выручке, платформах, географии \
                 и треках артистов каталога. ({})",
                NOT_RELEVANT_ANSWER
            ))
            .with_error(format!("no_matching_tool: '{}'", invocation.tool_name)));
        }

        self.inject_artist_hint(question, &mut invocation);

        debug!(
            tool = %invocation.tool_name,
            parameters = %serde_json::Value::Object(invocation.parameters.clone()),
            "Executing analytics tool"
        );

        // --- Stage 2: validation + execution ---
        let result = self.registry.execute(&invocation).await;

        // --- Stage 3: deterministic formatting ---
        Ok(self.finish(invocation, result))
    }

    async fn select_tool(&self, question: &Question) -> Result<ToolSelection> {
        let artist_context = match &question.artist_name {
            Some(artist) => format!(
                "\n\nКОНТЕКСТ: Это чат с артистом **{}**. Вопросы относятся к его данным.",
                artist
            ),
            None => String::new(),
        };

        let system = format!(
            r#"Ты эксперт по музыкальной аналитике. Твоя задача - выбрать правильный инструмент для ответа на вопрос пользователя.{artist_context}

ДОСТУПНЫЕ ИНСТРУМЕНТЫ:

{tools}

ВАЖНО:
1. Выбери ОДИН наиболее подходящий инструмент
2. Определи параметры для этого инструмента
3. Если вопрос не относится к аналитике каталога, верни "NOT_RELEVANT"

ФОРМАТ ОТВЕТА (строго JSON):
{{
  "tool_name": "название_инструмента",
  "parameters": {{"param1": value1}},
  "reasoning": "почему выбран этот инструмент"
}}

Или если не релевантно:
{{
  "tool_name": "NOT_RELEVANT",
  "reasoning": "объяснение"
}}

ПРИМЕРЫ:

Вопрос: "Топ 10 артистов по выручке"
Ответ:
{{"tool_name": "get_top_artists", "parameters": {{"limit": 10, "metric": "revenue"}}, "reasoning": "Нужны топ артисты по выручке"}}

Вопрос: "Сколько всего денег заработали?"
Ответ:
{{"tool_name": "get_overview_stats", "parameters": {{}}, "reasoning": "Общий вопрос про выручку каталога"}}

Верни ТОЛЬКО JSON, без дополнительного текста."#,
            artist_context = artist_context,
            tools = self.registry.describe_for_prompt(),
        );

        let response = self.gateway.complete(&system, &question.text).await?;
        let cleaned = strip_code_fences(&response);

        let reply: SelectionReply = match serde_json::from_str(cleaned) {
            Ok(reply) => reply,
            Err(e) => return Ok(ToolSelection::Malformed(e.to_string())),
        };

        if reply.tool_name == "NOT_RELEVANT" {
            return Ok(ToolSelection::NotRelevant);
        }

        debug!(
            tool = %reply.tool_name,
            reasoning = %reply.reasoning,
            "Tool selected"
        );

        Ok(ToolSelection::Invocation(ToolInvocation {
            tool_name: reply.tool_name,
            parameters: reply.parameters,
        }))
    }

    /// Propagate the artist hint into the invocation when the chosen tool
    /// declares an `artist_name` parameter and the model left it out.
    fn inject_artist_hint(&self, question: &Question, invocation: &mut ToolInvocation) {
        let Some(artist) = &question.artist_name else {
            return;
        };
        let Some(tool) = self.registry.get(&invocation.tool_name) else {
            return;
        };

        let declares_artist = tool.parameters().iter().any(|p| p.name == "artist_name");
        if declares_artist && !invocation.parameters.contains_key("artist_name") {
            debug!(artist = %artist, "Injecting artist hint into tool parameters");
            invocation
                .parameters
                .insert("artist_name".to_string(), json!(artist));
        }
    }

    fn finish(&self, invocation: ToolInvocation, result: ToolResult) -> Outcome {
        let tool_name = invocation.tool_name.clone();
        let parameters = invocation.parameters;

        match result {
            ToolResult::Success { data } => {
                let (answer, structured) = format::render(&tool_name, &data);
                let mut outcome = Outcome::answered(answer)
                    .with_tool(tool_name)
                    .with_tool_parameters(parameters);
                if let Some(structured) = structured {
                    outcome = outcome.with_structured_data(structured);
                }
                outcome
            }
            ToolResult::Failure { failure } => {
                let answer = match failure.kind {
                    ToolFailureKind::NotFound => format!(
                        "{}. Попробуйте инструмент поиска (search_artists), \
                         чтобы уточнить написание имени артиста.",
                        failure.message
                    ),
                    ToolFailureKind::InvalidParameters => {
                        format!("Не удалось выполнить запрос: {}", failure.message)
                    }
                    ToolFailureKind::ExecutionError => {
                        warn!(tool = %tool_name, detail = %failure.message, "Tool execution error");
                        EXECUTION_ERROR_ANSWER.to_string()
                    }
                };

                Outcome::answered(answer)
                    .with_error(failure.message)
                    .with_tool(tool_name)
                    .with_tool_parameters(parameters)
            }
        }
    }
}

/// Deterministic rendering of successful tool results: markdown answer
/// plus an optional `[{label, value}]` payload for charting.
mod format {
    use serde_json::{json, Value};

    pub fn render(tool_name: &str, data: &Value) -> (String, Option<Value>) {
        match tool_name {
            "get_overview_stats" => (render_overview(data), None),
            "get_top_artists" => render_top_artists(data),
            "get_top_platforms" => render_breakdown_list(
                data.get("platforms"),
                "📊 **Самые популярные платформы:**",
            ),
            "get_top_tracks" => render_top_tracks(data),
            "get_track_details" => render_track_details(data),
            "get_top_countries" => render_breakdown_list(
                data.get("countries"),
                "🌍 **Топ стран по выручке:**",
            ),
            "get_country_stats" => render_segment_stats(data, "🌍 **Страна"),
            "get_platform_stats" => render_segment_stats(data, "📊 **Платформа"),
            "get_artist_full_analytics" => render_full_analytics(data),
            "get_artist_streams" => render_artist_streams(data),
            "get_artist_platforms" => render_breakdown_list(
                data.get("platforms"),
                &format!("📊 **Платформы артиста {}:**", artist_of(data)),
            ),
            "get_artist_geography" => render_breakdown_list(
                data.get("countries"),
                &format!("🌍 **География артиста {}:**", artist_of(data)),
            ),
            "get_artist_tracks" => render_breakdown_list(
                data.get("tracks"),
                &format!("🎵 **Топ-треки артиста {}:**", artist_of(data)),
            ),
            "search_artists" => render_search(data),
            _ => (
                format!(
                    "```json\n{}\n```",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
                ),
                None,
            ),
        }
    }

    fn artist_of(data: &Value) -> &str {
        data.get("artist").and_then(Value::as_str).unwrap_or("—")
    }

    fn fmt_streams(streams: u64) -> String {
        if streams >= 1_000_000 {
            format!("{:.1}M", streams as f64 / 1_000_000.0)
        } else if streams >= 1_000 {
            format!("{:.1}K", streams as f64 / 1_000.0)
        } else {
            streams.to_string()
        }
    }

    fn fmt_revenue(revenue: f64) -> String {
        format!("€{:.2}", revenue)
    }

    fn render_overview(data: &Value) -> String {
        let get = |key: &str| data.get(key).and_then(Value::as_u64).unwrap_or(0);
        let revenue = data
            .get("total_revenue")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        format!(
            "📊 **Общая статистика каталога:**\n\n\
             - Артистов: {}\n\
             - Треков: {}\n\
             - Платформ: {}\n\
             - Стран: {}\n\
             - Суммарные стримы: {}\n\
             - 💰 Суммарная выручка: {}",
            get("artists"),
            get("tracks"),
            get("platforms"),
            get("countries"),
            fmt_streams(get("total_streams")),
            fmt_revenue(revenue),
        )
    }

    fn render_top_artists(data: &Value) -> (String, Option<Value>) {
        let metric = data.get("metric").and_then(Value::as_str).unwrap_or("revenue");
        let by_streams = metric == "streams";

        let Some(artists) = data.get("artists").and_then(Value::as_array) else {
            return ("Топ артистов пуст.".to_string(), None);
        };
        if artists.is_empty() {
            return ("В каталоге пока нет данных по артистам.".to_string(), None);
        }

        let header = if by_streams {
            "🎤 **Топ артистов по стримам:**"
        } else {
            "🎤 **Топ артистов по выручке:**"
        };

        let mut out = String::from(header);
        out.push_str("\n\n");

        let mut chart = Vec::with_capacity(artists.len());
        for (i, artist) in artists.iter().enumerate() {
            let name = artist.get("artist").and_then(Value::as_str).unwrap_or("—");
            let streams = artist
                .get("total_streams")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let revenue = artist
                .get("total_revenue")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);

            out.push_str(&format!(
                "{}. **{}** — {} ({} стримов)\n",
                i + 1,
                name,
                fmt_revenue(revenue),
                fmt_streams(streams),
            ));

            chart.push(json!({
                "label": name,
                "value": if by_streams { streams as f64 } else { revenue },
            }));
        }

        (out, Some(Value::Array(chart)))
    }

    fn render_top_tracks(data: &Value) -> (String, Option<Value>) {
        let metric = data.get("metric").and_then(Value::as_str).unwrap_or("revenue");
        let by_streams = metric == "streams";

        let Some(tracks) = data.get("tracks").and_then(Value::as_array) else {
            return ("Топ треков пуст.".to_string(), None);
        };
        if tracks.is_empty() {
            return ("В каталоге пока нет данных по трекам.".to_string(), None);
        }

        let header = if by_streams {
            "🎵 **Топ треков по стримам:**"
        } else {
            "🎵 **Топ треков по выручке:**"
        };

        let mut out = String::from(header);
        out.push_str("\n\n");

        let mut chart = Vec::with_capacity(tracks.len());
        for (i, track) in tracks.iter().enumerate() {
            let artist = track.get("artist").and_then(Value::as_str).unwrap_or("—");
            let title = track.get("track").and_then(Value::as_str).unwrap_or("—");
            let streams = track
                .get("total_streams")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let revenue = track
                .get("total_revenue")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);

            out.push_str(&format!(
                "{}. **{} — {}** · {} ({} стримов)\n",
                i + 1,
                artist,
                title,
                fmt_revenue(revenue),
                fmt_streams(streams),
            ));

            chart.push(json!({
                "label": format!("{} — {}", artist, title),
                "value": if by_streams { streams as f64 } else { revenue },
            }));
        }

        (out, Some(Value::Array(chart)))
    }

    fn render_track_details(data: &Value) -> (String, Option<Value>) {
        let artist = artist_of(data);
        let title = data.get("track").and_then(Value::as_str).unwrap_or("—");
        let streams = data
            .get("total_streams")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let revenue = data
            .get("total_revenue")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let mut out = format!(
            "🎵 **{} — {}**: {} стримов, выручка {}.\n\n",
            artist,
            title,
            fmt_streams(streams),
            fmt_revenue(revenue),
        );

        let (platforms, chart) = render_breakdown_list(data.get("platforms"), "**Платформы:**");
        out.push_str(&platforms);
        out.push('\n');
        let (countries, _) = render_breakdown_list(data.get("countries"), "**Страны:**");
        out.push_str(&countries);

        (out, chart)
    }

    fn render_segment_stats(data: &Value, header_prefix: &str) -> (String, Option<Value>) {
        let label = data.get("label").and_then(Value::as_str).unwrap_or("—");
        let streams = data
            .get("total_streams")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let revenue = data
            .get("total_revenue")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let share = data
            .get("revenue_share")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let mut out = format!(
            "{} {}**: {} стримов, выручка {} ({:.1}% каталога).\n\n",
            header_prefix,
            label,
            fmt_streams(streams),
            fmt_revenue(revenue),
            share,
        );

        let (artists, chart) = render_breakdown_list(data.get("artists"), "**Топ артистов:**");
        out.push_str(&artists);

        (out, chart)
    }

    fn render_full_analytics(data: &Value) -> (String, Option<Value>) {
        let artist = artist_of(data);
        let streams = data
            .get("total_streams")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let revenue = data
            .get("total_revenue")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let mut out = format!(
            "🎤 **Полная аналитика: {}**\n\n\
             Суммарные стримы: {}\n💰 Суммарная выручка: {}\n\n",
            artist,
            fmt_streams(streams),
            fmt_revenue(revenue),
        );

        for (key, header) in [
            ("platforms", "**Платформы:**"),
            ("countries", "**Страны:**"),
            ("tracks", "**Треки:**"),
        ] {
            let (section, _) = render_breakdown_list(data.get(key), header);
            out.push_str(&section);
            out.push('\n');
        }

        (out, Some(data.clone()))
    }

    fn render_artist_streams(data: &Value) -> (String, Option<Value>) {
        let artist = artist_of(data);
        let streams = data
            .get("total_streams")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let revenue = data
            .get("total_revenue")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let avg = data
            .get("avg_per_stream")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let answer = format!(
            "🎧 **{}**: {} стримов, выручка {} (в среднем €{:.6} за стрим).",
            artist,
            fmt_streams(streams),
            fmt_revenue(revenue),
            avg,
        );

        (answer, Some(data.clone()))
    }

    fn render_breakdown_list(entries: Option<&Value>, header: &str) -> (String, Option<Value>) {
        let Some(entries) = entries.and_then(Value::as_array) else {
            return ("Нет данных для отображения.".to_string(), None);
        };
        if entries.is_empty() {
            return ("Нет данных для отображения.".to_string(), None);
        }

        let mut out = String::from(header);
        out.push_str("\n\n| # | Название | Стримы | Выручка | Доля |\n");
        out.push_str("|---|----------|--------|---------|------|\n");

        let mut chart = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let label = entry.get("label").and_then(Value::as_str).unwrap_or("—");
            let streams = entry.get("streams").and_then(Value::as_u64).unwrap_or(0);
            let revenue = entry.get("revenue").and_then(Value::as_f64).unwrap_or(0.0);
            let pct = entry
                .get("percentage")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);

            out.push_str(&format!(
                "| {} | {} | {} | {} | {:.1}% |\n",
                i + 1,
                label,
                fmt_streams(streams),
                fmt_revenue(revenue),
                pct,
            ));

            chart.push(json!({ "label": label, "value": revenue }));
        }

        (out, Some(Value::Array(chart)))
    }

    fn render_search(data: &Value) -> (String, Option<Value>) {
        let query = data.get("query").and_then(Value::as_str).unwrap_or("");
        let Some(artists) = data.get("artists").and_then(Value::as_array) else {
            return ("По запросу ничего не найдено.".to_string(), None);
        };

        if artists.is_empty() {
            return (
                format!(
                    "🔍 По запросу '{}' ничего не найдено. Проверьте написание имени.",
                    query
                ),
                None,
            );
        }

        let mut out = format!(
            "🔍 Найдено артистов по запросу '{}': {}\n\n",
            query,
            artists.len()
        );
        for artist in artists {
            let name = artist.get("artist").and_then(Value::as_str).unwrap_or("—");
            let revenue = artist
                .get("total_revenue")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            out.push_str(&format!("- **{}** — {}\n", name, fmt_revenue(revenue)));
        }

        (out, None)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_render_is_deterministic() {
            let data = json!({
                "metric": "revenue",
                "artists": [
                    {"artist": "A", "total_streams": 2_000_000u64, "total_revenue": 9_000.0},
                    {"artist": "B", "total_streams": 1_000_000u64, "total_revenue": 4_000.0},
                ],
            });

            let first = render("get_top_artists", &data);
            let second = render("get_top_artists", &data);
            assert_eq!(first.0, second.0);
            assert_eq!(first.1, second.1);
        }

        #[test]
        fn test_top_artists_chart_points() {
            let data = json!({
                "metric": "streams",
                "artists": [
                    {"artist": "A", "total_streams": 5_000_000u64, "total_revenue": 100.0},
                ],
            });

            let (answer, chart) = render("get_top_artists", &data);
            assert!(answer.contains("по стримам"));

            let chart = chart.unwrap();
            assert_eq!(chart[0]["label"], "A");
            assert_eq!(chart[0]["value"], 5_000_000.0);
        }

        #[test]
        fn test_top_tracks_labels_pair_artist_and_title() {
            let data = json!({
                "metric": "revenue",
                "tracks": [
                    {"artist": "A", "track": "T", "total_streams": 1_000u64, "total_revenue": 50.0},
                ],
            });

            let (answer, chart) = render("get_top_tracks", &data);
            assert!(answer.contains("A — T"));
            assert_eq!(chart.unwrap()[0]["label"], "A — T");
        }

        #[test]
        fn test_segment_stats_shows_share_and_artists() {
            let data = json!({
                "label": "Spotify",
                "total_streams": 2_000_000u64,
                "total_revenue": 9_000.0,
                "revenue_share": 42.5,
                "artists": [
                    {"label": "A", "streams": 2_000_000u64, "revenue": 9_000.0, "percentage": 100.0},
                ],
            });

            let (answer, chart) = render("get_platform_stats", &data);
            assert!(answer.contains("Spotify"));
            assert!(answer.contains("42.5%"));
            assert!(chart.is_some());
        }

        #[test]
        fn test_unknown_tool_falls_back_to_json() {
            let data = json!({"x": 1});
            let (answer, chart) = render("some_future_tool", &data);
            assert!(answer.starts_with("```json"));
            assert!(chart.is_none());
        }
    }
}
