//! Tool trait and registry
//!
//! Tools are deterministic, read-only queries against the catalog store.
//! The registry is built once at startup and never mutated afterwards;
//! validation against a tool's parameter schema happens before execution.

use crate::catalog::{CatalogStore, RankMetric};
use crate::models::{ParamType, ToolFailure, ToolInvocation, ToolParameter, ToolResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single analytics tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Vec<ToolParameter>;
    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult;
}

/// Tool registry for looking up, validating and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Render all tool descriptors for the selection prompt
    /// (sorted by name so the prompt is deterministic).
    pub fn describe_for_prompt(&self) -> String {
        let mut tools: Vec<&Arc<dyn Tool>> = self.tools.values().collect();
        tools.sort_by_key(|tool| tool.name());

        tools
            .iter()
            .map(|tool| {
                let params = tool.parameters();
                let params_text = if params.is_empty() {
                    "Нет параметров".to_string()
                } else {
                    serde_json::to_string_pretty(&params)
                        .unwrap_or_else(|_| "Нет параметров".to_string())
                };
                format!(
                    "**{}**\nОписание: {}\nПараметры: {}",
                    tool.name(),
                    tool.description(),
                    params_text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Check an invocation against its tool's schema: required fields
    /// present, declared types respected. Extra keys are tolerated.
    pub fn validate(&self, invocation: &ToolInvocation) -> Result<(), ToolFailure> {
        let tool = self.tools.get(&invocation.tool_name).ok_or_else(|| {
            ToolFailure::execution_error(format!(
                "Инструмент '{}' не зарегистрирован",
                invocation.tool_name
            ))
        })?;

        for param in tool.parameters() {
            match invocation.parameters.get(param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(ToolFailure::invalid_parameters(format!(
                            "Обязательный параметр '{}' отсутствует для инструмента '{}'",
                            param.name, invocation.tool_name
                        )));
                    }
                }
                Some(value) => {
                    let type_ok = match param.param_type {
                        ParamType::String => value.is_string(),
                        ParamType::Integer => as_integer(value).is_some(),
                    };
                    if !type_ok {
                        return Err(ToolFailure::invalid_parameters(format!(
                            "Параметр '{}' должен иметь тип {} (неотрицательное число), получено: {}",
                            param.name, param.param_type, value
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Validate, then execute. Validation failures short-circuit without
    /// touching the store.
    pub async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        if let Err(failure) = self.validate(invocation) {
            return ToolResult::failure(failure);
        }

        // validate() guarantees the tool exists
        match self.get(&invocation.tool_name) {
            Some(tool) => tool.execute(invocation).await,
            None => ToolResult::failure(ToolFailure::execution_error(format!(
                "Инструмент '{}' не зарегистрирован",
                invocation.tool_name
            ))),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//
// ========== Parameter helpers ==========
//

fn str_param<'a>(invocation: &'a ToolInvocation, name: &str) -> Option<&'a str> {
    invocation.parameters.get(name).and_then(Value::as_str)
}

fn require_str<'a>(invocation: &'a ToolInvocation, name: &str) -> Result<&'a str, ToolFailure> {
    str_param(invocation, name).ok_or_else(|| {
        ToolFailure::invalid_parameters(format!("Ожидается строковый параметр '{}'", name))
    })
}

/// Non-negative integer reading that also accepts integral floats,
/// which chat models emit routinely (`10.0` for `10`). Must agree with
/// the Integer check in `validate`.
fn as_integer(value: &Value) -> Option<u64> {
    if let Some(v) = value.as_u64() {
        return Some(v);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Some(f as u64),
        _ => None,
    }
}

fn usize_param(invocation: &ToolInvocation, name: &str, default: usize) -> usize {
    invocation
        .parameters
        .get(name)
        .and_then(as_integer)
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn success_json<T: Serialize>(payload: &T) -> ToolResult {
    match serde_json::to_value(payload) {
        Ok(value) => ToolResult::success(value),
        Err(e) => ToolResult::failure(ToolFailure::execution_error(format!(
            "Не удалось сериализовать результат: {}",
            e
        ))),
    }
}

fn artist_not_found(artist_name: &str) -> ToolResult {
    ToolResult::failure(ToolFailure::not_found(format!(
        "Артист '{}' не найден",
        artist_name
    )))
}

//
// ========== Catalog tools ==========
//

pub struct SearchArtistsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for SearchArtistsTool {
    fn name(&self) -> &'static str {
        "search_artists"
    }

    fn description(&self) -> &'static str {
        "Поиск артистов по имени. Используй, когда нужно найти артиста или проверить правильность написания имени."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required(
                "query",
                ParamType::String,
                "Поисковый запрос — имя или часть имени артиста",
            ),
            ToolParameter::optional(
                "limit",
                ParamType::Integer,
                "Максимальное количество результатов",
                json!(20),
            ),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let query = match require_str(invocation, "query") {
            Ok(query) => query,
            Err(failure) => return ToolResult::failure(failure),
        };
        let limit = usize_param(invocation, "limit", 20);

        let artists = self.store.search_artists(query, limit);
        success_json(&json!({
            "query": query,
            "count": artists.len(),
            "artists": artists,
        }))
    }
}

pub struct ArtistStreamsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for ArtistStreamsTool {
    fn name(&self) -> &'static str {
        "get_artist_streams"
    }

    fn description(&self) -> &'static str {
        "Статистика стримов артиста: общее количество стримов, доход и средняя цена за стрим."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "artist_name",
            ParamType::String,
            "Точное имя артиста",
        )]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let artist_name = match require_str(invocation, "artist_name") {
            Ok(name) => name,
            Err(failure) => return ToolResult::failure(failure),
        };

        match self.store.artist_totals(artist_name) {
            Some(totals) => {
                let avg_per_stream = if totals.total_streams > 0 {
                    totals.total_revenue / totals.total_streams as f64
                } else {
                    0.0
                };
                success_json(&json!({
                    "artist": totals.artist,
                    "total_streams": totals.total_streams,
                    "total_revenue": totals.total_revenue,
                    "avg_per_stream": avg_per_stream,
                }))
            }
            None => artist_not_found(artist_name),
        }
    }
}

pub struct ArtistPlatformsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for ArtistPlatformsTool {
    fn name(&self) -> &'static str {
        "get_artist_platforms"
    }

    fn description(&self) -> &'static str {
        "Статистика по DSP-платформам артиста (Spotify, Apple Music и т.д.): где артист наиболее популярен."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("artist_name", ParamType::String, "Точное имя артиста"),
            ToolParameter::optional(
                "top_n",
                ParamType::Integer,
                "Количество топ-платформ для показа",
                json!(10),
            ),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let artist_name = match require_str(invocation, "artist_name") {
            Ok(name) => name,
            Err(failure) => return ToolResult::failure(failure),
        };
        let top_n = usize_param(invocation, "top_n", 10);

        match self.store.artist_platforms(artist_name, top_n) {
            Some(platforms) => success_json(&json!({
                "artist": artist_name,
                "platforms": platforms,
            })),
            None => artist_not_found(artist_name),
        }
    }
}

pub struct ArtistGeographyTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for ArtistGeographyTool {
    fn name(&self) -> &'static str {
        "get_artist_geography"
    }

    fn description(&self) -> &'static str {
        "Географическая статистика артиста: в каких странах артист наиболее популярен."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("artist_name", ParamType::String, "Точное имя артиста"),
            ToolParameter::optional(
                "top_n",
                ParamType::Integer,
                "Количество топ-стран для показа",
                json!(15),
            ),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let artist_name = match require_str(invocation, "artist_name") {
            Ok(name) => name,
            Err(failure) => return ToolResult::failure(failure),
        };
        let top_n = usize_param(invocation, "top_n", 15);

        match self.store.artist_geography(artist_name, top_n) {
            Some(countries) => success_json(&json!({
                "artist": artist_name,
                "countries": countries,
            })),
            None => artist_not_found(artist_name),
        }
    }
}

pub struct ArtistTracksTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for ArtistTracksTool {
    fn name(&self) -> &'static str {
        "get_artist_tracks"
    }

    fn description(&self) -> &'static str {
        "Статистика по трекам артиста: самые популярные треки по доходу."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("artist_name", ParamType::String, "Точное имя артиста"),
            ToolParameter::optional(
                "limit",
                ParamType::Integer,
                "Количество топ-треков для показа",
                json!(10),
            ),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let artist_name = match require_str(invocation, "artist_name") {
            Ok(name) => name,
            Err(failure) => return ToolResult::failure(failure),
        };
        let limit = usize_param(invocation, "limit", 10);

        match self.store.artist_tracks(artist_name, limit) {
            Some(tracks) => success_json(&json!({
                "artist": artist_name,
                "tracks": tracks,
            })),
            None => artist_not_found(artist_name),
        }
    }
}

pub struct TopArtistsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for TopArtistsTool {
    fn name(&self) -> &'static str {
        "get_top_artists"
    }

    fn description(&self) -> &'static str {
        "Топ артистов каталога по выручке или стримам."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::optional(
                "limit",
                ParamType::Integer,
                "Количество артистов в топе",
                json!(10),
            ),
            ToolParameter::optional(
                "metric",
                ParamType::String,
                "Метрика сортировки: revenue или streams",
                json!("revenue"),
            ),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let limit = usize_param(invocation, "limit", 10);
        let metric = RankMetric::parse(str_param(invocation, "metric").unwrap_or("revenue"));

        let artists = self.store.top_artists(limit, metric);
        success_json(&json!({
            "metric": match metric {
                RankMetric::Revenue => "revenue",
                RankMetric::Streams => "streams",
            },
            "artists": artists,
        }))
    }
}

pub struct TopPlatformsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for TopPlatformsTool {
    fn name(&self) -> &'static str {
        "get_top_platforms"
    }

    fn description(&self) -> &'static str {
        "Самые популярные DSP-платформы каталога по выручке и стримам."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::optional(
            "limit",
            ParamType::Integer,
            "Количество платформ в топе",
            json!(10),
        )]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let limit = usize_param(invocation, "limit", 10);
        let platforms = self.store.top_platforms(limit);
        success_json(&json!({ "platforms": platforms }))
    }
}

pub struct OverviewStatsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for OverviewStatsTool {
    fn name(&self) -> &'static str {
        "get_overview_stats"
    }

    fn description(&self) -> &'static str {
        "Общая статистика каталога: артисты, треки, платформы, страны, суммарные стримы и выручка."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _invocation: &ToolInvocation) -> ToolResult {
        success_json(&self.store.overview())
    }
}

pub struct TopTracksTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for TopTracksTool {
    fn name(&self) -> &'static str {
        "get_top_tracks"
    }

    fn description(&self) -> &'static str {
        "Топ треков каталога по выручке или стримам. Показывает артиста, название трека, стримы и выручку."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::optional(
                "limit",
                ParamType::Integer,
                "Количество треков в топе",
                json!(10),
            ),
            ToolParameter::optional(
                "metric",
                ParamType::String,
                "Метрика сортировки: revenue или streams",
                json!("revenue"),
            ),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let limit = usize_param(invocation, "limit", 10);
        let metric = RankMetric::parse(str_param(invocation, "metric").unwrap_or("revenue"));

        let tracks = self.store.top_tracks(limit, metric);
        success_json(&json!({
            "metric": match metric {
                RankMetric::Revenue => "revenue",
                RankMetric::Streams => "streams",
            },
            "tracks": tracks,
        }))
    }
}

pub struct TrackDetailsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for TrackDetailsTool {
    fn name(&self) -> &'static str {
        "get_track_details"
    }

    fn description(&self) -> &'static str {
        "Детальная статистика одного трека: суммарные стримы и выручка, разбивка по платформам и странам."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "track_name",
            ParamType::String,
            "Точное название трека",
        )]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let track_name = match require_str(invocation, "track_name") {
            Ok(name) => name,
            Err(failure) => return ToolResult::failure(failure),
        };

        match self.store.track_details(track_name) {
            Some(details) => success_json(&details),
            None => ToolResult::failure(ToolFailure::not_found(format!(
                "Трек '{}' не найден",
                track_name
            ))),
        }
    }
}

pub struct TopCountriesTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for TopCountriesTool {
    fn name(&self) -> &'static str {
        "get_top_countries"
    }

    fn description(&self) -> &'static str {
        "Топ стран каталога по выручке. Показывает страну, стримы, выручку и долю от общей выручки."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::optional(
            "limit",
            ParamType::Integer,
            "Количество стран в топе",
            json!(10),
        )]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let limit = usize_param(invocation, "limit", 10);
        let countries = self.store.top_countries(limit);
        success_json(&json!({ "countries": countries }))
    }
}

pub struct CountryStatsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for CountryStatsTool {
    fn name(&self) -> &'static str {
        "get_country_stats"
    }

    fn description(&self) -> &'static str {
        "Статистика одной страны: суммарные стримы, выручка, доля от каталога и топ артистов в стране."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required(
                "country",
                ParamType::String,
                "Код или название страны, как в отчётах (например KZ, RU, US)",
            ),
            ToolParameter::optional(
                "top_n",
                ParamType::Integer,
                "Количество топ-артистов для показа",
                json!(10),
            ),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let country = match require_str(invocation, "country") {
            Ok(name) => name,
            Err(failure) => return ToolResult::failure(failure),
        };
        let top_n = usize_param(invocation, "top_n", 10);

        match self.store.country_stats(country, top_n) {
            Some(stats) => success_json(&stats),
            None => ToolResult::failure(ToolFailure::not_found(format!(
                "Страна '{}' не найдена в данных",
                country
            ))),
        }
    }
}

pub struct PlatformStatsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for PlatformStatsTool {
    fn name(&self) -> &'static str {
        "get_platform_stats"
    }

    fn description(&self) -> &'static str {
        "Статистика одной платформы: суммарные стримы, выручка, доля от каталога и топ артистов на платформе."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required(
                "platform",
                ParamType::String,
                "Название платформы (например Spotify, Apple Music)",
            ),
            ToolParameter::optional(
                "top_n",
                ParamType::Integer,
                "Количество топ-артистов для показа",
                json!(10),
            ),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let platform = match require_str(invocation, "platform") {
            Ok(name) => name,
            Err(failure) => return ToolResult::failure(failure),
        };
        let top_n = usize_param(invocation, "top_n", 10);

        match self.store.platform_stats(platform, top_n) {
            Some(stats) => success_json(&stats),
            None => ToolResult::failure(ToolFailure::not_found(format!(
                "Платформа '{}' не найдена в данных",
                platform
            ))),
        }
    }
}

pub struct ArtistFullAnalyticsTool {
    store: Arc<CatalogStore>,
}

#[async_trait]
impl Tool for ArtistFullAnalyticsTool {
    fn name(&self) -> &'static str {
        "get_artist_full_analytics"
    }

    fn description(&self) -> &'static str {
        "Полная аналитика по артисту: стримы, выручка, топ платформы, страны и треки. Используй, когда нужна комплексная информация об артисте."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required(
                "artist_name",
                ParamType::String,
                "Точное имя артиста",
            ),
            ToolParameter::optional(
                "top_n",
                ParamType::Integer,
                "Количество топ-элементов для каждой категории",
                json!(10),
            ),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let artist_name = match require_str(invocation, "artist_name") {
            Ok(name) => name,
            Err(failure) => return ToolResult::failure(failure),
        };
        let top_n = usize_param(invocation, "top_n", 10);

        match self.store.artist_full_analytics(artist_name, top_n) {
            Some(full) => success_json(&full),
            None => artist_not_found(artist_name),
        }
    }
}

/// Create the fixed registry of catalog tools backed by one shared store.
pub fn create_default_registry(store: Arc<CatalogStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(OverviewStatsTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(TopArtistsTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(TopTracksTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(TrackDetailsTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(TopPlatformsTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(PlatformStatsTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(TopCountriesTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(CountryStatsTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(SearchArtistsTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(ArtistStreamsTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(ArtistPlatformsTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(ArtistGeographyTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(ArtistTracksTool {
        store: store.clone(),
    }));
    registry.register(Arc::new(ArtistFullAnalyticsTool { store }));

    registry
}
