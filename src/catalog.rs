//! In-memory music-catalog store
//!
//! Loaded once at startup from already-parsed rows and read-only for the
//! process lifetime; unsynchronized concurrent reads are safe. CSV upload
//! and parsing live in an external service, not here.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One distribution report row: a (artist, track, platform, country) cell
/// with its stream count and revenue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRow {
    pub artist: String,
    pub track: String,
    pub platform: String,
    pub country: String,
    pub streams: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtistTotals {
    pub artist: String,
    pub total_streams: u64,
    pub total_revenue: f64,
}

/// One slice of an artist's (or the catalog's) totals: per platform,
/// country or track.
#[derive(Debug, Clone, Serialize)]
pub struct BreakdownEntry {
    pub label: String,
    pub streams: u64,
    pub revenue: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackTotals {
    pub artist: String,
    pub track: String,
    pub total_streams: u64,
    pub total_revenue: f64,
}

/// Aggregated view of one track: totals plus per-platform and
/// per-country slices.
#[derive(Debug, Clone, Serialize)]
pub struct TrackDetails {
    pub artist: String,
    pub track: String,
    pub total_streams: u64,
    pub total_revenue: f64,
    pub platforms: Vec<BreakdownEntry>,
    pub countries: Vec<BreakdownEntry>,
}

/// Aggregated view of one catalog segment (a platform or a country):
/// totals, share of catalog revenue, and the top artists inside it.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentStats {
    pub label: String,
    pub total_streams: u64,
    pub total_revenue: f64,
    pub revenue_share: f64,
    pub artists: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtistFullAnalytics {
    pub artist: String,
    pub total_streams: u64,
    pub total_revenue: f64,
    pub platforms: Vec<BreakdownEntry>,
    pub countries: Vec<BreakdownEntry>,
    pub tracks: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogOverview {
    pub artists: usize,
    pub tracks: usize,
    pub platforms: usize,
    pub countries: usize,
    pub total_streams: u64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMetric {
    Revenue,
    Streams,
}

impl RankMetric {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "streams" | "стримы" => RankMetric::Streams,
            _ => RankMetric::Revenue,
        }
    }
}

pub struct CatalogStore {
    rows: Vec<CatalogRow>,
}

impl CatalogStore {
    pub fn from_rows(rows: Vec<CatalogRow>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn rows_for_artist(&self, artist_name: &str) -> Vec<&CatalogRow> {
        let needle = artist_name.to_lowercase();
        self.rows
            .iter()
            .filter(|row| row.artist.to_lowercase() == needle)
            .collect()
    }

    /// Case-insensitive substring search over artist names,
    /// ranked by revenue descending.
    pub fn search_artists(&self, query: &str, limit: usize) -> Vec<ArtistTotals> {
        let needle = query.to_lowercase();

        let mut totals: BTreeMap<&str, (u64, f64)> = BTreeMap::new();
        for row in &self.rows {
            if row.artist.to_lowercase().contains(&needle) {
                let entry = totals.entry(row.artist.as_str()).or_insert((0, 0.0));
                entry.0 += row.streams;
                entry.1 += row.revenue;
            }
        }

        let mut results: Vec<ArtistTotals> = totals
            .into_iter()
            .map(|(artist, (total_streams, total_revenue))| ArtistTotals {
                artist: artist.to_string(),
                total_streams,
                total_revenue,
            })
            .collect();

        results.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
        results.truncate(limit);
        results
    }

    /// Aggregate totals for an exact artist name (case-insensitive).
    /// Returns None when the artist is absent from the dataset.
    pub fn artist_totals(&self, artist_name: &str) -> Option<ArtistTotals> {
        let rows = self.rows_for_artist(artist_name);
        if rows.is_empty() {
            return None;
        }

        let total_streams = rows.iter().map(|row| row.streams).sum();
        let total_revenue = rows.iter().map(|row| row.revenue).sum();

        Some(ArtistTotals {
            artist: rows[0].artist.clone(),
            total_streams,
            total_revenue,
        })
    }

    pub fn artist_platforms(&self, artist_name: &str, top_n: usize) -> Option<Vec<BreakdownEntry>> {
        self.artist_breakdown(artist_name, top_n, |row| &row.platform)
    }

    pub fn artist_geography(&self, artist_name: &str, top_n: usize) -> Option<Vec<BreakdownEntry>> {
        self.artist_breakdown(artist_name, top_n, |row| &row.country)
    }

    pub fn artist_tracks(&self, artist_name: &str, top_n: usize) -> Option<Vec<BreakdownEntry>> {
        self.artist_breakdown(artist_name, top_n, |row| &row.track)
    }

    fn artist_breakdown<'a, F>(
        &'a self,
        artist_name: &str,
        top_n: usize,
        key: F,
    ) -> Option<Vec<BreakdownEntry>>
    where
        F: Fn(&'a CatalogRow) -> &'a str,
    {
        let rows = self.rows_for_artist(artist_name);
        if rows.is_empty() {
            return None;
        }

        Some(aggregate_breakdown(rows.into_iter(), key, top_n))
    }

    pub fn top_artists(&self, limit: usize, metric: RankMetric) -> Vec<ArtistTotals> {
        let mut totals: BTreeMap<&str, (u64, f64)> = BTreeMap::new();
        for row in &self.rows {
            let entry = totals.entry(row.artist.as_str()).or_insert((0, 0.0));
            entry.0 += row.streams;
            entry.1 += row.revenue;
        }

        let mut results: Vec<ArtistTotals> = totals
            .into_iter()
            .map(|(artist, (total_streams, total_revenue))| ArtistTotals {
                artist: artist.to_string(),
                total_streams,
                total_revenue,
            })
            .collect();

        match metric {
            RankMetric::Revenue => {
                results.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue))
            }
            RankMetric::Streams => results.sort_by(|a, b| b.total_streams.cmp(&a.total_streams)),
        }

        results.truncate(limit);
        results
    }

    pub fn top_platforms(&self, limit: usize) -> Vec<BreakdownEntry> {
        aggregate_breakdown(self.rows.iter(), |row| &row.platform, limit)
    }

    pub fn top_countries(&self, limit: usize) -> Vec<BreakdownEntry> {
        aggregate_breakdown(self.rows.iter(), |row| &row.country, limit)
    }

    /// Catalog-wide track ranking, keyed by (artist, track).
    pub fn top_tracks(&self, limit: usize, metric: RankMetric) -> Vec<TrackTotals> {
        let mut totals: BTreeMap<(&str, &str), (u64, f64)> = BTreeMap::new();
        for row in &self.rows {
            let entry = totals
                .entry((row.artist.as_str(), row.track.as_str()))
                .or_insert((0, 0.0));
            entry.0 += row.streams;
            entry.1 += row.revenue;
        }

        let mut results: Vec<TrackTotals> = totals
            .into_iter()
            .map(|((artist, track), (total_streams, total_revenue))| TrackTotals {
                artist: artist.to_string(),
                track: track.to_string(),
                total_streams,
                total_revenue,
            })
            .collect();

        match metric {
            RankMetric::Revenue => {
                results.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue))
            }
            RankMetric::Streams => results.sort_by(|a, b| b.total_streams.cmp(&a.total_streams)),
        }

        results.truncate(limit);
        results
    }

    /// Totals plus platform and country slices for one track
    /// (exact title, case-insensitive).
    pub fn track_details(&self, track_name: &str) -> Option<TrackDetails> {
        let needle = track_name.to_lowercase();
        let rows: Vec<&CatalogRow> = self
            .rows
            .iter()
            .filter(|row| row.track.to_lowercase() == needle)
            .collect();
        if rows.is_empty() {
            return None;
        }

        Some(TrackDetails {
            artist: rows[0].artist.clone(),
            track: rows[0].track.clone(),
            total_streams: rows.iter().map(|row| row.streams).sum(),
            total_revenue: rows.iter().map(|row| row.revenue).sum(),
            platforms: aggregate_breakdown(rows.iter().copied(), |row| &row.platform, usize::MAX),
            countries: aggregate_breakdown(rows.iter().copied(), |row| &row.country, usize::MAX),
        })
    }

    pub fn platform_stats(&self, platform: &str, top_n: usize) -> Option<SegmentStats> {
        self.segment_stats(platform, top_n, |row| &row.platform)
    }

    pub fn country_stats(&self, country: &str, top_n: usize) -> Option<SegmentStats> {
        self.segment_stats(country, top_n, |row| &row.country)
    }

    fn segment_stats<'a, F>(&'a self, label: &str, top_n: usize, key: F) -> Option<SegmentStats>
    where
        F: Fn(&'a CatalogRow) -> &'a str,
    {
        let needle = label.to_lowercase();
        let rows: Vec<&CatalogRow> = self
            .rows
            .iter()
            .filter(|row| key(row).to_lowercase() == needle)
            .collect();
        if rows.is_empty() {
            return None;
        }

        let total_revenue: f64 = rows.iter().map(|row| row.revenue).sum();
        let catalog_revenue: f64 = self.rows.iter().map(|row| row.revenue).sum();
        let revenue_share = if catalog_revenue > 0.0 {
            (total_revenue / catalog_revenue * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Some(SegmentStats {
            label: key(rows[0]).to_string(),
            total_streams: rows.iter().map(|row| row.streams).sum(),
            total_revenue,
            revenue_share,
            artists: aggregate_breakdown(rows.iter().copied(), |row| &row.artist, top_n),
        })
    }

    /// Everything about one artist in a single payload: totals plus the
    /// top platforms, countries and tracks.
    pub fn artist_full_analytics(
        &self,
        artist_name: &str,
        top_n: usize,
    ) -> Option<ArtistFullAnalytics> {
        let totals = self.artist_totals(artist_name)?;

        Some(ArtistFullAnalytics {
            artist: totals.artist,
            total_streams: totals.total_streams,
            total_revenue: totals.total_revenue,
            platforms: self.artist_platforms(artist_name, top_n)?,
            countries: self.artist_geography(artist_name, top_n)?,
            tracks: self.artist_tracks(artist_name, top_n)?,
        })
    }

    pub fn overview(&self) -> CatalogOverview {
        let artists: HashSet<&str> = self.rows.iter().map(|row| row.artist.as_str()).collect();
        let tracks: HashSet<(&str, &str)> = self
            .rows
            .iter()
            .map(|row| (row.artist.as_str(), row.track.as_str()))
            .collect();
        let platforms: HashSet<&str> = self.rows.iter().map(|row| row.platform.as_str()).collect();
        let countries: HashSet<&str> = self.rows.iter().map(|row| row.country.as_str()).collect();

        CatalogOverview {
            artists: artists.len(),
            tracks: tracks.len(),
            platforms: platforms.len(),
            countries: countries.len(),
            total_streams: self.rows.iter().map(|row| row.streams).sum(),
            total_revenue: self.rows.iter().map(|row| row.revenue).sum(),
        }
    }

    /// Small fixed dataset for the demo binary and tests.
    pub fn sample() -> Self {
        let mut rows = Vec::new();

        let dataset: &[(&str, &str, &[(&str, &str, u64, f64)])] = &[
            (
                "Darkhan Juzz",
                "Qara Bala",
                &[
                    ("Spotify", "KZ", 18_500_000, 41_200.0),
                    ("Spotify", "RU", 9_200_000, 19_800.0),
                    ("Apple Music", "KZ", 6_400_000, 21_500.0),
                    ("YouTube Music", "KZ", 11_000_000, 9_400.0),
                    ("Яндекс Музыка", "RU", 7_800_000, 12_300.0),
                ],
            ),
            (
                "Darkhan Juzz",
                "Tünde",
                &[
                    ("Spotify", "KZ", 7_100_000, 15_900.0),
                    ("Apple Music", "US", 2_300_000, 8_100.0),
                    ("Яндекс Музыка", "RU", 3_600_000, 5_200.0),
                ],
            ),
            (
                "Mona Songz",
                "Ayale",
                &[
                    ("Spotify", "KZ", 12_400_000, 27_600.0),
                    ("Apple Music", "KZ", 4_100_000, 13_800.0),
                    ("YouTube Music", "RU", 8_900_000, 7_100.0),
                ],
            ),
            (
                "Mona Songz",
                "Leila",
                &[
                    ("Spotify", "RU", 5_200_000, 10_900.0),
                    ("Яндекс Музыка", "RU", 6_700_000, 9_800.0),
                ],
            ),
            (
                "Ayau",
                "Tañ Qalamaq",
                &[
                    ("Spotify", "KZ", 3_900_000, 8_400.0),
                    ("Apple Music", "KZ", 1_200_000, 4_100.0),
                    ("YouTube Music", "KZ", 2_800_000, 2_300.0),
                ],
            ),
            (
                "Irina Kairatovna",
                "5000",
                &[
                    ("Spotify", "KZ", 9_800_000, 21_400.0),
                    ("Яндекс Музыка", "RU", 4_400_000, 6_700.0),
                    ("YouTube Music", "KZ", 6_100_000, 5_100.0),
                ],
            ),
        ];

        for (artist, track, cells) in dataset {
            for (platform, country, streams, revenue) in *cells {
                rows.push(CatalogRow {
                    artist: artist.to_string(),
                    track: track.to_string(),
                    platform: platform.to_string(),
                    country: country.to_string(),
                    streams: *streams,
                    revenue: *revenue,
                });
            }
        }

        Self::from_rows(rows)
    }
}

fn aggregate_breakdown<'a, I, F>(rows: I, key: F, top_n: usize) -> Vec<BreakdownEntry>
where
    I: Iterator<Item = &'a CatalogRow>,
    F: Fn(&'a CatalogRow) -> &'a str,
{
    let mut totals: BTreeMap<&str, (u64, f64)> = BTreeMap::new();
    let mut grand_total = 0.0;

    for row in rows {
        let entry = totals.entry(key(row)).or_insert((0, 0.0));
        entry.0 += row.streams;
        entry.1 += row.revenue;
        grand_total += row.revenue;
    }

    let mut entries: Vec<BreakdownEntry> = totals
        .into_iter()
        .map(|(label, (streams, revenue))| BreakdownEntry {
            label: label.to_string(),
            streams,
            revenue,
            percentage: if grand_total > 0.0 {
                (revenue / grand_total * 1000.0).round() / 10.0
            } else {
                0.0
            },
        })
        .collect();

    entries.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    entries.truncate(top_n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_totals_exact_match() {
        let store = CatalogStore::sample();

        let totals = store.artist_totals("Darkhan Juzz").unwrap();
        assert!(totals.total_streams > 0);
        assert!(totals.total_revenue > 0.0);

        // Case-insensitive lookup, canonical spelling in the result
        let lowered = store.artist_totals("darkhan juzz").unwrap();
        assert_eq!(lowered.artist, "Darkhan Juzz");
        assert_eq!(lowered.total_streams, totals.total_streams);

        assert!(store.artist_totals("Неизвестный Артист").is_none());
    }

    #[test]
    fn test_top_artists_sorted_and_limited() {
        let store = CatalogStore::sample();

        let top = store.top_artists(2, RankMetric::Revenue);
        assert_eq!(top.len(), 2);
        assert!(top[0].total_revenue >= top[1].total_revenue);

        let by_streams = store.top_artists(10, RankMetric::Streams);
        for pair in by_streams.windows(2) {
            assert!(pair[0].total_streams >= pair[1].total_streams);
        }
    }

    #[test]
    fn test_platform_breakdown_percentages() {
        let store = CatalogStore::sample();

        let platforms = store.artist_platforms("Darkhan Juzz", 10).unwrap();
        assert!(!platforms.is_empty());
        assert!(platforms[0].revenue >= platforms.last().unwrap().revenue);

        let total_pct: f64 = platforms.iter().map(|p| p.percentage).sum();
        assert!((total_pct - 100.0).abs() < 1.0);
    }

    #[test]
    fn test_search_is_substring_and_ranked() {
        let store = CatalogStore::sample();

        let hits = store.search_artists("juzz", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].artist, "Darkhan Juzz");

        assert!(store.search_artists("zzz-нет", 5).is_empty());
    }

    #[test]
    fn test_top_tracks_sorted_and_keyed_per_track() {
        let store = CatalogStore::sample();

        let top = store.top_tracks(3, RankMetric::Revenue);
        assert_revenue_sorted(&top);
        assert!(top.len() <= 3);

        // Two tracks of the same artist stay separate entries
        let all = store.top_tracks(100, RankMetric::Streams);
        let darkhan_tracks = all.iter().filter(|t| t.artist == "Darkhan Juzz").count();
        assert_eq!(darkhan_tracks, 2);
    }

    fn assert_revenue_sorted(tracks: &[TrackTotals]) {
        for pair in tracks.windows(2) {
            assert!(pair[0].total_revenue >= pair[1].total_revenue);
        }
    }

    #[test]
    fn test_track_details_case_insensitive() {
        let store = CatalogStore::sample();

        let details = store.track_details("qara bala").unwrap();
        assert_eq!(details.track, "Qara Bala");
        assert_eq!(details.artist, "Darkhan Juzz");
        assert!(details.total_streams > 0);
        assert!(!details.platforms.is_empty());
        assert!(!details.countries.is_empty());

        assert!(store.track_details("Несуществующий трек").is_none());
    }

    #[test]
    fn test_platform_stats_revenue_share() {
        let store = CatalogStore::sample();

        let spotify = store.platform_stats("Spotify", 10).unwrap();
        assert_eq!(spotify.label, "Spotify");
        assert!(spotify.revenue_share > 0.0 && spotify.revenue_share <= 100.0);
        assert!(!spotify.artists.is_empty());

        assert!(store.platform_stats("Tidal", 10).is_none());
    }

    #[test]
    fn test_country_stats_and_top_countries() {
        let store = CatalogStore::sample();

        let kz = store.country_stats("KZ", 10).unwrap();
        assert_eq!(kz.label, "KZ");
        assert!(kz.total_streams > 0);

        let countries = store.top_countries(10);
        assert_eq!(countries.len(), 3);
        assert!(countries[0].revenue >= countries[1].revenue);
    }

    #[test]
    fn test_artist_full_analytics_composes_all_slices() {
        let store = CatalogStore::sample();

        let full = store.artist_full_analytics("Darkhan Juzz", 5).unwrap();
        assert_eq!(full.artist, "Darkhan Juzz");
        assert!(full.total_revenue > 0.0);
        assert!(!full.platforms.is_empty());
        assert!(!full.countries.is_empty());
        assert_eq!(full.tracks.len(), 2);

        assert!(store.artist_full_analytics("Никто", 5).is_none());
    }

    #[test]
    fn test_overview_counts() {
        let store = CatalogStore::sample();
        let overview = store.overview();

        assert_eq!(overview.artists, 4);
        assert!(overview.tracks >= overview.artists);
        assert!(overview.total_revenue > 0.0);
    }
}
