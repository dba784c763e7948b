//! IEA energy statistics data browser, driven through a real browser.
//!
//! There is no API: the connector opens the data browser, switches to the
//! table view, picks a country and a year through the page's filter
//! controls and scrapes the rendered table. Country, fuel and year option
//! lists are memoized to `iea_*.csv` files.
//!
//! All page access goes through a [`PageLayout`], which names each control
//! by its role rather than by its position on the page.

pub mod parse;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::persist;
use crate::cache::ListCache;
use crate::config::IeaConfig;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{click_text, wait_and_click, wait_for, wait_for_change, RenderContext};
use crate::table::Table;
use crate::types::{StatError, StatResult};

pub use parse::{clean_cell, parse_table, WideTable, FUEL_COLUMN};

/// CSS selectors for every control the scraper touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLayout {
    /// The "browse as tables" tab.
    pub tables_tab: String,
    pub results_table: String,
    pub country_dropdown: String,
    /// Text input that narrows the country list.
    pub country_filter: String,
    pub country_option: String,
    pub year_dropdown: String,
    pub year_option: String,
    pub fuel_dropdown: String,
    pub fuel_option: String,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            tables_tab: "a[data-tab-id='tables']".to_string(),
            results_table: "div.m-data-table > table".to_string(),
            country_dropdown: "[data-filter='country'] .m-filter-dropdown__toggle".to_string(),
            country_filter: "[data-filter='country'] input[type='text']".to_string(),
            country_option: "[data-filter='country'] .m-filter-dropdown__option".to_string(),
            year_dropdown: "[data-filter='year'] .m-filter-dropdown__toggle".to_string(),
            year_option: "[data-filter='year'] .m-filter-dropdown__content button".to_string(),
            fuel_dropdown: "[data-filter='product'] .m-filter-dropdown__toggle".to_string(),
            fuel_option: "[data-filter='product'] .m-filter-dropdown__option".to_string(),
        }
    }
}

impl PageLayout {
    /// Load a layout from JSON. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> StatResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Option lists that are memoized to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Countries,
    Fuels,
    Years,
}

impl Lookup {
    /// File stem suffix, as in `iea_countries.csv`.
    pub fn name(self) -> &'static str {
        match self {
            Lookup::Countries => "countries",
            Lookup::Fuels => "fuels",
            Lookup::Years => "years",
        }
    }

    /// Header of the single cached column.
    pub fn column(self) -> &'static str {
        match self {
            Lookup::Countries => "country",
            Lookup::Fuels => "fuel",
            Lookup::Years => "year",
        }
    }

    fn selectors(self, layout: &PageLayout) -> (String, String) {
        match self {
            Lookup::Countries => (layout.country_dropdown.clone(), layout.country_option.clone()),
            Lookup::Fuels => (layout.fuel_dropdown.clone(), layout.fuel_option.clone()),
            Lookup::Years => (layout.year_dropdown.clone(), layout.year_option.clone()),
        }
    }
}

/// Which country/year combinations to scrape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IeaRequest {
    pub countries: Vec<String>,
    pub years: Vec<String>,
    /// Keep only these fuel columns; empty keeps all.
    pub fuels: Vec<String>,
    pub write: bool,
}

/// Open `dropdown`, read every option label, close it again.
async fn scrape_labels(
    ctx: &mut dyn RenderContext,
    dropdown: &str,
    option: &str,
    wait: Duration,
) -> StatResult<Vec<String>> {
    wait_and_click(ctx, dropdown, wait).await?;
    wait_for(&*ctx, option, wait).await?;

    let mut labels: Vec<String> = Vec::new();
    for text in ctx.texts(option).await? {
        if !text.is_empty() && !labels.contains(&text) {
            labels.push(text);
        }
    }

    ctx.click_nth(dropdown, 0).await?;
    Ok(labels)
}

/// IEA connector.
pub struct Iea {
    config: IeaConfig,
}

impl Iea {
    pub fn new(config: IeaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IeaConfig {
        &self.config
    }

    fn wait(&self) -> Duration {
        Duration::from_millis(self.config.wait_timeout_ms)
    }

    fn layout(&self) -> &PageLayout {
        &self.config.layout
    }

    /// Launch the browser configured for this connector.
    pub async fn launch(&self) -> StatResult<ChromiumRenderer> {
        ChromiumRenderer::launch(self.config.chromium_path.as_deref(), self.config.headless).await
    }

    /// Load the data browser and switch to the table view.
    pub async fn open(&self, ctx: &mut dyn RenderContext) -> StatResult<()> {
        tracing::info!("opening {}", self.config.url);
        ctx.navigate(&self.config.url, 30_000).await?;

        wait_and_click(ctx, &self.layout().tables_tab, self.wait()).await?;
        wait_for(&*ctx, &self.layout().results_table, self.wait()).await
    }

    /// Cached option list, scraped from the page when the file is missing
    /// or `refresh` is set.
    pub async fn lookup(
        &self,
        ctx: &mut dyn RenderContext,
        lookup: Lookup,
        refresh: bool,
    ) -> StatResult<Vec<String>> {
        let cache = ListCache::new(self.config.lookup_path(lookup.name()), lookup.column());
        let (dropdown, option) = lookup.selectors(self.layout());
        let wait = self.wait();

        cache
            .get_or_insert_with(refresh, move || async move {
                tracing::info!("scraping {} from the page", lookup.name());
                scrape_labels(ctx, &dropdown, &option, wait).await
            })
            .await
    }

    pub async fn countries(
        &self,
        ctx: &mut dyn RenderContext,
        refresh: bool,
    ) -> StatResult<Vec<String>> {
        self.lookup(ctx, Lookup::Countries, refresh).await
    }

    pub async fn fuels(
        &self,
        ctx: &mut dyn RenderContext,
        refresh: bool,
    ) -> StatResult<Vec<String>> {
        self.lookup(ctx, Lookup::Fuels, refresh).await
    }

    pub async fn years(
        &self,
        ctx: &mut dyn RenderContext,
        refresh: bool,
    ) -> StatResult<Vec<String>> {
        self.lookup(ctx, Lookup::Years, refresh).await
    }

    /// Filter the country list by name and pick the first match.
    pub async fn select_country(
        &self,
        ctx: &mut dyn RenderContext,
        country: &str,
    ) -> StatResult<()> {
        let layout = self.layout();
        tracing::debug!("selecting country {country}");
        wait_and_click(ctx, &layout.country_dropdown, self.wait()).await?;
        wait_for(&*ctx, &layout.country_filter, self.wait()).await?;
        ctx.type_into(&layout.country_filter, country).await?;
        wait_and_click(ctx, &layout.country_option, self.wait()).await
    }

    /// Pick the year button whose text is exactly `year`.
    pub async fn select_year(&self, ctx: &mut dyn RenderContext, year: &str) -> StatResult<()> {
        let layout = self.layout();
        tracing::debug!("selecting year {year}");
        wait_and_click(ctx, &layout.year_dropdown, self.wait()).await?;
        click_text(ctx, &layout.year_option, year, self.wait()).await
    }

    /// Scrape the rendered results table in long form.
    pub async fn scrape_table(
        &self,
        ctx: &dyn RenderContext,
        country: &str,
        year: &str,
    ) -> StatResult<Table> {
        let html = self.results_html(ctx).await?;
        parse_table(&html)?.to_long(country, year)
    }

    async fn results_html(&self, ctx: &dyn RenderContext) -> StatResult<String> {
        let selector = &self.layout().results_table;
        wait_for(ctx, selector, self.wait()).await?;
        ctx.outer_html(selector)
            .await?
            .ok_or_else(|| StatError::Browser(format!("{selector} disappeared")))
    }

    /// Scrape every requested country x year in order and concatenate.
    ///
    /// Any failure discards everything collected so far; nothing is written.
    pub async fn fetch(
        &self,
        ctx: &mut dyn RenderContext,
        request: &IeaRequest,
    ) -> StatResult<Table> {
        if request.countries.is_empty() || request.years.is_empty() {
            return Err(StatError::InvalidInput(
                "at least one country and one year are required".to_string(),
            ));
        }
        tracing::info!(
            "pulling data from IEA: {} countries x {} years",
            request.countries.len(),
            request.years.len()
        );

        let results = &self.layout().results_table;
        // A selection re-renders the table asynchronously; each scrape waits
        // for content that differs from the previous one.
        let mut previous = ctx.outer_html(results).await?;
        let mut scraped: Vec<Table> = Vec::new();
        for country in &request.countries {
            self.select_country(ctx, country).await?;
            for year in &request.years {
                self.select_year(ctx, year).await?;
                if !wait_for_change(&*ctx, results, previous.as_deref(), self.wait()).await? {
                    tracing::debug!("results table unchanged for {country} {year}");
                }
                let html = self.results_html(&*ctx).await?;
                let table = parse_table(&html)?.to_long(country, year)?;
                tracing::info!("{country} {year}: {} rows", table.len());
                scraped.push(table);
                previous = Some(html);
            }
        }

        tracing::info!("processing data");
        let mut table = Table::concat(scraped)?;
        if !request.fuels.is_empty() {
            if let Some(fuel_idx) = table.column_index(FUEL_COLUMN) {
                table.retain_rows(|row| {
                    row[fuel_idx]
                        .as_str()
                        .is_some_and(|fuel| request.fuels.iter().any(|f| f == fuel))
                });
            }
        }

        if request.write {
            persist(&table, &self.config.data_path())?;
        }
        Ok(table)
    }
}
