use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use listing_scout::export::{self, Column, GroupKey, ListingTable, RowFilter};
use listing_scout::scrapers::ExtractMode;
use listing_scout::{Config, ListingRecord, ListingScraper, SearchFilter};
use std::fmt::Display;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "listing-scout")]
#[command(about = "Scrape real-estate listings through the Firecrawl API")]
#[command(version)]
struct Cli {
    /// Load configuration from this .env-style file
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Save results to this CSV file
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    /// Save results to this JSON file
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Filters applied to scraped or loaded listings before printing and export
#[derive(Args)]
struct FilterArgs {
    /// Keep listings with at least this much living area
    #[arg(long)]
    min_sqft: Option<u32>,

    /// Keep listings whose property type contains this text (repeatable)
    #[arg(long = "type", value_name = "TYPE")]
    property_types: Vec<String>,
}

impl FilterArgs {
    fn into_filter(self) -> RowFilter {
        RowFilter {
            min_sqft: self.min_sqft,
            property_types: self.property_types,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a single listing page
    Single {
        url: String,

        /// Let the provider fill the listing schema instead of pattern matching
        #[arg(long)]
        structured: bool,
    },

    /// Scrape several listing pages in order
    Batch {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        #[arg(long)]
        structured: bool,
    },

    /// Crawl search results and scrape every listing found
    Search {
        /// Location slug, e.g. San-Francisco_CA
        #[arg(long)]
        location: String,
        #[arg(long)]
        price_min: Option<u64>,
        #[arg(long)]
        price_max: Option<u64>,
        #[arg(long)]
        beds_min: Option<u32>,
        #[arg(long)]
        beds_max: Option<u32>,
        #[arg(long)]
        baths_min: Option<f64>,
        #[arg(long)]
        baths_max: Option<f64>,

        /// Maximum number of search pages to crawl
        #[arg(long)]
        limit: Option<u32>,

        /// Milliseconds to wait for dynamic content
        #[arg(long)]
        wait_ms: Option<u64>,

        /// Print summary statistics after scraping
        #[arg(long)]
        summary: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print statistics for a previously exported CSV file
    Summary {
        path: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("🏠 Listing Scout");

    let listings = match cli.command {
        Commands::Summary { path, filter } => {
            let listings = export::read_csv(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            info!("Loaded {} listings from {}", listings.len(), path.display());
            let listings = apply_filter(listings, filter.into_filter());
            print_summary(&listings);
            save_listings(cli.csv.as_ref(), cli.json.as_ref(), &listings)?;
            return Ok(());
        }
        Commands::Single { url, structured } => {
            let mut scraper = build_scraper(cli.env_file.as_ref(), structured, None, None)?;
            let listing = scraper
                .scrape_single(&url)
                .await
                .with_context(|| format!("Failed to scrape {}", url))?;
            vec![listing]
        }
        Commands::Batch { urls, structured } => {
            let mut scraper = build_scraper(cli.env_file.as_ref(), structured, None, None)?;
            let results = scraper.scrape_batch(&urls).await;

            let mut listings = Vec::new();
            for result in results {
                if result.success {
                    listings.extend(result.listings);
                } else {
                    warn!(
                        "Failed: {} ({})",
                        result.source_url,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            listings
        }
        Commands::Search {
            location,
            price_min,
            price_max,
            beds_min,
            beds_max,
            baths_min,
            baths_max,
            limit,
            wait_ms,
            summary,
            filter,
        } => {
            let search = SearchFilter {
                location,
                price_min,
                price_max,
                beds_min,
                beds_max,
                baths_min,
                baths_max,
            };
            let mut scraper = build_scraper(cli.env_file.as_ref(), false, limit, wait_ms)?;
            info!("Searching {}", scraper.build_search_url(&search)?);

            let listings = scraper
                .scrape_search(&search)
                .await
                .context("Search crawl failed")?;
            let listings = apply_filter(listings, filter.into_filter());
            if summary {
                print_summary(&listings);
            }
            listings
        }
    };

    info!("\n✅ Scraped {} listings\n", listings.len());
    print_listings(&listings);
    save_listings(cli.csv.as_ref(), cli.json.as_ref(), &listings)?;

    Ok(())
}

fn save_listings(
    csv: Option<&PathBuf>,
    json: Option<&PathBuf>,
    listings: &[ListingRecord],
) -> anyhow::Result<()> {
    if let Some(path) = csv {
        export::export_csv(listings, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    if let Some(path) = json {
        export::export_json(listings, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn apply_filter(listings: Vec<ListingRecord>, filter: RowFilter) -> Vec<ListingRecord> {
    if filter.is_empty() {
        return listings;
    }
    let before = listings.len();
    let filtered = ListingTable::from_records(&listings).filter(&filter).rows().to_vec();
    info!("Filtered to {} of {} listings", filtered.len(), before);
    filtered
}

fn build_scraper(
    env_file: Option<&PathBuf>,
    structured: bool,
    limit: Option<u32>,
    wait_ms: Option<u64>,
) -> anyhow::Result<ListingScraper<listing_scout::scrapers::FirecrawlClient>> {
    let mut config = match env_file {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(limit) = limit {
        config.crawl_limit = limit;
    }
    if let Some(wait_ms) = wait_ms {
        config.wait_for_ms = wait_ms;
    }

    let mode = if structured {
        ExtractMode::Structured
    } else {
        ExtractMode::Pattern
    };
    Ok(ListingScraper::from_config(&config)?.with_mode(mode))
}

fn print_listings(listings: &[ListingRecord]) {
    for (i, listing) in listings.iter().enumerate() {
        let title = listing.address.as_deref().unwrap_or(&listing.url);
        match listing.price {
            Some(price) => println!("{}. {} (${})", i + 1, title, price),
            None => println!("{}. {}", i + 1, title),
        }
        println!(
            "   {} bd, {} ba, {} sqft",
            or_dash(listing.bedrooms),
            or_dash(listing.bathrooms),
            or_dash(listing.sqft)
        );
        if let Some(kind) = &listing.property_type {
            println!("   Type: {}", kind);
        }
        if let (Some(city), Some(state)) = (&listing.city, &listing.state) {
            println!("   {}, {} {}", city, state, listing.zip_code.as_deref().unwrap_or(""));
        }
        println!("   URL: {}", listing.url);
        println!();
    }
}

fn print_summary(listings: &[ListingRecord]) {
    let table = ListingTable::from_records(listings);
    if table.is_empty() {
        println!("No listings to summarize");
        return;
    }

    match table.describe(Column::Price) {
        Some(stats) => println!("Price statistics:\n{}\n", stats),
        None => println!("Price statistics: no prices extracted\n"),
    }

    let by_beds = table.group_stats(GroupKey::Bedrooms, Column::Price);
    if !by_beds.is_empty() {
        println!("Average price by bedroom count:");
        for group in by_beds {
            println!("   {:>4}  {:>14.2}  (n={})", group.key, group.mean, group.count);
        }
        println!();
    }

    let by_city = table.group_stats(GroupKey::City, Column::Price);
    if !by_city.is_empty() {
        println!("Price by city (mean / median):");
        for group in by_city {
            println!(
                "   {:<20}  {:>14.2}  {:>14.2}  (n={})",
                group.key, group.mean, group.median, group.count
            );
        }
        println!();
    }

    let by_city = table.group_stats(GroupKey::City, Column::PricePerSqft);
    if !by_city.is_empty() {
        println!("Average price per sqft by city:");
        for group in by_city {
            println!("   {:<20}  {:>10.2}  (n={})", group.key, group.mean, group.count);
        }
        println!();
    }

    println!("Data completeness (%):");
    for (field, pct) in table.completeness() {
        println!("   {:<14} {:>6.1}", field, pct);
    }

    println!("\nPotential price outliers: {}", table.price_outliers().len());
}

fn or_dash<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
