//! Scripted shopping session against the Vitrine engine.
//!
//! Walks the full surface in order: category navigation, a listing
//! with batched image resolution, a product page with variant
//! resolution and the purchase gate, a cart shared across two
//! surfaces, and debounced search. Run with `--fail-image ITEM-MUG`
//! to watch a lookup failure degrade into a placeholder.

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vitrine_cart::prelude::*;
use vitrine_catalog::prelude::*;
use vitrine_data::{
    hydrate_stock, pending_codes, BatchConfig, CatalogApi, ImageBatcher, MemoryCatalog,
    MemoryImageSource, PolicyCatalog, ProductQuery, SearchDebouncer, StockQuery, StockRecord,
};

/// Scripted storefront session.
#[derive(Parser)]
#[command(name = "storefront-session")]
#[command(version, about, long_about = None)]
struct Cli {
    /// In-flight image lookups per batch
    #[arg(long, default_value_t = 6)]
    image_concurrency: usize,

    /// Item codes whose image lookups fail upstream (repeatable)
    #[arg(long)]
    fail_image: Vec<String>,

    /// Simulated upstream latency in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn usd(cents: i64) -> Money {
    Money::new(cents, Currency::USD)
}

fn seed_catalog(latency: Duration) -> MemoryCatalog {
    let apparel = Category::new_root("Apparel", "/c/apparel");
    let drinkware = Category::new_root("Drinkware", "/c/drinkware");

    let tee = Product::template("TEE", "T-Shirt", Currency::USD)
        .with_axis(AttributeAxis::new("Color", ["Red", "Blue"]))
        .with_axis(AttributeAxis::new("Size", ["S", "M"]))
        .with_variant(
            Variant::new("TEE-RED-S", usd(1900))
                .with_attribute("Color", "Red")
                .with_attribute("Size", "S"),
        )
        .with_variant(
            Variant::new("TEE-RED-M", usd(1900))
                .with_attribute("Color", "Red")
                .with_attribute("Size", "M"),
        )
        .with_variant(
            Variant::new("TEE-BLUE-S", usd(2100))
                .with_attribute("Color", "Blue")
                .with_attribute("Size", "S"),
        )
        .with_variant(
            Variant::new("TEE-BLUE-M", usd(2100))
                .with_attribute("Color", "Blue")
                .with_attribute("Size", "M")
                .with_sale_price(usd(1800)),
        )
        .with_image("ITEM-TEE")
        .in_category(apparel.id.clone());

    let mug = Product::new("MUG", "Coffee Mug", usd(1200))
        .with_sale_price(usd(900))
        .with_stock(StockInfo::from_total(12))
        .with_image("ITEM-MUG")
        .in_category(drinkware.id.clone());

    let cap = Product::new("CAP", "Baseball Cap", usd(1500))
        .with_stock(StockInfo::from_total(4))
        .with_image("https://cdn.example.com/cap.jpg")
        .in_category(apparel.id.clone());

    let pen = Product::new("PEN-ENG", "Engraved Pen", usd(4500))
        .with_quote_allowed()
        .with_image("ITEM-PEN");

    let kit = Product::new("KIT-START", "Starter Kit", usd(4900))
        .with_stock(StockInfo::from_total(6));

    let mut catalog = MemoryCatalog::new()
        .with_category(apparel)
        .with_category(drinkware)
        .with_product(tee)
        .with_product(mug)
        .with_product(cap)
        .with_product(pen)
        .with_product(kit)
        .with_stock_record(StockRecord::new("TEE-RED-S", "WH-EAST", 3))
        .with_stock_record(StockRecord::new("TEE-RED-S", "WH-WEST", 2))
        .with_stock_record(StockRecord::new("TEE-RED-M", "WH-EAST", 2))
        .with_stock_record(StockRecord::new("TEE-BLUE-S", "WH-WEST", 6))
        .with_stock_record(StockRecord::new("TEE-BLUE-M", "WH-EAST", 7));
    if !latency.is_zero() {
        catalog = catalog.with_latency(latency);
    }
    catalog
}

fn seed_images(cli: &Cli) -> MemoryImageSource {
    let mut source = MemoryImageSource::new()
        .with_image("ITEM-TEE", "https://cdn.example.com/tee.jpg")
        .with_image("ITEM-MUG", "https://cdn.example.com/mug.jpg")
        .with_image("ITEM-PEN", "https://cdn.example.com/pen.jpg");
    for code in &cli.fail_image {
        source = source.with_failure(code.clone());
    }
    source
}

async fn browse<A: CatalogApi>(
    api: &A,
    batcher: &ImageBatcher<MemoryImageSource>,
) -> Result<Vec<Product>> {
    println!("== Categories ==");
    for category in api.get_categories().await? {
        println!("  {}  ->  {}", category.name, category.route);
    }

    println!("\n== Listing ==");
    let listing = api.list_products(&ProductQuery::default()).await?;
    let outcome = batcher.resolve_batch(&pending_codes(&listing)).await;

    for product in &listing {
        let price = match product.price_range() {
            Some(range) => range.display(),
            None => product.effective_price().display(),
        };
        let image = match product.image.as_deref() {
            Some(raw) if !vitrine_data::needs_resolution(raw) => raw.to_string(),
            Some(code) => outcome
                .status_for(code)
                .and_then(|s| s.url.clone())
                .unwrap_or_else(|| "(placeholder)".to_string()),
            None => "(placeholder)".to_string(),
        };
        println!(
            "  {:<12} {:<14} stock {:>3}  {}",
            product.sku,
            price,
            product.aggregate_stock(),
            image
        );
    }
    println!(
        "  images: {} of {} resolved in {:?} ({}% complete)",
        outcome.summary.successful,
        outcome.summary.total,
        outcome.summary.duration,
        batcher.progress().percent()
    );
    if outcome.is_error() {
        println!("  image service unavailable, placeholders everywhere");
    }
    Ok(listing)
}

async fn product_page<A: CatalogApi>(api: &A, listing: &[Product]) -> Result<AddToCart> {
    println!("\n== Product page: T-Shirt ==");
    let id = listing
        .iter()
        .find(|p| p.sku == "TEE")
        .map(|p| p.id.clone())
        .context("seeded listing is missing the T-Shirt")?;

    let mut product = api.get_product(&id).await?;
    let skus: Vec<String> = product.variants.iter().map(|v| v.sku.clone()).collect();
    let balances = api.get_stock_balance(&StockQuery::for_skus(skus)).await?;
    hydrate_stock(&mut product, &balances);

    let mut picker = VariantPicker::new(&product);
    let gate = picker.gate();
    println!(
        "  nothing picked: sku {}  {}",
        gate.display_sku(),
        match &gate {
            PurchaseGate::Locked {
                price_range: Some(range),
            } => range.display(),
            _ => String::new(),
        }
    );

    let resolution = picker.select("Color", "Red");
    println!(
        "  picked Color=Red: {} ({} variants still in play)",
        resolution.as_str(),
        picker.compatible_variants().len()
    );

    let resolution = picker.select("Size", "M");
    println!("  picked Size=M: {}", resolution.as_str());
    match picker.gate() {
        PurchaseGate::Unlocked { sku, price, stock } => {
            println!("  unlocked: sku {sku}  {}  stock {stock}", price.display());
        }
        PurchaseGate::Locked { .. } => println!("  still locked"),
    }

    let variant = picker
        .resolution()
        .variant()
        .context("resolved selection must name a variant")?;
    Ok(AddToCart::resolved(&product, variant))
}

fn cart_session(tee: AddToCart, listing: &[Product]) -> Result<()> {
    println!("\n== Cart, two surfaces ==");
    let backend = MemoryStorage::new();
    let page = CartStore::new(backend.attach());
    let badge = CartStore::new(backend.attach());
    let badge_events = badge.subscribe();

    page.add(tee.clone(), 2)?;
    badge.pump_external()?;
    while let Ok(event) = badge_events.try_recv() {
        println!(
            "  badge saw {:?} change, count now {}",
            event.origin,
            badge.snapshot()?.total_quantity
        );
    }

    // Same identity again: one line, quantities merged.
    page.add(tee, 3)?;
    let snapshot = page.snapshot()?;
    println!(
        "  re-added same variant: {} line(s), quantity {}",
        snapshot.line_count, snapshot.total_quantity
    );

    // Step against the stock ceiling.
    let line_id = snapshot.lines[0].line_id.clone();
    let moved = page.increment(&line_id)?;
    println!(
        "  increment past stock: {}",
        if moved { "moved" } else { "held at ceiling" }
    );

    // Quote-only item goes in at zero stock.
    if let Some(pen) = listing.iter().find(|p| p.sku == "PEN-ENG") {
        let outcome = page.add(AddToCart::simple(pen), 1)?;
        println!("  quote-only pen at zero stock: added = {}", outcome.is_added());
    }

    // A bundle mutates as one unit.
    if let Some(kit) = listing.iter().find(|p| p.sku == "KIT-START") {
        let components = vec![
            CartLine::new(kit.id.clone(), "KIT-MUG", "Kit Mug", usd(0)),
            CartLine::new(kit.id.clone(), "KIT-PEN", "Kit Pen", usd(0)),
        ];
        page.add(AddToCart::bundle(kit, components), 1)?;
    }

    let snapshot = page.snapshot()?;
    println!("  -- cart --");
    for line in &snapshot.lines {
        let marker = if line.is_bundle() { " (bundle)" } else { "" };
        println!(
            "  {:>2} x {:<24}{} {}",
            line.quantity,
            line.name,
            marker,
            line.effective_price().display()
        );
    }
    println!("  subtotal {}", snapshot.subtotal.display());

    badge.pump_external()?;
    println!("  badge count {}", badge.snapshot()?.total_quantity);
    Ok(())
}

async fn search_session<A: CatalogApi>(api: A) -> Result<()> {
    println!("\n== Search ==");
    let debouncer = SearchDebouncer::new(api).with_delay(Duration::from_millis(150));

    // Two quick keystrokes: the first edition is stale before it runs.
    let stale = debouncer.begin();
    let fresh = debouncer.begin();

    if debouncer.run(stale, "shi", 10).await?.is_none() {
        println!("  'shi' superseded, nothing applied");
    }
    if let Some(results) = debouncer.run(fresh, "shirt", 10).await? {
        for product in results {
            println!("  hit: {} ({})", product.name, product.sku);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let catalog = PolicyCatalog::new(seed_catalog(Duration::from_millis(cli.latency_ms)));
    let batcher = ImageBatcher::with_config(
        seed_images(&cli),
        BatchConfig::default().with_concurrency(cli.image_concurrency),
    );

    let listing = browse(&catalog, &batcher).await?;
    let candidate = product_page(&catalog, &listing).await?;
    cart_session(candidate, &listing)?;
    search_session(catalog).await?;

    println!("\nsession complete");
    Ok(())
}
