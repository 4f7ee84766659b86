use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use futures::TryStreamExt;
use shopkeep::catalog::documents_from_json;
use shopkeep::config::Config;
use shopkeep::store::ConfiguredStore;
use shopkeep::{DocumentStore, Page, PageError, PagedCollectionCache, Product};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "shopkeep")]
#[command(about = "Page through and manage the storefront product catalog")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shopkeep/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Records per page (overrides the config file)
  #[arg(long)]
  page_size: Option<usize>,

  /// Print records as JSON lines
  #[arg(long)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print a single page
  Page {
    /// Zero-based page number
    index: usize,
  },
  /// Print every page
  List,
  /// Delete a product and print the repaired page
  Delete {
    /// Document id of the product
    id: String,
    /// Page the product is listed on
    #[arg(long, default_value_t = 0)]
    page: usize,
  },
  /// Import products from a JSON array file
  Seed { file: PathBuf },
  /// Interactive session: n(ext), p(revious), d <id>, r(eload), q(uit)
  Browse,
}

type Cache = PagedCollectionCache<ConfiguredStore, Product>;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = shopkeep::logging::init()?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override page size if specified on command line
  let config = if let Some(page_size) = args.page_size {
    Config { page_size, ..config }
  } else {
    config
  };

  let store = ConfiguredStore::open(&config.store)?;
  let cache =
    PagedCollectionCache::new(store, config.page_size)?.with_order_key(&config.order_key)?;
  let output = Output { json: args.json };

  match args.command {
    Command::Page { index } => {
      let page = walk_to(&cache, index).await?;
      output.page(&page)?;
    }
    Command::List => {
      let mut pages = std::pin::pin!(cache.pages());
      while let Some(page) = pages.try_next().await? {
        output.page(&page)?;
      }
    }
    Command::Delete { id, page } => {
      walk_to(&cache, page).await?;
      let refetch = cache.delete_record(page, &id).await?;
      info!(id = %id, page, refetch, "Deleted product");
      let page = cache.fetch_page(refetch).await?;
      output.page(&page)?;
    }
    Command::Seed { file } => {
      let contents = std::fs::read_to_string(&file)
        .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
      let documents = documents_from_json(&contents)?;
      for document in &documents {
        cache.store().put(document).await?;
      }
      info!(count = documents.len(), file = %file.display(), "Seeded products");
      println!("Imported {} products", documents.len());
    }
    Command::Browse => browse(&cache, &output).await?,
  }

  Ok(())
}

/// Fetch pages 0..=index in order so every boundary before `index` is known.
async fn walk_to(cache: &Cache, index: usize) -> Result<Page<Product>> {
  let mut page = cache.fetch_page(0).await?;
  while page.index < index {
    if !page.has_next {
      return Err(eyre!(
        "Page {} does not exist; the listing has {} pages",
        index,
        page.index + 1
      ));
    }
    page = cache.fetch_page(page.index + 1).await?;
  }
  Ok(page)
}

async fn browse(cache: &Cache, output: &Output) -> Result<()> {
  let mut current = cache.fetch_page(0).await?;
  output.page(&current)?;

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  while let Some(line) = lines.next_line().await? {
    let mut words = line.split_whitespace();
    let target = match (words.next(), words.next()) {
      (Some("q"), _) => break,
      (Some("n"), _) if current.has_next => current.index + 1,
      (Some("n"), _) => {
        println!("Already on the last page");
        continue;
      }
      (Some("p"), _) if current.has_previous() => current.index - 1,
      (Some("p"), _) => {
        println!("Already on the first page");
        continue;
      }
      (Some("r"), _) => current.index,
      (Some("d"), Some(id)) => match cache.delete_record(current.index, id).await {
        Ok(refetch) => refetch,
        Err(e) => {
          report(&e);
          continue;
        }
      },
      _ => {
        println!("Commands: n, p, d <id>, r, q");
        continue;
      }
    };

    match cache.fetch_page(target).await {
      Ok(page) => {
        current = page;
        output.page(&current)?;
      }
      Err(e) => report(&e),
    }
  }

  Ok(())
}

fn report(error: &PageError) {
  warn!(error = %error, "Page operation failed");
  if error.is_retryable() {
    println!("Failed to load products. Please try again. ({})", error);
  } else {
    println!("{}", error);
  }
}

struct Output {
  json: bool,
}

impl Output {
  fn page(&self, page: &Page<Product>) -> Result<()> {
    if self.json {
      for product in &page.records {
        let line =
          serde_json::to_string(product).map_err(|e| eyre!("Failed to encode product: {}", e))?;
        println!("{}", line);
      }
      return Ok(());
    }

    println!(
      "-- page {}{} --",
      page.index + 1,
      if page.has_next { "" } else { " (last)" }
    );
    if page.is_empty() {
      println!("  (no products)");
    }
    for product in &page.records {
      println!(
        "  {:<20} {:<40} {:>9.2}  {:<16} {:.1} ({})",
        product.id,
        product.title,
        product.price,
        product.category,
        product.rating.rate,
        product.rating.count
      );
    }
    Ok(())
  }
}

