use clap::{Parser, Subcommand};
use color_eyre::Result;
use dinecache::{
  Choice, Config, Directory, HttpClient, NoopStorage, Restaurant, ReviewDraft, SqliteStorage,
  Storage, SubmitOutcome,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "DINECACHE_LOG";

#[derive(Parser, Debug)]
#[command(name = "dinecache")]
#[command(about = "Browse a restaurant directory that keeps working offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/dinecache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List restaurants, optionally filtered
  Restaurants {
    /// Cuisine to match ("all" for any)
    #[arg(long)]
    cuisine: Option<String>,
    /// Neighborhood to match ("all" for any)
    #[arg(long)]
    neighborhood: Option<String>,
  },
  /// Show one restaurant with its reviews
  Show { id: u64 },
  /// List neighborhoods
  Neighborhoods,
  /// List cuisines
  Cuisines,
  /// List reviews of a restaurant
  Reviews { id: u64 },
  /// Write a review
  Review {
    id: u64,
    #[arg(long)]
    name: String,
    #[arg(long)]
    rating: u8,
    #[arg(long)]
    comments: String,
  },
  /// Mark a restaurant as favorite
  Favorite {
    id: u64,
    /// Clear the favorite flag instead
    #[arg(long)]
    off: bool,
  },
  /// Flip the favorite flag of a restaurant
  Toggle { id: u64 },
  /// List reviews waiting for delivery
  Pending,
  /// Deliver queued reviews now
  Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _guard = init_logging();

  let api = HttpClient::new(&config.server)?;
  info!(server = %api.base_url(), "starting");

  if !config.store.enabled {
    return run(Directory::new(NoopStorage, api), args.command).await;
  }

  let opened = match &config.store.path {
    Some(path) => SqliteStorage::open(path),
    None => SqliteStorage::default_path().and_then(|path| SqliteStorage::open(&path)),
  };

  match opened {
    Ok(storage) => run(Directory::new(storage, api), args.command).await,
    Err(e) => {
      warn!(error = %e, "local store unavailable; continuing without it");
      run(Directory::new(NoopStorage, api), args.command).await
    }
  }
}

/// Log to a daily file in the data directory, leaving stdout for output.
fn init_logging() -> Option<WorkerGuard> {
  let dir = Config::data_dir()?;
  if std::fs::create_dir_all(&dir).is_err() {
    return None;
  }

  let appender = tracing_appender::rolling::daily(dir, "dinecache.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(filter)
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false),
    )
    .init();

  Some(guard)
}

async fn run<S: Storage>(directory: Directory<S, HttpClient>, command: Command) -> Result<()> {
  match command {
    Command::Restaurants {
      cuisine,
      neighborhood,
    } => {
      let cuisine = Choice::from(cuisine.as_deref());
      let neighborhood = Choice::from(neighborhood.as_deref());
      let restaurants = directory
        .fetch_by_cuisine_and_neighborhood(&cuisine, &neighborhood)
        .await?;
      for restaurant in &restaurants {
        print_summary(restaurant);
      }
    }
    Command::Show { id } => {
      let page = directory.load_restaurant_page(id).await?;
      let restaurant = &page.restaurant;
      print_summary(restaurant);
      if let Some(address) = &restaurant.address {
        println!("  {}", address);
      }
      for (day, hours) in &restaurant.operating_hours {
        println!("  {:<10} {}", day, hours);
      }
      if let Some(image) = Directory::<S, HttpClient>::image_url_for_restaurant(restaurant) {
        println!("  photo: {}", image);
      }
      println!("  page: {}", Directory::<S, HttpClient>::url_for_restaurant(restaurant));
      println!();
      for review in &page.reviews {
        println!("{} ({}/5): {}", review.name, review.rating, review.comments);
      }
    }
    Command::Neighborhoods => {
      for neighborhood in directory.fetch_neighborhoods().await? {
        println!("{}", neighborhood);
      }
    }
    Command::Cuisines => {
      for cuisine in directory.fetch_cuisines().await? {
        println!("{}", cuisine);
      }
    }
    Command::Reviews { id } => {
      for review in directory.fetch_reviews_by_restaurant(id).await? {
        println!("{} ({}/5): {}", review.name, review.rating, review.comments);
      }
    }
    Command::Review {
      id,
      name,
      rating,
      comments,
    } => {
      let draft = ReviewDraft {
        restaurant_id: id,
        name,
        rating,
        comments,
      };
      match directory.submit_review(draft).await? {
        SubmitOutcome::Delivered => println!("Review posted."),
        SubmitOutcome::Queued { .. } => {
          println!("Server unreachable; review saved and will be sent later.")
        }
      }
    }
    Command::Favorite { id, off } => {
      let restaurant = directory.set_favorite(id, !off).await?;
      print_summary(&restaurant);
    }
    Command::Toggle { id } => {
      let restaurant = directory.toggle_favorite(id).await?;
      print_summary(&restaurant);
    }
    Command::Pending => {
      for pending in directory.pending_reviews()? {
        let review = &pending.0;
        println!(
          "#{} {} ({}/5): {}",
          review.restaurant_id, review.name, review.rating, review.comments
        );
      }
    }
    Command::Sync => {
      let report = directory.drain_pending().await?;
      println!(
        "Delivered {}, {} still pending.",
        report.delivered, report.remaining
      );
    }
  }

  Ok(())
}

fn print_summary(restaurant: &Restaurant) {
  let star = if restaurant.is_favorite.is_favorite() {
    "*"
  } else {
    " "
  };
  println!(
    "{}{:>4}  {}  [{} / {}]",
    star, restaurant.id, restaurant.name, restaurant.cuisine_type, restaurant.neighborhood
  );
}
