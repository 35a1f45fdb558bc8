use santvaani_reader::reader::OpenOutcome;
use santvaani_reader::session::{ReaderSession, HELP};
use santvaani_reader::{
    db, routes, CachedContentStore, ChapterNavigator, Paginator, ProgressTracker, ReaderConfig,
    SqliteStore,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "usage: santvaani-reader <book-slug> <chapter-slug> [user-id]\n       santvaani-reader /leelaayen/<book-slug>/<chapter-slug> [user-id]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logs on stderr, pages on stdout
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let parsed = args.first().and_then(|path| routes::parse_chapter_path(path));
    let (book_slug, chapter_slug, user_id) = match (parsed, args.as_slice()) {
        (Some((book, chapter)), [_]) => (book.to_string(), chapter.to_string(), None),
        (Some((book, chapter)), [_, user]) => {
            (book.to_string(), chapter.to_string(), Some(user.clone()))
        }
        (None, [book, chapter]) => (book.clone(), chapter.clone(), None),
        (None, [book, chapter, user]) => (book.clone(), chapter.clone(), Some(user.clone())),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };
    let user_id = user_id.unwrap_or_else(|| "guest".to_string());

    let config = ReaderConfig::load()?;
    let pool = db::connect(&config.database_url).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let content = Arc::new(CachedContentStore::new(
        store.clone(),
        config.chapter_cache_ttl(),
        config.chapter_cache_capacity,
    ));
    let paginator = Paginator::new(config.page_size)?.with_policy(config.split_policy);

    let navigator = match ChapterNavigator::open_route(
        content,
        paginator,
        config.locale,
        &book_slug,
        &chapter_slug,
    )
    .await?
    {
        OpenOutcome::Reading(navigator) => navigator,
        OpenOutcome::Redirect { location } => {
            println!("chapter not available, continue at {}", location);
            return Ok(());
        }
    };

    let tracker =
        ProgressTracker::new(store, user_id).with_completion_threshold(config.completion_threshold);
    let mut session = ReaderSession::new(navigator, tracker);

    eprintln!("{}", HELP);
    session
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    Ok(())
}
