use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use catalog_core::{
    query::parse_min_rating, CatalogEngine, CatalogTransport, CategoryFilter, FetchState,
    HttpTransport, QueryState,
};
use clap::{Parser, Subcommand, ValueEnum};
use shared::domain::{AppId, SortDirection, SortField};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;

#[derive(Parser, Debug)]
#[command(name = "catalog_cli", about = "Browse the VR app catalog")]
struct Args {
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    #[arg(long, global = true, default_value = "catalog.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One page of apps for the given filters.
    List(ListArgs),
    /// Every category the backend knows about.
    Categories,
    /// A single app by id.
    Show { id: String },
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    #[arg(long, default_value = "All")]
    category: String,
    /// Lowest rating to include, 0 to 5. Empty means no minimum.
    #[arg(long, default_value = "")]
    min_rating: String,
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, value_enum, default_value_t = SortArg::Name)]
    sort: SortArg,
    #[arg(long)]
    desc: bool,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long)]
    per_page: Option<u32>,
}

impl Default for ListArgs {
    fn default() -> Self {
        Self {
            category: "All".into(),
            min_rating: String::new(),
            search: String::new(),
            sort: SortArg::Name,
            desc: false,
            page: 1,
            per_page: None,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Name,
    Category,
    Rating,
    Reviews,
}

impl From<SortArg> for SortField {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Name => SortField::Name,
            SortArg::Category => SortField::Category,
            SortArg::Rating => SortField::Rating,
            SortArg::Reviews => SortField::Reviews,
        }
    }
}

fn query_from(args: &ListArgs, default_per_page: u32) -> Result<QueryState> {
    let mut query = QueryState::with_page_size(args.per_page.unwrap_or(default_per_page))?
        .category(CategoryFilter::parse(&args.category))
        .min_rating(parse_min_rating(&args.min_rating)?)?
        .search(args.search.as_str());
    query.sort_field = args.sort.into();
    query.sort_direction = if args.desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    Ok(query.page(args.page))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config)?;
    if let Some(url) = args.api_base_url {
        settings.api_base_url = url;
    }

    let http = HttpTransport::with_timeout(&settings.api_base_url, settings.request_timeout())?;
    info!(api_base_url = %http.base_url(), "using catalog backend");
    let transport: Arc<dyn CatalogTransport> = Arc::new(http);

    let command = args
        .command
        .unwrap_or_else(|| Command::List(ListArgs::default()));
    match command {
        Command::List(list) => {
            let query = query_from(&list, settings.per_page)?;
            let engine = CatalogEngine::with_options(transport, query, settings.debounce());
            if let FetchState::Error(err) = engine.load().await {
                return Err(err.into());
            }
            print!("{}", render::render_view(&engine.view().await));
        }
        Command::Categories => {
            let engine = CatalogEngine::new(transport);
            let categories = engine.fetch_categories().await?;
            print!("{}", render::render_categories(&categories));
        }
        Command::Show { id } => {
            let engine = CatalogEngine::new(transport);
            let record = engine.fetch_app(&AppId(id)).await?;
            print!("{}", render::render_detail(&record));
        }
    }

    Ok(())
}
