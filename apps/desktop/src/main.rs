use std::{
    io::{self, BufRead, Write},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{
    load_settings, ArticleApi, ArticleBrowser, DraftField, Entry, HttpGateway, Outcome,
    SkipReason,
};
use shared::{domain::ArticleId, protocol::Article};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse, search and edit articles on a TechInsight service")]
struct Args {
    /// Overrides API_BASE_URL and client.toml.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Health,
    List,
    Search {
        query: String,
    },
    Show {
        id: i64,
    },
    Create(Fields),
    Edit {
        id: i64,
        #[command(flatten)]
        fields: Fields,
    },
    Delete {
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct Fields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    content: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    published_at: Option<String>,
}

impl Fields {
    fn edits(self) -> Vec<(DraftField, String)> {
        [
            (DraftField::Title, self.title),
            (DraftField::Content, self.content),
            (DraftField::Author, self.author),
            (DraftField::Category, self.category),
            (DraftField::PublishedAt, self.published_at),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut settings = load_settings().context("failed to load client settings")?;
    if let Some(url) = &args.server_url {
        settings = settings.with_base_url(url);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings = settings.with_timeout_ms(timeout_ms);
    }
    tracing::debug!(
        base_url = %settings.api_base_url,
        timeout_ms = settings.request_timeout_ms,
        "settings loaded"
    );

    let gateway = Arc::new(HttpGateway::new(&settings)?);
    let browser = ArticleBrowser::new(gateway.clone());

    match args.command {
        Command::Health => {
            let health = gateway.health().await?;
            println!("service ok={}", health.ok);
        }
        Command::List => {
            browser.load_listing().await?;
            print_working_set(&browser).await;
        }
        Command::Search { query } => {
            if let Outcome::Skipped(SkipReason::EmptyQuery) = browser.run_search(&query).await? {
                bail!("search text must not be empty");
            }
            print_working_set(&browser).await;
        }
        Command::Show { id } => {
            browser.open_detail(ArticleId(id)).await?;
            let detail = browser.snapshot().await.detail;
            let article = detail.context("article detail did not open")?;
            print_article(&article);
        }
        Command::Create(fields) => {
            browser.open_create().await;
            submit_with(&browser, fields).await?;
        }
        Command::Edit { id, fields } => {
            browser.open_edit(ArticleId(id)).await?;
            submit_with(&browser, fields).await?;
        }
        Command::Delete { id, yes } => {
            let article = gateway.get_article(ArticleId(id)).await?;
            let outcome = browser
                .remove_entity(&article, |article| yes || confirm_on_stdin(article))
                .await?;
            match outcome {
                Outcome::Done(()) => println!("deleted article {id}"),
                Outcome::Skipped(reason) => println!("nothing deleted ({reason:?})"),
            }
        }
    }

    Ok(())
}

async fn submit_with(browser: &ArticleBrowser, fields: Fields) -> Result<()> {
    for (field, value) in fields.edits() {
        browser.edit_form(field, value).await;
    }
    match browser.submit_form().await? {
        Outcome::Done(article) => {
            println!("saved article {}", article.id);
            print_article(&article);
        }
        Outcome::Skipped(reason) => bail!("submit did not run ({reason:?})"),
    }
    Ok(())
}

async fn print_working_set(browser: &ArticleBrowser) {
    let view = browser.snapshot().await.view;
    if let Some(message) = view.empty_message() {
        println!("{message}");
        return;
    }
    println!("{}", view.count_label());
    for entry in view.items() {
        let article = entry.article();
        let meta = [article.category.as_deref(), article.author.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" / ");
        match entry {
            Entry::Hit(_) => println!(
                "{:>6}  score={:.3} distance={:.3}  {}  {}",
                article.id.0,
                entry.score().unwrap_or_default(),
                entry.distance().unwrap_or_default(),
                article.title,
                meta
            ),
            Entry::Article(_) => println!("{:>6}  {}  {}", article.id.0, article.title, meta),
        }
    }
}

fn print_article(article: &Article) {
    println!("#{} {}", article.id, article.title);
    if let Some(author) = &article.author {
        println!("author:    {author}");
    }
    if let Some(category) = &article.category {
        println!("category:  {category}");
    }
    match article.published_at_parsed() {
        Some(ts) => println!("published: {}", ts.format("%Y-%m-%d %H:%M")),
        None => {
            if let Some(raw) = &article.published_at {
                println!("published: {raw}");
            }
        }
    }
    println!();
    println!("{}", article.content);
}

fn confirm_on_stdin(article: &Article) -> bool {
    print!("Delete \"{}\"? [y/N] ", article.title);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
