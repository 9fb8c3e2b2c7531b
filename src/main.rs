use clap::Parser;
use tracing_subscriber::EnvFilter;

use locallens::comments::Submission;
use locallens::config::{Cli, Command, Config};
use locallens::error::ClientError;
use locallens::interaction::ToggleOutcome;
use locallens::models::PostId;
use locallens::render;
use locallens::state::{AppState, SignIn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::debug!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    let state = AppState::from_config(config)?;
    state.sessions.restore().await;

    if let Err(e) = run(&state, cli.command).await {
        if e.is_unauthorized() {
            state.sessions.invalidate().await;
            eprintln!("Your session has expired. Please log in again.");
        } else {
            eprintln!("{}", e.user_message());
            if e.is_retryable() {
                eprintln!("Try again in a moment.");
            }
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(state: &AppState, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let signed_in = state.sign_up(&username, &email, &password).await?;
            report_sign_in(&signed_in);
        }
        Command::Login { username, password } => {
            let signed_in = state.sign_in(&username, &password).await?;
            report_sign_in(&signed_in);
        }
        Command::Logout => {
            state.sessions.logout().await;
            println!("Logged out.");
        }
        Command::Whoami => match state.sessions.current_session().await {
            Some(session) => println!(
                "Logged in as {}",
                session.username().unwrap_or("an unknown user")
            ),
            None => println!("Not logged in."),
        },
        Command::Feed => show_feed(state).await?,
        Command::Like { post_id } => toggle_like(state, post_id).await?,
        Command::Comments { post_id } => {
            let thread = state.comments(post_id);
            let comments = thread.load().await?;
            println!("Comments ({})", comments.len());
            if comments.is_empty() {
                println!("No comments yet. Be the first!");
            }
            for c in &comments {
                println!("{}", render::comment(c));
            }
        }
        Command::Comment { post_id, text } => {
            let thread = state.comments(post_id);
            match thread.post(&text).await? {
                Submission::Posted(c) => println!("{}", render::comment(&c)),
                Submission::Suppressed => {}
            }
        }
        Command::Post { image, caption } => {
            let created = state.composer().publish(&image, &caption).await?;
            println!("Shared post #{}", created.id);
            show_feed(state).await?;
        }
    }
    Ok(())
}

fn report_sign_in(signed_in: &SignIn) {
    println!(
        "Welcome, {}!",
        signed_in.session.username().unwrap_or("friend")
    );
    match signed_in.location {
        Ok(position) => println!("Location access granted ({})", position),
        Err(ref e) => println!("{}", e),
    }
}

async fn show_feed(state: &AppState) -> Result<(), ClientError> {
    let feed = state.feed();
    let posts = feed.start().await?;

    if posts.is_empty() {
        println!("No posts nearby. Be the first to share something from your area!");
        return Ok(());
    }

    println!(
        "{}\n",
        render::feed_summary(posts.len(), state.config.feed.radius_miles)
    );
    for post in &posts {
        let image_url = post
            .image_url(&state.media_base)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| post.image_path.clone());
        println!("{}\n", render::post(post, &image_url));
    }
    Ok(())
}

async fn toggle_like(state: &AppState, post_id: PostId) -> Result<(), ClientError> {
    let (tx, mut refresh_requests) = tokio::sync::mpsc::unbounded_channel();
    let feed = state.feed().with_refresh_signal(tx);
    feed.start().await?;
    let controller = feed
        .interaction(post_id)
        .await
        .ok_or_else(|| ClientError::validation(format!("Post #{} is not in your feed", post_id)))?;

    match controller.toggle().await {
        ToggleOutcome::Confirmed(_) => {
            // Pull the server's view of the post once the like lands
            if refresh_requests.try_recv().is_ok() {
                if let Err(e) = feed.refresh().await {
                    tracing::warn!("Feed refresh after like failed: {}", e);
                }
            }
            println!("{}", render::like_state(controller.displayed().await));
        }
        ToggleOutcome::RolledBack(snapshot) => {
            println!("Could not update like. {}", render::like_state(snapshot))
        }
        ToggleOutcome::Ignored => {}
    }
    Ok(())
}
