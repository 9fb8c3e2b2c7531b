// Plain-text presentation for the command line.
use chrono::{DateTime, Utc};

use crate::interaction::LikeSnapshot;
use crate::models::{Comment, Post};

pub fn distance(miles: f64) -> String {
    let unit = if miles == 1.0 { "mile" } else { "miles" };
    format!("{} {} away", miles, unit)
}

/// `None` when there is nothing to show.
pub fn likes(count: u32) -> Option<String> {
    match count {
        0 => None,
        1 => Some("1 like".to_string()),
        n => Some(format!("{} likes", n)),
    }
}

pub fn feed_summary(count: usize, radius_miles: f64) -> String {
    let noun = if count == 1 { "post" } else { "posts" };
    format!("Showing {} {} within {} miles", count, noun, radius_miles)
}

pub fn date(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y").to_string()
}

pub fn avatar(username: &str) -> String {
    username
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}

pub fn post(post: &Post, image_url: &str) -> String {
    let heart = if post.user_liked { "♥" } else { "♡" };
    let mut out = format!(
        "[{}] #{} {} · {}\n    {}\n",
        avatar(&post.username),
        post.id,
        post.username,
        distance(post.distance_miles),
        image_url
    );
    if !post.caption.is_empty() {
        out.push_str(&format!("    {}\n", post.caption));
    }
    out.push_str(&format!("    {} ", heart));
    if let Some(l) = likes(post.like_count) {
        out.push_str(&l);
        out.push_str(" · ");
    }
    out.push_str(&date(&post.created_at));
    out
}

pub fn like_state(snapshot: LikeSnapshot) -> String {
    let heart = if snapshot.liked { "♥ liked" } else { "♡ not liked" };
    match likes(snapshot.count) {
        Some(l) => format!("{} · {}", heart, l),
        None => heart.to_string(),
    }
}

pub fn comment(comment: &Comment) -> String {
    format!(
        "[{}] {}: {} ({})",
        avatar(&comment.username),
        comment.username,
        comment.text,
        comment.created_at.format("%b %-d")
    )
}
