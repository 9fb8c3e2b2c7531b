//! End-to-end walk through a typical session: log in, load the feed,
//! like a post, and watch the like roll back when the server refuses it.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use locallens::feed::FeedStatus;
use locallens::geolocation::FixedLocationProvider;
use locallens::interaction::{LikeSnapshot, ToggleOutcome};
use locallens::models::{Position, PostId};
use support::{post_json, MockServer};

#[tokio::test]
async fn rejected_like_rolls_back_in_feed_scenario() {
    let server = MockServer::spawn().await;
    server.state.set_posts(vec![
        post_json(5, "bob", 3, false),
        post_json(8, "carol", 0, false),
    ]);
    let app = server.app(Arc::new(FixedLocationProvider::new(Position::new(
        37.77, -122.41,
    ))));

    // Log in; token is stored
    let signed_in = app.sign_in("alice", "secret1").await.unwrap();
    assert_eq!(signed_in.session.token.as_str(), "token-alice");
    let position = signed_in.location.unwrap();
    assert_eq!(position, Position::new(37.77, -122.41));

    // Feed at the acquired position
    let feed = app.feed();
    let posts = feed.load(position).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(feed.status().await, FeedStatus::Ready);

    // Like post 5 while the server refuses likes
    server.state.fail_likes.store(true, Ordering::SeqCst);
    server.state.set_mutation_delay(Duration::from_millis(200));
    let controller = feed.interaction(PostId(5)).await.unwrap();
    assert_eq!(controller.displayed().await, LikeSnapshot::new(false, 3));

    let (outcome, in_flight) = tokio::join!(controller.toggle(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        (
            controller.displayed().await,
            feed.post(PostId(5)).await.map(|p| (p.user_liked, p.like_count)),
        )
    });

    // Optimistic (true, 4) while the request is out, then rolled back
    assert_eq!(in_flight.0, LikeSnapshot::new(true, 4));
    assert_eq!(in_flight.1, Some((true, 4)));
    assert_eq!(outcome, ToggleOutcome::RolledBack(LikeSnapshot::new(false, 3)));
    assert_eq!(controller.displayed().await, LikeSnapshot::new(false, 3));
    let held = feed.post(PostId(5)).await.unwrap();
    assert_eq!((held.user_liked, held.like_count), (false, 3));

    // The request did go out, with the session token
    let calls = server.state.requests_to("/api/posts/5/like");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer token-alice"));

    // Session survives the failure
    assert!(app.sessions.handle().is_authenticated().await);
}
