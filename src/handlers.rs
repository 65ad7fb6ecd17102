use std::io::{self, Write};

use futures::future::BoxFuture;
use tracing::info;

use crate::commands::{Command, State};
use crate::db::{Feed, FeedFollowDetails, User};
use crate::error::{Error, Result};
use crate::scraper;

pub fn login<'a>(state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(1, "<name>")?;
        let name = &cmd.args[0];

        let user = state
            .db
            .get_user(name)
            .await?
            .ok_or_else(|| Error::UserNotFound(name.clone()))?;

        state.config.set_user(&user.name)?;
        info!(user = %user.name, "switched user");
        writeln!(state.out, "User switched successfully!")?;
        Ok(())
    })
}

pub fn register<'a>(state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(1, "<name>")?;
        let name = cmd.args[0].trim();
        if name.is_empty() {
            return Err(Error::Usage("usage: register <name>".to_string()));
        }

        let user = state.db.create_user(name).await?;
        state.config.set_user(&user.name)?;

        writeln!(state.out, "User created successfully:")?;
        print_user(&mut state.out, &user)?;
        Ok(())
    })
}

pub fn reset<'a>(state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(0, "")?;

        let removed = state.db.delete_users().await?;
        info!(removed, "reset users");
        writeln!(
            state.out,
            "Database reset successfully! Removed {} users.",
            removed
        )?;
        Ok(())
    })
}

pub fn users<'a>(state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(0, "")?;

        let users = state.db.get_users().await?;
        for user in users {
            if state.config.current_user() == Some(user.name.as_str()) {
                writeln!(state.out, "* {} (current)", user.name)?;
            } else {
                writeln!(state.out, "* {}", user.name)?;
            }
        }
        Ok(())
    })
}

pub fn agg<'a>(state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(1, "<time_between_reqs>")?;
        let interval = scraper::parse_interval(&cmd.args[0])?;

        scraper::run(&state.db, &state.fetcher, interval, &mut *state.out, None).await
    })
}

pub fn add_feed<'a>(
    state: &'a mut State,
    cmd: &'a Command,
    user: User,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(2, "<name> <url>")?;
        let (name, url) = (&cmd.args[0], &cmd.args[1]);

        let feed = state.db.create_feed(name, url, user.id).await?;
        let follow = state.db.create_feed_follow(&user, &feed).await?;

        writeln!(state.out, "Feed created successfully:")?;
        print_feed(&mut state.out, &feed, &user.name)?;
        writeln!(state.out)?;
        writeln!(state.out, "Feed followed successfully:")?;
        print_follow(&mut state.out, &follow)?;
        writeln!(state.out, "=====================================")?;
        Ok(())
    })
}

pub fn feeds<'a>(state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(0, "")?;

        let feeds = state.db.get_feeds().await?;
        if feeds.is_empty() {
            writeln!(state.out, "No feeds found.")?;
            return Ok(());
        }

        writeln!(state.out, "Found {} feeds:", feeds.len())?;
        for entry in feeds {
            print_feed(&mut state.out, &entry.feed, &entry.user_name)?;
            writeln!(state.out, "=====================================")?;
        }
        Ok(())
    })
}

pub fn follow<'a>(
    state: &'a mut State,
    cmd: &'a Command,
    user: User,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(1, "<feed_url>")?;
        let url = &cmd.args[0];

        let feed = state
            .db
            .get_feed_by_url(url)
            .await?
            .ok_or_else(|| Error::FeedNotFound(url.clone()))?;
        let follow = state.db.create_feed_follow(&user, &feed).await?;

        writeln!(state.out, "Feed follow created:")?;
        print_follow(&mut state.out, &follow)?;
        Ok(())
    })
}

pub fn unfollow<'a>(
    state: &'a mut State,
    cmd: &'a Command,
    user: User,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(1, "<feed_url>")?;
        let url = &cmd.args[0];

        let feed = state
            .db
            .get_feed_by_url(url)
            .await?
            .ok_or_else(|| Error::FeedNotFound(url.clone()))?;
        if !state.db.delete_feed_follow(user.id, feed.id).await? {
            return Err(Error::NotFollowing {
                user: user.name,
                url: url.clone(),
            });
        }

        writeln!(state.out, "User {} unfollowed \"{}\"", user.name, url)?;
        Ok(())
    })
}

pub fn following<'a>(
    state: &'a mut State,
    cmd: &'a Command,
    user: User,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        cmd.expect_args(0, "")?;

        let follows = state.db.get_feed_follows_for_user(user.id).await?;
        if follows.is_empty() {
            writeln!(state.out, "No feed follows found for this user.")?;
            return Ok(());
        }

        writeln!(state.out, "Feed follows for user {}:", user.name)?;
        for follow in follows {
            writeln!(state.out, "* {}", follow.feed_name)?;
        }
        Ok(())
    })
}

fn print_user(out: &mut impl Write, user: &User) -> io::Result<()> {
    writeln!(out, "* ID:            {}", user.id)?;
    writeln!(out, "* Created:       {}", user.created_at)?;
    writeln!(out, "* Updated:       {}", user.updated_at)?;
    writeln!(out, "* Name:          {}", user.name)
}

fn print_feed(out: &mut impl Write, feed: &Feed, user_name: &str) -> io::Result<()> {
    writeln!(out, "* ID:            {}", feed.id)?;
    writeln!(out, "* Created:       {}", feed.created_at)?;
    writeln!(out, "* Updated:       {}", feed.updated_at)?;
    writeln!(out, "* Name:          {}", feed.name)?;
    writeln!(out, "* URL:           {}", feed.url)?;
    writeln!(out, "* User:          {}", user_name)?;
    match feed.last_fetched_at {
        Some(at) => writeln!(out, "* LastFetchedAt: {}", at),
        None => writeln!(out, "* LastFetchedAt: never"),
    }
}

fn print_follow(out: &mut impl Write, follow: &FeedFollowDetails) -> io::Result<()> {
    writeln!(out, "* Feed Name:     {}", follow.feed_name)?;
    writeln!(out, "* User Name:     {}", follow.user_name)
}
