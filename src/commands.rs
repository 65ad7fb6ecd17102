use std::collections::HashMap;
use std::io::Write;

use futures::future::BoxFuture;
use tracing::debug;

use crate::config::Config;
use crate::db::{Database, User};
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::handlers;

/// Where command output goes: stdout for the binary, a buffer in tests.
pub type Output = Box<dyn Write + Send + Sync>;

/// Everything a handler can touch. Passed explicitly to each command.
pub struct State {
    pub config: Config,
    pub db: Database,
    pub fetcher: Fetcher,
    pub out: Output,
}

impl State {
    pub fn new(config: Config, db: Database, fetcher: Fetcher, out: Output) -> Self {
        Self {
            config,
            db,
            fetcher,
            out,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// First word is the command name, the rest are its arguments.
    pub fn from_words<I>(words: I) -> Option<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut words = words.into_iter();
        let name = words.next()?;
        Some(Self::new(name, words.collect()))
    }

    /// Fail with a usage message unless exactly `count` arguments were given.
    pub fn expect_args(&self, count: usize, usage: &str) -> Result<()> {
        if self.args.len() != count {
            let usage = if usage.is_empty() {
                format!("usage: {}", self.name)
            } else {
                format!("usage: {} {}", self.name, usage)
            };
            return Err(Error::Usage(usage));
        }
        Ok(())
    }
}

pub type HandlerFn = for<'a> fn(&'a mut State, &'a Command) -> BoxFuture<'a, Result<()>>;
pub type LoggedInHandlerFn =
    for<'a> fn(&'a mut State, &'a Command, User) -> BoxFuture<'a, Result<()>>;

#[derive(Clone, Copy)]
pub enum Handler {
    Public(HandlerFn),
    /// Runs only with a logged-in user, which is looked up and passed along.
    LoggedIn(LoggedInHandlerFn),
}

impl Handler {
    pub fn public(f: HandlerFn) -> Self {
        Handler::Public(f)
    }

    pub fn logged_in(f: LoggedInHandlerFn) -> Self {
        Handler::LoggedIn(f)
    }

    pub async fn call(&self, state: &mut State, cmd: &Command) -> Result<()> {
        match *self {
            Handler::Public(f) => f(state, cmd).await,
            Handler::LoggedIn(f) => {
                let user = current_user(&state.config, &state.db).await?;
                f(state, cmd, user).await
            }
        }
    }
}

/// Resolve the configured user against the database.
pub async fn current_user(config: &Config, db: &Database) -> Result<User> {
    let name = config.current_user().ok_or(Error::NotLoggedIn)?;
    db.get_user(name)
        .await?
        .ok_or_else(|| Error::UserNotFound(name.to_string()))
}

#[derive(Default)]
pub struct Commands {
    handlers: HashMap<String, Handler>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut commands = Self::new();
        commands.register("login", Handler::public(handlers::login));
        commands.register("register", Handler::public(handlers::register));
        commands.register("reset", Handler::public(handlers::reset));
        commands.register("users", Handler::public(handlers::users));
        commands.register("agg", Handler::public(handlers::agg));
        commands.register("feeds", Handler::public(handlers::feeds));
        commands.register("addfeed", Handler::logged_in(handlers::add_feed));
        commands.register("follow", Handler::logged_in(handlers::follow));
        commands.register("unfollow", Handler::logged_in(handlers::unfollow));
        commands.register("following", Handler::logged_in(handlers::following));
        commands
    }

    pub fn register(&mut self, name: &str, handler: Handler) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn run(&self, state: &mut State, cmd: &Command) -> Result<()> {
        let handler = *self
            .handlers
            .get(&cmd.name)
            .ok_or_else(|| Error::UnknownCommand(cmd.name.clone()))?;

        debug!(command = %cmd.name, args = ?cmd.args, "running command");
        handler.call(state, cmd).await
    }
}
