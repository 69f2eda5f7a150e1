//! Scripted collaborators for boot pipeline tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;

use crate::boot::BootContext;
use crate::config::AppConfig;
use crate::error::LunchboxError;
use crate::manifest::{FetchError, ManifestFetcher};
use crate::runner::{CommandOutput, CommandRunner};
use crate::settings::{Settings, StoredSettings};
use crate::sink::BufferSink;
use crate::store::SettingsStore;

pub fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed_output(stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(127),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

#[derive(Default)]
struct RunnerState {
    exec: HashMap<String, CommandOutput>,
    streams: HashMap<String, (Vec<String>, Option<i32>)>,
    calls: Vec<String>,
}

/// Command runner answering from a script. Unknown exec commands behave
/// like a shell that cannot find them; unknown streams fail to spawn.
#[derive(Clone, Default)]
pub struct FakeRunner {
    state: Rc<RefCell<RunnerState>>,
}

impl FakeRunner {
    pub fn on_exec(&self, command_line: &str, output: CommandOutput) -> &Self {
        self.state
            .borrow_mut()
            .exec
            .insert(command_line.to_string(), output);
        self
    }

    pub fn on_stream(&self, command_line: &str, lines: &[&str], exit_code: i32) -> &Self {
        self.state.borrow_mut().streams.insert(
            command_line.to_string(),
            (lines.iter().map(|l| l.to_string()).collect(), Some(exit_code)),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }
}

impl CommandRunner for FakeRunner {
    fn exec<'a>(&'a self, command_line: &'a str) -> LocalBoxFuture<'a, io::Result<CommandOutput>> {
        Box::pin(async move {
            let mut state = self.state.borrow_mut();
            state.calls.push(command_line.to_string());
            Ok(state
                .exec
                .get(command_line)
                .cloned()
                .unwrap_or_else(|| failed_output(&format!("sh: {command_line}: not found"))))
        })
    }

    fn stream<'a>(
        &'a self,
        program: &'a str,
        args: &'a [&'a str],
        on_line: &'a mut dyn FnMut(&str),
    ) -> LocalBoxFuture<'a, io::Result<Option<i32>>> {
        Box::pin(async move {
            let mut command_line = program.to_string();
            for arg in args {
                command_line.push(' ');
                command_line.push_str(arg);
            }
            let scripted = {
                let mut state = self.state.borrow_mut();
                state.calls.push(command_line.clone());
                state.streams.get(&command_line).cloned()
            };
            let Some((lines, code)) = scripted else {
                return Err(io::Error::new(io::ErrorKind::NotFound, format!("{program}: not found")));
            };
            for line in &lines {
                on_line(line);
            }
            Ok(code)
        })
    }
}

#[derive(Default)]
struct StoreState {
    stored: Option<StoredSettings>,
    saves: Vec<StoredSettings>,
    load_error: Option<String>,
    save_error: Option<String>,
}

/// In-memory settings store that records every save.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<StoreState>>,
}

impl MemoryStore {
    pub fn with(stored: StoredSettings) -> Self {
        let store = Self::default();
        store.state.borrow_mut().stored = Some(stored);
        store
    }

    pub fn fail_load(&self, message: &str) {
        self.state.borrow_mut().load_error = Some(message.to_string());
    }

    pub fn fail_save(&self, message: &str) {
        self.state.borrow_mut().save_error = Some(message.to_string());
    }

    pub fn stored(&self) -> Option<StoredSettings> {
        self.state.borrow().stored.clone()
    }

    pub fn saves(&self) -> Vec<StoredSettings> {
        self.state.borrow().saves.clone()
    }
}

fn store_error(message: &str) -> LunchboxError {
    LunchboxError::SettingsLoad {
        path: "memory".into(),
        source: io::Error::other(message.to_string()),
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> LocalBoxFuture<'_, Result<Option<StoredSettings>, LunchboxError>> {
        Box::pin(async move {
            let state = self.state.borrow();
            if let Some(message) = &state.load_error {
                return Err(store_error(message));
            }
            Ok(state.stored.clone())
        })
    }

    fn save<'a>(&'a self, settings: &'a StoredSettings) -> LocalBoxFuture<'a, Result<(), LunchboxError>> {
        Box::pin(async move {
            let mut state = self.state.borrow_mut();
            if let Some(message) = &state.save_error {
                return Err(store_error(message));
            }
            state.saves.push(settings.clone());
            state.stored = Some(settings.clone());
            Ok(())
        })
    }
}

#[derive(Default)]
struct FetcherState {
    response: Option<Result<String, FetchError>>,
    urls: Vec<String>,
}

/// Manifest fetcher returning a canned response.
#[derive(Clone, Default)]
pub struct FakeFetcher {
    state: Rc<RefCell<FetcherState>>,
}

impl FakeFetcher {
    pub fn respond(&self, response: Result<String, FetchError>) {
        self.state.borrow_mut().response = Some(response);
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.borrow().urls.clone()
    }
}

impl ManifestFetcher for FakeFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<String, FetchError>> {
        Box::pin(async move {
            let mut state = self.state.borrow_mut();
            state.urls.push(url.to_string());
            state
                .response
                .clone()
                .unwrap_or_else(|| Err(FetchError::Transport("no response scripted".into())))
        })
    }
}

/// A boot context wired to fakes, with handles kept for assertions.
pub struct Harness {
    pub runner: FakeRunner,
    pub store: MemoryStore,
    pub fetcher: FakeFetcher,
    pub sink: Rc<BufferSink>,
    pub config: AppConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::default())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            runner: FakeRunner::default(),
            store,
            fetcher: FakeFetcher::default(),
            sink: Rc::new(BufferSink::new()),
            config: AppConfig::default(),
        }
    }

    /// Context before `load_settings` has run.
    pub fn context(&self, data_dir: &Path) -> BootContext {
        BootContext::new(
            self.config.clone(),
            data_dir,
            self.sink.clone(),
            Box::new(self.store.clone()),
            Box::new(self.runner.clone()),
            Box::new(self.fetcher.clone()),
        )
    }

    /// Context with settings already loaded from the store.
    pub fn loaded_context(&self, data_dir: &Path) -> BootContext {
        let mut ctx = self.context(data_dir);
        ctx.settings = Some(Settings::from_stored(self.store.stored(), data_dir));
        ctx
    }
}
