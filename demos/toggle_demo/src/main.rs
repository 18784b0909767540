//! Toggle Demo
//!
//! A small command-line tool showing the Switchboard runtime end to end:
//! configuration loading, local and remote toggles, a composite group,
//! persisted overrides and live observation.
//!
//! # Toggles
//!
//! ```text
//! local                                   remote (remote.json)
//! ├── beta            bool                └── rollout.checkout_v2   bool
//! ├── theme           choice                  rollout.banner        string
//! └── search          group
//!     ├── limit       u32
//!     ├── mode        choice
//!     └── fuzzy       bool
//! ```
//!
//! # Usage
//!
//! ```bash
//! cd demos/toggle_demo
//! cargo run --package toggle-demo -- list
//! cargo run --package toggle-demo -- set search.limit 50
//! cargo run --package toggle-demo -- get search
//! cargo run --package toggle-demo -- watch rollout.checkout_v2
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use switchboard::prelude::*;
use tracing::info;

// ============================================================================
// Toggle Definitions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Theme {
    #[default]
    Light,
    Dark,
    System,
}

impl ToggleChoice for Theme {
    fn all_cases() -> Vec<Self> {
        vec![Theme::Light, Theme::Dark, Theme::System]
    }

    fn raw_value(&self) -> &str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SearchMode {
    #[default]
    Prefix,
    Substring,
}

impl ToggleChoice for SearchMode {
    fn all_cases() -> Vec<Self> {
        vec![SearchMode::Prefix, SearchMode::Substring]
    }

    fn raw_value(&self) -> &str {
        match self {
            SearchMode::Prefix => "prefix",
            SearchMode::Substring => "substring",
        }
    }
}

/// Search tuning, resolved field by field.
#[derive(Debug, Clone, PartialEq)]
struct SearchSettings {
    limit: u32,
    mode: SearchMode,
    fuzzy: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            limit: 10,
            mode: SearchMode::Prefix,
            fuzzy: false,
        }
    }
}

impl ToggleGroup for SearchSettings {
    fn properties() -> PropertyTable<Self> {
        PropertyTable::new()
            .with(
                GroupProperty::value("limit", |s: &mut SearchSettings| &mut s.limit)
                    .with_description("Maximum number of results")
                    .with_debug_values([10_u64, 20, 50]),
            )
            .with(
                GroupProperty::choice("mode", |s: &mut SearchSettings| &mut s.mode)
                    .with_description("Match strategy"),
            )
            .with(GroupProperty::value("fuzzy", |s: &mut SearchSettings| {
                &mut s.fuzzy
            }))
    }
}

/// Every toggle the demo knows about.
struct DemoToggles {
    beta: Toggle<bool>,
    theme: Toggle<Theme>,
    search: Group<SearchSettings>,
    checkout_v2: Option<Toggle<bool>>,
    banner: Option<Toggle<String>>,
}

impl DemoToggles {
    fn define(runtime: &ToggleRuntime) -> Self {
        let beta = runtime.register(
            Toggle::new("beta", false, runtime.local())
                .with_description("Opt into beta features")
                .with_debug_values([true, false]),
        );
        let theme = runtime.register(
            Toggle::choice("theme", Theme::Light, runtime.local())
                .with_description("Color theme"),
        );
        let search = runtime.register(
            Group::<SearchSettings>::new("search", runtime.local())
                .with_description("Search tuning"),
        );

        // Remote toggles exist only when a remote source is configured.
        let remote = runtime.remote();
        let checkout_v2 = remote.clone().map(|provider| {
            runtime.register(
                Toggle::new("rollout.checkout_v2", false, provider)
                    .with_description("New checkout flow"),
            )
        });
        let banner = remote.map(|provider| {
            runtime.register(
                Toggle::new("rollout.banner", String::new(), provider)
                    .with_description("Promotional banner text"),
            )
        });

        Self {
            beta,
            theme,
            search,
            checkout_v2,
            banner,
        }
    }
}

// ============================================================================
// Command Line
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "toggle-demo", about = "Inspect and override Switchboard toggles")]
struct Cli {
    /// Configuration file (defaults to ./switchboard.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `dev`
    #[arg(short, long)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every registered toggle with its effective value
    List,
    /// Print the effective value of one toggle
    Get { key: String },
    /// Override a key; the value is parsed as JSON, falling back to a string
    Set { key: String, value: String },
    /// Remove the override of a key
    Clear { key: String },
    /// Remove every override
    Reset,
    /// Follow a toggle and print each new value
    Watch {
        key: String,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
}

fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from(json),
        Err(_) => Value::from(raw),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn print_listing(runtime: &ToggleRuntime) {
    for toggle in runtime.registry().entries() {
        let (value, error) = toggle.effective();
        let key = toggle.key().to_string();
        let marker = if toggle.has_override() { "*" } else { " " };
        match error {
            Some(e) => println!("{marker} {key:<24} {value}  (default, {e})"),
            None => println!("{marker} {key:<24} {value}"),
        }
        if !toggle.description().is_empty() {
            println!("    {}", toggle.description());
        }
        for property in toggle.children() {
            let key = property.key.to_string();
            let marker = if property.overridden { "*" } else { " " };
            println!("  {marker} {key:<22} {}", property.value);
        }
    }
}

fn print_toggle(runtime: &ToggleRuntime, key: &str) -> Result<()> {
    let Some(toggle) = runtime.registry().find(key) else {
        bail!("no toggle registered under `{key}`");
    };
    let (value, error) = toggle.effective();
    println!("{value}");
    if let Some(e) = error {
        eprintln!("using default: {e}");
    }
    Ok(())
}

async fn watch(toggles: &DemoToggles, key: &str, seconds: Option<u64>) -> Result<()> {
    let mut updates = match key {
        "beta" => toggles.beta.observe().updates().map(|v| v.to_string()).boxed(),
        "theme" => toggles
            .theme
            .observe()
            .updates()
            .map(|v| v.raw_value().to_string())
            .boxed(),
        "search" => toggles
            .search
            .observe()
            .updates()
            .map(|v| format!("{v:?}"))
            .boxed(),
        "rollout.checkout_v2" => toggles
            .checkout_v2
            .as_ref()
            .context("no remote source configured")?
            .observe()
            .updates()
            .map(|v| v.to_string())
            .boxed(),
        "rollout.banner" => toggles
            .banner
            .as_ref()
            .context("no remote source configured")?
            .observe()
            .updates()
            .boxed(),
        other => bail!("`{other}` cannot be watched"),
    };

    let follow = async {
        while let Some(value) = updates.next().await {
            println!("{key} = {value}");
        }
    };
    match seconds {
        Some(seconds) => {
            let _ = tokio::time::timeout(Duration::from_secs(seconds), follow).await;
        }
        None => follow.await,
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = ToggleRuntime::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &cli.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build().context("failed to build the toggle runtime")?;
    let toggles = DemoToggles::define(&runtime);

    runtime.start().await;
    if runtime.config().remote.is_some() && !runtime.remote_loaded() {
        info!("Remote document unavailable, remote toggles use their defaults");
    }

    let outcome = match cli.command {
        Command::List => {
            print_listing(&runtime);
            Ok(())
        }
        Command::Get { key } => print_toggle(&runtime, &key),
        Command::Set { key, value } => runtime
            .overrides()
            .set_value(&KeyPath::new(&key), parse_value(&value))
            .map(|()| println!("{key} overridden"))
            .map_err(Into::into),
        Command::Clear { key } => runtime
            .overrides()
            .clear_value(&KeyPath::new(&key))
            .map(|()| println!("{key} cleared"))
            .map_err(Into::into),
        Command::Reset => runtime
            .registry()
            .clear_all()
            .map(|()| println!("all overrides cleared"))
            .map_err(Into::into),
        Command::Watch { key, seconds } => watch(&toggles, &key, seconds).await,
    };

    runtime.shutdown().await;
    outcome
}
