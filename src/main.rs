use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use tracing::{debug, error, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer};

use vdd_control::build_info::BuildVersionInfo;
use vdd_control::launcher::{Launcher, SystemLauncher};
use vdd_control::page::{BackdropSupport, Link, PageMessage, Selector, SettingsPage};
use vdd_control::settings::{default_settings_path, JsonSettingsStore, MaterialMode, ThemeMode};
use vdd_control::update::{ComparePolicy, GithubReleaseSource, TagFormat, UpdateChecker, UpdateError, Version};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Settings and update checks for the virtual display driver")]
struct Args {
    /// How verbose the output should be, can be set up to 3 times. Has no effect if RUST_LOG is set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to output a JSON log to
    #[arg(short, long, global = true)]
    log_path: Option<PathBuf>,

    /// Settings file to use instead of the one in the user's config directory
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Print the application name and build version
    About,

    /// Show the current theme, or change it
    Theme {
        #[arg(value_enum)]
        mode: Option<ThemeMode>,
    },

    /// Show the current backdrop material, or change it
    Material {
        #[arg(value_enum)]
        mode: Option<MaterialMode>,

        /// Treat the Mica backdrop as unsupported on this machine
        #[arg(long)]
        no_mica: bool,

        /// Treat the Acrylic backdrop as unsupported on this machine
        #[arg(long)]
        no_acrylic: bool,
    },

    /// Open one of the project pages in the browser
    Open {
        #[arg(value_enum)]
        link: Link,
    },

    /// Check GitHub for a newer release
    CheckUpdate {
        /// How the release tag is read, overrides the settings file
        #[arg(long, value_enum)]
        tag_format: Option<TagFormat>,

        /// How versions are compared, overrides the settings file
        #[arg(long, value_enum)]
        compare: Option<ComparePolicy>,

        /// Pretend to be this version instead of the build version
        #[arg(long, value_parser = parse_version)]
        current: Option<Version>,

        /// Open the release page if an update was found
        #[arg(long)]
        open_release: bool,

        /// Open the download link of the asset at this position if an update was found
        #[arg(long)]
        download: Option<usize>,
    },
}

fn parse_version(s: &str) -> Result<Version, String> {
    s.parse().map_err(|e: UpdateError| e.to_string())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let old_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        old_hook(panic_info);
        error!("Backtrace: {:#?}", backtrace);
    }));

    let args = Args::parse();

    tracing_init(&args)?;

    debug!(?args);

    run(args).await
}

async fn run(args: Args) -> color_eyre::Result<()> {
    let settings = args.settings;

    match args.command {
        Command::About => {
            println!("{}", BuildVersionInfo::current().app_info());
        }

        Command::Theme { mode } => {
            let store = load_store(settings)?;
            let mut page = open_page(store, UpdateOverrides::default(), BackdropSupport::default());
            if let Some(mode) = mode {
                let index = option_index(page.theme_selector(), mode.tag())?;
                page.update(PageMessage::ThemeSelected(index));
            }
            print_selector("Theme", page.theme_selector());
        }

        Command::Material {
            mode,
            no_mica,
            no_acrylic,
        } => {
            let backdrop = BackdropSupport {
                mica: !no_mica,
                acrylic: !no_acrylic,
            };
            let store = load_store(settings)?;
            let mut page = open_page(store, UpdateOverrides::default(), backdrop);
            if let Some(mode) = mode {
                let index = option_index(page.material_selector(), mode.tag())?;
                if !page.material_selector().options[index].enabled {
                    warn!("{} is not supported on this machine", mode.tag());
                }
                page.update(PageMessage::MaterialSelected(index));
            }
            print_selector("Material", page.material_selector());
        }

        Command::Open { link } => {
            let store = load_store(settings)?;
            let mut page = open_page(store, UpdateOverrides::default(), BackdropSupport::default());
            page.update(PageMessage::OpenLink(link));
        }

        Command::CheckUpdate {
            tag_format,
            compare,
            current,
            open_release,
            download,
        } => {
            let overrides = UpdateOverrides {
                tag_format,
                compare,
                current,
            };
            let store = load_store(settings)?;
            let mut page = open_page(store, overrides, BackdropSupport::default());

            println!("{}", page.app_info());
            page.dispatch(PageMessage::UpdateClicked).await;

            let card = page.update_card();
            println!("{}", card.header);
            for (i, entry) in card.download_menu.iter().enumerate() {
                println!("  [{i}] {}  {}", entry.text, entry.url);
            }

            if page.checker().state().click_to_release() {
                if open_release {
                    page.dispatch(PageMessage::UpdateClicked).await;
                }
                if let Some(index) = download {
                    if index >= page.update_card().download_menu.len() {
                        return Err(eyre!("there is no download at position {index}"));
                    }
                    page.dispatch(PageMessage::AssetActivated(index)).await;
                }
            }
        }
    }

    Ok(())
}

fn load_store(path: Option<PathBuf>) -> color_eyre::Result<JsonSettingsStore> {
    let path = match path {
        Some(path) => path,
        None => default_settings_path()?,
    };
    JsonSettingsStore::load(&path).wrap_err_with(|| format!("could not load settings from {}", path.display()))
}

/// Per-run replacements for the persisted update preferences.
#[derive(Debug, Default)]
struct UpdateOverrides {
    tag_format: Option<TagFormat>,
    compare: Option<ComparePolicy>,
    current: Option<Version>,
}

fn open_page(
    store: JsonSettingsStore,
    overrides: UpdateOverrides,
    backdrop: BackdropSupport,
) -> SettingsPage<JsonSettingsStore> {
    let prefs = store.settings().update.clone();
    let build = BuildVersionInfo::current();
    let launcher: Arc<dyn Launcher> = Arc::new(SystemLauncher);

    let source = GithubReleaseSource::new(prefs.api_base, prefs.timeout_secs.map(Duration::from_secs));
    let checker = UpdateChecker::new(Arc::new(source), launcher.clone(), overrides.current.unwrap_or(build.version))
        .with_tag_format(overrides.tag_format.unwrap_or(prefs.tag_format))
        .with_compare(overrides.compare.unwrap_or(prefs.compare));

    SettingsPage::new(store, checker, launcher, build, backdrop)
}

fn option_index(selector: &Selector, tag: &str) -> color_eyre::Result<usize> {
    selector
        .options
        .iter()
        .position(|o| o.tag == tag)
        .ok_or_else(|| eyre!("no option tagged {tag}"))
}

fn print_selector(name: &str, selector: &Selector) {
    for (i, option) in selector.options.iter().enumerate() {
        let marker = if i == selector.selected { '*' } else { ' ' };
        let disabled = if option.enabled { "" } else { " (unsupported)" };
        println!("{marker} {name}: {}{disabled}", option.label);
    }
}

fn tracing_init(args: &Args) -> color_eyre::Result<()> {
    tracing_log::LogTracer::init()?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(
            match args.verbose {
                0 => "vdd_control=warn",
                1 => "vdd_control=info",
                2 => "debug",
                _ => "trace",
            }
            .parse()?,
        )
        .from_env_lossy();

    // stdout carries the command output, logs go to stderr
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let file_log = if let Some(log_path) = &args.log_path {
        let log_file =
            File::create(log_path).wrap_err_with(|| format!("could not create log file {}", log_path.display()))?;
        let file_log = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(Mutex::new(log_file))
            .with_filter(tracing::level_filters::LevelFilter::TRACE);
        Some(file_log)
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry().with(stderr_log).with(file_log);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
