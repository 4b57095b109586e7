//! Admission Wizard
//!
//! Terminal front end for the eight-stage membership admission wizard.
//! Progress is saved locally on every edit and each stage is committed to
//! the admissions backend as the applicant moves forward.

use admission_wizard::application::{
    EntryRoute, RecordingNotifier, StageSubmitter, SubmissionReceipt, SubmissionRequest, Transition, Wizard,
    WizardOptions,
};
use admission_wizard::domain::{ApplicationId, SubmitResult};
use admission_wizard::infrastructure::{logging, FileDraftStore, HttpBackend, InMemoryBackend, StageBackend, WizardConfig};
use admission_wizard::presentation::{render_ui, FormView, InputHandler};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "admission-wizard", version, about = "Membership admission wizard")]
struct Cli {
    /// Resume a specific application instead of the last active draft
    #[arg(long, value_name = "ID")]
    application_id: Option<String>,

    /// Stage to open (1-8); limited to the first incomplete stage
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=8))]
    step: Option<u8>,

    /// Path of the TOML configuration file
    #[arg(long, default_value = "admission-wizard.toml")]
    config: PathBuf,

    /// Use an in-process backend instead of the admissions server
    #[arg(long)]
    offline: bool,
}

type Completion = (u64, SubmitResult<SubmissionReceipt>);

/// Entry point for the admission wizard.
///
/// Loads configuration, installs file logging, opens the wizard and runs the
/// terminal event loop until the user quits or the application is submitted.
///
/// # Errors
///
/// Returns an error if configuration, the draft store or terminal setup
/// fail.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = WizardConfig::load(&cli.config)?.with_env_overrides(|name| std::env::var(name).ok())?;
    logging::init(&config.log_file)?;
    tracing::info!(offline = cli.offline, api = %config.api_base_url, "starting admission wizard");

    let backend: Arc<dyn StageBackend> = if cli.offline {
        Arc::new(InMemoryBackend::new())
    } else {
        Arc::new(HttpBackend::new(&config.api_base_url, config.request_timeout())?)
    };
    let drafts = FileDraftStore::new(&config.draft_dir)?;
    let notifier = RecordingNotifier::new();
    let entry = EntryRoute {
        application_id: cli.application_id.map(ApplicationId::new),
        target_step: cli.step,
    };
    let mut wizard = Wizard::open(
        entry,
        Box::new(drafts),
        backend.as_ref(),
        Box::new(notifier.clone()),
        WizardOptions {
            deep_link_override: config.deep_link_override,
        },
    )?;
    let submitter = StageSubmitter::new(backend);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let res = run_app(&mut terminal, &mut wizard, &submitter, &notifier);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    wizard.teardown();

    match res {
        Ok(Some(id)) => println!("Application {id} has been submitted for review."),
        Ok(None) => println!("Your progress has been saved. Run the wizard again to continue."),
        Err(err) => {
            tracing::error!(error = %err, "terminal loop failed");
            eprintln!("{err}");
        }
    }
    Ok(())
}

/// Main event loop.
///
/// Stage submissions run on a worker thread; their results come back over a
/// channel and are applied here, on the only thread that touches the wizard.
/// Returns the application id once stage 8 is committed, or `None` when the
/// user quits.
fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    wizard: &mut Wizard,
    submitter: &StageSubmitter,
    notifier: &RecordingNotifier,
) -> io::Result<Option<ApplicationId>> {
    let (tx, rx) = mpsc::channel::<Completion>();
    let mut view = FormView::default();
    loop {
        if let Some(id) = drain_completions(wizard, &mut view, &rx) {
            return Ok(Some(id));
        }

        let notice = notifier.last();
        terminal.draw(|f| render_ui(f, wizard, &view, notice.as_ref()))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(request) = InputHandler::handle_key_event(wizard, &mut view, key.code, key.modifiers) {
                        spawn_submission(submitter, request, wizard, &tx);
                    }
                }
            }
        }
        if view.quit {
            return Ok(None);
        }
    }
}

fn spawn_submission(
    submitter: &StageSubmitter,
    request: SubmissionRequest,
    wizard: &Wizard,
    tx: &Sender<Completion>,
) {
    let submitter = submitter.clone();
    let liveness = wizard.liveness();
    let tx = tx.clone();
    thread::spawn(move || {
        let result = submitter.submit(&request);
        if liveness.is_live() {
            // The receiver only disappears when the loop has exited.
            let _ = tx.send((request.ticket, result));
        }
    });
}

fn drain_completions(wizard: &mut Wizard, view: &mut FormView, rx: &Receiver<Completion>) -> Option<ApplicationId> {
    for (ticket, result) in rx.try_iter() {
        match wizard.finish_next(ticket, result) {
            Ok(Transition::Finalized { application_id }) => return Some(application_id),
            Ok(Transition::Advanced { .. }) => InputHandler::stage_changed(wizard, view),
            Err(err) => tracing::debug!(error = %err, "submission not applied"),
        }
    }
    None
}
