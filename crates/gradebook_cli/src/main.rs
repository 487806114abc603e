//! Interactive gradebook entry point.
//!
//! # Responsibility
//! - Resolve configuration, start logging and open the configured store.
//! - Hand the session to the menu loop and report fatal setup errors.

mod journal;
mod menu;
mod prompt;
mod render;

use gradebook_core::{
    init_logging, GradebookConfig, GradebookService, JsonFileStore, RecordStore,
    SqliteRecordStore, StorageBackend,
};
use journal::SummaryJournal;
use log::info;
use menu::Menu;
use prompt::ConsolePrompter;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gradebook: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    let config = GradebookConfig::discover(&cwd)?;
    let policy = config.grade_policy()?;

    if let Err(err) = init_logging(&config.logging.level, &config.log_dir(&cwd)) {
        eprintln!("gradebook: logging disabled: {err}");
    }

    let data_path = config.data_path(&cwd);
    let store: Box<dyn RecordStore> = match config.storage.backend {
        StorageBackend::Json => Box::new(JsonFileStore::new(data_path)),
        StorageBackend::Sqlite => Box::new(SqliteRecordStore::open(&data_path)?),
    };
    let mut service = GradebookService::open(store, policy);
    let journal = config.summary_log_path(&cwd).map(SummaryJournal::new);

    let load_error = service.take_load_error();
    let mut prompter = ConsolePrompter::stdio();

    let mut menu = Menu::new(&mut service, &mut prompter, journal.as_ref());
    if let Some(err) = &load_error {
        menu.report_load_error(err);
    }
    menu.run();
    info!(
        "event=app_exit module=cli status=ok unsaved={}",
        service.is_dirty()
    );
    Ok(())
}
